//! SQL fragments shared by the datum statement builders

use tracing::debug;

use solarnet_core::{
    Aggregation, DateRange, DatumCriteria, DatumError, ObjectDatumKind, Page, Result, SortDescriptor,
};

use crate::statement::{SqlArray, SqlBuilder, SqlValue};

/// Write the `s` CTE selecting the streams matching `criteria`.
///
/// Columns: `stream_id, obj_id, source_id, names_i, names_a, names_s, time_zone`.
pub(crate) fn write_stream_cte(b: &mut SqlBuilder, criteria: &DatumCriteria) {
    b.push("WITH s AS (\n\tSELECT s.stream_id, ");
    match criteria.object_kind {
        ObjectDatumKind::Node => {
            b.push(
                "s.node_id AS obj_id, s.source_id, s.names_i, s.names_a, s.names_s\n\
                 \t\t, COALESCE(l.time_zone, 'UTC') AS time_zone\n\
                 \tFROM solardatm.da_datm_meta s\n\
                 \tLEFT OUTER JOIN solarnet.sn_node n ON n.node_id = s.node_id\n\
                 \tLEFT OUTER JOIN solarnet.sn_loc l ON l.id = n.loc_id\n",
            );
        }
        ObjectDatumKind::Location => {
            b.push(
                "s.loc_id AS obj_id, s.source_id, s.names_i, s.names_a, s.names_s\n\
                 \t\t, COALESCE(l.time_zone, 'UTC') AS time_zone\n\
                 \tFROM solardatm.da_loc_datm_meta s\n\
                 \tLEFT OUTER JOIN solarnet.sn_loc l ON l.id = s.loc_id\n",
            );
        }
    }

    let mut keyword = "WHERE";
    if let Some(ids) = criteria.object_ids() {
        let column = match criteria.object_kind {
            ObjectDatumKind::Node => "s.node_id",
            ObjectDatumKind::Location => "s.loc_id",
        };
        b.push("\t").push(keyword).push(" ").push(column).push(" = ANY(");
        b.array(SqlArray::BigInt(ids.to_vec())).push(")\n");
        keyword = "AND";
    }
    if let Some(ids) = criteria.source_ids() {
        b.push("\t").push(keyword);
        if ids.iter().any(|id| is_source_pattern(id)) {
            let patterns = ids.iter().map(|id| source_pattern_to_regex(id)).collect();
            b.push(" s.source_id ~ ANY(").array(SqlArray::Text(patterns));
        } else {
            b.push(" s.source_id = ANY(").array(SqlArray::Text(ids.to_vec()));
        }
        b.push(")\n");
        keyword = "AND";
    }
    if let Some(ids) = criteria.stream_ids() {
        b.push("\t").push(keyword).push(" s.stream_id = ANY(");
        b.array(SqlArray::Uuid(ids.to_vec())).push(")\n");
    }
    b.push(")\n");
}

/// Whether `source_id` uses any of the `*`, `**` or `?` wildcards.
pub fn is_source_pattern(source_id: &str) -> bool {
    source_id.contains(['*', '?'])
}

/// Convert an Ant-style source id pattern into an anchored POSIX regex.
///
/// `?` matches one character and `*` any run of characters, neither crossing
/// a `/`. `**` matches across path segments; as a whole segment it also
/// matches no segment at all, so `/a/**/b` matches `/a/b`.
pub fn source_pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 16);
    regex.push('^');
    let mut chars = pattern.chars().peekable();
    let mut segment_start = true;
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                if segment_start && chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                    segment_start = true;
                    continue;
                }
                regex.push_str(".*");
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '\\' | '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
        segment_start = c == '/';
    }
    regex.push('$');
    regex
}

/// Write `AND` conditions restricting `column` to the criteria's date range.
///
/// Local dates are resolved in each stream's time zone.
pub(crate) fn write_date_conditions(b: &mut SqlBuilder, column: &str, range: Option<&DateRange>) {
    match range {
        Some(DateRange::Absolute { start, end }) => {
            if let Some(start) = start {
                b.push("\tAND ").push(column).push(" >= ");
                b.param_cast(SqlValue::Timestamp(*start), "timestamptz").push("\n");
            }
            if let Some(end) = end {
                b.push("\tAND ").push(column).push(" < ");
                b.param_cast(SqlValue::Timestamp(*end), "timestamptz").push("\n");
            }
        }
        Some(DateRange::Local { start, end }) => {
            if let Some(start) = start {
                b.push("\tAND ").push(column).push(" >= ");
                b.param_cast(SqlValue::LocalTimestamp(*start), "timestamp")
                    .push(" AT TIME ZONE s.time_zone\n");
            }
            if let Some(end) = end {
                b.push("\tAND ").push(column).push(" < ");
                b.param_cast(SqlValue::LocalTimestamp(*end), "timestamp")
                    .push(" AT TIME ZONE s.time_zone\n");
            }
        }
        None => {}
    }
}

/// Result column for a sort key, if the key is supported.
pub fn sort_column(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "node" | "location" | "loc" | "object" | "obj" => Some("obj_id"),
        "source" => Some("source_id"),
        "stream" => Some("stream_id"),
        _ => None,
    }
}

/// Write an `ORDER BY` clause for `sorts`, falling back to object then source.
pub(crate) fn write_order_by(b: &mut SqlBuilder, sorts: &[SortDescriptor]) {
    let mut columns = Vec::with_capacity(sorts.len());
    for sort in sorts {
        match sort_column(&sort.sort_key) {
            Some(column) if !columns.iter().any(|(c, _)| *c == column) => {
                columns.push((column, sort.descending));
            }
            Some(_) => {}
            None => debug!(sort_key = %sort.sort_key, "Ignoring unsupported sort key"),
        }
    }
    if columns.is_empty() {
        columns.push(("obj_id", false));
        columns.push(("source_id", false));
    }

    b.push("ORDER BY ");
    for (i, (column, descending)) in columns.into_iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push(column);
        if descending {
            b.push(" DESC");
        }
    }
    b.push("\n");
}

/// Write `LIMIT`/`OFFSET` for a bounded page. An unbounded page still skips
/// `offset` rows when it is positive.
pub(crate) fn write_limit_offset(b: &mut SqlBuilder, page: &Page) {
    match page.limit() {
        Some(limit) => {
            b.push("LIMIT ").param_cast(SqlValue::Integer(limit), "integer");
            b.push("\nOFFSET ").param_cast(SqlValue::BigInt(page.offset), "bigint");
            b.push("\n");
        }
        None if page.offset > 0 => {
            b.push("OFFSET ").param_cast(SqlValue::BigInt(page.offset), "bigint");
            b.push("\n");
        }
        None => {}
    }
}

/// Aggregate table holding rows of `level`. Year periods read monthly rows.
pub fn aggregate_table(level: Aggregation) -> Result<&'static str> {
    match level {
        Aggregation::Hour => Ok("solardatm.agg_datm_hourly"),
        Aggregation::Day => Ok("solardatm.agg_datm_daily"),
        Aggregation::Month | Aggregation::Year => Ok("solardatm.agg_datm_monthly"),
        other => Err(DatumError::UnsupportedAggregation(other.to_string())),
    }
}
