//! Rollup of aggregate rows read across partitioned intervals
//!
//! Each interval becomes a sub-select over the aggregate table of its level;
//! the sub-selects are unioned and rolled up to one row per stream, or per
//! virtual stream when the criteria combine streams.

use chrono::NaiveDateTime;

use solarnet_core::{CombiningConfig, DateRange, DatumCriteria, Result};

use crate::combine::write_combining_ctes;
use crate::filter::{aggregate_table, write_date_conditions, write_order_by, write_stream_cte};
use crate::interval::LocalDateInterval;
use crate::statement::{SqlBuilder, SqlValue};

/// Output columns shared by every rollup statement, in select order
pub const ROLLUP_COLUMNS: [&str; 12] = [
    "stream_id",
    "obj_id",
    "source_id",
    "ts_start",
    "ts_end",
    "names_i",
    "names_a",
    "names_s",
    "data_i",
    "data_a",
    "data_s",
    "data_t",
];

/// Render the complete rollup statement for `intervals`, which must cover
/// `[start, end)` in order.
pub(crate) fn write_rollup(
    b: &mut SqlBuilder,
    criteria: &DatumCriteria,
    intervals: &[LocalDateInterval],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<()> {
    write_stream_cte(b, criteria);

    b.push(", d AS (\n");
    for (i, interval) in intervals.iter().enumerate() {
        if i > 0 {
            b.push("\tUNION ALL\n");
        }
        let table = aggregate_table(interval.aggregation)?;
        b.push("\tSELECT d.stream_id, d.ts_start, d.data_i, d.data_a, d.data_s, d.data_t, d.stat_i, d.read_a\n");
        b.push("\tFROM s\n\tINNER JOIN ").push(table);
        b.push(" d ON d.stream_id = s.stream_id\n");
        let range = DateRange::Local {
            start: Some(interval.start),
            end: Some(interval.end),
        };
        write_date_conditions(b, "d.ts_start", Some(&range));
    }
    b.push(")\n");

    b.push(
        ", r AS (\n\
         \tSELECT d.stream_id, solardatm.rollup_agg_data(\n\
         \t\t(d.data_i, d.data_a, d.data_s, d.data_t, d.stat_i, d.read_a)::solardatm.agg_data\n\
         \t\tORDER BY d.ts_start) AS rollup\n\
         \tFROM d\n\
         \tGROUP BY d.stream_id\n\
         )\n",
    );

    match &criteria.combining {
        Some(combining) => write_combined_select(b, combining, start, end)?,
        None => write_stream_select(b, start, end),
    }
    write_order_by(b, &criteria.sorts);
    Ok(())
}

fn write_range_columns(b: &mut SqlBuilder, start: NaiveDateTime, end: NaiveDateTime) {
    b.push("\t, ")
        .param_cast(SqlValue::LocalTimestamp(start), "timestamp")
        .push(" AS ts_start, ")
        .param_cast(SqlValue::LocalTimestamp(end), "timestamp")
        .push(" AS ts_end\n");
}

fn write_stream_select(b: &mut SqlBuilder, start: NaiveDateTime, end: NaiveDateTime) {
    b.push("SELECT r.stream_id, s.obj_id, s.source_id\n");
    write_range_columns(b, start, end);
    b.push(
        "\t, s.names_i, s.names_a, s.names_s\n\
         \t, (r.rollup).data_i, (r.rollup).data_a, (r.rollup).data_s, (r.rollup).data_t\n\
         FROM r\n\
         INNER JOIN s ON s.stream_id = r.stream_id\n",
    );
}

fn write_combined_select(
    b: &mut SqlBuilder,
    combining: &CombiningConfig,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<()> {
    write_combining_ctes(b, combining)?;
    b.push(", k AS (\n\tSELECT DISTINCT rs.obj_id, rs.source_id FROM rs\n)\n");
    for (name, source) in [("ai", "pi"), ("aa", "pa"), ("ast", "ps")] {
        b.push(", ").push(name).push(" AS (\n");
        b.push("\tSELECT obj_id, source_id, array_agg(name ORDER BY name) AS names, array_agg(val ORDER BY name) AS vals\n");
        b.push("\tFROM ").push(source).push("\n\tGROUP BY obj_id, source_id\n)\n");
    }
    b.push("SELECT NULL::uuid AS stream_id, k.obj_id, k.source_id\n");
    write_range_columns(b, start, end);
    b.push(
        "\t, ai.names AS names_i, aa.names AS names_a, ast.names AS names_s\n\
         \t, ai.vals AS data_i, aa.vals AS data_a, ast.vals AS data_s, pt.tags AS data_t\n\
         FROM k\n\
         LEFT OUTER JOIN ai ON ai.obj_id = k.obj_id AND ai.source_id = k.source_id\n\
         LEFT OUTER JOIN aa ON aa.obj_id = k.obj_id AND aa.source_id = k.source_id\n\
         LEFT OUTER JOIN ast ON ast.obj_id = k.obj_id AND ast.source_id = k.source_id\n\
         LEFT OUTER JOIN pt ON pt.obj_id = k.obj_id AND pt.source_id = k.source_id\n",
    );
    Ok(())
}
