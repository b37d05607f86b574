//! End-to-end statement rendering from criteria

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

use solarnet_core::{
    Aggregation, CombiningConfig, CombiningType, DatumCriteria, DatumError, SortDescriptor,
};
use solarnet_datum_sql::{
    partition, CombiningSqlGenerator, CursorShape, SelectDatumPartialAggregate, SelectDatumRecordCounts,
    SelectDatumRunningTotal, SelectStreamMetadata, SqlArray, SqlParameter, SqlValue, StatementBuilder,
    StatementConnection, StatementDescription,
};

fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn local_criteria() -> DatumCriteria {
    let mut criteria = DatumCriteria::for_nodes(vec![1, 2, 3])
        .with_source_ids(["/meter/1", "/meter/2"])
        .with_local_dates(local(2020, 1, 15, 6), local(2020, 6, 3, 0));
    criteria.sorts = vec![SortDescriptor::asc("source")];
    criteria
}

fn builders() -> Vec<Box<dyn Fn() -> Result<StatementDescription, DatumError>>> {
    let mut partial = local_criteria();
    partial.aggregation = Some(Aggregation::Month);
    partial.partial_aggregation = Some(Aggregation::Day);

    let mut combined = local_criteria();
    combined.combining = Some(
        CombiningConfig::new(CombiningType::Difference)
            .with_object_map(-1, vec![2, 1])
            .with_source_map("/meter/net", ["/meter/1", "/meter/2"]),
    );

    let absolute = DatumCriteria::for_nodes(vec![1]).with_dates(
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap(),
    );

    let running = local_criteria();
    let metadata = local_criteria();
    vec![
        Box::new(move || SelectDatumRunningTotal::new(running.clone()).statement()),
        Box::new(move || SelectDatumRunningTotal::new(combined.clone()).statement()),
        Box::new(move || SelectDatumPartialAggregate::new(partial.clone()).statement()),
        Box::new(move || SelectDatumRecordCounts::new(absolute.clone()).statement()),
        Box::new(move || SelectStreamMetadata::new(metadata.clone()).statement()),
    ]
}

/// Placeholder numbers in document order.
fn placeholders(sql: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut rest = sql;
    while let Some(pos) = rest.find('$') {
        rest = &rest[pos + 1..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        found.push(digits.parse().unwrap());
    }
    found
}

#[test]
fn rendering_is_deterministic() {
    for build in builders() {
        let first = build().unwrap();
        let second = build().unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.parameters, second.parameters);
    }
}

#[test]
fn placeholders_match_parameters_in_order() {
    for build in builders() {
        let statement = build().unwrap();
        let numbers = placeholders(&statement.sql);
        let expected: Vec<usize> = (1..=statement.parameters.len()).collect();
        assert_eq!(numbers, expected, "{}", statement.query_name);
    }
}

#[test]
fn running_total_repeats_range_dates() {
    let statement = SelectDatumRunningTotal::new(local_criteria()).statement().unwrap();
    let start = SqlParameter::Value(SqlValue::LocalTimestamp(local(2020, 1, 15, 6)));
    let end = SqlParameter::Value(SqlValue::LocalTimestamp(local(2020, 6, 3, 0)));

    // once bounding the first or last interval, once as an output column
    assert_eq!(statement.parameters.iter().filter(|p| **p == start).count(), 2);
    assert_eq!(statement.parameters.iter().filter(|p| **p == end).count(), 2);
    assert_eq!(statement.parameters.last(), Some(&end));
    assert!(statement
        .parameters
        .iter()
        .all(|p| !matches!(p, SqlParameter::Value(SqlValue::Timestamp(_)))));
    assert_eq!(statement.cursor, CursorShape::STREAMING);
}

#[test]
fn combined_running_total_ranks_by_difference() {
    let mut criteria = local_criteria();
    criteria.combining = Some(CombiningConfig::new(CombiningType::Difference).with_object_map(-1, vec![2, 1]));
    let statement = SelectDatumRunningTotal::new(criteria).statement().unwrap();

    assert!(statement
        .sql
        .contains("SUM(CASE rs.prank WHEN 1 THEN p.val ELSE -p.val END ORDER BY rs.prank)"));
    assert!(statement
        .parameters
        .contains(&SqlParameter::Array(SqlArray::BigInt(vec![2, 1]))));
}

#[test]
fn interval_examples() {
    let intervals = partition(
        Aggregation::Year,
        Aggregation::Month,
        local(2020, 3, 1, 0),
        local(2023, 3, 1, 0),
    )
    .unwrap();
    let spans: Vec<(NaiveDateTime, NaiveDateTime, Aggregation)> =
        intervals.iter().map(|i| (i.start, i.end, i.aggregation)).collect();
    assert_eq!(
        spans,
        vec![
            (local(2020, 3, 1, 0), local(2021, 1, 1, 0), Aggregation::Month),
            (local(2021, 1, 1, 0), local(2023, 1, 1, 0), Aggregation::Year),
            (local(2023, 1, 1, 0), local(2023, 3, 1, 0), Aggregation::Month),
        ]
    );
}

#[test]
fn fragment_contract() {
    assert_eq!(CombiningSqlGenerator::fragment(CombiningType::Average, "foo"), "AVG(foo)");
    assert_eq!(
        CombiningSqlGenerator::fragment_ranked(CombiningType::Difference, "foo", "bar"),
        "SUM(CASE bar WHEN 1 THEN foo ELSE -foo END ORDER BY bar)"
    );
}

/// Connection that counts array lifecycles and records bound values.
#[derive(Default)]
struct CountingConnection {
    created: usize,
    freed: usize,
    values: Vec<(usize, SqlValue)>,
}

#[derive(Debug)]
struct CountingError(String);

impl std::fmt::Display for CountingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DatumError> for CountingError {
    fn from(e: DatumError) -> Self {
        Self(e.to_string())
    }
}

#[async_trait]
impl StatementConnection for CountingConnection {
    type Statement = usize;
    type Array = usize;
    type Error = CountingError;

    async fn prepare(&mut self, sql: &str, _cursor: CursorShape) -> Result<usize, CountingError> {
        Ok(placeholders(sql).len())
    }

    async fn create_array(&mut self, values: &SqlArray) -> Result<usize, CountingError> {
        self.created += 1;
        Ok(values.len())
    }

    async fn free_array(&mut self, _array: usize) -> Result<(), CountingError> {
        self.freed += 1;
        Ok(())
    }

    fn bind_array(&mut self, statement: &mut usize, index: usize, _array: &usize) -> Result<(), CountingError> {
        if index >= *statement {
            return Err(CountingError(format!("no parameter {index}")));
        }
        Ok(())
    }

    fn bind_value(&mut self, statement: &mut usize, index: usize, value: &SqlValue) -> Result<(), CountingError> {
        if index >= *statement {
            return Err(CountingError(format!("no parameter {index}")));
        }
        self.values.push((index, value.clone()));
        Ok(())
    }
}

#[test]
fn bind_frees_every_array() {
    let mut criteria = local_criteria();
    criteria.combining = Some(CombiningConfig::new(CombiningType::Sum));
    let builder = SelectDatumRunningTotal::new(criteria);
    let statement = builder.statement().unwrap();
    let arrays = statement
        .parameters
        .iter()
        .filter(|p| matches!(p, SqlParameter::Array(_)))
        .count();

    let mut conn = CountingConnection::default();
    tokio_test::block_on(builder.bind(&mut conn)).unwrap();

    assert_eq!(arrays, 6);
    assert_eq!(conn.created, arrays);
    assert_eq!(conn.freed, arrays);
    assert_eq!(conn.values.len(), statement.parameters.len() - arrays);
}

#[test]
fn bind_reports_precondition_errors() {
    let builder = SelectDatumRunningTotal::new(DatumCriteria::for_nodes(vec![1]));
    let mut conn = CountingConnection::default();
    let err = tokio_test::block_on(builder.bind(&mut conn)).unwrap_err();
    assert!(err.0.contains("Missing required filter"));
    assert_eq!(conn.created, 0);
}
