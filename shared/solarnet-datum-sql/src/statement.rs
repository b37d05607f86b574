//! Statement descriptions and parameter binding
//!
//! Builders render a [`StatementDescription`]: SQL text with PostgreSQL `$n`
//! placeholders, one [`SqlParameter`] per placeholder occurrence in document
//! order, and the cursor shape the statement should be executed with. A
//! [`StatementConnection`] turns a description into a prepared statement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use solarnet_core::{DatumError, Result};

/// Names of the statements the engine renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryName {
    FindDatumRecordCounts,
    FindDatumRecordCountsCount,
    FindDatumRunningTotal,
    FindDatumPartialAggregate,
    FindStreamMetadata,
    StoreDatumAuxiliary,
    MoveDatumAuxiliary,
    GetDatumAuxiliary,
}

impl QueryName {
    pub const ALL: [QueryName; 8] = [
        Self::FindDatumRecordCounts,
        Self::FindDatumRecordCountsCount,
        Self::FindDatumRunningTotal,
        Self::FindDatumPartialAggregate,
        Self::FindStreamMetadata,
        Self::StoreDatumAuxiliary,
        Self::MoveDatumAuxiliary,
        Self::GetDatumAuxiliary,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::FindDatumRecordCounts => "find-datum-record-counts",
            Self::FindDatumRecordCountsCount => "find-datum-record-counts-count",
            Self::FindDatumRunningTotal => "find-datum-running-total",
            Self::FindDatumPartialAggregate => "find-datum-partial-agg",
            Self::FindStreamMetadata => "find-stream-metadata",
            Self::StoreDatumAuxiliary => "store-datum-aux",
            Self::MoveDatumAuxiliary => "move-datum-aux",
            Self::GetDatumAuxiliary => "get-datum-aux",
        }
    }

    /// The `-count` companion of a pageable query.
    pub fn count_variant(&self) -> Option<QueryName> {
        match self {
            Self::FindDatumRecordCounts => Some(Self::FindDatumRecordCountsCount),
            _ => None,
        }
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for QueryName {
    type Err = DatumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.id() == s)
            .ok_or_else(|| DatumError::InvalidIdentifier(s.to_string()))
    }
}

impl Serialize for QueryName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

/// Values bound as a single database array parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum SqlArray {
    BigInt(Vec<i64>),
    Text(Vec<String>),
    Uuid(Vec<Uuid>),
}

impl SqlArray {
    /// PostgreSQL element type name.
    pub fn element_type(&self) -> &'static str {
        match self {
            Self::BigInt(_) => "bigint",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::BigInt(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Uuid(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scalar parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SqlValue {
    BigInt(i64),
    Integer(i32),
    Text(Option<String>),
    Uuid(Uuid),
    /// Time zone aware instant, bound as `timestamptz`.
    Timestamp(DateTime<Utc>),
    /// Zone-local date-time, bound as `timestamp` without conversion.
    LocalTimestamp(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlParameter {
    Array(SqlArray),
    Value(SqlValue),
}

impl From<SqlArray> for SqlParameter {
    fn from(array: SqlArray) -> Self {
        Self::Array(array)
    }
}

impl From<SqlValue> for SqlParameter {
    fn from(value: SqlValue) -> Self {
        Self::Value(value)
    }
}

/// Result set shape requested from the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorShape {
    pub forward_only: bool,
    pub read_only: bool,
    pub close_at_commit: bool,
}

impl CursorShape {
    /// Forward-only, read-only cursor closed when the transaction commits,
    /// for results consumed incrementally rather than materialized.
    pub const STREAMING: CursorShape = CursorShape {
        forward_only: true,
        read_only: true,
        close_at_commit: true,
    };

    pub fn is_streaming(&self) -> bool {
        self.forward_only && self.read_only
    }
}

/// Rendered statement ready to be prepared and bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementDescription {
    pub query_name: QueryName,
    pub sql: String,
    pub parameters: Vec<SqlParameter>,
    pub cursor: CursorShape,
}

/// Accumulates SQL text and its parameters, numbering placeholders as they
/// are written so text and parameter order cannot drift apart.
#[derive(Debug, Default)]
pub(crate) struct SqlBuilder {
    sql: String,
    parameters: Vec<SqlParameter>,
}

impl SqlBuilder {
    pub(crate) fn new() -> Self {
        Self {
            sql: String::with_capacity(1024),
            parameters: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Write a `$n` placeholder for `parameter`.
    pub(crate) fn param(&mut self, parameter: impl Into<SqlParameter>) -> &mut Self {
        self.parameters.push(parameter.into());
        self.sql.push('$');
        self.sql.push_str(&self.parameters.len().to_string());
        self
    }

    /// Write a `$n::cast` placeholder for `parameter`.
    pub(crate) fn param_cast(&mut self, parameter: impl Into<SqlParameter>, cast: &str) -> &mut Self {
        self.param(parameter);
        self.sql.push_str("::");
        self.sql.push_str(cast);
        self
    }

    /// Write an array placeholder cast to the array's element type.
    pub(crate) fn array(&mut self, array: SqlArray) -> &mut Self {
        let cast = format!("{}[]", array.element_type());
        self.param_cast(array, &cast)
    }

    pub(crate) fn finish(self, query_name: QueryName, cursor: CursorShape) -> Result<StatementDescription> {
        let absolute = self
            .parameters
            .iter()
            .any(|p| matches!(p, SqlParameter::Value(SqlValue::Timestamp(_))));
        let local = self
            .parameters
            .iter()
            .any(|p| matches!(p, SqlParameter::Value(SqlValue::LocalTimestamp(_))));
        if absolute && local {
            return Err(DatumError::MixedDateTyping {
                query: query_name.to_string(),
            });
        }

        debug!(
            query = %query_name,
            parameters = self.parameters.len(),
            streaming = cursor.is_streaming(),
            "Rendered statement"
        );

        Ok(StatementDescription {
            query_name,
            sql: self.sql,
            parameters: self.parameters,
            cursor,
        })
    }
}

/// Database access needed to realize a [`StatementDescription`].
#[async_trait]
pub trait StatementConnection: Send {
    type Statement: Send;
    type Array: Send + Sync;
    type Error: From<DatumError> + fmt::Display + Send;

    async fn prepare(
        &mut self,
        sql: &str,
        cursor: CursorShape,
    ) -> std::result::Result<Self::Statement, Self::Error>;

    async fn create_array(&mut self, values: &SqlArray) -> std::result::Result<Self::Array, Self::Error>;

    async fn free_array(&mut self, array: Self::Array) -> std::result::Result<(), Self::Error>;

    /// Bind an array to the zero-based parameter `index`.
    fn bind_array(
        &mut self,
        statement: &mut Self::Statement,
        index: usize,
        array: &Self::Array,
    ) -> std::result::Result<(), Self::Error>;

    /// Bind a scalar to the zero-based parameter `index`.
    fn bind_value(
        &mut self,
        statement: &mut Self::Statement,
        index: usize,
        value: &SqlValue,
    ) -> std::result::Result<(), Self::Error>;
}

/// Prepare `statement` and bind every parameter in placeholder order.
///
/// Each array is created immediately before it is bound and freed
/// immediately after, whether or not the bind succeeded. A failed free is
/// logged and never replaces the bind result.
pub async fn bind_statement<C>(
    conn: &mut C,
    statement: &StatementDescription,
) -> std::result::Result<C::Statement, C::Error>
where
    C: StatementConnection + ?Sized,
{
    let mut prepared = conn.prepare(&statement.sql, statement.cursor).await?;
    for (index, parameter) in statement.parameters.iter().enumerate() {
        match parameter {
            SqlParameter::Value(value) => conn.bind_value(&mut prepared, index, value)?,
            SqlParameter::Array(values) => {
                let array = conn.create_array(values).await?;
                trace!(index, element_type = values.element_type(), len = values.len(), "Created array parameter");
                let bound = conn.bind_array(&mut prepared, index, &array);
                if let Err(e) = conn.free_array(array).await {
                    warn!(
                        query = %statement.query_name,
                        index,
                        error = %e,
                        "Failed to free array parameter"
                    );
                }
                bound?;
            }
        }
    }
    Ok(prepared)
}

/// A statement rendered from criteria.
#[async_trait]
pub trait StatementBuilder: Send + Sync {
    fn query_name(&self) -> QueryName;

    /// Render SQL text, parameters and cursor shape. Pure and deterministic.
    fn statement(&self) -> Result<StatementDescription>;

    fn sql_text(&self) -> Result<String> {
        Ok(self.statement()?.sql)
    }

    /// Render, then prepare and bind on `conn`.
    async fn bind<C>(&self, conn: &mut C) -> std::result::Result<C::Statement, C::Error>
    where
        C: StatementConnection + ?Sized,
    {
        let statement = self.statement()?;
        bind_statement(conn, &statement).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn description() -> StatementDescription {
        let mut b = SqlBuilder::new();
        b.push("SELECT * FROM t WHERE a = ANY(")
            .array(SqlArray::BigInt(vec![1, 2]))
            .push(") AND b = ANY(")
            .array(SqlArray::Text(vec!["x".into()]))
            .push(") AND c = ")
            .param(SqlValue::Integer(5));
        b.finish(QueryName::FindStreamMetadata, CursorShape::default())
            .unwrap()
    }

    #[test]
    fn placeholders_numbered_in_order() {
        let statement = description();
        assert_eq!(
            statement.sql,
            "SELECT * FROM t WHERE a = ANY($1::bigint[]) AND b = ANY($2::text[]) AND c = $3"
        );
        assert_eq!(statement.parameters.len(), 3);
        assert_eq!(statement.parameters[2], SqlParameter::Value(SqlValue::Integer(5)));
    }

    #[test]
    fn mixed_timestamp_kinds_fail() {
        let mut b = SqlBuilder::new();
        b.param(SqlValue::Timestamp(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()))
            .param(SqlValue::LocalTimestamp(
                NaiveDate::from_ymd_opt(2020, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ));
        let err = b
            .finish(QueryName::FindDatumRecordCounts, CursorShape::default())
            .unwrap_err();
        assert!(matches!(err, DatumError::MixedDateTyping { .. }));
    }

    #[test]
    fn query_names_round_trip_ids() {
        for name in QueryName::ALL {
            assert_eq!(name.id().parse::<QueryName>().unwrap(), name);
        }
        assert_eq!(
            QueryName::FindDatumRecordCounts.count_variant(),
            Some(QueryName::FindDatumRecordCountsCount)
        );
        assert_eq!(
            QueryName::FindDatumRecordCounts.count_variant().unwrap().id(),
            format!("{}-count", QueryName::FindDatumRecordCounts.id())
        );
        assert!(QueryName::StoreDatumAuxiliary.count_variant().is_none());
        assert!("find-nothing".parse::<QueryName>().is_err());
    }

    #[tokio::test]
    async fn binds_in_order_and_frees_each_array() {
        let statement = description();
        let mut conn = RecordingConnection::default();
        let bound = bind_statement(&mut conn, &statement).await.unwrap();

        assert_eq!(
            conn.events,
            vec![
                Event::Prepare(statement.sql.clone(), CursorShape::default()),
                Event::CreateArray(0),
                Event::BindArray(0, 0),
                Event::FreeArray(0),
                Event::CreateArray(1),
                Event::BindArray(1, 1),
                Event::FreeArray(1),
                Event::BindValue(2, SqlValue::Integer(5)),
            ]
        );
        let bound: Vec<SqlParameter> = bound.into_iter().map(Option::unwrap).collect();
        assert_eq!(bound, statement.parameters);
    }

    #[tokio::test]
    async fn frees_array_when_bind_fails() {
        let statement = description();
        let mut conn = RecordingConnection {
            fail_bind_array_at: Some(0),
            ..Default::default()
        };
        let err = bind_statement(&mut conn, &statement).await.unwrap_err();

        assert_eq!(err.to_string(), "mock failure: bind");
        assert_eq!(conn.created(), 1);
        assert_eq!(conn.freed(), 1);
        assert_eq!(conn.events.last(), Some(&Event::FreeArray(0)));
    }

    #[tokio::test]
    async fn free_failure_does_not_mask_result() {
        let statement = description();
        let mut conn = RecordingConnection {
            fail_free: true,
            ..Default::default()
        };
        assert!(bind_statement(&mut conn, &statement).await.is_ok());
        assert_eq!(conn.created(), 2);
        assert_eq!(conn.freed(), 2);

        let mut conn = RecordingConnection {
            fail_free: true,
            fail_bind_array_at: Some(1),
            ..Default::default()
        };
        let err = bind_statement(&mut conn, &statement).await.unwrap_err();
        assert_eq!(err.to_string(), "mock failure: bind");
    }
}
