//! tokio-postgres realization of statement binding
//!
//! Arrays are sent inline with the bind message, so an array "handle" is just
//! the boxed value and freeing it releases nothing on the server.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, NoTls, Statement};
use tracing::{debug, instrument, trace};

use solarnet_datum_sql::{CursorShape, QueryName, SqlArray, SqlValue, StatementConnection, StatementDescription};

use crate::{DatumDbError, Result};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Prepared statement with its parameters bound by position
#[derive(Debug)]
pub struct PgBoundStatement {
    pub statement: Statement,
    pub cursor: CursorShape,
    query: String,
    params: Vec<Option<BoxedParam>>,
}

impl PgBoundStatement {
    /// Parameters in placeholder order, failing if any were left unbound.
    pub fn params(&self) -> Result<Vec<&(dyn ToSql + Sync)>> {
        self.params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                param
                    .as_ref()
                    .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                    .ok_or_else(|| DatumDbError::Binding {
                        query: self.query.clone(),
                        index,
                    })
            })
            .collect()
    }

    fn set(&mut self, index: usize, param: BoxedParam) -> Result<()> {
        let slot = self.params.get_mut(index).ok_or_else(|| DatumDbError::Binding {
            query: self.query.clone(),
            index,
        })?;
        *slot = Some(param);
        Ok(())
    }
}

/// Array parameter ready to be bound
#[derive(Debug, Clone)]
pub struct PgArray(SqlArray);

/// [`StatementConnection`] over any tokio-postgres client or transaction
pub struct PgStatementConnection<'a, C> {
    client: &'a C,
    query: Option<QueryName>,
}

impl<'a, C> PgStatementConnection<'a, C>
where
    C: GenericClient + Sync,
{
    pub fn new(client: &'a C) -> Self {
        Self { client, query: None }
    }

    /// Prepare and bind `description` on this connection.
    pub async fn bind(&mut self, description: &StatementDescription) -> Result<PgBoundStatement> {
        self.query = Some(description.query_name);
        solarnet_datum_sql::bind_statement(self, description).await
    }
}

#[async_trait]
impl<'a, C> StatementConnection for PgStatementConnection<'a, C>
where
    C: GenericClient + Sync,
{
    type Statement = PgBoundStatement;
    type Array = PgArray;
    type Error = DatumDbError;

    async fn prepare(&mut self, sql: &str, cursor: CursorShape) -> Result<PgBoundStatement> {
        let statement = self.client.prepare(sql).await?;
        let count = statement.params().len();
        debug!(query = ?self.query, params = count, "Prepared statement");
        Ok(PgBoundStatement {
            statement,
            cursor,
            query: self.query.map(|q| q.to_string()).unwrap_or_default(),
            params: (0..count).map(|_| None).collect(),
        })
    }

    async fn create_array(&mut self, values: &SqlArray) -> Result<PgArray> {
        Ok(PgArray(values.clone()))
    }

    async fn free_array(&mut self, array: PgArray) -> Result<()> {
        trace!(element_type = array.0.element_type(), len = array.0.len(), "Released array parameter");
        Ok(())
    }

    fn bind_array(&mut self, statement: &mut PgBoundStatement, index: usize, array: &PgArray) -> Result<()> {
        let param: BoxedParam = match &array.0 {
            SqlArray::BigInt(values) => Box::new(values.clone()),
            SqlArray::Text(values) => Box::new(values.clone()),
            SqlArray::Uuid(values) => Box::new(values.clone()),
        };
        statement.set(index, param)
    }

    fn bind_value(&mut self, statement: &mut PgBoundStatement, index: usize, value: &SqlValue) -> Result<()> {
        let param: BoxedParam = match value {
            SqlValue::BigInt(v) => Box::new(*v),
            SqlValue::Integer(v) => Box::new(*v),
            SqlValue::Text(v) => Box::new(v.clone()),
            SqlValue::Uuid(v) => Box::new(*v),
            SqlValue::Timestamp(v) => Box::new(*v),
            SqlValue::LocalTimestamp(v) => Box::new(*v),
        };
        statement.set(index, param)
    }
}

/// Open a dedicated connection outside the pool.
#[instrument(skip(url))]
pub async fn connect(url: &str) -> Result<tokio_postgres::Client> {
    debug!("Connecting to datum store");

    let (client, connection) = tokio_postgres::connect(url, NoTls)
        .await
        .map_err(DatumDbError::Connection)?;

    // Spawn connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Datum store connection error: {}", e);
        }
    });

    Ok(client)
}
