//! Datum query execution
//!
//! Executes rendered statements against the pool. Pageable queries follow
//! the count-before-page rule; streaming statements are read through a portal
//! inside a transaction, one fetch-size batch at a time.

use std::time::Instant;

use tokio_postgres::{Client, GenericClient, Row, Transaction};
use tracing::{debug, info, instrument, warn};

use solarnet_core::{
    AggregateDatum, AuxiliaryDatum, AuxiliaryDatumKey, CollectingHandler, DatumCriteria, DatumExportHandler,
    ExportAction, FilterResults, Page, QueryConfig, StreamMetadata, StreamRecordCounts,
};
use solarnet_datum_sql::{
    GetDatumAuxiliary, MoveDatumAuxiliary, SelectDatumPartialAggregate, SelectDatumRecordCounts,
    SelectDatumRunningTotal, SelectStreamMetadata, StatementBuilder, StatementDescription, StoreDatumAuxiliary,
};
use solarnet_telemetry::{Counter, Histogram};

use crate::client::PgStatementConnection;
use crate::{mapper, DatumDbError, DatumDbPool, PoolConfig, Result};

/// Execution counters shared by clones of a [`DatumDao`]
#[derive(Clone)]
pub struct DaoMetrics {
    pub statements: Counter,
    pub failures: Counter,
    pub rows: Counter,
    pub latency_ms: Histogram,
}

impl Default for DaoMetrics {
    fn default() -> Self {
        Self {
            statements: Counter::new("datum_statements_total"),
            failures: Counter::new("datum_statement_failures_total"),
            rows: Counter::new("datum_rows_total"),
            latency_ms: Histogram::new("datum_statement_latency_ms"),
        }
    }
}

impl DaoMetrics {
    fn observe(&self, started: Instant, rows: std::result::Result<usize, &DatumDbError>) {
        self.statements.inc();
        self.latency_ms.record(started.elapsed().as_secs_f64() * 1000.0);
        match rows {
            Ok(n) => self.rows.add(n as u64),
            Err(_) => self.failures.inc(),
        }
    }
}

/// One statement of a record count query
#[derive(Debug)]
enum RecordCountStep {
    Count(StatementDescription),
    Page(StatementDescription),
}

/// Statements a record count query runs, in order: the count of matching
/// streams when the page is bounded, then the page itself.
fn record_count_steps(criteria: &DatumCriteria, max_page_size: Option<i32>) -> Result<(Page, Vec<RecordCountStep>)> {
    let page = criteria.page().capped(max_page_size);
    let builder = SelectDatumRecordCounts::new(criteria.clone()).with_page(page);
    let mut steps = Vec::with_capacity(2);
    if page.requires_count() {
        steps.push(RecordCountStep::Count(builder.count_statement()?));
    }
    steps.push(RecordCountStep::Page(builder.statement()?));
    Ok((page, steps))
}

/// Datum queries over a connection pool
#[derive(Clone)]
pub struct DatumDao {
    pool: DatumDbPool,
    config: QueryConfig,
    metrics: DaoMetrics,
}

impl DatumDao {
    pub fn new(pool: DatumDbPool, config: QueryConfig) -> Self {
        Self {
            pool,
            config,
            metrics: DaoMetrics::default(),
        }
    }

    /// Build the pool and query settings from the environment.
    pub async fn from_env() -> Result<Self> {
        let config = QueryConfig::from_env()?;
        let pool = DatumDbPool::new(PoolConfig::from_env()?).await?;
        info!(
            fetch_size = config.running_total_fetch_size,
            max_page_size = ?config.max_page_size,
            "Datum DAO ready"
        );
        Ok(Self::new(pool, config))
    }

    pub fn metrics(&self) -> &DaoMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    #[instrument(skip(self, criteria), fields(kind = ?criteria.object_kind))]
    pub async fn find_stream_metadata(&self, criteria: &DatumCriteria) -> Result<Vec<StreamMetadata>> {
        let builder = SelectStreamMetadata::new(criteria.clone());
        let description = builder.statement()?;
        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        let rows = self.query(client, &description).await?;
        rows.iter()
            .map(|row| mapper::stream_metadata(row, builder.object_kind()))
            .collect()
    }

    /// Record counts per stream. A bounded page first counts the matching
    /// streams; otherwise the total is the number of rows returned.
    #[instrument(skip(self, criteria))]
    pub async fn find_record_counts(&self, criteria: &DatumCriteria) -> Result<FilterResults<StreamRecordCounts>> {
        let (page, steps) = record_count_steps(criteria, self.config.max_page_size)?;

        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        let mut total = None;
        let mut results = Vec::new();
        for step in &steps {
            match step {
                RecordCountStep::Count(count) => {
                    let rows = self.query(client, count).await?;
                    let row = rows.first().ok_or(DatumDbError::NotFound)?;
                    total = Some(row.try_get::<_, i64>("total")?.max(0) as u64);
                }
                RecordCountStep::Page(description) => {
                    let rows = self.query(client, description).await?;
                    results = rows
                        .iter()
                        .map(mapper::record_counts)
                        .collect::<Result<Vec<_>>>()?;
                }
            }
        }
        debug!(returned = results.len(), total = ?total, offset = page.offset, "Found record counts");
        Ok(FilterResults::new(results, total, page.offset))
    }

    /// Stream running totals to `handler`, returning the number of rows handled.
    #[instrument(skip(self, criteria, handler))]
    pub async fn find_running_total(
        &self,
        criteria: &DatumCriteria,
        handler: &mut dyn DatumExportHandler<AggregateDatum>,
    ) -> Result<u64> {
        let description = SelectDatumRunningTotal::new(criteria.clone()).statement()?;
        self.stream(&description, handler).await
    }

    #[instrument(skip(self, criteria))]
    pub async fn find_partial_aggregate(&self, criteria: &DatumCriteria) -> Result<Vec<AggregateDatum>> {
        let description = SelectDatumPartialAggregate::new(criteria.clone()).statement()?;
        let mut collected = CollectingHandler::default();
        self.stream(&description, &mut collected).await?;
        Ok(collected.rows)
    }

    #[instrument(skip(self, datum), fields(stream_id = %datum.stream_id, ts = %datum.timestamp))]
    pub async fn store_auxiliary(&self, datum: &AuxiliaryDatum) -> Result<()> {
        let description = StoreDatumAuxiliary::new(datum.clone()).statement()?;
        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        self.execute(client, &description).await?;
        Ok(())
    }

    /// Re-key the record at `from`; false when no record existed there.
    #[instrument(skip(self, to), fields(stream_id = %from.stream_id, from = %from.timestamp, to = %to.timestamp))]
    pub async fn move_auxiliary(&self, from: &AuxiliaryDatumKey, to: &AuxiliaryDatum) -> Result<bool> {
        let description = MoveDatumAuxiliary::new(*from, to.clone()).statement()?;
        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        let rows = self.query(client, &description).await?;
        let row = rows.first().ok_or(DatumDbError::NotFound)?;
        Ok(row.try_get::<_, Option<bool>>("moved")?.unwrap_or(false))
    }

    #[instrument(skip(self), fields(stream_id = %key.stream_id, ts = %key.timestamp))]
    pub async fn get_auxiliary(&self, key: &AuxiliaryDatumKey) -> Result<Option<AuxiliaryDatum>> {
        let description = GetDatumAuxiliary::new(*key).statement()?;
        let conn = self.pool.get().await?;
        let client: &Client = &conn;
        let rows = self.query(client, &description).await?;
        rows.first().map(mapper::auxiliary_datum).transpose()
    }

    async fn query<C>(&self, client: &C, description: &StatementDescription) -> Result<Vec<Row>>
    where
        C: GenericClient + Sync,
    {
        let started = Instant::now();
        let result: Result<Vec<Row>> = async {
            let bound = PgStatementConnection::new(client).bind(description).await?;
            let params = bound.params()?;
            Ok(client.query(&bound.statement, &params).await?)
        }
        .await;
        self.metrics.observe(started, result.as_ref().map(Vec::len));
        result
    }

    async fn execute<C>(&self, client: &C, description: &StatementDescription) -> Result<u64>
    where
        C: GenericClient + Sync,
    {
        let started = Instant::now();
        let result: Result<u64> = async {
            let bound = PgStatementConnection::new(client).bind(description).await?;
            let params = bound.params()?;
            Ok(client.execute(&bound.statement, &params).await?)
        }
        .await;
        self.metrics.observe(started, result.as_ref().map(|n| *n as usize));
        result
    }

    /// Read a streaming statement through a portal, handing each mapped row
    /// to `handler` until it stops or the rows run out.
    async fn stream(
        &self,
        description: &StatementDescription,
        handler: &mut dyn DatumExportHandler<AggregateDatum>,
    ) -> Result<u64> {
        let started = Instant::now();
        let mut conn = self.pool.get().await?;
        let txn = conn.transaction().await?;
        let result = self.stream_in(&txn, description, handler).await;
        self.metrics.observe(started, result.as_ref().map(|n| *n as usize));
        let handled = result?;
        txn.commit().await?;
        Ok(handled)
    }

    async fn stream_in(
        &self,
        txn: &Transaction<'_>,
        description: &StatementDescription,
        handler: &mut dyn DatumExportHandler<AggregateDatum>,
    ) -> Result<u64> {
        if !description.cursor.is_streaming() {
            warn!(query = %description.query_name, "Streaming a statement rendered without a streaming cursor");
        }
        let fetch_size = self.config.running_total_fetch_size;
        let bound = PgStatementConnection::new(txn).bind(description).await?;
        let params = bound.params()?;
        let portal = txn.bind(&bound.statement, &params).await?;

        handler.did_begin(None);
        let mut handled = 0u64;
        loop {
            let rows = txn.query_portal(&portal, fetch_size).await?;
            let batch = rows.len();
            for row in &rows {
                handled += 1;
                if handler.handle(mapper::aggregate_datum(row)?) == ExportAction::Stop {
                    debug!(query = %description.query_name, handled, "Export handler stopped");
                    return Ok(handled);
                }
            }
            if batch < fetch_size as usize {
                break;
            }
        }
        debug!(query = %description.query_name, handled, "Streamed rows");
        Ok(handled)
    }
}
