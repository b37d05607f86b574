//! Datum Query
//!
//! Operator tool for the datum query engine:
//! - Renders the statement a criteria document produces (SQL, parameters, cursor)
//! - Optionally executes it against the datum store and prints the results
//!
//! Output is JSON on stdout; logs go to stderr.

mod command;

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use tracing::{info, warn};

use solarnet_core::{AggregateDatum, DatumExportHandler, ExportAction};
use solarnet_datum_sql::QueryName;
use solarnet_pgdb::DatumDao;

use command::{render, Command, QueryInput};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = solarnet_telemetry::init("datum-query")?;

    let command = Command::parse();
    let json = std::fs::read_to_string(&command.input)
        .with_context(|| format!("reading {}", command.input.display()))?;
    let input = QueryInput::decode(command.query, &json)
        .with_context(|| format!("decoding {}", command.input.display()))?;

    let statement = render(command.query, &input)?;
    info!(
        query = %statement.query_name,
        parameters = statement.parameters.len(),
        execute = command.execute,
        "Rendered statement"
    );

    if !command.execute {
        println!("{}", serde_json::to_string_pretty(&statement)?);
        return Ok(());
    }

    let dao = DatumDao::from_env().await?;
    execute(&dao, command.query, &input).await?;

    let metrics = dao.metrics();
    let latency = metrics.latency_ms.summary();
    info!(
        statements = metrics.statements.get(),
        rows = metrics.rows.get(),
        latency_mean_ms = latency.mean,
        latency_p95_ms = latency.p95,
        "Execution finished"
    );
    Ok(())
}

async fn execute(dao: &DatumDao, query: QueryName, input: &QueryInput) -> anyhow::Result<()> {
    let output = match (query, input) {
        (QueryName::FindStreamMetadata, QueryInput::Criteria(c)) => {
            serde_json::to_value(dao.find_stream_metadata(c).await?)?
        }
        (QueryName::FindDatumRecordCounts | QueryName::FindDatumRecordCountsCount, QueryInput::Criteria(c)) => {
            let results = dao.find_record_counts(c).await?;
            if query == QueryName::FindDatumRecordCountsCount {
                serde_json::json!({ "totalResults": results.total_results })
            } else {
                serde_json::to_value(results)?
            }
        }
        (QueryName::FindDatumRunningTotal, QueryInput::Criteria(c)) => {
            let mut printer = JsonLinesHandler::default();
            let handled = dao.find_running_total(c, &mut printer).await?;
            info!(handled, "Streamed running totals");
            return Ok(());
        }
        (QueryName::FindDatumPartialAggregate, QueryInput::Criteria(c)) => {
            serde_json::to_value(dao.find_partial_aggregate(c).await?)?
        }
        (QueryName::StoreDatumAuxiliary, QueryInput::Store(d)) => {
            dao.store_auxiliary(d).await?;
            serde_json::json!({ "stored": d.key() })
        }
        (QueryName::MoveDatumAuxiliary, QueryInput::Move(m)) => {
            let moved = dao.move_auxiliary(&m.from, &m.to).await?;
            serde_json::json!({ "moved": moved })
        }
        (QueryName::GetDatumAuxiliary, QueryInput::Get(k)) => serde_json::to_value(dao.get_auxiliary(k).await?)?,
        (query, _) => anyhow::bail!("input does not match query {query}"),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Writes each streamed row to stdout as one JSON line.
#[derive(Default)]
struct JsonLinesHandler {
    written: u64,
}

impl DatumExportHandler<AggregateDatum> for JsonLinesHandler {
    fn did_begin(&mut self, total: Option<u64>) {
        info!(total = ?total, "Streaming rows");
    }

    fn handle(&mut self, row: AggregateDatum) -> ExportAction {
        let line = match serde_json::to_string(&row) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to encode row");
                return ExportAction::Stop;
            }
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            warn!(error = %e, written = self.written, "Output closed");
            return ExportAction::Stop;
        }
        self.written += 1;
        ExportAction::Continue
    }
}
