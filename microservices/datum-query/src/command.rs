//! Command line parsing and statement rendering

use anyhow::bail;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use solarnet_core::{AuxiliaryDatum, AuxiliaryDatumKey, DatumCriteria};
use solarnet_datum_sql::{
    GetDatumAuxiliary, MoveDatumAuxiliary, QueryName, SelectDatumPartialAggregate, SelectDatumRecordCounts,
    SelectDatumRunningTotal, SelectStreamMetadata, StatementBuilder, StatementDescription, StoreDatumAuxiliary,
};

const QUERIES: &str = "Queries:
  find-stream-metadata            criteria document
  find-datum-record-counts        criteria document
  find-datum-record-counts-count  criteria document
  find-datum-running-total        criteria document
  find-datum-partial-agg          criteria document
  store-datum-aux                 auxiliary datum document
  move-datum-aux                  {\"from\": key, \"to\": auxiliary datum}
  get-datum-aux                   auxiliary datum key";

/// Render datum statements from JSON input documents, optionally executing them
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "datum-query", version, after_help = QUERIES)]
pub struct Command {
    /// Query to render
    #[arg(value_parser = parse_query)]
    pub query: QueryName,

    /// JSON input document for the query
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Execute against the datum store instead of printing the statement
    #[arg(short = 'x', long)]
    pub execute: bool,
}

fn parse_query(value: &str) -> Result<QueryName, String> {
    value.parse().map_err(|_| {
        let known: Vec<&str> = QueryName::ALL.iter().map(QueryName::id).collect();
        format!("expected one of {}", known.join(", "))
    })
}

/// Input document of a query, decoded by query kind
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Criteria(DatumCriteria),
    Store(AuxiliaryDatum),
    Move(MoveRequest),
    Get(AuxiliaryDatumKey),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoveRequest {
    pub from: AuxiliaryDatumKey,
    pub to: AuxiliaryDatum,
}

impl QueryInput {
    pub fn decode(query: QueryName, json: &str) -> anyhow::Result<Self> {
        let input = match query {
            QueryName::StoreDatumAuxiliary => Self::Store(serde_json::from_str(json)?),
            QueryName::MoveDatumAuxiliary => Self::Move(serde_json::from_str(json)?),
            QueryName::GetDatumAuxiliary => Self::Get(serde_json::from_str(json)?),
            _ => Self::Criteria(serde_json::from_str(json)?),
        };
        Ok(input)
    }
}

/// Render the statement `query` would execute for `input`.
pub fn render(query: QueryName, input: &QueryInput) -> anyhow::Result<StatementDescription> {
    let statement = match (query, input) {
        (QueryName::FindStreamMetadata, QueryInput::Criteria(c)) => SelectStreamMetadata::new(c.clone()).statement()?,
        (QueryName::FindDatumRecordCounts, QueryInput::Criteria(c)) => {
            SelectDatumRecordCounts::new(c.clone()).statement()?
        }
        (QueryName::FindDatumRecordCountsCount, QueryInput::Criteria(c)) => {
            SelectDatumRecordCounts::new(c.clone()).count_statement()?
        }
        (QueryName::FindDatumRunningTotal, QueryInput::Criteria(c)) => {
            SelectDatumRunningTotal::new(c.clone()).statement()?
        }
        (QueryName::FindDatumPartialAggregate, QueryInput::Criteria(c)) => {
            SelectDatumPartialAggregate::new(c.clone()).statement()?
        }
        (QueryName::StoreDatumAuxiliary, QueryInput::Store(d)) => StoreDatumAuxiliary::new(d.clone()).statement()?,
        (QueryName::MoveDatumAuxiliary, QueryInput::Move(m)) => {
            MoveDatumAuxiliary::new(m.from, m.to.clone()).statement()?
        }
        (QueryName::GetDatumAuxiliary, QueryInput::Get(k)) => GetDatumAuxiliary::new(*k).statement()?,
        (query, _) => bail!("input does not match query {query}"),
    };
    Ok(statement)
}
