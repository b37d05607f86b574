//! Datum records produced and consumed by the query engine

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DatumError;

/// Sample values of one datum, keyed by property name per sample kind.
///
/// Serializes to the compact `{"i":{..},"a":{..},"s":{..},"t":[..]}` form,
/// omitting empty kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatumSamples {
    #[serde(rename = "i", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instantaneous: BTreeMap<String, Number>,
    #[serde(rename = "a", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub accumulating: BTreeMap<String, Number>,
    #[serde(rename = "s", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub status: BTreeMap<String, String>,
    #[serde(rename = "t", default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl DatumSamples {
    pub fn with_instantaneous(mut self, name: impl Into<String>, value: impl Into<Number>) -> Self {
        self.instantaneous.insert(name.into(), value.into());
        self
    }

    pub fn with_accumulating(mut self, name: impl Into<String>, value: impl Into<Number>) -> Self {
        self.accumulating.insert(name.into(), value.into());
        self
    }

    pub fn with_status(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.status.insert(name.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.instantaneous.is_empty()
            && self.accumulating.is_empty()
            && self.status.is_empty()
            && self.tags.is_empty()
    }
}

/// Kind of auxiliary record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuxiliaryDatumType {
    /// Marks a discontinuity in accumulating values, such as a meter rollover.
    Reset,
}

impl AuxiliaryDatumType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset => "Reset",
        }
    }
}

impl fmt::Display for AuxiliaryDatumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuxiliaryDatumType {
    type Err = DatumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reset" => Ok(Self::Reset),
            _ => Err(DatumError::UnsupportedAuxiliaryType(s.to_string())),
        }
    }
}

/// Primary key of an auxiliary record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryDatumKey {
    pub stream_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: AuxiliaryDatumType,
}

/// Reset marker recording samples immediately before and after an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryDatum {
    pub stream_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: AuxiliaryDatumType,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub samples_final: Option<DatumSamples>,
    #[serde(default)]
    pub samples_start: Option<DatumSamples>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl AuxiliaryDatum {
    pub fn reset(stream_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            stream_id,
            timestamp,
            kind: AuxiliaryDatumType::Reset,
            updated: None,
            notes: None,
            samples_final: None,
            samples_start: None,
            metadata: None,
        }
    }

    pub fn key(&self) -> AuxiliaryDatumKey {
        AuxiliaryDatumKey {
            stream_id: self.stream_id,
            timestamp: self.timestamp,
            kind: self.kind,
        }
    }
}

/// Row counts per storage level for one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecordCounts {
    pub stream_id: Uuid,
    pub object_id: i64,
    pub source_id: String,
    pub datum_count: i64,
    pub datum_hourly_count: i64,
    pub datum_daily_count: i64,
    pub datum_monthly_count: i64,
}

/// Rolled-up values of one stream, or one virtual stream, over a local date span
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDatum {
    /// `None` for virtual streams produced by combining.
    pub stream_id: Option<Uuid>,
    pub object_id: i64,
    pub source_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub instantaneous: BTreeMap<String, Decimal>,
    pub accumulating: BTreeMap<String, Decimal>,
    pub status: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResults<T> {
    pub results: Vec<T>,
    pub total_results: u64,
    pub starting_offset: i64,
    pub returned_result_count: usize,
}

impl<T> FilterResults<T> {
    pub fn new(results: Vec<T>, total_results: Option<u64>, starting_offset: i64) -> Self {
        let returned_result_count = results.len();
        Self {
            total_results: total_results.unwrap_or(returned_result_count as u64),
            results,
            starting_offset,
            returned_result_count,
        }
    }
}
