//! Auxiliary datum persistence statements
//!
//! Sample sets and metadata travel as JSON text cast to `jsonb` in SQL.
//! An absent sample set is bound as SQL `NULL`, never as an empty object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use solarnet_core::{AuxiliaryDatum, AuxiliaryDatumKey, DatumSamples, Result};

use crate::statement::{
    CursorShape, QueryName, SqlBuilder, SqlValue, StatementBuilder, StatementDescription,
};

const AUX_TYPE_CAST: &str = "text::solardatm.da_datm_aux_type";
const JSON_CAST: &str = "text::jsonb";

/// Columns selected for one auxiliary record, JSON columns as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryColumns {
    pub stream_id: Uuid,
    pub ts: DateTime<Utc>,
    pub atype: String,
    pub updated: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub jdata_af: Option<String>,
    pub jdata_as: Option<String>,
    pub jmeta: Option<String>,
}

/// Encodes auxiliary records into procedure calls and decodes selected rows
pub struct AuxiliaryDatumCodec;

impl AuxiliaryDatumCodec {
    /// Upsert call with parameters: stream id, timestamp, type name, notes,
    /// final samples, start samples, metadata.
    pub fn to_procedure_call(datum: &AuxiliaryDatum) -> Result<StatementDescription> {
        let mut b = SqlBuilder::new();
        b.push("CALL solardatm.store_datm_aux(");
        write_entity_params(&mut b, datum)?;
        b.push(")");
        b.finish(QueryName::StoreDatumAuxiliary, CursorShape::default())
    }

    /// Re-key the record at `from` to `to`, replacing its content.
    pub fn to_move_call(from: &AuxiliaryDatumKey, to: &AuxiliaryDatum) -> Result<StatementDescription> {
        let mut b = SqlBuilder::new();
        b.push("SELECT solardatm.move_datm_aux(");
        write_key_params(&mut b, from);
        b.push(", ");
        write_entity_params(&mut b, to)?;
        b.push(") AS moved");
        b.finish(QueryName::MoveDatumAuxiliary, CursorShape::default())
    }

    pub fn select_by_key(key: &AuxiliaryDatumKey) -> Result<StatementDescription> {
        let mut b = SqlBuilder::new();
        b.push(
            "SELECT stream_id, ts, atype::text AS atype, updated, notes\n\
             \t, jdata_af::text AS jdata_af, jdata_as::text AS jdata_as, jmeta::text AS jmeta\n\
             FROM solardatm.da_datm_aux\n\
             WHERE (stream_id, ts, atype) = (",
        );
        write_key_params(&mut b, key);
        b.push(")");
        b.finish(QueryName::GetDatumAuxiliary, CursorShape::default())
    }

    pub fn encode_samples(samples: Option<&DatumSamples>) -> Result<Option<String>> {
        Ok(samples.map(serde_json::to_string).transpose()?)
    }

    pub fn encode_metadata(metadata: Option<&Map<String, Value>>) -> Result<Option<String>> {
        Ok(metadata.map(serde_json::to_string).transpose()?)
    }

    /// Rebuild an auxiliary record from its selected columns.
    pub fn decode(columns: AuxiliaryColumns) -> Result<AuxiliaryDatum> {
        let samples = |json: Option<String>| -> Result<Option<DatumSamples>> {
            Ok(json.as_deref().map(serde_json::from_str).transpose()?)
        };
        Ok(AuxiliaryDatum {
            stream_id: columns.stream_id,
            timestamp: columns.ts,
            kind: columns.atype.parse()?,
            updated: columns.updated,
            notes: columns.notes,
            samples_final: samples(columns.jdata_af)?,
            samples_start: samples(columns.jdata_as)?,
            metadata: columns
                .jmeta
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

fn write_key_params(b: &mut SqlBuilder, key: &AuxiliaryDatumKey) {
    b.param_cast(SqlValue::Uuid(key.stream_id), "uuid")
        .push(", ")
        .param_cast(SqlValue::Timestamp(key.timestamp), "timestamptz")
        .push(", ")
        .param_cast(SqlValue::Text(Some(key.kind.name().to_string())), AUX_TYPE_CAST);
}

fn write_entity_params(b: &mut SqlBuilder, datum: &AuxiliaryDatum) -> Result<()> {
    let samples_final = AuxiliaryDatumCodec::encode_samples(datum.samples_final.as_ref())?;
    let samples_start = AuxiliaryDatumCodec::encode_samples(datum.samples_start.as_ref())?;
    let metadata = AuxiliaryDatumCodec::encode_metadata(datum.metadata.as_ref())?;

    write_key_params(b, &datum.key());
    b.push(", ")
        .param_cast(SqlValue::Text(datum.notes.clone()), "text")
        .push(", ")
        .param_cast(SqlValue::Text(samples_final), JSON_CAST)
        .push(", ")
        .param_cast(SqlValue::Text(samples_start), JSON_CAST)
        .push(", ")
        .param_cast(SqlValue::Text(metadata), JSON_CAST);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct StoreDatumAuxiliary {
    datum: AuxiliaryDatum,
}

impl StoreDatumAuxiliary {
    pub fn new(datum: AuxiliaryDatum) -> Self {
        Self { datum }
    }
}

impl StatementBuilder for StoreDatumAuxiliary {
    fn query_name(&self) -> QueryName {
        QueryName::StoreDatumAuxiliary
    }

    fn statement(&self) -> Result<StatementDescription> {
        AuxiliaryDatumCodec::to_procedure_call(&self.datum)
    }
}

#[derive(Debug, Clone)]
pub struct MoveDatumAuxiliary {
    from: AuxiliaryDatumKey,
    to: AuxiliaryDatum,
}

impl MoveDatumAuxiliary {
    pub fn new(from: AuxiliaryDatumKey, to: AuxiliaryDatum) -> Self {
        Self { from, to }
    }
}

impl StatementBuilder for MoveDatumAuxiliary {
    fn query_name(&self) -> QueryName {
        QueryName::MoveDatumAuxiliary
    }

    fn statement(&self) -> Result<StatementDescription> {
        AuxiliaryDatumCodec::to_move_call(&self.from, &self.to)
    }
}

#[derive(Debug, Clone)]
pub struct GetDatumAuxiliary {
    key: AuxiliaryDatumKey,
}

impl GetDatumAuxiliary {
    pub fn new(key: AuxiliaryDatumKey) -> Self {
        Self { key }
    }
}

impl StatementBuilder for GetDatumAuxiliary {
    fn query_name(&self) -> QueryName {
        QueryName::GetDatumAuxiliary
    }

    fn statement(&self) -> Result<StatementDescription> {
        AuxiliaryDatumCodec::select_by_key(&self.key)
    }
}
