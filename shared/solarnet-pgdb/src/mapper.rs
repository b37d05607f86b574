//! Result row mapping

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tokio_postgres::Row;
use uuid::Uuid;

use solarnet_core::{AggregateDatum, AuxiliaryDatum, ObjectDatumKind, StreamMetadata, StreamRecordCounts};
use solarnet_datum_sql::{AuxiliaryColumns, AuxiliaryDatumCodec};

use crate::Result;

pub fn stream_metadata(row: &Row, kind: ObjectDatumKind) -> Result<StreamMetadata> {
    Ok(StreamMetadata::new(
        row.try_get::<_, Uuid>("stream_id")?,
        row.try_get::<_, String>("time_zone")?,
        kind,
        row.try_get::<_, i64>("obj_id")?,
        row.try_get::<_, String>("source_id")?,
        row.try_get("names_i")?,
        row.try_get("names_a")?,
        row.try_get("names_s")?,
    ))
}

pub fn record_counts(row: &Row) -> Result<StreamRecordCounts> {
    Ok(StreamRecordCounts {
        stream_id: row.try_get("stream_id")?,
        object_id: row.try_get("obj_id")?,
        source_id: row.try_get("source_id")?,
        datum_count: row.try_get("datum_count")?,
        datum_hourly_count: row.try_get("datum_hourly_count")?,
        datum_daily_count: row.try_get("datum_daily_count")?,
        datum_monthly_count: row.try_get("datum_monthly_count")?,
    })
}

/// Map one rollup row; `stream_id` is null for virtual streams.
pub fn aggregate_datum(row: &Row) -> Result<AggregateDatum> {
    Ok(AggregateDatum {
        stream_id: row.try_get::<_, Option<Uuid>>("stream_id")?,
        object_id: row.try_get("obj_id")?,
        source_id: row.try_get("source_id")?,
        start: row.try_get::<_, NaiveDateTime>("ts_start")?,
        end: row.try_get::<_, NaiveDateTime>("ts_end")?,
        instantaneous: zip_values(row.try_get("names_i")?, row.try_get::<_, Option<Vec<Option<Decimal>>>>("data_i")?),
        accumulating: zip_values(row.try_get("names_a")?, row.try_get::<_, Option<Vec<Option<Decimal>>>>("data_a")?),
        status: zip_values(row.try_get("names_s")?, row.try_get::<_, Option<Vec<Option<String>>>>("data_s")?),
        tags: row
            .try_get::<_, Option<Vec<String>>>("data_t")?
            .unwrap_or_default()
            .into_iter()
            .collect::<BTreeSet<_>>(),
    })
}

pub fn auxiliary_datum(row: &Row) -> Result<AuxiliaryDatum> {
    let columns = AuxiliaryColumns {
        stream_id: row.try_get("stream_id")?,
        ts: row.try_get::<_, DateTime<Utc>>("ts")?,
        atype: row.try_get("atype")?,
        updated: row.try_get("updated")?,
        notes: row.try_get("notes")?,
        jdata_af: row.try_get("jdata_af")?,
        jdata_as: row.try_get("jdata_as")?,
        jmeta: row.try_get("jmeta")?,
    };
    Ok(AuxiliaryDatumCodec::decode(columns)?)
}

/// Pair property names with their positional values, dropping nulls.
///
/// Values beyond the end of `names` are ignored.
pub fn zip_values<T>(names: Option<Vec<String>>, values: Option<Vec<Option<T>>>) -> BTreeMap<String, T> {
    match (names, values) {
        (Some(names), Some(values)) => names
            .into_iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn zips_names_with_values() {
        let names = Some(vec!["watts".to_string(), "volts".to_string(), "amps".to_string()]);
        let values = Some(vec![Some(Decimal::new(1234, 1)), None, Some(Decimal::ONE)]);
        let zipped = zip_values(names, values);

        assert_eq!(zipped.len(), 2);
        assert_eq!(zipped["watts"], Decimal::new(1234, 1));
        assert_eq!(zipped["amps"], Decimal::ONE);
        assert!(!zipped.contains_key("volts"));
    }

    #[test]
    fn missing_segments_are_empty() {
        assert!(zip_values::<String>(None, Some(vec![Some("x".into())])).is_empty());
        assert!(zip_values::<String>(Some(vec!["mode".into()]), None).is_empty());

        let zipped = zip_values(Some(vec!["mode".to_string()]), Some(vec![Some("on".to_string()), Some("x".to_string())]));
        assert_eq!(zipped.len(), 1);
    }
}
