//! Datum query criteria

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::{Aggregation, CombiningType, ObjectDatumKind, SortDescriptor};
use crate::error::{DatumError, Result};

/// Rank column used by combining queries when none is configured
pub const DEFAULT_RANK_PROPERTY: &str = "prank";

/// Declarative description of a datum query, built by upstream callers and
/// only ever read by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatumCriteria {
    pub object_kind: ObjectDatumKind,
    pub node_ids: Option<Vec<i64>>,
    pub location_ids: Option<Vec<i64>>,
    pub source_ids: Option<Vec<String>>,
    pub stream_ids: Option<Vec<Uuid>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub local_start_date: Option<NaiveDateTime>,
    pub local_end_date: Option<NaiveDateTime>,
    pub aggregation: Option<Aggregation>,
    pub partial_aggregation: Option<Aggregation>,
    pub combining: Option<CombiningConfig>,
    pub sorts: Vec<SortDescriptor>,
    pub offset: Option<i64>,
    pub max: Option<i32>,
}

/// The single active date interpretation of a criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Absolute {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    Local {
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    },
}

impl DatumCriteria {
    pub fn for_nodes(node_ids: impl Into<Vec<i64>>) -> Self {
        Self {
            node_ids: Some(node_ids.into()),
            ..Default::default()
        }
    }

    pub fn with_source_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.source_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_dates(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_local_dates(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.local_start_date = Some(start);
        self.local_end_date = Some(end);
        self
    }

    /// Object ids of the active object kind, if any were given.
    pub fn object_ids(&self) -> Option<&[i64]> {
        let ids = match self.object_kind {
            ObjectDatumKind::Node => self.node_ids.as_deref(),
            ObjectDatumKind::Location => self.location_ids.as_deref(),
        };
        ids.filter(|ids| !ids.is_empty())
    }

    pub fn source_ids(&self) -> Option<&[String]> {
        self.source_ids.as_deref().filter(|ids| !ids.is_empty())
    }

    pub fn stream_ids(&self) -> Option<&[Uuid]> {
        self.stream_ids.as_deref().filter(|ids| !ids.is_empty())
    }

    /// Resolve the active date mode, rejecting criteria that set both.
    pub fn date_range(&self) -> Result<Option<DateRange>> {
        let absolute = self.start_date.is_some() || self.end_date.is_some();
        let local = self.local_start_date.is_some() || self.local_end_date.is_some();
        match (absolute, local) {
            (true, true) => Err(DatumError::MixedDateCriteria {
                criteria: self.to_string(),
            }),
            (true, false) => {
                if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
                    if start >= end {
                        return Err(DatumError::invalid_range("start must precede end", self));
                    }
                }
                Ok(Some(DateRange::Absolute {
                    start: self.start_date,
                    end: self.end_date,
                }))
            }
            (false, true) => {
                if let (Some(start), Some(end)) = (self.local_start_date, self.local_end_date) {
                    if start >= end {
                        return Err(DatumError::invalid_range("start must precede end", self));
                    }
                }
                Ok(Some(DateRange::Local {
                    start: self.local_start_date,
                    end: self.local_end_date,
                }))
            }
            (false, false) => Ok(None),
        }
    }

    /// Both local dates, required by queries that partition by calendar.
    pub fn local_date_span(&self) -> Result<(NaiveDateTime, NaiveDateTime)> {
        match self.date_range()? {
            Some(DateRange::Local {
                start: Some(start),
                end: Some(end),
            }) => Ok((start, end)),
            _ => Err(DatumError::missing_filter("local start and end dates", self)),
        }
    }

    /// Fail unless the query is restricted to some objects or streams.
    pub fn require_identity_filter(&self) -> Result<()> {
        if self.object_ids().is_none() && self.stream_ids().is_none() {
            return Err(DatumError::missing_filter("object or stream ids", self));
        }
        Ok(())
    }

    pub fn page(&self) -> Page {
        Page {
            offset: self.offset.unwrap_or(0).max(0),
            max: self.max,
        }
    }
}

impl fmt::Display for DatumCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatumCriteria{{kind={:?}", self.object_kind)?;
        if let Some(ids) = &self.node_ids {
            write!(f, ",nodes={ids:?}")?;
        }
        if let Some(ids) = &self.location_ids {
            write!(f, ",locations={ids:?}")?;
        }
        if let Some(ids) = &self.source_ids {
            write!(f, ",sources={ids:?}")?;
        }
        if let Some(ids) = &self.stream_ids {
            let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            write!(f, ",streams={ids:?}")?;
        }
        if let Some(d) = &self.start_date {
            write!(f, ",start={}", d.to_rfc3339())?;
        }
        if let Some(d) = &self.end_date {
            write!(f, ",end={}", d.to_rfc3339())?;
        }
        if let Some(d) = &self.local_start_date {
            write!(f, ",localStart={d}")?;
        }
        if let Some(d) = &self.local_end_date {
            write!(f, ",localEnd={d}")?;
        }
        if let Some(agg) = &self.aggregation {
            write!(f, ",agg={agg}")?;
        }
        if let Some(agg) = &self.partial_aggregation {
            write!(f, ",partialAgg={agg}")?;
        }
        if let Some(c) = &self.combining {
            write!(f, ",combine={}", c.combining_type)?;
        }
        f.write_str("}")
    }
}

/// Virtual stream definition: how real streams merge into virtual ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombiningConfig {
    pub combining_type: CombiningType,
    #[serde(default)]
    pub rank_property: Option<String>,
    /// Virtual object id to the real object ids it combines, in rank order.
    #[serde(default)]
    pub object_id_maps: BTreeMap<i64, Vec<i64>>,
    /// Virtual source id to the real source ids it combines, in rank order.
    #[serde(default)]
    pub source_id_maps: BTreeMap<String, Vec<String>>,
}

impl CombiningConfig {
    pub fn new(combining_type: CombiningType) -> Self {
        Self {
            combining_type,
            rank_property: None,
            object_id_maps: BTreeMap::new(),
            source_id_maps: BTreeMap::new(),
        }
    }

    pub fn with_object_map(mut self, virtual_id: i64, real_ids: impl Into<Vec<i64>>) -> Self {
        self.object_id_maps.insert(virtual_id, real_ids.into());
        self
    }

    pub fn with_source_map<S: Into<String>>(
        mut self,
        virtual_id: impl Into<String>,
        real_ids: impl IntoIterator<Item = S>,
    ) -> Self {
        self.source_id_maps
            .insert(virtual_id.into(), real_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Rank column name, validated as a plain SQL identifier.
    pub fn rank_property(&self) -> Result<&str> {
        let rank = self.rank_property.as_deref().unwrap_or(DEFAULT_RANK_PROPERTY);
        let mut chars = rank.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(DatumError::InvalidIdentifier(rank.to_string()));
        }
        Ok(rank)
    }
}

/// Requested result window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub offset: i64,
    pub max: Option<i32>,
}

impl Page {
    /// A bounded page needs a separate total count; `-1` or no max means all rows.
    pub fn requires_count(&self) -> bool {
        self.limit().is_some()
    }

    pub fn limit(&self) -> Option<i32> {
        self.max.filter(|max| *max >= 0)
    }

    /// Clamp a bounded page to `max_page_size`; unbounded pages become bounded.
    pub fn capped(self, max_page_size: Option<i32>) -> Self {
        match max_page_size {
            Some(cap) => Self {
                offset: self.offset,
                max: Some(self.limit().map_or(cap, |max| max.min(cap))),
            },
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn mixed_date_modes_rejected() {
        let mut criteria = DatumCriteria::for_nodes(vec![1]);
        criteria.start_date = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        criteria.local_end_date = Some(local(2020, 2, 1, 0));

        let err = criteria.date_range().unwrap_err();
        assert!(matches!(err, DatumError::MixedDateCriteria { .. }));
        assert!(err.to_string().contains("nodes=[1]"));
    }

    #[test]
    fn date_modes_resolve() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        let criteria = DatumCriteria::for_nodes(vec![1]).with_dates(start, end);
        assert_eq!(
            criteria.date_range().unwrap(),
            Some(DateRange::Absolute {
                start: Some(start),
                end: Some(end)
            })
        );

        let criteria = DatumCriteria::for_nodes(vec![1]);
        assert_eq!(criteria.date_range().unwrap(), None);
    }

    #[test]
    fn inverted_range_rejected() {
        let criteria =
            DatumCriteria::for_nodes(vec![1]).with_local_dates(local(2020, 2, 1, 0), local(2020, 1, 1, 0));
        let err = criteria.date_range().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RANGE");
    }

    #[test]
    fn local_span_requires_both_local_dates() {
        let mut criteria = DatumCriteria::for_nodes(vec![1]);
        criteria.local_start_date = Some(local(2020, 1, 1, 0));
        assert!(matches!(
            criteria.local_date_span(),
            Err(DatumError::MissingFilter { .. })
        ));

        criteria.local_end_date = Some(local(2020, 1, 2, 0));
        assert_eq!(
            criteria.local_date_span().unwrap(),
            (local(2020, 1, 1, 0), local(2020, 1, 2, 0))
        );
    }

    #[test]
    fn empty_identifier_sets_are_unrestricted() {
        let mut criteria = DatumCriteria {
            node_ids: Some(Vec::new()),
            source_ids: Some(Vec::new()),
            ..Default::default()
        };
        assert!(criteria.object_ids().is_none());
        assert!(criteria.source_ids().is_none());
        assert!(criteria.require_identity_filter().is_err());

        criteria.object_kind = ObjectDatumKind::Location;
        criteria.location_ids = Some(vec![11]);
        assert_eq!(criteria.object_ids(), Some(&[11_i64][..]));
        assert!(criteria.require_identity_filter().is_ok());
    }

    #[test]
    fn page_policy() {
        assert!(!Page { offset: 0, max: None }.requires_count());
        assert!(!Page { offset: 0, max: Some(-1) }.requires_count());
        assert!(Page { offset: 0, max: Some(0) }.requires_count());
        assert!(Page { offset: 10, max: Some(25) }.requires_count());

        let capped = Page { offset: 5, max: None }.capped(Some(100));
        assert_eq!(capped, Page { offset: 5, max: Some(100) });
        let capped = Page { offset: 0, max: Some(500) }.capped(Some(100));
        assert_eq!(capped.max, Some(100));
    }

    #[test]
    fn rank_property_defaults_and_validates() {
        let mut config = CombiningConfig::new(CombiningType::Difference);
        assert_eq!(config.rank_property().unwrap(), "prank");

        config.rank_property = Some("bar".into());
        assert_eq!(config.rank_property().unwrap(), "bar");

        config.rank_property = Some("bar; DROP TABLE x".into());
        assert!(matches!(
            config.rank_property(),
            Err(DatumError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn criteria_deserializes_from_camel_case() {
        let json = r#"{
            "nodeIds": [1, 2],
            "sourceIds": ["a"],
            "localStartDate": "2020-01-01T00:00:00",
            "localEndDate": "2021-01-01T00:00:00",
            "aggregation": "Year",
            "partialAggregation": "Month",
            "combining": {"combiningType": "Sum", "objectIdMaps": {"100": [1, 2]}},
            "sorts": [{"sortKey": "source", "descending": true}]
        }"#;
        let criteria: DatumCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.object_ids(), Some(&[1_i64, 2][..]));
        assert_eq!(criteria.aggregation, Some(Aggregation::Year));
        assert_eq!(criteria.partial_aggregation, Some(Aggregation::Month));
        let combining = criteria.combining.unwrap();
        assert_eq!(combining.object_id_maps.get(&100), Some(&vec![1, 2]));
        assert_eq!(criteria.sorts, vec![SortDescriptor::desc("source")]);
    }
}
