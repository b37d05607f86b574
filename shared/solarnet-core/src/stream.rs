//! Datum stream metadata

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{DatumSamplesType, ObjectDatumKind};

/// Immutable description of one datum stream.
///
/// Property names are held in a single array laid out as the instantaneous
/// names, then the accumulating names, then the status names. Tags are not
/// positional and never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    stream_id: Uuid,
    time_zone: String,
    kind: ObjectDatumKind,
    object_id: i64,
    source_id: String,
    property_names: Vec<String>,
    instantaneous_len: usize,
    accumulating_len: usize,
    status_len: usize,
}

impl StreamMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_id: Uuid,
        time_zone: impl Into<String>,
        kind: ObjectDatumKind,
        object_id: i64,
        source_id: impl Into<String>,
        instantaneous: Option<Vec<String>>,
        accumulating: Option<Vec<String>>,
        status: Option<Vec<String>>,
    ) -> Self {
        let instantaneous = instantaneous.unwrap_or_default();
        let accumulating = accumulating.unwrap_or_default();
        let status = status.unwrap_or_default();
        let instantaneous_len = instantaneous.len();
        let accumulating_len = accumulating.len();
        let status_len = status.len();

        let mut property_names =
            Vec::with_capacity(instantaneous_len + accumulating_len + status_len);
        property_names.extend(instantaneous);
        property_names.extend(accumulating);
        property_names.extend(status);

        Self {
            stream_id,
            time_zone: time_zone.into(),
            kind,
            object_id,
            source_id: source_id.into(),
            property_names,
            instantaneous_len,
            accumulating_len,
            status_len,
        }
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn kind(&self) -> ObjectDatumKind {
        self.kind
    }

    pub fn object_id(&self) -> i64 {
        self.object_id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// All property names, or `None` when the stream has no properties at all.
    pub fn property_names(&self) -> Option<&[String]> {
        if self.property_names.is_empty() {
            None
        } else {
            Some(&self.property_names)
        }
    }

    pub fn property_names_length(&self) -> usize {
        self.property_names.len()
    }

    /// Names of one sample kind; empty when the stream has none of that kind.
    pub fn property_names_for_kind(&self, kind: DatumSamplesType) -> &[String] {
        let (start, len) = self.segment(kind);
        &self.property_names[start..start + len]
    }

    pub fn property_names_length_for_kind(&self, kind: DatumSamplesType) -> usize {
        self.segment(kind).1
    }

    /// Position of `name` within the names of `kind`.
    pub fn property_index(&self, kind: DatumSamplesType, name: &str) -> Option<usize> {
        self.property_names_for_kind(kind)
            .iter()
            .position(|n| n == name)
    }

    fn segment(&self, kind: DatumSamplesType) -> (usize, usize) {
        match kind {
            DatumSamplesType::Instantaneous => (0, self.instantaneous_len),
            DatumSamplesType::Accumulating => (self.instantaneous_len, self.accumulating_len),
            DatumSamplesType::Status => (
                self.instantaneous_len + self.accumulating_len,
                self.status_len,
            ),
            DatumSamplesType::Tag => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Option<Vec<String>> {
        Some(n.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn segments_partition_property_names() {
        let meta = StreamMetadata::new(
            Uuid::new_v4(),
            "Pacific/Auckland",
            ObjectDatumKind::Node,
            1,
            "meter/1",
            names(&["watts", "current"]),
            names(&["wattHours"]),
            names(&["phase"]),
        );

        assert_eq!(meta.property_names_length(), 4);
        assert_eq!(
            meta.property_names().unwrap(),
            &["watts", "current", "wattHours", "phase"]
        );
        assert_eq!(
            meta.property_names_for_kind(DatumSamplesType::Instantaneous),
            &["watts", "current"]
        );
        assert_eq!(
            meta.property_names_for_kind(DatumSamplesType::Accumulating),
            &["wattHours"]
        );
        assert_eq!(meta.property_names_for_kind(DatumSamplesType::Status), &["phase"]);
        assert!(meta.property_names_for_kind(DatumSamplesType::Tag).is_empty());
        assert_eq!(
            meta.property_names_length_for_kind(DatumSamplesType::Instantaneous)
                + meta.property_names_length_for_kind(DatumSamplesType::Accumulating)
                + meta.property_names_length_for_kind(DatumSamplesType::Status),
            meta.property_names_length()
        );
        assert_eq!(
            meta.property_index(DatumSamplesType::Accumulating, "wattHours"),
            Some(0)
        );
        assert_eq!(meta.property_index(DatumSamplesType::Instantaneous, "phase"), None);
    }

    #[test]
    fn empty_segments_are_empty_slices() {
        let meta = StreamMetadata::new(
            Uuid::new_v4(),
            "UTC",
            ObjectDatumKind::Location,
            2,
            "weather",
            None,
            names(&["rain"]),
            Some(Vec::new()),
        );

        assert!(meta
            .property_names_for_kind(DatumSamplesType::Instantaneous)
            .is_empty());
        assert!(meta.property_names_for_kind(DatumSamplesType::Status).is_empty());
        assert_eq!(meta.property_names().map(<[String]>::len), Some(1));
    }

    #[test]
    fn no_properties_reports_absent_names() {
        let meta = StreamMetadata::new(
            Uuid::new_v4(),
            "UTC",
            ObjectDatumKind::Node,
            3,
            "empty",
            None,
            None,
            None,
        );

        assert!(meta.property_names().is_none());
        assert_eq!(meta.property_names_length(), 0);
        assert!(meta
            .property_names_for_kind(DatumSamplesType::Accumulating)
            .is_empty());
    }
}
