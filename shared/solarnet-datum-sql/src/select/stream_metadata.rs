//! Stream metadata lookup

use solarnet_core::{DatumCriteria, ObjectDatumKind, Result};

use crate::filter::{write_order_by, write_stream_cte};
use crate::statement::{CursorShape, QueryName, SqlBuilder, StatementBuilder, StatementDescription};

/// Selects identity, time zone and property layout of matching streams.
#[derive(Debug, Clone)]
pub struct SelectStreamMetadata {
    criteria: DatumCriteria,
}

impl SelectStreamMetadata {
    pub fn new(criteria: DatumCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &DatumCriteria {
        &self.criteria
    }

    pub fn object_kind(&self) -> ObjectDatumKind {
        self.criteria.object_kind
    }
}

impl StatementBuilder for SelectStreamMetadata {
    fn query_name(&self) -> QueryName {
        QueryName::FindStreamMetadata
    }

    fn statement(&self) -> Result<StatementDescription> {
        // dates do not restrict metadata, but contradictory ones are still rejected
        self.criteria.date_range()?;

        let mut b = SqlBuilder::new();
        write_stream_cte(&mut b, &self.criteria);
        b.push("SELECT s.stream_id, s.obj_id, s.source_id, s.names_i, s.names_a, s.names_s, s.time_zone\nFROM s\n");
        write_order_by(&mut b, &self.criteria.sorts);
        b.finish(self.query_name(), CursorShape::default())
    }
}
