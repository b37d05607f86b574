//! Running total over a local date range
//!
//! The range is served by the coarsest aggregate available for each part:
//! whole months from the monthly table, whole days from the daily table and
//! the remaining hours from the hourly table.

use solarnet_core::{Aggregation, DatumCriteria, DatumError, Result};

use crate::interval::{partition, refine, LocalDateInterval};
use crate::select::rollup::write_rollup;
use crate::statement::{CursorShape, QueryName, SqlBuilder, StatementBuilder, StatementDescription};

#[derive(Debug, Clone)]
pub struct SelectDatumRunningTotal {
    criteria: DatumCriteria,
}

impl SelectDatumRunningTotal {
    pub fn new(criteria: DatumCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &DatumCriteria {
        &self.criteria
    }

    /// Month, day and hour intervals covering the criteria's local range.
    pub fn intervals(&self) -> Result<Vec<LocalDateInterval>> {
        let (start, end) = self.criteria.local_date_span()?;
        let intervals = partition(Aggregation::Month, Aggregation::Day, start, end)?;
        refine(intervals, Aggregation::Day, Aggregation::Hour)
    }
}

impl StatementBuilder for SelectDatumRunningTotal {
    fn query_name(&self) -> QueryName {
        QueryName::FindDatumRunningTotal
    }

    fn statement(&self) -> Result<StatementDescription> {
        match self.criteria.aggregation {
            None | Some(Aggregation::RunningTotal) => {}
            Some(other) => return Err(DatumError::UnsupportedAggregation(other.to_string())),
        }
        self.criteria.require_identity_filter()?;
        let (start, end) = self.criteria.local_date_span()?;
        let intervals = self.intervals()?;

        let mut b = SqlBuilder::new();
        write_rollup(&mut b, &self.criteria, &intervals, start, end)?;
        b.finish(self.query_name(), CursorShape::STREAMING)
    }
}
