//! Aggregate over a local date range assembled from two aggregation levels

use solarnet_core::{Aggregation, DatumCriteria, DatumError, Result};

use crate::interval::{partition, LocalDateInterval};
use crate::select::rollup::write_rollup;
use crate::statement::{CursorShape, QueryName, SqlBuilder, StatementBuilder, StatementDescription};

/// Rolls up each matching stream over `[local_start, local_end)`, reading
/// whole `aggregation` periods from their own table and the remainders from
/// the `partial_aggregation` table.
#[derive(Debug, Clone)]
pub struct SelectDatumPartialAggregate {
    criteria: DatumCriteria,
}

impl SelectDatumPartialAggregate {
    pub fn new(criteria: DatumCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &DatumCriteria {
        &self.criteria
    }

    /// The partitioned intervals the statement reads.
    pub fn intervals(&self) -> Result<Vec<LocalDateInterval>> {
        let (start, end) = self.criteria.local_date_span()?;
        let (aggregation, partial) = self.levels()?;
        partition(aggregation, partial, start, end)
    }

    fn levels(&self) -> Result<(Aggregation, Aggregation)> {
        let aggregation = self
            .criteria
            .aggregation
            .ok_or_else(|| DatumError::missing_filter("aggregation", &self.criteria))?;
        let partial = self
            .criteria
            .partial_aggregation
            .ok_or_else(|| DatumError::missing_filter("partial aggregation", &self.criteria))?;
        for level in [aggregation, partial] {
            if !matches!(
                level,
                Aggregation::Year | Aggregation::Month | Aggregation::Day | Aggregation::Hour
            ) {
                return Err(DatumError::UnsupportedAggregation(level.to_string()));
            }
        }
        Ok((aggregation, partial))
    }
}

impl StatementBuilder for SelectDatumPartialAggregate {
    fn query_name(&self) -> QueryName {
        QueryName::FindDatumPartialAggregate
    }

    fn statement(&self) -> Result<StatementDescription> {
        self.criteria.require_identity_filter()?;
        let (start, end) = self.criteria.local_date_span()?;
        let intervals = self.intervals()?;

        let mut b = SqlBuilder::new();
        write_rollup(&mut b, &self.criteria, &intervals, start, end)?;
        b.finish(self.query_name(), CursorShape::STREAMING)
    }
}
