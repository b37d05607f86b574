//! Datum row counts per stream and storage level

use solarnet_core::{DatumCriteria, Page, Result};

use crate::filter::{write_date_conditions, write_limit_offset, write_order_by, write_stream_cte};
use crate::statement::{CursorShape, QueryName, SqlBuilder, StatementBuilder, StatementDescription};

/// Count source table, time column and output column for each storage level
const COUNT_SOURCES: [(&str, &str, &str); 4] = [
    ("solardatm.da_datm", "d.ts", "datum_count"),
    ("solardatm.agg_datm_hourly", "d.ts_start", "datum_hourly_count"),
    ("solardatm.agg_datm_daily", "d.ts_start", "datum_daily_count"),
    ("solardatm.agg_datm_monthly", "d.ts_start", "datum_monthly_count"),
];

#[derive(Debug, Clone)]
pub struct SelectDatumRecordCounts {
    criteria: DatumCriteria,
    page: Page,
}

impl SelectDatumRecordCounts {
    pub fn new(criteria: DatumCriteria) -> Self {
        let page = criteria.page();
        Self { criteria, page }
    }

    /// Replace the page taken from the criteria.
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn criteria(&self) -> &DatumCriteria {
        &self.criteria
    }

    /// The `-count` variant: the number of streams the paged query spans.
    pub fn count_statement(&self) -> Result<StatementDescription> {
        self.criteria.require_identity_filter()?;
        self.criteria.date_range()?;

        let mut b = SqlBuilder::new();
        write_stream_cte(&mut b, &self.criteria);
        b.push("SELECT COUNT(*) AS total FROM s\n");
        b.finish(QueryName::FindDatumRecordCountsCount, CursorShape::default())
    }
}

impl StatementBuilder for SelectDatumRecordCounts {
    fn query_name(&self) -> QueryName {
        QueryName::FindDatumRecordCounts
    }

    fn statement(&self) -> Result<StatementDescription> {
        self.criteria.require_identity_filter()?;
        let range = self.criteria.date_range()?;

        let mut b = SqlBuilder::new();
        write_stream_cte(&mut b, &self.criteria);
        b.push("SELECT s.stream_id, s.obj_id, s.source_id\n");
        for (table, column, alias) in COUNT_SOURCES {
            b.push("\t, (\n\t\tSELECT COUNT(*) FROM ").push(table);
            b.push(" d\n\t\tWHERE d.stream_id = s.stream_id\n");
            write_date_conditions(&mut b, column, range.as_ref());
            b.push("\t) AS ").push(alias).push("\n");
        }
        b.push("FROM s\n");
        write_order_by(&mut b, &self.criteria.sorts);
        write_limit_offset(&mut b, &self.page);
        b.finish(self.query_name(), CursorShape::default())
    }
}
