//! Statement builders for datum queries

mod partial_aggregate;
mod record_counts;
pub mod rollup;
mod running_total;
mod stream_metadata;

pub use partial_aggregate::SelectDatumPartialAggregate;
pub use record_counts::SelectDatumRecordCounts;
pub use rollup::ROLLUP_COLUMNS;
pub use running_total::SelectDatumRunningTotal;
pub use stream_metadata::SelectStreamMetadata;
