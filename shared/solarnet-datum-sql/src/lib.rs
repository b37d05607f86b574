//! SolarNet Datum SQL - datum query planning engine
//!
//! This crate turns [`DatumCriteria`](solarnet_core::DatumCriteria) into
//! statement descriptions:
//! - Calendar partitioning of local date ranges across aggregation levels
//! - Statement builders rendering SQL with ordered, typed parameters
//! - Virtual stream combining fragments and CTE templates
//! - Auxiliary datum procedure calls and row decoding
//!
//! Rendering is pure; only [`StatementBuilder::bind`] touches a connection.

pub mod auxiliary;
pub mod combine;
pub mod filter;
pub mod interval;
pub mod select;
pub mod statement;

pub use auxiliary::{
    AuxiliaryColumns, AuxiliaryDatumCodec, GetDatumAuxiliary, MoveDatumAuxiliary, StoreDatumAuxiliary,
};
pub use combine::CombiningSqlGenerator;
pub use interval::{partition, refine, LocalDateInterval};
pub use select::{
    SelectDatumPartialAggregate, SelectDatumRecordCounts, SelectDatumRunningTotal, SelectStreamMetadata,
    ROLLUP_COLUMNS,
};
pub use statement::{
    bind_statement, CursorShape, QueryName, SqlArray, SqlParameter, SqlValue, StatementBuilder,
    StatementConnection, StatementDescription,
};
