//! SolarNet Core - datum stream domain model
//!
//! This crate provides:
//! - Stream metadata and the query criteria model
//! - Aggregation, combining and sample-kind enumerations
//! - Auxiliary datum and result record types
//! - Error handling and query configuration

pub mod config;
pub mod criteria;
pub mod datum;
pub mod domain;
pub mod error;
pub mod export;
pub mod stream;

pub use config::QueryConfig;
pub use criteria::{CombiningConfig, DateRange, DatumCriteria, Page, DEFAULT_RANK_PROPERTY};
pub use datum::*;
pub use domain::*;
pub use error::{DatumError, Result};
pub use export::{CollectingHandler, DatumExportHandler, ExportAction};
pub use stream::StreamMetadata;
