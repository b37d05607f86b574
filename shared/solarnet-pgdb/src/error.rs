//! Datum store error types

use solarnet_core::DatumError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatumDbError>;

#[derive(Debug, Error)]
pub enum DatumDbError {
    #[error(transparent)]
    Datum(#[from] DatumError),

    #[error("Connection error: {0}")]
    Connection(tokio_postgres::Error),

    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Statement {query} has no parameter {index}")]
    Binding { query: String, index: usize },

    #[error("Row not found")]
    NotFound,
}

impl DatumDbError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Datum(e) => e.status_code(),
            Self::NotFound => 404,
            _ => 500,
        }
    }
}
