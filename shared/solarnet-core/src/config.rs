//! Query execution configuration

use crate::error::{DatumError, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Rows fetched per round trip when streaming from a forward-only cursor.
    pub running_total_fetch_size: i32,
    /// Upper bound applied to every requested page.
    pub max_page_size: Option<i32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            running_total_fetch_size: 1000,
            max_page_size: None,
        }
    }
}

impl QueryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let running_total_fetch_size: i32 = lookup("DATUM_RUNNING_TOTAL_FETCH_SIZE")
            .unwrap_or_else(|| "1000".to_string())
            .parse()
            .map_err(|e| {
                DatumError::Config(format!("Invalid DATUM_RUNNING_TOTAL_FETCH_SIZE: {}", e))
            })?;
        if running_total_fetch_size < 1 {
            return Err(DatumError::Config(
                "DATUM_RUNNING_TOTAL_FETCH_SIZE must be positive".to_string(),
            ));
        }

        let max_page_size = lookup("DATUM_MAX_PAGE_SIZE")
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|e| DatumError::Config(format!("Invalid DATUM_MAX_PAGE_SIZE: {}", e)))
            })
            .transpose()?;

        Ok(Self {
            running_total_fetch_size,
            max_page_size,
        })
    }
}
