//! SolarNet PgDB - datum store access
//!
//! Executes statements rendered by `solarnet-datum-sql` over PostgreSQL.
//! Provides connection pooling, parameter binding, row mapping and
//! forward-cursor streaming.

mod client;
mod dao;
mod error;
pub mod mapper;
mod pool;

pub use client::{connect, PgArray, PgBoundStatement, PgStatementConnection};
pub use dao::{DaoMetrics, DatumDao};
pub use error::{DatumDbError, Result};
pub use pool::{DatumDbPool, PoolConfig, PoolStats};

/// Re-export tokio-postgres types for convenience
pub use tokio_postgres::{types::ToSql, Row, Statement};
