//! Healthbridge Cache - SQLite metrics store
//!
//! Local stand-in for the backend that receives daily snapshots and
//! connection records:
//! - `health_connections`, one row per user and platform
//! - `health_daily_metrics`, one row per user and calendar day
//!
//! ## Architecture
//!
//! [`SqliteMetricsStore`] is the `IMetricsStore` adapter the daemon and the
//! integration tests run against. [`DatabasePool`] opens the file (or an
//! in-memory database) and applies the embedded migrations.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use healthbridge_cache::{DatabasePool, SqliteMetricsStore};
//! use healthbridge_core::ports::IMetricsStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/healthbridge/healthbridge.db")).await?;
//! let store: Arc<dyn IMetricsStore> = Arc::new(SqliteMetricsStore::new(pool.pool().clone()));
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteMetricsStore;

/// Failures of the SQLite adapter itself
///
/// Schema gaps are not reported here; the store turns those into
/// `StoreError::SchemaUnavailable` before they leave the crate.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot create database directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open metrics database {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {name} failed: {source}")]
    Migration {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// A stored value does not decode into its domain type
    #[error("malformed row: {0}")]
    Decode(String),
}
