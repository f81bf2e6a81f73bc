//! Backend metrics store port (driven/secondary port)
//!
//! This module defines the narrow read/write contract the orchestrator needs
//! against the remote store: two upserts, one lookup and the sync stamp.
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a classified [`StoreError`]:
//!   the orchestrator must tell "the table is not provisioned" apart from
//!   "the write failed", because the first is a soft failure.
//! - Upserts take references so the caller keeps ownership.
//! - A sync attempt never writes the whole connection back. It only stamps
//!   the row through [`IMetricsStore::record_sync`], so a disconnect or a
//!   reconnect that lands while the reads are in flight survives.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{Capabilities, DailyMetricSnapshot, HealthConnection, Platform, UserId};

/// Backend relation holding daily snapshots
pub const DAILY_METRICS_RELATION: &str = "health_daily_metrics";

/// Backend relation holding connection records
pub const CONNECTIONS_RELATION: &str = "health_connections";

/// Errors returned by metrics store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    /// The destination table or one of its columns does not exist
    #[error("relation '{relation}' is not provisioned: {message}")]
    SchemaUnavailable {
        relation: &'static str,
        message: String,
    },

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Returns true if the backend lacks the destination schema
    pub fn is_schema_unavailable(&self) -> bool {
        matches!(self, StoreError::SchemaUnavailable { .. })
    }
}

/// Port trait for the backend metrics store
#[async_trait::async_trait]
pub trait IMetricsStore: Send + Sync {
    /// Inserts or replaces the snapshot keyed by `(user_id, metric_date)`
    async fn upsert_daily_metrics(&self, snapshot: &DailyMetricSnapshot) -> Result<(), StoreError>;

    /// Inserts or replaces the connection keyed by `(user_id, platform)`
    async fn upsert_connection(&self, connection: &HealthConnection) -> Result<(), StoreError>;

    /// Returns the connection for `(user_id, platform)`, if any
    async fn get_connection(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Option<HealthConnection>, StoreError>;

    /// Stamps a completed sync on the existing row for `(user_id, platform)`
    ///
    /// Sets `last_synced_date` and `last_synced_at` and OR-merges `observed`
    /// into the stored flags. `is_connected` and `provider` are untouched.
    /// Returns false if no row exists.
    async fn record_sync(
        &self,
        user_id: &UserId,
        platform: Platform,
        date: NaiveDate,
        at: DateTime<Utc>,
        observed: Capabilities,
    ) -> Result<bool, StoreError>;
}
