//! Ephemeral outcome of one orchestration attempt
//!
//! A [`SyncResult`] is never persisted; the background task handler turns it
//! into a [`TaskOutcome`] for the host scheduler and drops it.

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a sync attempt ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    /// Fresh values were written
    Synced,
    /// No user is signed in
    NotAuthenticated,
    /// No connection row, or the user disconnected
    HealthNotConnected,
    /// The last sync is younger than the minimum interval
    SyncedRecently,
    /// The platform health service is not usable right now
    HealthNotAvailable,
    /// The steps read was unsupported on this attempt
    HealthDataUnavailable,
    /// The steps read kept failing across consecutive attempts
    HealthReadFailed,
    /// `health_daily_metrics` is not provisioned in the backend
    DailyMetricsStorageUnavailable,
    /// `health_connections` is not provisioned in the backend
    ConnectionsStorageUnavailable,
    /// Snapshot upsert failed for another reason
    DailyMetricsUpsertFailed,
    /// Connection lookup failed for another reason
    ConnectionLookupFailed,
    /// Connection upsert failed for another reason
    ConnectionUpdateFailed,
}

impl SyncReason {
    /// Stable code surfaced to callers and telemetry
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::Synced => "synced",
            SyncReason::NotAuthenticated => "not_authenticated",
            SyncReason::HealthNotConnected => "health_not_connected",
            SyncReason::SyncedRecently => "synced_recently",
            SyncReason::HealthNotAvailable => "health_not_available",
            SyncReason::HealthDataUnavailable => "health_data_unavailable",
            SyncReason::HealthReadFailed => "health_read_failed",
            SyncReason::DailyMetricsStorageUnavailable => "health_daily_metrics_storage_unavailable",
            SyncReason::ConnectionsStorageUnavailable => "health_connections_storage_unavailable",
            SyncReason::DailyMetricsUpsertFailed => "health_daily_metrics_upsert_failed",
            SyncReason::ConnectionLookupFailed => "health_connection_lookup_failed",
            SyncReason::ConnectionUpdateFailed => "health_connection_update_failed",
        }
    }

    /// Returns true for reasons that are expected no-ops rather than faults
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            SyncReason::NotAuthenticated
                | SyncReason::HealthNotConnected
                | SyncReason::HealthNotAvailable
                | SyncReason::SyncedRecently
                | SyncReason::HealthDataUnavailable
                | SyncReason::DailyMetricsStorageUnavailable
                | SyncReason::ConnectionsStorageUnavailable
        )
    }
}

impl Display for SyncReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state result reported to the host's periodic task scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    NewData,
    NoData,
    Failed,
}

/// Outcome of a single `sync_snapshot_for_user` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub synced: bool,
    pub reason: SyncReason,
    pub date: NaiveDate,
    pub steps: Option<u64>,
    pub active_calories: Option<f64>,
    /// Verbatim platform reason, when one exists
    pub detail: Option<String>,
}

impl SyncResult {
    /// A short-circuited attempt with no values
    pub fn skipped(reason: SyncReason, date: NaiveDate) -> Self {
        Self {
            synced: false,
            reason,
            date,
            steps: None,
            active_calories: None,
            detail: None,
        }
    }

    /// A completed attempt carrying the values that were written
    pub fn synced(date: NaiveDate, steps: u64, active_calories: Option<f64>) -> Self {
        Self {
            synced: true,
            reason: SyncReason::Synced,
            date,
            steps: Some(steps),
            active_calories,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Maps this result onto the scheduler's tri-state
    pub fn task_outcome(&self) -> TaskOutcome {
        if self.synced {
            TaskOutcome::NewData
        } else if self.reason.is_benign() {
            TaskOutcome::NoData
        } else {
            TaskOutcome::Failed
        }
    }
}
