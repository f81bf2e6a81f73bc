//! Day-bucketed metric snapshot
//!
//! One row per user × local calendar day. Upserts replace the whole row, so a
//! later snapshot for the same day always wins and no field is merged.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{errors::DomainError, provider::UserId};

/// Which trigger produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    /// User-visible trigger (app opened, settings screen)
    Foreground,
    /// Periodic background task
    Background,
}

impl SyncSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSource::Foreground => "foreground",
            SyncSource::Background => "background",
        }
    }
}

impl Display for SyncSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreground" => Ok(SyncSource::Foreground),
            "background" => Ok(SyncSource::Background),
            other => Err(DomainError::InvalidSource(other.to_string())),
        }
    }
}

/// Aggregated health metrics for one user and one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricSnapshot {
    pub user_id: UserId,
    pub metric_date: NaiveDate,
    pub steps: u64,
    /// Kilocalories, one decimal; `None` when the read was unsupported
    pub active_calories: Option<f64>,
    pub source: SyncSource,
    pub updated_at: DateTime<Utc>,
}

impl DailyMetricSnapshot {
    pub fn new(
        user_id: UserId,
        metric_date: NaiveDate,
        steps: u64,
        active_calories: Option<f64>,
        source: SyncSource,
    ) -> Self {
        Self {
            user_id,
            metric_date,
            steps,
            active_calories,
            source,
            updated_at: Utc::now(),
        }
    }
}
