//! SQLite implementation of IMetricsStore
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                   |
//! |--------------------|----------|--------------------------------------------|
//! | UserId             | TEXT     | `.as_str()` / `UserId::new()`              |
//! | Platform           | TEXT     | `.as_str()` / `FromStr`                    |
//! | SyncSource         | TEXT     | `.as_str()` / `FromStr`                    |
//! | NaiveDate          | TEXT     | `YYYY-MM-DD`                               |
//! | DateTime<Utc>      | TEXT     | ISO 8601 via `to_rfc3339()`                |
//! | Capabilities       | INTEGER  | one 0/1 column per flag                    |
//!
//! ## Schema errors
//!
//! A missing table or column is reported as
//! [`StoreError::SchemaUnavailable`] so the orchestrator can treat an
//! unprovisioned backend as a soft failure.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use healthbridge_core::domain::{
    Capabilities, DailyMetricSnapshot, HealthConnection, Platform, SyncSource, UserId,
};
use healthbridge_core::ports::{IMetricsStore, StoreError, CONNECTIONS_RELATION, DAILY_METRICS_RELATION};

use crate::CacheError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Backend error messages that mean the schema is not provisioned
const SCHEMA_MISSING_MARKERS: &[&str] = &["no such table", "no such column", "has no column named"];

/// SQLite-based implementation of the metrics store port
pub struct SqliteMetricsStore {
    pool: SqlitePool,
}

impl SqliteMetricsStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the stored snapshot for `(user_id, date)`, if any
    pub async fn get_daily_metrics(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyMetricSnapshot>, StoreError> {
        let row = sqlx::query("SELECT * FROM health_daily_metrics WHERE user_id = ? AND metric_date = ?")
            .bind(user_id.as_str())
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(DAILY_METRICS_RELATION, e))?;

        row.as_ref()
            .map(snapshot_from_row)
            .transpose()
            .map_err(|e| StoreError::Backend(e.into()))
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Returns true if `message` reports a missing table, column or relation
pub fn is_schema_missing(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    SCHEMA_MISSING_MARKERS.iter().any(|m| lower.contains(m))
        || (lower.contains("relation") && lower.contains("does not exist"))
}

fn classify(relation: &'static str, err: sqlx::Error) -> StoreError {
    let message = err.to_string();
    if is_schema_missing(&message) {
        tracing::warn!(relation, error = %message, "Metrics relation is not provisioned");
        StoreError::SchemaUnavailable { relation, message }
    } else {
        StoreError::Backend(CacheError::Query(err).into())
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn parse_date(s: &str) -> Result<NaiveDate, CacheError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| CacheError::Decode(format!("Invalid date '{}': {}", s, e)))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Decode(format!("Invalid datetime '{}': {}", s, e)))
}

fn parse_user_id(s: String) -> Result<UserId, CacheError> {
    UserId::new(s).map_err(|e| CacheError::Decode(e.to_string()))
}

fn connection_from_row(row: &SqliteRow) -> Result<HealthConnection, CacheError> {
    let user_id: String = row.try_get("user_id")?;
    let platform: String = row.try_get("platform")?;
    let provider: String = row.try_get("provider")?;
    let is_connected: bool = row.try_get("is_connected")?;
    let capabilities = Capabilities {
        can_read_steps: row.try_get("can_read_steps")?,
        can_read_active_calories: row.try_get("can_read_active_calories")?,
        can_write_nutrition: row.try_get("can_write_nutrition")?,
    };
    let last_synced_date: Option<String> = row.try_get("last_synced_date")?;
    let last_synced_at: Option<String> = row.try_get("last_synced_at")?;

    let platform = platform
        .parse::<Platform>()
        .map_err(|e| CacheError::Decode(e.to_string()))?;

    Ok(HealthConnection::from_parts(
        parse_user_id(user_id)?,
        platform,
        provider,
        is_connected,
        capabilities,
        last_synced_date.as_deref().map(parse_date).transpose()?,
        last_synced_at.as_deref().map(parse_datetime).transpose()?,
    ))
}

fn snapshot_from_row(row: &SqliteRow) -> Result<DailyMetricSnapshot, CacheError> {
    let user_id: String = row.try_get("user_id")?;
    let metric_date: String = row.try_get("metric_date")?;
    let steps: i64 = row.try_get("steps")?;
    let active_calories: Option<f64> = row.try_get("active_calories")?;
    let source: String = row.try_get("source")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(DailyMetricSnapshot {
        user_id: parse_user_id(user_id)?,
        metric_date: parse_date(&metric_date)?,
        steps: steps.max(0) as u64,
        active_calories,
        source: source
            .parse::<SyncSource>()
            .map_err(|e| CacheError::Decode(e.to_string()))?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ============================================================================
// IMetricsStore
// ============================================================================

#[async_trait::async_trait]
impl IMetricsStore for SqliteMetricsStore {
    async fn upsert_daily_metrics(&self, snapshot: &DailyMetricSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO health_daily_metrics \
             (user_id, metric_date, steps, active_calories, source, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, metric_date) DO UPDATE SET \
               steps = excluded.steps, \
               active_calories = excluded.active_calories, \
               source = excluded.source, \
               updated_at = excluded.updated_at",
        )
        .bind(snapshot.user_id.as_str())
        .bind(snapshot.metric_date.format(DATE_FORMAT).to_string())
        .bind(i64::try_from(snapshot.steps).unwrap_or(i64::MAX))
        .bind(snapshot.active_calories)
        .bind(snapshot.source.as_str())
        .bind(snapshot.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| classify(DAILY_METRICS_RELATION, e))?;

        tracing::debug!(
            user_id = %snapshot.user_id,
            date = %snapshot.metric_date,
            steps = snapshot.steps,
            "Upserted daily metrics"
        );
        Ok(())
    }

    async fn upsert_connection(&self, connection: &HealthConnection) -> Result<(), StoreError> {
        let capabilities = connection.capabilities();
        sqlx::query(
            "INSERT INTO health_connections \
             (user_id, platform, provider, is_connected, can_read_steps, \
              can_read_active_calories, can_write_nutrition, last_synced_date, \
              last_synced_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, platform) DO UPDATE SET \
               provider = excluded.provider, \
               is_connected = excluded.is_connected, \
               can_read_steps = excluded.can_read_steps, \
               can_read_active_calories = excluded.can_read_active_calories, \
               can_write_nutrition = excluded.can_write_nutrition, \
               last_synced_date = excluded.last_synced_date, \
               last_synced_at = excluded.last_synced_at, \
               updated_at = excluded.updated_at",
        )
        .bind(connection.user_id().as_str())
        .bind(connection.platform().as_str())
        .bind(connection.provider())
        .bind(connection.is_connected())
        .bind(capabilities.can_read_steps)
        .bind(capabilities.can_read_active_calories)
        .bind(capabilities.can_write_nutrition)
        .bind(
            connection
                .last_synced_date()
                .map(|d| d.format(DATE_FORMAT).to_string()),
        )
        .bind(connection.last_synced_at().map(|at| at.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| classify(CONNECTIONS_RELATION, e))?;

        tracing::debug!(
            user_id = %connection.user_id(),
            platform = %connection.platform(),
            connected = connection.is_connected(),
            "Upserted health connection"
        );
        Ok(())
    }

    async fn get_connection(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Option<HealthConnection>, StoreError> {
        let row = sqlx::query("SELECT * FROM health_connections WHERE user_id = ? AND platform = ?")
            .bind(user_id.as_str())
            .bind(platform.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(CONNECTIONS_RELATION, e))?;

        row.as_ref()
            .map(connection_from_row)
            .transpose()
            .map_err(|e| StoreError::Backend(e.into()))
    }

    async fn record_sync(
        &self,
        user_id: &UserId,
        platform: Platform,
        date: NaiveDate,
        at: DateTime<Utc>,
        observed: Capabilities,
    ) -> Result<bool, StoreError> {
        // Flags are 0/1 integers, so MAX is a logical OR
        let result = sqlx::query(
            "UPDATE health_connections SET \
               last_synced_date = ?, \
               last_synced_at = ?, \
               can_read_steps = MAX(can_read_steps, ?), \
               can_read_active_calories = MAX(can_read_active_calories, ?), \
               can_write_nutrition = MAX(can_write_nutrition, ?), \
               updated_at = ? \
             WHERE user_id = ? AND platform = ?",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(at.to_rfc3339())
        .bind(observed.can_read_steps)
        .bind(observed.can_read_active_calories)
        .bind(observed.can_write_nutrition)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.as_str())
        .bind(platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| classify(CONNECTIONS_RELATION, e))?;

        let found = result.rows_affected() > 0;
        tracing::debug!(user_id = %user_id, platform = %platform, date = %date, found, "Recorded sync");
        Ok(found)
    }
}
