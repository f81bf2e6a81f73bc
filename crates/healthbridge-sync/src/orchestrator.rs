//! Background sync orchestration
//!
//! [`SyncOrchestrator::sync_snapshot_for_user`] runs one attempt:
//!
//! ```text
//! resolve user ─→ load connection ─→ recency gate ─→ availability
//!       ─→ read steps ∥ read active calories ─→ upsert snapshot
//!       ─→ stamp connection
//! ```
//!
//! Every step that cannot continue ends the attempt with a [`SyncResult`]
//! carrying a stable reason. The connection row is read once at the start
//! for the gates and never written back whole: the final step only stamps
//! the sync fields and OR-merges capabilities in storage, so a disconnect
//! or reconnect made while the reads were in flight is kept.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use healthbridge_bridge::HealthBridge;
use healthbridge_core::config::SyncConfig;
use healthbridge_core::domain::{
    Capabilities, DailyMetricSnapshot, HealthConnection, SyncReason, SyncResult, SyncSource,
    UserId,
};
use healthbridge_core::ports::{IIdentityProvider, IMetricsStore, StoreError};

use crate::SyncError;

/// Parameters of one sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Explicit user; falls back to the identity provider when `None`
    pub user_id: Option<String>,
    /// Bypass the recency gate
    pub force: bool,
    pub source: SyncSource,
}

impl SyncRequest {
    /// An unforced background attempt for the signed-in user
    pub fn background() -> Self {
        Self {
            user_id: None,
            force: false,
            source: SyncSource::Background,
        }
    }

    /// An unforced foreground attempt for `user_id`
    pub fn foreground(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            force: false,
            source: SyncSource::Foreground,
        }
    }

    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Reconciles native health data into the metrics store
pub struct SyncOrchestrator {
    bridge: Arc<HealthBridge>,
    store: Arc<dyn IMetricsStore>,
    identity: Arc<dyn IIdentityProvider>,
    config: SyncConfig,
    /// Consecutive attempts per user whose steps read was unsupported
    read_failures: DashMap<UserId, u32>,
}

impl SyncOrchestrator {
    pub fn new(
        bridge: Arc<HealthBridge>,
        store: Arc<dyn IMetricsStore>,
        identity: Arc<dyn IIdentityProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            bridge,
            store,
            identity,
            config,
            read_failures: DashMap::new(),
        }
    }

    pub fn bridge(&self) -> &HealthBridge {
        &self.bridge
    }

    /// Resolves an explicit id or falls back to the signed-in user
    async fn resolve_user(&self, explicit: Option<&str>) -> Option<UserId> {
        let raw = match explicit {
            Some(id) => Some(id.to_string()),
            None => self.identity.current_user_id().await,
        };
        raw.and_then(|id| UserId::new(id).ok())
    }

    // ========================================================================
    // Sync attempt
    // ========================================================================

    /// Runs one sync attempt; never fails, every outcome is a [`SyncResult`]
    #[tracing::instrument(
        skip_all,
        fields(
            attempt = %uuid::Uuid::new_v4(),
            source = %request.source,
            force = request.force,
        )
    )]
    pub async fn sync_snapshot_for_user(&self, request: SyncRequest) -> SyncResult {
        let today = Local::now().date_naive();

        // Step 1: user and connection
        let Some(user_id) = self.resolve_user(request.user_id.as_deref()).await else {
            debug!("No authenticated user, skipping health sync");
            return SyncResult::skipped(SyncReason::NotAuthenticated, today);
        };

        let platform = self.bridge.provider_details().platform;
        let connection = match self.store.get_connection(&user_id, platform).await {
            Ok(Some(connection)) if connection.is_connected() => connection,
            Ok(_) => {
                debug!(user_id = %user_id, "Health not connected, skipping sync");
                return SyncResult::skipped(SyncReason::HealthNotConnected, today);
            }
            Err(err) => return Self::lookup_failed(err, today),
        };

        // Step 2: recency gate, before any native call
        let now = Utc::now();
        if !request.force && connection.synced_within(self.config.min_interval(), now) {
            debug!(
                user_id = %user_id,
                last_synced_at = ?connection.last_synced_at(),
                "Synced recently, skipping"
            );
            return SyncResult::skipped(SyncReason::SyncedRecently, today);
        }

        // Step 3: availability
        let availability = self.bridge.check_availability().await;
        if let Some(reason) = availability.reason() {
            info!(user_id = %user_id, reason = %reason, "Health service not available");
            return SyncResult::skipped(SyncReason::HealthNotAvailable, today)
                .with_detail(reason.to_string());
        }

        // Step 4: concurrent reads
        let (steps, calories) = tokio::join!(
            self.bridge.read_today_steps(today),
            self.bridge.read_today_active_calories(today)
        );

        let Some(step_count) = steps.steps.filter(|_| steps.supported) else {
            let reason = steps.reason.unwrap_or_default();
            return self.record_read_failure(&user_id, today, reason);
        };
        self.read_failures.remove(&user_id);

        if !calories.supported {
            debug!(
                user_id = %user_id,
                reason = calories.reason.as_deref().unwrap_or_default(),
                "Active calories unsupported, syncing steps only"
            );
        }
        let active_calories = calories.active_calories.filter(|_| calories.supported);

        // Step 5: snapshot
        let snapshot = DailyMetricSnapshot::new(
            user_id.clone(),
            today,
            step_count,
            active_calories,
            request.source,
        );
        if let Err(err) = self.store.upsert_daily_metrics(&snapshot).await {
            let reason = if err.is_schema_unavailable() {
                SyncReason::DailyMetricsStorageUnavailable
            } else {
                SyncReason::DailyMetricsUpsertFailed
            };
            warn!(error = %err, reason = %reason, "Daily metrics upsert failed");
            return SyncResult::skipped(reason, today).with_detail(err.to_string());
        }

        // Step 6: connection state
        let observed = Capabilities {
            can_read_steps: true,
            can_read_active_calories: calories.supported,
            can_write_nutrition: false,
        };
        let result = SyncResult::synced(today, step_count, active_calories);
        let stamped = self
            .store
            .record_sync(&user_id, platform, today, now, observed)
            .await;
        let failure = match stamped {
            Ok(true) => None,
            Ok(false) => Some((
                SyncReason::ConnectionUpdateFailed,
                "connection row no longer exists".to_string(),
            )),
            Err(err) if err.is_schema_unavailable() => {
                Some((SyncReason::ConnectionsStorageUnavailable, err.to_string()))
            }
            Err(err) => Some((SyncReason::ConnectionUpdateFailed, err.to_string())),
        };
        if let Some((reason, detail)) = failure {
            warn!(reason = %reason, detail = %detail, "Snapshot written but connection update failed");
            return SyncResult {
                synced: false,
                reason,
                ..result
            }
            .with_detail(detail);
        }

        info!(
            user_id = %user_id,
            date = %today,
            steps = step_count,
            active_calories = ?active_calories,
            "Health snapshot synced"
        );
        result
    }

    fn lookup_failed(err: StoreError, today: NaiveDate) -> SyncResult {
        let reason = if err.is_schema_unavailable() {
            SyncReason::ConnectionsStorageUnavailable
        } else {
            SyncReason::ConnectionLookupFailed
        };
        warn!(error = %err, reason = %reason, "Health connection lookup failed");
        SyncResult::skipped(reason, today).with_detail(err.to_string())
    }

    /// Counts an unsupported steps read and escalates once the threshold is hit
    fn record_read_failure(&self, user_id: &UserId, today: NaiveDate, detail: String) -> SyncResult {
        let failures = {
            let mut entry = self.read_failures.entry(user_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let reason = if failures >= self.config.read_failure_threshold {
            SyncReason::HealthReadFailed
        } else {
            SyncReason::HealthDataUnavailable
        };
        warn!(
            user_id = %user_id,
            consecutive_failures = failures,
            reason = %reason,
            detail = %detail,
            "Steps read unsupported"
        );
        SyncResult::skipped(reason, today).with_detail(detail)
    }

    // ========================================================================
    // Connect / disconnect
    // ========================================================================

    /// Negotiates permissions and creates or reconnects the connection row
    #[tracing::instrument(skip(self))]
    pub async fn connect_user(
        &self,
        user_id: Option<String>,
        include_nutrition_write: bool,
    ) -> Result<HealthConnection, SyncError> {
        let user_id = self
            .resolve_user(user_id.as_deref())
            .await
            .ok_or(SyncError::NotAuthenticated)?;

        let outcome = self.bridge.request_permissions(include_nutrition_write).await;
        if !outcome.granted {
            let reason = outcome
                .reason
                .unwrap_or_else(|| "permission_denied".to_string());
            warn!(user_id = %user_id, reason = %reason, "Health connect refused");
            return Err(SyncError::PermissionNotGranted(reason));
        }

        let descriptor = self.bridge.provider_details();
        let connection = match self.store.get_connection(&user_id, descriptor.platform).await? {
            Some(mut existing) => {
                existing.reconnect(descriptor, outcome.capabilities);
                existing
            }
            None => HealthConnection::new(user_id.clone(), descriptor, outcome.capabilities),
        };
        self.store.upsert_connection(&connection).await?;

        info!(
            user_id = %user_id,
            provider = %descriptor.provider_id,
            capabilities = ?connection.capabilities(),
            "Health connected"
        );
        Ok(connection)
    }

    /// Marks the connection disconnected; the row is kept
    #[tracing::instrument(skip(self))]
    pub async fn disconnect_user(
        &self,
        user_id: Option<String>,
    ) -> Result<Option<HealthConnection>, SyncError> {
        let user_id = self
            .resolve_user(user_id.as_deref())
            .await
            .ok_or(SyncError::NotAuthenticated)?;

        let platform = self.bridge.provider_details().platform;
        let Some(mut connection) = self.store.get_connection(&user_id, platform).await? else {
            return Ok(None);
        };
        connection.disconnect();
        self.store.upsert_connection(&connection).await?;
        self.read_failures.remove(&user_id);

        info!(user_id = %user_id, "Health disconnected");
        Ok(Some(connection))
    }
}
