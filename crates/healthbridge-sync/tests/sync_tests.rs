//! Integration tests: SyncOrchestrator → HealthBridge → SQLite
//!
//! A fake generic health module stands in for the native library; the
//! metrics store is a real in-memory SQLite database wrapped in a counter.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde_json::{json, Value};

use healthbridge_bridge::{BindingResolver, HealthBridge};
use healthbridge_cache::{DatabasePool, SqliteMetricsStore};
use healthbridge_core::config::{SyncConfig, TimeoutConfig};
use healthbridge_core::domain::{
    Capabilities, DailyMetricSnapshot, HealthConnection, Platform, SyncReason, UserId,
};
use healthbridge_core::ports::{
    GenericDataType, IGenericHealthModule, IHealthConnectModule, IHealthKitModule,
    IIdentityProvider, IMetricsStore, INativeModuleLoader, ITaskScheduler, ModuleMissing,
    NutritionSample, StoreError, TaskOutcome,
};
use healthbridge_sync::background::run_background_attempt;
use healthbridge_sync::{BackgroundSync, SyncError, SyncOrchestrator, SyncRequest, TokioTaskScheduler};

// ============================================================================
// Fakes
// ============================================================================

struct FakeModule {
    available: AtomicBool,
    grant: AtomicBool,
    fail_steps: AtomicBool,
    fail_calories: AtomicBool,
    steps: Vec<Value>,
    calories: Vec<Value>,
    availability_calls: AtomicUsize,
    query_delay_ms: AtomicU64,
}

impl FakeModule {
    /// 4500 steps and 250 kcal spread over a few samples
    fn healthy() -> Self {
        Self {
            available: AtomicBool::new(true),
            grant: AtomicBool::new(true),
            fail_steps: AtomicBool::new(false),
            fail_calories: AtomicBool::new(false),
            steps: vec![json!({"value": 3000}), json!({"count": 1500})],
            calories: vec![
                json!({"value": 150, "unit": "kcal"}),
                json!({"value": 418400, "unit": "J"}),
            ],
            availability_calls: AtomicUsize::new(0),
            query_delay_ms: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl IGenericHealthModule for FakeModule {
    async fn is_available(&self) -> anyhow::Result<bool> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn request_permissions(
        &self,
        _read: &[GenericDataType],
        _write: &[GenericDataType],
    ) -> anyhow::Result<bool> {
        Ok(self.grant.load(Ordering::SeqCst))
    }

    async fn query(
        &self,
        data_type: GenericDataType,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Value>> {
        let delay = self.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        match data_type {
            GenericDataType::Steps if self.fail_steps.load(Ordering::SeqCst) => {
                anyhow::bail!("steps query rejected")
            }
            GenericDataType::ActiveEnergyBurned if self.fail_calories.load(Ordering::SeqCst) => {
                anyhow::bail!("energy query rejected")
            }
            GenericDataType::Steps => Ok(self.steps.clone()),
            GenericDataType::ActiveEnergyBurned => Ok(self.calories.clone()),
            GenericDataType::Nutrition => Ok(Vec::new()),
        }
    }

    async fn write_nutrition(&self, _samples: &[NutritionSample]) -> anyhow::Result<()> {
        Ok(())
    }
}

struct GenericOnlyLoader(Arc<FakeModule>);

impl INativeModuleLoader for GenericOnlyLoader {
    fn load_healthkit(&self) -> Result<Arc<dyn IHealthKitModule>, ModuleMissing> {
        Err(ModuleMissing::new("healthkit", "not linked"))
    }

    fn load_health_connect(&self) -> Result<Arc<dyn IHealthConnectModule>, ModuleMissing> {
        Err(ModuleMissing::new("health_connect", "not linked"))
    }

    fn load_generic(&self) -> Result<Arc<dyn IGenericHealthModule>, ModuleMissing> {
        Ok(Arc::clone(&self.0) as Arc<dyn IGenericHealthModule>)
    }
}

struct FixedIdentity(Option<String>);

#[async_trait::async_trait]
impl IIdentityProvider for FixedIdentity {
    async fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Delegates to SQLite and counts writes
struct CountingStore {
    inner: SqliteMetricsStore,
    snapshot_upserts: AtomicUsize,
    connection_upserts: AtomicUsize,
}

#[async_trait::async_trait]
impl IMetricsStore for CountingStore {
    async fn upsert_daily_metrics(&self, snapshot: &DailyMetricSnapshot) -> Result<(), StoreError> {
        self.snapshot_upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_daily_metrics(snapshot).await
    }

    async fn upsert_connection(&self, connection: &HealthConnection) -> Result<(), StoreError> {
        self.connection_upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_connection(connection).await
    }

    async fn get_connection(
        &self,
        user_id: &UserId,
        platform: Platform,
    ) -> Result<Option<HealthConnection>, StoreError> {
        self.inner.get_connection(user_id, platform).await
    }

    async fn record_sync(
        &self,
        user_id: &UserId,
        platform: Platform,
        date: NaiveDate,
        at: DateTime<Utc>,
        observed: Capabilities,
    ) -> Result<bool, StoreError> {
        self.inner
            .record_sync(user_id, platform, date, at, observed)
            .await
    }
}

/// A store whose lookup panics, to exercise the task boundary
struct PanickingStore;

#[async_trait::async_trait]
impl IMetricsStore for PanickingStore {
    async fn upsert_daily_metrics(&self, _snapshot: &DailyMetricSnapshot) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_connection(&self, _connection: &HealthConnection) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_connection(
        &self,
        _user_id: &UserId,
        _platform: Platform,
    ) -> Result<Option<HealthConnection>, StoreError> {
        panic!("store exploded");
    }

    async fn record_sync(
        &self,
        _user_id: &UserId,
        _platform: Platform,
        _date: NaiveDate,
        _at: DateTime<Utc>,
        _observed: Capabilities,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }
}

// ============================================================================
// Harness
// ============================================================================

const USER: &str = "user-1";

struct Harness {
    pool: DatabasePool,
    store: Arc<CountingStore>,
    module: Arc<FakeModule>,
    orchestrator: Arc<SyncOrchestrator>,
}

fn bridge_for(module: &Arc<FakeModule>) -> Arc<HealthBridge> {
    let loader = Arc::new(GenericOnlyLoader(Arc::clone(module)));
    let resolver = Arc::new(BindingResolver::new(Platform::Other, loader));
    Arc::new(HealthBridge::new(resolver, TimeoutConfig::default()))
}

async fn harness(module: FakeModule, signed_in: Option<&str>) -> Harness {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(CountingStore {
        inner: SqliteMetricsStore::new(pool.pool().clone()),
        snapshot_upserts: AtomicUsize::new(0),
        connection_upserts: AtomicUsize::new(0),
    });
    let module = Arc::new(module);
    let orchestrator = Arc::new(SyncOrchestrator::new(
        bridge_for(&module),
        Arc::clone(&store) as Arc<dyn IMetricsStore>,
        Arc::new(FixedIdentity(signed_in.map(str::to_string))),
        SyncConfig::default(),
    ));
    Harness {
        pool,
        store,
        module,
        orchestrator,
    }
}

impl Harness {
    async fn connect(&self) -> HealthConnection {
        self.orchestrator
            .connect_user(Some(USER.to_string()), true)
            .await
            .expect("connect succeeds")
    }

    async fn sync(&self, force: bool) -> healthbridge_core::domain::SyncResult {
        let request = SyncRequest::foreground(USER);
        let request = if force { request.forced() } else { request };
        self.orchestrator.sync_snapshot_for_user(request).await
    }

    fn sqlite(&self) -> SqliteMetricsStore {
        SqliteMetricsStore::new(self.pool.pool().clone())
    }

    async fn drop_table(&self, table: &str) {
        sqlx::raw_sql(&format!("DROP TABLE {table}"))
            .execute(self.pool.pool())
            .await
            .unwrap();
    }
}

fn user() -> UserId {
    UserId::new(USER).unwrap()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_fresh_user_grant_and_sync_creates_both_rows() {
    let h = harness(FakeModule::healthy(), None).await;

    let connection = h.connect().await;
    assert!(connection.is_connected());
    assert!(connection.capabilities().can_write_nutrition);

    let result = h.sync(false).await;
    assert!(result.synced);
    assert_eq!(result.reason, SyncReason::Synced);
    assert_eq!(result.steps, Some(4500));
    assert_eq!(result.active_calories, Some(250.0));
    assert_eq!(result.task_outcome(), TaskOutcome::NewData);

    let sqlite = h.sqlite();
    let snapshot = sqlite
        .get_daily_metrics(&user(), today())
        .await
        .unwrap()
        .expect("snapshot row");
    assert_eq!(snapshot.steps, 4500);
    assert_eq!(snapshot.active_calories, Some(250.0));

    let stored = sqlite
        .get_connection(&user(), Platform::Other)
        .await
        .unwrap()
        .expect("connection row");
    assert_eq!(stored.last_synced_date(), Some(today()));
    assert!(stored.last_synced_at().is_some());
    assert!(stored.capabilities().can_read_active_calories);
}

#[tokio::test]
async fn test_second_unforced_sync_is_synced_recently() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;

    assert!(h.sync(false).await.synced);
    let availability_calls = h.module.availability_calls.load(Ordering::SeqCst);

    let second = h.sync(false).await;
    assert!(!second.synced);
    assert_eq!(second.reason, SyncReason::SyncedRecently);
    assert_eq!(second.task_outcome(), TaskOutcome::NoData);
    assert_eq!(h.store.snapshot_upserts.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.module.availability_calls.load(Ordering::SeqCst),
        availability_calls
    );

    // Forcing bypasses the gate
    assert!(h.sync(true).await.synced);
    assert_eq!(h.store.snapshot_upserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disconnected_user_skips_without_availability_check() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    let disconnected = h
        .orchestrator
        .disconnect_user(Some(USER.to_string()))
        .await
        .unwrap()
        .expect("row exists");
    assert!(!disconnected.is_connected());

    let calls_before = h.module.availability_calls.load(Ordering::SeqCst);
    let result = h.sync(false).await;

    assert_eq!(result.reason, SyncReason::HealthNotConnected);
    assert_eq!(h.module.availability_calls.load(Ordering::SeqCst), calls_before);
    assert_eq!(h.store.snapshot_upserts.load(Ordering::SeqCst), 0);

    // The row is kept, only marked disconnected
    let stored = h
        .sqlite()
        .get_connection(&user(), Platform::Other)
        .await
        .unwrap();
    assert!(stored.is_some_and(|c| !c.is_connected()));
}

#[tokio::test]
async fn test_missing_metrics_table_maps_to_no_data() {
    let h = harness(FakeModule::healthy(), Some(USER)).await;
    h.connect().await;
    h.drop_table("health_daily_metrics").await;

    let result = h.sync(false).await;
    assert_eq!(result.reason, SyncReason::DailyMetricsStorageUnavailable);
    assert!(!result.synced);

    let outcome = run_background_attempt(Arc::clone(&h.orchestrator)).await;
    assert_eq!(outcome, TaskOutcome::NoData);
}

// ============================================================================
// Short circuits
// ============================================================================

#[tokio::test]
async fn test_no_user_is_not_authenticated() {
    let h = harness(FakeModule::healthy(), None).await;

    let result = h
        .orchestrator
        .sync_snapshot_for_user(SyncRequest::background())
        .await;
    assert_eq!(result.reason, SyncReason::NotAuthenticated);
    assert_eq!(result.task_outcome(), TaskOutcome::NoData);

    let blank = h
        .orchestrator
        .sync_snapshot_for_user(SyncRequest::foreground("   "))
        .await;
    assert_eq!(blank.reason, SyncReason::NotAuthenticated);
}

#[tokio::test]
async fn test_identity_provider_supplies_background_user() {
    let h = harness(FakeModule::healthy(), Some(USER)).await;
    h.connect().await;

    let outcome = run_background_attempt(Arc::clone(&h.orchestrator)).await;
    assert_eq!(outcome, TaskOutcome::NewData);
}

#[tokio::test]
async fn test_never_connected_user_is_not_connected() {
    let h = harness(FakeModule::healthy(), None).await;

    let result = h.sync(false).await;
    assert_eq!(result.reason, SyncReason::HealthNotConnected);
    assert_eq!(h.module.availability_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_connections_table_is_soft_failure() {
    let h = harness(FakeModule::healthy(), None).await;
    h.drop_table("health_connections").await;

    let result = h.sync(false).await;
    assert_eq!(result.reason, SyncReason::ConnectionsStorageUnavailable);
    assert_eq!(result.task_outcome(), TaskOutcome::NoData);
}

#[tokio::test]
async fn test_unavailable_service_reports_platform_reason() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    h.module.available.store(false, Ordering::SeqCst);

    let result = h.sync(false).await;
    assert_eq!(result.reason, SyncReason::HealthNotAvailable);
    assert_eq!(result.detail.as_deref(), Some("health_data_not_supported"));
    assert_eq!(h.store.snapshot_upserts.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Read failures
// ============================================================================

#[tokio::test]
async fn test_repeated_steps_failures_escalate() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    h.module.fail_steps.store(true, Ordering::SeqCst);

    let first = h.sync(false).await;
    assert_eq!(first.reason, SyncReason::HealthDataUnavailable);
    assert_eq!(first.detail.as_deref(), Some("steps query rejected"));
    assert_eq!(first.task_outcome(), TaskOutcome::NoData);

    assert_eq!(h.sync(false).await.reason, SyncReason::HealthDataUnavailable);

    let third = h.sync(false).await;
    assert_eq!(third.reason, SyncReason::HealthReadFailed);
    assert_eq!(third.task_outcome(), TaskOutcome::Failed);
    assert_eq!(h.store.snapshot_upserts.load(Ordering::SeqCst), 0);

    // A good read resets the streak
    h.module.fail_steps.store(false, Ordering::SeqCst);
    assert!(h.sync(false).await.synced);
    h.module.fail_steps.store(true, Ordering::SeqCst);
    assert_eq!(h.sync(true).await.reason, SyncReason::HealthDataUnavailable);
}

#[tokio::test]
async fn test_calories_failure_still_syncs_steps() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    h.module.fail_calories.store(true, Ordering::SeqCst);

    let result = h.sync(false).await;
    assert!(result.synced);
    assert_eq!(result.steps, Some(4500));
    assert_eq!(result.active_calories, None);

    let snapshot = h
        .sqlite()
        .get_daily_metrics(&user(), today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.active_calories, None);
}

// ============================================================================
// Connect / disconnect
// ============================================================================

#[tokio::test]
async fn test_connect_refused_creates_no_row() {
    let h = harness(FakeModule::healthy(), None).await;
    h.module.grant.store(false, Ordering::SeqCst);

    let err = h
        .orchestrator
        .connect_user(Some(USER.to_string()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::PermissionNotGranted(ref reason) if reason == "permission_denied"));
    assert_eq!(h.store.connection_upserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reconnect_keeps_sync_history() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    assert!(h.sync(false).await.synced);
    h.orchestrator
        .disconnect_user(Some(USER.to_string()))
        .await
        .unwrap();

    let reconnected = h.connect().await;
    assert!(reconnected.is_connected());
    assert_eq!(reconnected.last_synced_date(), Some(today()));
}

#[tokio::test]
async fn test_disconnect_during_sync_is_kept() {
    let h = harness(FakeModule::healthy(), None).await;
    h.connect().await;
    h.module.query_delay_ms.store(300, Ordering::SeqCst);

    let orchestrator = Arc::clone(&h.orchestrator);
    let attempt = tokio::spawn(async move {
        orchestrator
            .sync_snapshot_for_user(SyncRequest::foreground(USER))
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator
        .disconnect_user(Some(USER.to_string()))
        .await
        .unwrap();

    let result = attempt.await.unwrap();
    assert_eq!(result.reason, SyncReason::Synced);

    let stored = h
        .sqlite()
        .get_connection(&user(), Platform::Other)
        .await
        .unwrap()
        .expect("connection row");
    assert!(!stored.is_connected());
    assert_eq!(stored.last_synced_date(), Some(today()));
}

#[tokio::test]
async fn test_capabilities_granted_during_sync_are_kept() {
    let h = harness(FakeModule::healthy(), None).await;
    let first = h
        .orchestrator
        .connect_user(Some(USER.to_string()), false)
        .await
        .unwrap();
    assert!(!first.capabilities().can_write_nutrition);
    h.module.query_delay_ms.store(300, Ordering::SeqCst);

    let orchestrator = Arc::clone(&h.orchestrator);
    let attempt = tokio::spawn(async move {
        orchestrator
            .sync_snapshot_for_user(SyncRequest::foreground(USER))
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.connect().await;

    assert!(attempt.await.unwrap().synced);

    let stored = h
        .sqlite()
        .get_connection(&user(), Platform::Other)
        .await
        .unwrap()
        .expect("connection row");
    assert!(stored.is_connected());
    assert!(stored.capabilities().can_write_nutrition);
    assert!(stored.last_synced_at().is_some());
}

#[tokio::test]
async fn test_disconnect_unknown_user_is_noop() {
    let h = harness(FakeModule::healthy(), None).await;
    let result = h
        .orchestrator
        .disconnect_user(Some("nobody".to_string()))
        .await
        .unwrap();
    assert!(result.is_none());
}

// ============================================================================
// Background task
// ============================================================================

#[tokio::test]
async fn test_panic_in_sync_maps_to_failed() {
    let module = Arc::new(FakeModule::healthy());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        bridge_for(&module),
        Arc::new(PanickingStore),
        Arc::new(FixedIdentity(Some(USER.to_string()))),
        SyncConfig::default(),
    ));

    let outcome = run_background_attempt(orchestrator).await;
    assert_eq!(outcome, TaskOutcome::Failed);
}

#[tokio::test]
async fn test_background_registration_is_idempotent_and_clamped() {
    let h = harness(FakeModule::healthy(), Some(USER)).await;
    let scheduler = Arc::new(TokioTaskScheduler::default());
    let config = SyncConfig {
        min_interval_secs: 60,
        ..SyncConfig::default()
    };
    let background = BackgroundSync::new(
        Arc::clone(&h.orchestrator),
        Arc::clone(&scheduler) as Arc<dyn ITaskScheduler>,
        &config,
    );

    assert_eq!(background.registration_interval_secs(), 900);
    assert!(background.register_background_task().await.unwrap());
    assert!(!background.register_background_task().await.unwrap());
    assert!(scheduler
        .is_task_registered(background.task_name())
        .await
        .unwrap());

    // The defined handler runs the real sync path
    h.connect().await;
    assert_eq!(
        scheduler.run_now(background.task_name()).await,
        Some(TaskOutcome::NewData)
    );

    assert!(background.unregister_background_task().await.unwrap());
    assert!(!background.unregister_background_task().await.unwrap());
    scheduler.shutdown();
}
