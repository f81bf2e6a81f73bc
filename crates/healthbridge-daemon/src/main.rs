//! Healthbridge Daemon - Background health sync service
//!
//! This binary runs as a user service and handles:
//! - Resolving the health library (a JSON export on desktop hosts)
//! - Connecting the configured user on first run
//! - Periodic daily snapshot sync into the local metrics store
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon wires the bridge, store and orchestrator together, registers
//! the periodic task with an in-process scheduler and then waits. Every
//! task loop hangs off one `CancellationToken` that is triggered on receipt
//! of SIGTERM or SIGINT.

mod export;
mod identity;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use healthbridge_bridge::{BindingResolver, HealthBridge};
use healthbridge_cache::{DatabasePool, SqliteMetricsStore};
use healthbridge_core::config::Config;
use healthbridge_core::domain::UserId;
use healthbridge_core::ports::{IIdentityProvider, IMetricsStore, ITaskScheduler};
use healthbridge_sync::{BackgroundSync, SyncError, SyncOrchestrator, TokioTaskScheduler};

use crate::export::{ExportFileModule, ExportModuleLoader};
use crate::identity::ConfiguredIdentity;

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the wired components for the lifetime of the process
struct DaemonService {
    config: Config,
    store: Arc<SqliteMetricsStore>,
    orchestrator: Arc<SyncOrchestrator>,
    scheduler: Arc<TokioTaskScheduler>,
    background: BackgroundSync,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and builds the sync stack
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = &config.storage.database_path;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db_pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteMetricsStore::new(db_pool.pool().clone()));

        let module = Arc::new(ExportFileModule::new(config.export.path.clone()));
        info!(export = %module.path().display(), "Using health export");
        let loader = Arc::new(ExportModuleLoader::new(module));
        let resolver = Arc::new(BindingResolver::new(config.resolve_platform(), loader));
        let bridge = Arc::new(HealthBridge::new(resolver, config.timeouts.clone()));

        let identity: Arc<dyn IIdentityProvider> =
            Arc::new(ConfiguredIdentity::new(config.sync.user_id.clone()));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            bridge,
            Arc::clone(&store) as Arc<dyn IMetricsStore>,
            identity,
            config.sync.clone(),
        ));

        let scheduler = Arc::new(TokioTaskScheduler::new(shutdown.child_token()));
        let background = BackgroundSync::new(
            Arc::clone(&orchestrator),
            Arc::clone(&scheduler) as Arc<dyn ITaskScheduler>,
            &config.sync,
        );

        Ok(Self {
            config,
            store,
            orchestrator,
            scheduler,
            background,
            shutdown,
        })
    }

    /// Runs until the shutdown token fires
    ///
    /// 1. Connects the configured user if no connection row exists yet
    /// 2. Runs one sync immediately
    /// 3. Registers the periodic task and waits for shutdown
    async fn run(&self) -> Result<()> {
        let bridge = self.orchestrator.bridge();
        let provider = bridge.provider_details();
        info!(
            platform = %provider.platform,
            provider = %provider.provider_id,
            installed = bridge.is_bridge_installed(),
            "Health provider resolved"
        );

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                info!("Shutdown signal received during startup");
                self.scheduler.shutdown();
                return Ok(());
            }
            started = self.start() => started?,
        }

        self.shutdown.cancelled().await;
        info!("Shutdown signal received");

        self.scheduler.shutdown();
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.ensure_connected().await?;

        if let Some(outcome) = self.scheduler.run_now(self.background.task_name()).await {
            info!(outcome = ?outcome, "Initial health sync finished");
        }

        self.background
            .register_background_task()
            .await
            .context("Failed to register background health sync")?;
        Ok(())
    }

    /// Connects the configured user on first run
    ///
    /// An existing row is left alone, so a user who disconnected stays
    /// disconnected across restarts.
    async fn ensure_connected(&self) -> Result<()> {
        let Some(user_id) = self.config.sync.user_id.as_deref() else {
            warn!("No sync.user_id configured, background sync will report not_authenticated");
            return Ok(());
        };
        let Ok(user) = UserId::new(user_id) else {
            warn!("Configured sync.user_id is blank");
            return Ok(());
        };

        let platform = self.orchestrator.bridge().provider_details().platform;
        if self
            .store
            .get_connection(&user, platform)
            .await
            .context("Failed to query health connection")?
            .is_some()
        {
            return Ok(());
        }

        match self.orchestrator.connect_user(None, true).await {
            Ok(connection) => {
                info!(capabilities = ?connection.capabilities(), "Connected health for configured user");
                Ok(())
            }
            Err(SyncError::PermissionNotGranted(reason)) => {
                warn!(reason = %reason, "Health permissions not granted, sync stays idle");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to connect health"),
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
///
/// A signal handler that cannot be installed is logged and treated as
/// never firing.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// `RUST_LOG` wins over the configured level
fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

/// Loads the configuration and rejects invalid settings
fn load_config() -> Result<Config> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!(
            "Invalid configuration at {}: {}",
            config_path.display(),
            details.join("; ")
        );
    }
    Ok(config)
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config))
        .with_target(true)
        .init();

    info!(config_path = %Config::default_path().display(), "Healthbridge daemon starting (healthbridged)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("Healthbridge daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Healthbridge daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
