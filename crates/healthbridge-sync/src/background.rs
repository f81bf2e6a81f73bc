//! Background task registration
//!
//! The periodic task handler is defined with the host scheduler as soon as
//! [`BackgroundSync`] is constructed; registration for periodic execution is
//! a separate, idempotent step.
//!
//! The handler is the only place a panic from the sync path can surface. It
//! runs each attempt on its own tokio task so a panic becomes a
//! [`TaskOutcome::Failed`] instead of unwinding into the host.

use std::sync::Arc;

use tracing::{debug, error, info};

use healthbridge_core::config::{SyncConfig, MIN_SYNC_INTERVAL_SECS};
use healthbridge_core::ports::{ITaskScheduler, TaskFuture, TaskHandler, TaskOptions, TaskOutcome};

use crate::orchestrator::{SyncOrchestrator, SyncRequest};
use crate::SyncError;

/// Owns the periodic health sync task
pub struct BackgroundSync {
    scheduler: Arc<dyn ITaskScheduler>,
    task_name: String,
    min_interval_secs: u64,
}

impl BackgroundSync {
    /// Defines the task handler with `scheduler`
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        scheduler: Arc<dyn ITaskScheduler>,
        config: &SyncConfig,
    ) -> Self {
        scheduler.define_task(&config.task_name, task_handler(orchestrator));
        Self {
            scheduler,
            task_name: config.task_name.clone(),
            min_interval_secs: config.min_interval_secs,
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Interval passed to the host, never below the platform floor
    pub fn registration_interval_secs(&self) -> u64 {
        self.min_interval_secs.max(MIN_SYNC_INTERVAL_SECS)
    }

    /// Registers the periodic task unless it already is
    ///
    /// Returns `true` when a new registration was made.
    pub async fn register_background_task(&self) -> Result<bool, SyncError> {
        if self
            .scheduler
            .is_task_registered(&self.task_name)
            .await
            .map_err(SyncError::Scheduler)?
        {
            debug!(task = %self.task_name, "Background health sync already registered");
            return Ok(false);
        }

        let interval = self.registration_interval_secs();
        self.scheduler
            .register_periodic_task(&self.task_name, interval, TaskOptions::default())
            .await
            .map_err(SyncError::Scheduler)?;

        info!(task = %self.task_name, interval_secs = interval, "Registered background health sync");
        Ok(true)
    }

    /// Unregisters the periodic task if it is registered
    ///
    /// Returns `true` when a registration was removed.
    pub async fn unregister_background_task(&self) -> Result<bool, SyncError> {
        if !self
            .scheduler
            .is_task_registered(&self.task_name)
            .await
            .map_err(SyncError::Scheduler)?
        {
            return Ok(false);
        }

        self.scheduler
            .unregister_task(&self.task_name)
            .await
            .map_err(SyncError::Scheduler)?;

        info!(task = %self.task_name, "Unregistered background health sync");
        Ok(true)
    }
}

/// Builds the handler the host invokes each time the task fires
pub fn task_handler(orchestrator: Arc<SyncOrchestrator>) -> TaskHandler {
    Arc::new(move || -> TaskFuture {
        let orchestrator = Arc::clone(&orchestrator);
        Box::pin(run_background_attempt(orchestrator))
    })
}

/// Runs one background attempt and maps it onto the scheduler's tri-state
pub async fn run_background_attempt(orchestrator: Arc<SyncOrchestrator>) -> TaskOutcome {
    let attempt = tokio::spawn(async move {
        orchestrator
            .sync_snapshot_for_user(SyncRequest::background())
            .await
    });

    match attempt.await {
        Ok(result) => {
            let outcome = result.task_outcome();
            debug!(
                reason = %result.reason,
                detail = result.detail.as_deref().unwrap_or_default(),
                outcome = ?outcome,
                "Background health sync finished"
            );
            outcome
        }
        Err(join_error) if join_error.is_panic() => {
            error!(error = %join_error, "Background health sync panicked");
            TaskOutcome::Failed
        }
        Err(join_error) => {
            error!(error = %join_error, "Background health sync was cancelled");
            TaskOutcome::Failed
        }
    }
}
