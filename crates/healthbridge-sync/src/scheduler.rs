//! In-process periodic task scheduler
//!
//! [`TokioTaskScheduler`] implements the `ITaskScheduler` port for hosts
//! that have no OS-level background task facility (desktop daemons, tests).
//! Each registered task gets its own tokio task that fires the handler on a
//! fixed interval until it is unregistered or the scheduler shuts down.
//!
//! ## Flow
//!
//! ```text
//! define_task ──→ handlers
//! register_periodic_task ──→ spawn loop ──→ interval.tick() ──→ handler()
//!                                  │
//!                          CancellationToken (per task, child of shutdown)
//! ```

use std::time::Duration;

use anyhow::bail;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use healthbridge_core::ports::{ITaskScheduler, TaskHandler, TaskOptions, TaskOutcome};

/// A registered task's loop
struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs periodic tasks on the current tokio runtime
pub struct TokioTaskScheduler {
    handlers: DashMap<String, TaskHandler>,
    running: DashMap<String, RunningTask>,
    shutdown: CancellationToken,
}

impl Default for TokioTaskScheduler {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl TokioTaskScheduler {
    /// Creates a scheduler whose loops stop when `shutdown` is cancelled
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            handlers: DashMap::new(),
            running: DashMap::new(),
            shutdown,
        }
    }

    /// Fires a defined task once, outside its schedule
    pub async fn run_now(&self, name: &str) -> Option<TaskOutcome> {
        let handler = self.handlers.get(name).map(|h| h.value().clone())?;
        Some(handler().await)
    }

    /// Stops every task loop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for entry in self.running.iter() {
            entry.value().handle.abort();
        }
        self.running.clear();
    }
}

async fn task_loop(name: String, handler: TaskHandler, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(task = %name, "Task loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                let outcome = handler().await;
                debug!(task = %name, outcome = ?outcome, "Periodic task fired");
            }
        }
    }
}

#[async_trait::async_trait]
impl ITaskScheduler for TokioTaskScheduler {
    fn define_task(&self, name: &str, handler: TaskHandler) {
        debug!(task = %name, "Task defined");
        self.handlers.insert(name.to_string(), handler);
    }

    async fn is_task_registered(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.running.contains_key(name))
    }

    async fn register_periodic_task(
        &self,
        name: &str,
        min_interval_secs: u64,
        options: TaskOptions,
    ) -> anyhow::Result<()> {
        let Some(handler) = self.handlers.get(name).map(|h| h.value().clone()) else {
            bail!("task '{}' must be defined before it is registered", name);
        };
        if min_interval_secs == 0 {
            bail!("task '{}' needs a non-zero interval", name);
        }
        if self.shutdown.is_cancelled() {
            bail!("scheduler is shut down");
        }

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(task_loop(
            name.to_string(),
            handler,
            Duration::from_secs(min_interval_secs),
            token.clone(),
        ));

        if let Some(previous) = self
            .running
            .insert(name.to_string(), RunningTask { token, handle })
        {
            warn!(task = %name, "Task re-registered, replacing previous schedule");
            previous.token.cancel();
        }

        info!(
            task = %name,
            interval_secs = min_interval_secs,
            start_on_boot = options.start_on_boot,
            stop_on_terminate = options.stop_on_terminate,
            "Periodic task registered"
        );
        Ok(())
    }

    async fn unregister_task(&self, name: &str) -> anyhow::Result<()> {
        if let Some((_, task)) = self.running.remove(name) {
            task.token.cancel();
            info!(task = %name, "Periodic task unregistered");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use healthbridge_core::ports::TaskFuture;

    use super::*;

    fn counting_handler(counter: Arc<AtomicUsize>) -> TaskHandler {
        Arc::new(move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TaskOutcome::NoData
            })
        })
    }

    #[tokio::test]
    async fn test_register_requires_definition() {
        let scheduler = TokioTaskScheduler::default();
        let err = scheduler
            .register_periodic_task("missing", 900, TaskOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be defined"));
        assert!(!scheduler.is_task_registered("missing").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_fires_on_interval_until_unregistered() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioTaskScheduler::default();
        scheduler.define_task("sync", counting_handler(Arc::clone(&counter)));
        scheduler
            .register_periodic_task("sync", 900, TaskOptions::default())
            .await
            .unwrap();
        assert!(scheduler.is_task_registered("sync").await.unwrap());

        // Nothing fires before the first interval elapses
        tokio::time::sleep(Duration::from_secs(899)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(902)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        scheduler.unregister_task("sync").await.unwrap();
        assert!(!scheduler.is_task_registered("sync").await.unwrap());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_now_invokes_handler_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let scheduler = TokioTaskScheduler::default();
        scheduler.define_task("sync", counting_handler(Arc::clone(&counter)));

        assert_eq!(scheduler.run_now("sync").await, Some(TaskOutcome::NoData));
        assert_eq!(scheduler.run_now("other").await, None);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_registrations() {
        let scheduler = TokioTaskScheduler::default();
        scheduler.define_task("sync", counting_handler(Arc::new(AtomicUsize::new(0))));
        scheduler.shutdown();

        assert!(scheduler
            .register_periodic_task("sync", 900, TaskOptions::default())
            .await
            .is_err());
    }
}
