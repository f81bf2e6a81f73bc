//! Local periodic task scheduler port (driven/secondary port)
//!
//! Abstracts the host's background-task facility. The host decides when a
//! registered task actually fires; the handler reports whether it produced
//! new data so the host can tune its own cadence.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use crate::domain::TaskOutcome;

/// Future returned by a task handler
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;

/// Handler invoked each time a task fires
pub type TaskHandler = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Registration options passed through to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOptions {
    /// Stop firing when the app is terminated by the user
    pub stop_on_terminate: bool,
    /// Resume firing after a device reboot
    pub start_on_boot: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            stop_on_terminate: false,
            start_on_boot: true,
        }
    }
}

/// Port trait for the host's periodic task facility
#[async_trait::async_trait]
pub trait ITaskScheduler: Send + Sync {
    /// Associates a handler with a task name; must precede registration
    fn define_task(&self, name: &str, handler: TaskHandler);

    /// Returns true if the named task is registered for periodic execution
    async fn is_task_registered(&self, name: &str) -> anyhow::Result<bool>;

    /// Registers a defined task to fire no more often than `min_interval_secs`
    async fn register_periodic_task(
        &self,
        name: &str,
        min_interval_secs: u64,
        options: TaskOptions,
    ) -> anyhow::Result<()>;

    /// Stops periodic execution of the named task
    async fn unregister_task(&self, name: &str) -> anyhow::Result<()>;
}
