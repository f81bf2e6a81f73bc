//! Deadline-bounded invocation of native calls
//!
//! Every call into a native health library goes through [`TimeoutInvoker`].
//! A hung library can therefore delay an operation by at most its budget.
//!
//! ## Cancellation
//!
//! There is no explicit cancel path. When the deadline expires the call's
//! future is dropped; whatever the native side does afterwards is ignored.

use std::future::Future;
use std::time::Duration;

use healthbridge_core::config::TimeoutConfig;
use thiserror::Error;
use tracing::warn;

/// Failure of an invoked call
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The call did not settle within its budget
    #[error("{0}")]
    Timeout(&'static str),

    /// The call settled with its own error
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::Timeout(_))
    }
}

/// Operation classes with distinct budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Availability,
    Permission,
    Read,
    Write,
}

impl OperationClass {
    /// Reason code reported when this class of call times out
    pub fn timeout_reason(&self) -> &'static str {
        match self {
            OperationClass::Availability => "health_availability_timeout",
            OperationClass::Permission => "health_permission_timeout",
            OperationClass::Read => "health_read_timeout",
            OperationClass::Write => "health_write_timeout",
        }
    }
}

/// Wraps native calls with per-class deadlines
#[derive(Debug, Clone)]
pub struct TimeoutInvoker {
    budgets: TimeoutConfig,
}

impl TimeoutInvoker {
    pub fn new(budgets: TimeoutConfig) -> Self {
        Self { budgets }
    }

    /// Budget for an operation class
    pub fn budget(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::Availability => self.budgets.availability(),
            OperationClass::Permission => self.budgets.permission(),
            OperationClass::Read => self.budgets.read(),
            OperationClass::Write => self.budgets.write(),
        }
    }

    /// Runs `call` and fails with [`InvokeError::Timeout`] if it outlives `budget`
    pub async fn invoke<F, T>(
        &self,
        call: F,
        budget: Duration,
        timeout_reason: &'static str,
    ) -> Result<T, InvokeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(budget, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(InvokeError::Failed(err)),
            Err(_elapsed) => {
                warn!(
                    budget_ms = budget.as_millis() as u64,
                    reason = timeout_reason,
                    "Native call timed out, abandoning it"
                );
                Err(InvokeError::Timeout(timeout_reason))
            }
        }
    }

    /// Runs `call` with the budget and timeout reason of `class`
    pub async fn run<F, T>(&self, class: OperationClass, call: F) -> Result<T, InvokeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.invoke(call, self.budget(class), class.timeout_reason())
            .await
    }
}
