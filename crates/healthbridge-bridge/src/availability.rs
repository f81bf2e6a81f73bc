//! Availability checking
//!
//! Decides whether the platform health service can be used right now. The
//! check never fails: every error path becomes
//! [`Availability::Unavailable`] with a stable reason.

use std::sync::Arc;

use healthbridge_core::ports::NativeCallError;
use tracing::{debug, warn};

use crate::binding::{Availability, UnavailableReason};
use crate::invoker::{InvokeError, OperationClass, TimeoutInvoker};
use crate::resolver::BindingResolver;

/// Runs availability probes against the active binding
#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    resolver: Arc<BindingResolver>,
    invoker: TimeoutInvoker,
}

impl AvailabilityChecker {
    pub fn new(resolver: Arc<BindingResolver>, invoker: TimeoutInvoker) -> Self {
        Self { resolver, invoker }
    }

    pub async fn check(&self) -> Availability {
        let Some(binding) = self.resolver.active() else {
            return Availability::Unavailable(UnavailableReason::ModuleMissing);
        };

        let availability = match self
            .invoker
            .run(OperationClass::Availability, binding.probe_availability())
            .await
        {
            Ok(availability) => availability,
            Err(InvokeError::Timeout(_)) if binding.assume_available_on_timeout() => {
                warn!(
                    binding = binding.name(),
                    "Availability probe never settled, assuming available"
                );
                Availability::Available
            }
            Err(InvokeError::Timeout(_)) => Availability::Unavailable(UnavailableReason::Timeout),
            Err(InvokeError::Failed(err)) => Availability::Unavailable(classify(&err)),
        };

        debug!(binding = binding.name(), available = availability.is_available(), reason = ?availability.reason(), "Availability checked");
        availability
    }
}

fn classify(err: &anyhow::Error) -> UnavailableReason {
    match err.downcast_ref::<NativeCallError>() {
        Some(NativeCallError::MethodMissing(method)) => UnavailableReason::MethodMissing(method.clone()),
        _ => UnavailableReason::NativeError(err.to_string()),
    }
}
