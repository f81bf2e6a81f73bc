//! Permission negotiation
//!
//! One combined grant request covers the reads and, optionally, the
//! nutrition write. If that fails while a write was requested, a read-only
//! request follows, so a user who refuses writes still gets syncing.
//!
//! `granted` tracks the steps read permission: it is what the background
//! sync needs.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use healthbridge_core::domain::Capabilities;
use healthbridge_core::ports::NativeCallError;

use crate::availability::AvailabilityChecker;
use crate::binding::{BindingTier, HealthBinding, PermissionRequest};
use crate::invoker::{InvokeError, OperationClass, TimeoutInvoker};
use crate::resolver::BindingResolver;

/// Reason reported when reads were granted but the nutrition write was not
pub const NUTRITION_NOT_GRANTED: &str = "nutrition_permission_not_granted";

/// Reason reported when the user refused without a more specific error
pub const PERMISSION_DENIED: &str = "permission_denied";

/// Diagnostic details of a negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionMetadata {
    pub provider_id: String,
    pub binding: Option<&'static str>,
    pub tier: Option<BindingTier>,
    pub nutrition_write_requested: bool,
    pub read_only_fallback: bool,
}

/// Result of a negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionOutcome {
    pub granted: bool,
    pub reason: Option<String>,
    pub capabilities: Capabilities,
    pub metadata: PermissionMetadata,
}

/// Requests read and write permissions from the active binding
#[derive(Debug, Clone)]
pub struct PermissionNegotiator {
    resolver: Arc<BindingResolver>,
    invoker: TimeoutInvoker,
    availability: AvailabilityChecker,
}

impl PermissionNegotiator {
    pub fn new(
        resolver: Arc<BindingResolver>,
        invoker: TimeoutInvoker,
        availability: AvailabilityChecker,
    ) -> Self {
        Self {
            resolver,
            invoker,
            availability,
        }
    }

    pub async fn request_permissions(&self, include_nutrition_write: bool) -> PermissionOutcome {
        let mut metadata = PermissionMetadata {
            provider_id: self.resolver.descriptor().provider_id.clone(),
            binding: None,
            tier: None,
            nutrition_write_requested: include_nutrition_write,
            read_only_fallback: false,
        };

        let availability = self.availability.check().await;
        if let Some(reason) = availability.reason() {
            return PermissionOutcome {
                granted: false,
                reason: Some(reason.to_string()),
                capabilities: Capabilities::none(),
                metadata,
            };
        }

        // Availability only passes with a resolved binding
        let Some(binding) = self.resolver.active() else {
            return PermissionOutcome {
                granted: false,
                reason: Some("health_module_missing".to_string()),
                capabilities: Capabilities::none(),
                metadata,
            };
        };
        metadata.binding = Some(binding.name());
        metadata.tier = Some(binding.tier());

        let request = PermissionRequest::standard(include_nutrition_write);
        let combined = self.grant(binding.as_ref(), &request).await;
        let failure = match combined {
            Ok(capabilities) if request.is_satisfied_by(&capabilities) => {
                info!(binding = binding.name(), write = include_nutrition_write, "Health permissions granted");
                return PermissionOutcome {
                    granted: capabilities.can_read_steps,
                    reason: None,
                    capabilities,
                    metadata,
                };
            }
            Ok(partial) => {
                if !include_nutrition_write {
                    return Self::settle(partial, None, metadata);
                }
                None
            }
            Err(reason) => {
                if !include_nutrition_write {
                    return Self::settle(Capabilities::none(), Some(reason), metadata);
                }
                Some(reason)
            }
        };

        warn!(
            binding = binding.name(),
            reason = failure.as_deref().unwrap_or(NUTRITION_NOT_GRANTED),
            "Combined permission request failed, retrying read-only"
        );
        metadata.read_only_fallback = true;

        let read_only = PermissionRequest::standard(false);
        match self.grant(binding.as_ref(), &read_only).await {
            Ok(capabilities) if capabilities.can_read_steps => PermissionOutcome {
                granted: true,
                reason: Some(NUTRITION_NOT_GRANTED.to_string()),
                capabilities: Capabilities {
                    can_write_nutrition: false,
                    ..capabilities
                },
                metadata,
            },
            Ok(capabilities) => Self::settle(capabilities, None, metadata),
            Err(reason) => Self::settle(Capabilities::none(), Some(reason), metadata),
        }
    }

    /// Runs one grant call, reducing any failure to its reason string
    async fn grant(
        &self,
        binding: &dyn HealthBinding,
        request: &PermissionRequest,
    ) -> Result<Capabilities, String> {
        self.invoker
            .run(OperationClass::Permission, binding.request_permissions(request))
            .await
            .map_err(|err| {
                let reason = match &err {
                    InvokeError::Failed(inner) => {
                        match inner.downcast_ref::<NativeCallError>() {
                            Some(NativeCallError::PermissionDenied(_)) => PERMISSION_DENIED.to_string(),
                            _ => err.to_string(),
                        }
                    }
                    InvokeError::Timeout(reason) => reason.to_string(),
                };
                warn!(binding = binding.name(), reason = %reason, "Permission request failed");
                reason
            })
    }

    /// Final outcome for a request that did not fully succeed
    fn settle(
        capabilities: Capabilities,
        reason: Option<String>,
        metadata: PermissionMetadata,
    ) -> PermissionOutcome {
        let granted = capabilities.can_read_steps;
        let reason = if granted {
            reason
        } else {
            reason.or_else(|| Some(PERMISSION_DENIED.to_string()))
        };
        PermissionOutcome {
            granted,
            reason,
            capabilities,
            metadata,
        }
    }
}
