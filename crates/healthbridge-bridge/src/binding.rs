//! The polymorphic binding interface
//!
//! A [`HealthBinding`] adapts one native health library to the operations
//! the bridge needs. Concrete bindings live in [`crate::bindings`] and are
//! chosen once by the [`BindingResolver`](crate::resolver::BindingResolver),
//! so no caller ever branches on the platform.

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use serde::Serialize;

use healthbridge_core::domain::{Capabilities, MacroField};

use crate::samples::DayWindow;

/// Preference tier of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingTier {
    /// Platform-specific library with the richer surface
    Direct,
    /// Cross-platform bridging library, lower fidelity
    Generic,
}

/// Metrics the reader knows how to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Steps,
    ActiveCalories,
}

/// Why the platform health service cannot be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No native library is linked for any tier
    ModuleMissing,
    /// The library is linked but lacks an entry point
    MethodMissing(String),
    /// Health Connect provider app is not installed
    SdkNotInstalled,
    /// Health Connect provider app must be updated
    SdkUpdateRequired,
    /// The permission service could not be reached
    PermissionSubsystemUnreachable,
    /// The device reports that health data is not supported
    NotSupported,
    /// The availability probe did not settle in time
    Timeout,
    /// Any other native failure
    NativeError(String),
}

impl UnavailableReason {
    /// Stable code surfaced verbatim for telemetry
    pub fn code(&self) -> &'static str {
        match self {
            UnavailableReason::ModuleMissing => "health_module_missing",
            UnavailableReason::MethodMissing(_) => "health_method_missing",
            UnavailableReason::SdkNotInstalled => "health_connect_not_installed",
            UnavailableReason::SdkUpdateRequired => "health_connect_update_required",
            UnavailableReason::PermissionSubsystemUnreachable => "health_permission_service_unreachable",
            UnavailableReason::NotSupported => "health_data_not_supported",
            UnavailableReason::Timeout => "health_availability_timeout",
            UnavailableReason::NativeError(_) => "health_availability_error",
        }
    }
}

impl Display for UnavailableReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::MethodMissing(detail) | UnavailableReason::NativeError(detail) => {
                write!(f, "{}: {}", self.code(), detail)
            }
            _ => f.write_str(self.code()),
        }
    }
}

/// Result of an availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(UnavailableReason),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Reason code when unavailable
    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            Availability::Available => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }
}

/// Permissions to ask the native store for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub read: Vec<MetricKind>,
    pub write_nutrition: bool,
}

impl PermissionRequest {
    /// Steps and active calories, plus nutrition write if asked
    pub fn standard(write_nutrition: bool) -> Self {
        Self {
            read: vec![MetricKind::Steps, MetricKind::ActiveCalories],
            write_nutrition,
        }
    }

    /// Returns true when `granted` covers everything in this request
    pub fn is_satisfied_by(&self, granted: &Capabilities) -> bool {
        let reads_ok = self.read.iter().all(|metric| match metric {
            MetricKind::Steps => granted.can_read_steps,
            MetricKind::ActiveCalories => granted.can_read_active_calories,
        });
        reads_ok && (!self.write_nutrition || granted.can_write_nutrition)
    }

    /// Capabilities this request would yield if fully granted
    pub fn as_capabilities(&self) -> Capabilities {
        Capabilities {
            can_read_steps: self.read.contains(&MetricKind::Steps),
            can_read_active_calories: self.read.contains(&MetricKind::ActiveCalories),
            can_write_nutrition: self.write_nutrition,
        }
    }
}

/// Adapter exposing the bridge operations against one native library
///
/// ## Implementation Notes
///
/// - Methods return raw results; deadlines are applied by the caller through
///   the [`TimeoutInvoker`](crate::invoker::TimeoutInvoker).
/// - `request_permissions` reports what was granted; an `Err` means the
///   request itself failed or was refused outright.
/// - `read_samples` returns samples in whatever shape the library uses.
#[async_trait::async_trait]
pub trait HealthBinding: Send + Sync {
    /// Tier this binding belongs to
    fn tier(&self) -> BindingTier;

    /// Short library name used in logs and metadata
    fn name(&self) -> &'static str;

    /// Whether an availability probe that never settles counts as available
    ///
    /// Only libraries known to drop their completion callback under some OS
    /// states opt in; the permission step then decides.
    fn assume_available_on_timeout(&self) -> bool {
        false
    }

    async fn probe_availability(&self) -> anyhow::Result<Availability>;

    async fn request_permissions(&self, request: &PermissionRequest) -> anyhow::Result<Capabilities>;

    async fn read_samples(
        &self,
        metric: MetricKind,
        window: &DayWindow,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Writes every entry in a single native call
    async fn write_nutrition(
        &self,
        date: NaiveDate,
        window: &DayWindow,
        entries: &[(MacroField, f64)],
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_satisfaction() {
        let request = PermissionRequest::standard(true);
        assert!(request.is_satisfied_by(&Capabilities::reads(true)));
        assert!(!request.is_satisfied_by(&Capabilities::reads(false)));

        let read_only = PermissionRequest::standard(false);
        assert!(read_only.is_satisfied_by(&Capabilities::reads(false)));
        assert!(!read_only.is_satisfied_by(&Capabilities::none()));
    }

    #[test]
    fn test_as_capabilities() {
        assert_eq!(
            PermissionRequest::standard(false).as_capabilities(),
            Capabilities::reads(false)
        );
    }

    #[test]
    fn test_unavailable_reason_display() {
        assert_eq!(
            UnavailableReason::SdkUpdateRequired.to_string(),
            "health_connect_update_required"
        );
        assert_eq!(
            UnavailableReason::MethodMissing("isHealthDataAvailable".into()).to_string(),
            "health_method_missing: isHealthDataAvailable"
        );
        assert!(!Availability::Unavailable(UnavailableReason::Timeout).is_available());
        assert!(Availability::Available.reason().is_none());
    }
}
