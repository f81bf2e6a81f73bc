//! Concrete [`HealthBinding`](crate::binding::HealthBinding) implementations
//!
//! - [`HealthKitBinding`] - iOS HealthKit, direct tier
//! - [`HealthConnectBinding`] - Android Health Connect, direct tier
//! - [`GenericBinding`] - cross-platform bridging library, generic tier

mod generic;
mod health_connect;
mod healthkit;

pub use generic::GenericBinding;
pub use health_connect::HealthConnectBinding;
pub use healthkit::HealthKitBinding;
