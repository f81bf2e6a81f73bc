//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates or in the
//! host application.
//!
//! ## Ports Overview
//!
//! - [`INativeModuleLoader`] - Native health libraries linked into the host
//! - [`IMetricsStore`] - Backend persistence for snapshots and connections
//! - [`ITaskScheduler`] - Host periodic background task facility
//! - [`IIdentityProvider`] - Currently signed-in user

pub mod identity;
pub mod metrics_store;
pub mod native;
pub mod task_scheduler;

pub use identity::IIdentityProvider;
pub use metrics_store::{IMetricsStore, StoreError, CONNECTIONS_RELATION, DAILY_METRICS_RELATION};
pub use native::{
    AccessType, GenericDataType, HealthConnectPermission, IGenericHealthModule,
    IHealthConnectModule, IHealthKitModule, INativeModuleLoader, ModuleMissing, NativeCallError,
    NutritionSample, QuantitySample, SdkStatus,
};
pub use task_scheduler::{ITaskScheduler, TaskFuture, TaskHandler, TaskOptions, TaskOutcome};
