//! Healthbridge Bridge - Uniform access to platform health stores
//!
//! Provides:
//! - One-time, sticky resolution of the native health library to use
//! - Deadline-bounded invocation of every native call
//! - Availability checks, permission negotiation, metric reads and
//!   nutrition writes that never fail past their own boundary
//!
//! ## Modules
//!
//! - [`resolver`] - Picks the direct binding or the generic fallback, once
//! - [`invoker`] - Timeout wrapper shared by every native call
//! - [`binding`] - The polymorphic [`HealthBinding`] interface
//! - [`bindings`] - HealthKit, Health Connect and generic implementations
//! - [`availability`], [`permissions`], [`reader`], [`writer`] - Operations
//! - [`samples`] - Window computation, value extraction and unit normalization

pub mod availability;
pub mod binding;
pub mod bindings;
pub mod bridge;
pub mod invoker;
pub mod permissions;
pub mod reader;
pub mod resolver;
pub mod samples;
pub mod writer;

pub use availability::AvailabilityChecker;
pub use binding::{Availability, BindingTier, HealthBinding, MetricKind, PermissionRequest, UnavailableReason};
pub use bridge::HealthBridge;
pub use invoker::{InvokeError, OperationClass, TimeoutInvoker};
pub use permissions::{PermissionMetadata, PermissionNegotiator, PermissionOutcome};
pub use reader::{ActiveCaloriesReading, MetricReader, StepsReading};
pub use resolver::BindingResolver;
pub use samples::DayWindow;
pub use writer::{NutritionWriteOutcome, NutritionWriter};
