//! Domain entities and business rules
//!
//! This module contains the core domain types for Healthbridge:
//! - Platform and provider descriptors
//! - Capability flags negotiated with the native health store
//! - The persisted per-user connection record
//! - Day-bucketed metric snapshots
//! - Nutrition totals pushed to the native store
//! - Ephemeral sync results and their scheduler mapping
//! - Domain-specific error types

pub mod capability;
pub mod connection;
pub mod errors;
pub mod nutrition;
pub mod provider;
pub mod snapshot;
pub mod sync_result;

// Re-export commonly used types
pub use capability::Capabilities;
pub use connection::HealthConnection;
pub use errors::DomainError;
pub use nutrition::{MacroField, NutritionTotals};
pub use provider::{Platform, ProviderDescriptor, UserId};
pub use snapshot::{DailyMetricSnapshot, SyncSource};
pub use sync_result::{SyncReason, SyncResult, TaskOutcome};
