//! Native health module ports (driven/secondary ports)
//!
//! The host application links zero or more native health libraries. Each one
//! is described here by the raw surface it exposes; the bridge crate wraps
//! them in uniform bindings.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because native failures are library-specific and
//!   only need to be carried through as a reason string.
//! - Samples are returned as `serde_json::Value` since every library shapes
//!   them differently; normalization happens in the bridge.
//! - A library that is linked but lacks a method reports it by returning a
//!   [`NativeCallError::MethodMissing`] inside the `anyhow::Error`.
//! - Loading is synchronous and fallible; [`ModuleMissing`] means the library
//!   is not present at all, which is distinct from a method failing.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MacroField;

// ============================================================================
// Errors
// ============================================================================

/// A native library is not linked into the host
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("native module '{module}' is not available: {detail}")]
pub struct ModuleMissing {
    /// Library name, e.g. `"healthkit"`
    pub module: String,
    /// Loader-provided explanation
    pub detail: String,
}

impl ModuleMissing {
    pub fn new(module: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            detail: detail.into(),
        }
    }
}

/// Structured failures a native module may raise
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NativeCallError {
    /// The library is linked but this entry point does not exist
    #[error("native method '{0}' is not available")]
    MethodMissing(String),

    /// The user or the OS refused the request
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

// ============================================================================
// HealthKit (iOS)
// ============================================================================

/// A quantity sample written to HealthKit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitySample {
    /// HealthKit type identifier, e.g. `HKQuantityTypeIdentifierDietaryProtein`
    pub type_identifier: String,
    pub value: f64,
    /// HealthKit unit string, e.g. `kcal`, `g`
    pub unit: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw surface of the iOS HealthKit library
#[async_trait::async_trait]
pub trait IHealthKitModule: Send + Sync {
    /// Whether HealthKit data is available on this device
    ///
    /// Some OS states never complete this call; callers must bound it.
    async fn is_health_data_available(&self) -> anyhow::Result<bool>;

    /// Presents the authorization sheet for the given type identifiers
    async fn request_authorization(&self, read: &[String], write: &[String]) -> anyhow::Result<()>;

    /// Returns raw quantity samples of one type in `[start, end]`
    async fn query_quantity_samples(
        &self,
        type_identifier: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Saves a batch of quantity samples in one call
    async fn save_quantity_samples(&self, samples: &[QuantitySample]) -> anyhow::Result<()>;
}

// ============================================================================
// Health Connect (Android)
// ============================================================================

/// Health Connect SDK status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdkStatus {
    Available,
    /// The provider app is not installed
    Unavailable,
    /// The provider app must be updated before use
    UpdateRequired,
}

/// Read or write access for a Health Connect permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

/// A single Health Connect permission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConnectPermission {
    pub access_type: AccessType,
    /// Record type name, e.g. `Steps`, `ActiveCaloriesBurned`, `Nutrition`
    pub record_type: String,
}

impl HealthConnectPermission {
    pub fn read(record_type: impl Into<String>) -> Self {
        Self {
            access_type: AccessType::Read,
            record_type: record_type.into(),
        }
    }

    pub fn write(record_type: impl Into<String>) -> Self {
        Self {
            access_type: AccessType::Write,
            record_type: record_type.into(),
        }
    }
}

/// Raw surface of the Android Health Connect library
#[async_trait::async_trait]
pub trait IHealthConnectModule: Send + Sync {
    async fn sdk_status(&self) -> anyhow::Result<SdkStatus>;

    /// Initializes the client; `false` means the permission service is unreachable
    async fn initialize(&self) -> anyhow::Result<bool>;

    /// Requests permissions and returns the subset that was granted
    async fn request_permission(
        &self,
        permissions: &[HealthConnectPermission],
    ) -> anyhow::Result<Vec<HealthConnectPermission>>;

    /// Reads raw records of one type in `[start, end]`
    async fn read_records(
        &self,
        record_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Inserts records and returns their new identifiers
    async fn insert_records(&self, records: Vec<serde_json::Value>) -> anyhow::Result<Vec<String>>;
}

// ============================================================================
// Generic cross-platform bridge
// ============================================================================

/// Data types understood by the generic bridging library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericDataType {
    Steps,
    ActiveEnergyBurned,
    Nutrition,
}

/// One macro value written through the generic bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionSample {
    pub field: MacroField,
    pub value: f64,
    pub unit: String,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw surface of a lower-fidelity cross-platform health library
#[async_trait::async_trait]
pub trait IGenericHealthModule: Send + Sync {
    async fn is_available(&self) -> anyhow::Result<bool>;

    /// Returns `true` when every requested type was granted
    async fn request_permissions(
        &self,
        read: &[GenericDataType],
        write: &[GenericDataType],
    ) -> anyhow::Result<bool>;

    async fn query(
        &self,
        data_type: GenericDataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<serde_json::Value>>;

    async fn write_nutrition(&self, samples: &[NutritionSample]) -> anyhow::Result<()>;
}

// ============================================================================
// Loader
// ============================================================================

/// Port through which the host exposes whichever native libraries it links
///
/// Each method is called at most once per resolver; the result is cached.
pub trait INativeModuleLoader: Send + Sync {
    fn load_healthkit(&self) -> Result<Arc<dyn IHealthKitModule>, ModuleMissing>;

    fn load_health_connect(&self) -> Result<Arc<dyn IHealthConnectModule>, ModuleMissing>;

    fn load_generic(&self) -> Result<Arc<dyn IGenericHealthModule>, ModuleMissing>;
}
