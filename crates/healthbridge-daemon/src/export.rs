//! JSON health export backing the generic bridge
//!
//! Desktop hosts have no platform health store. The daemon reads samples
//! from a JSON export instead and appends nutrition writes to the same file.
//!
//! ```json
//! {
//!   "available": true,
//!   "granted": true,
//!   "steps": [{"startDate": "2026-10-19T08:00:00Z", "value": 1200}],
//!   "active_energy_burned": [{"startDate": "...", "value": 42, "unit": "kcal"}],
//!   "nutrition": []
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use healthbridge_bridge::samples::sample_timestamp;
use healthbridge_core::ports::{
    GenericDataType, IGenericHealthModule, IHealthConnectModule, IHealthKitModule,
    INativeModuleLoader, ModuleMissing, NutritionSample,
};

fn default_true() -> bool {
    true
}

/// On-disk layout of the export file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthExport {
    #[serde(default = "default_true")]
    pub available: bool,
    /// Answer given to permission requests
    #[serde(default = "default_true")]
    pub granted: bool,
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(default)]
    pub active_energy_burned: Vec<Value>,
    #[serde(default)]
    pub nutrition: Vec<NutritionSample>,
}

impl Default for HealthExport {
    fn default() -> Self {
        Self {
            available: true,
            granted: true,
            steps: Vec::new(),
            active_energy_burned: Vec::new(),
            nutrition: Vec::new(),
        }
    }
}

/// Generic health module reading from an export file
pub struct ExportFileModule {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl ExportFileModule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HealthExport> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read health export {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid health export {}", self.path.display()))
    }

    async fn load_or_default(&self) -> Result<HealthExport> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => self.load().await,
            _ => Ok(HealthExport::default()),
        }
    }

    async fn store(&self, export: &HealthExport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(export)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write health export {}", self.path.display()))
    }
}

#[async_trait::async_trait]
impl IGenericHealthModule for ExportFileModule {
    async fn is_available(&self) -> Result<bool> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => Ok(self.load().await?.available),
            _ => Ok(false),
        }
    }

    async fn request_permissions(
        &self,
        read: &[GenericDataType],
        write: &[GenericDataType],
    ) -> Result<bool> {
        let granted = self.load_or_default().await?.granted;
        debug!(?read, ?write, granted, "Export permission request");
        Ok(granted)
    }

    async fn query(
        &self,
        data_type: GenericDataType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Value>> {
        let export = self.load().await?;
        let samples = match data_type {
            GenericDataType::Steps => export.steps,
            GenericDataType::ActiveEnergyBurned => export.active_energy_burned,
            GenericDataType::Nutrition => export
                .nutrition
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<Value>, _>>()?,
        };

        // Undated samples are kept; the reader has no better answer for them
        Ok(samples
            .into_iter()
            .filter(|sample| sample_timestamp(sample).map_or(true, |at| at >= start && at < end))
            .collect())
    }

    async fn write_nutrition(&self, samples: &[NutritionSample]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut export = self.load_or_default().await?;
        export.nutrition.extend_from_slice(samples);
        self.store(&export).await?;
        info!(count = samples.len(), path = %self.path.display(), "Appended nutrition to export");
        Ok(())
    }
}

/// Loader exposing only the export-backed generic module
pub struct ExportModuleLoader {
    module: Arc<ExportFileModule>,
}

impl ExportModuleLoader {
    pub fn new(module: Arc<ExportFileModule>) -> Self {
        Self { module }
    }
}

impl INativeModuleLoader for ExportModuleLoader {
    fn load_healthkit(&self) -> Result<Arc<dyn IHealthKitModule>, ModuleMissing> {
        Err(ModuleMissing::new("healthkit", "not available on this host"))
    }

    fn load_health_connect(&self) -> Result<Arc<dyn IHealthConnectModule>, ModuleMissing> {
        Err(ModuleMissing::new("health_connect", "not available on this host"))
    }

    fn load_generic(&self) -> Result<Arc<dyn IGenericHealthModule>, ModuleMissing> {
        Ok(Arc::clone(&self.module) as Arc<dyn IGenericHealthModule>)
    }
}
