//! Health Connect binding (Android, direct tier)
//!
//! The client must be initialized before any permission or data call. The
//! binding does this lazily and remembers a successful initialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;
use chrono::{NaiveDate, SecondsFormat};
use serde_json::{json, Map, Value};
use tracing::debug;

use healthbridge_core::domain::{Capabilities, MacroField};
use healthbridge_core::ports::{AccessType, HealthConnectPermission, IHealthConnectModule, SdkStatus};

use crate::binding::{Availability, BindingTier, HealthBinding, MetricKind, PermissionRequest, UnavailableReason};
use crate::samples::DayWindow;

const STEPS: &str = "Steps";
const ACTIVE_CALORIES: &str = "ActiveCaloriesBurned";
const NUTRITION: &str = "Nutrition";

fn record_type(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Steps => STEPS,
        MetricKind::ActiveCalories => ACTIVE_CALORIES,
    }
}

/// Binding over the Health Connect module
pub struct HealthConnectBinding {
    module: Arc<dyn IHealthConnectModule>,
    initialized: AtomicBool,
}

impl HealthConnectBinding {
    pub fn new(module: Arc<dyn IHealthConnectModule>) -> Self {
        Self {
            module,
            initialized: AtomicBool::new(false),
        }
    }

    async fn ensure_initialized(&self) -> anyhow::Result<bool> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(true);
        }
        let ready = self.module.initialize().await?;
        if ready {
            debug!("Health Connect client initialized");
            self.initialized.store(true, Ordering::Release);
        }
        Ok(ready)
    }

    async fn require_initialized(&self) -> anyhow::Result<()> {
        if !self.ensure_initialized().await? {
            bail!("{}", UnavailableReason::PermissionSubsystemUnreachable.code());
        }
        Ok(())
    }
}

/// Builds the single Nutrition record carrying every writable macro
fn nutrition_record(window: &DayWindow, entries: &[(MacroField, f64)]) -> Value {
    let mut record = Map::new();
    record.insert("recordType".into(), json!(NUTRITION));
    record.insert(
        "startTime".into(),
        json!(window.start.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    record.insert(
        "endTime".into(),
        json!(window.end.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    for (field, value) in entries {
        let (key, quantity) = match field {
            MacroField::Calories => ("energy", json!({ "inKilocalories": value })),
            MacroField::Protein => ("protein", json!({ "inGrams": value })),
            MacroField::Carbs => ("totalCarbohydrate", json!({ "inGrams": value })),
            MacroField::Fat => ("totalFat", json!({ "inGrams": value })),
        };
        record.insert(key.into(), quantity);
    }
    Value::Object(record)
}

#[async_trait::async_trait]
impl HealthBinding for HealthConnectBinding {
    fn tier(&self) -> BindingTier {
        BindingTier::Direct
    }

    fn name(&self) -> &'static str {
        "health_connect"
    }

    async fn probe_availability(&self) -> anyhow::Result<Availability> {
        let reason = match self.module.sdk_status().await? {
            SdkStatus::Unavailable => UnavailableReason::SdkNotInstalled,
            SdkStatus::UpdateRequired => UnavailableReason::SdkUpdateRequired,
            SdkStatus::Available => {
                if self.ensure_initialized().await? {
                    return Ok(Availability::Available);
                }
                UnavailableReason::PermissionSubsystemUnreachable
            }
        };
        Ok(Availability::Unavailable(reason))
    }

    async fn request_permissions(&self, request: &PermissionRequest) -> anyhow::Result<Capabilities> {
        self.require_initialized().await?;

        let mut wanted: Vec<HealthConnectPermission> = request
            .read
            .iter()
            .map(|metric| HealthConnectPermission::read(record_type(*metric)))
            .collect();
        if request.write_nutrition {
            wanted.push(HealthConnectPermission::write(NUTRITION));
        }

        let granted = self.module.request_permission(&wanted).await?;
        let has = |access: AccessType, record: &str| {
            granted
                .iter()
                .any(|p| p.access_type == access && p.record_type == record)
        };
        Ok(Capabilities {
            can_read_steps: has(AccessType::Read, STEPS),
            can_read_active_calories: has(AccessType::Read, ACTIVE_CALORIES),
            can_write_nutrition: has(AccessType::Write, NUTRITION),
        })
    }

    async fn read_samples(&self, metric: MetricKind, window: &DayWindow) -> anyhow::Result<Vec<Value>> {
        self.require_initialized().await?;
        self.module
            .read_records(record_type(metric), window.start, window.end)
            .await
    }

    async fn write_nutrition(
        &self,
        _date: NaiveDate,
        window: &DayWindow,
        entries: &[(MacroField, f64)],
    ) -> anyhow::Result<()> {
        self.require_initialized().await?;
        let ids = self
            .module
            .insert_records(vec![nutrition_record(window, entries)])
            .await?;
        debug!(records = ids.len(), "Inserted Health Connect nutrition record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nutrition_record_shape() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let window = DayWindow::in_zone(date, &chrono::Utc);
        let record = nutrition_record(
            &window,
            &[(MacroField::Calories, 1800.0), (MacroField::Fat, 55.5)],
        );

        assert_eq!(record["recordType"], "Nutrition");
        assert_eq!(record["startTime"], "2026-10-19T00:00:00.000Z");
        assert_eq!(record["endTime"], "2026-10-19T23:59:59.999Z");
        assert_eq!(record["energy"]["inKilocalories"], 1800.0);
        assert_eq!(record["totalFat"]["inGrams"], 55.5);
        assert!(record.get("protein").is_none());
    }
}
