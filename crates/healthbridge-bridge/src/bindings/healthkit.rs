//! HealthKit binding (iOS, direct tier)

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use healthbridge_core::domain::{Capabilities, MacroField};
use healthbridge_core::ports::{IHealthKitModule, QuantitySample};

use crate::binding::{Availability, BindingTier, HealthBinding, MetricKind, PermissionRequest, UnavailableReason};
use crate::samples::DayWindow;

const STEP_COUNT: &str = "HKQuantityTypeIdentifierStepCount";
const ACTIVE_ENERGY: &str = "HKQuantityTypeIdentifierActiveEnergyBurned";

fn metric_type(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Steps => STEP_COUNT,
        MetricKind::ActiveCalories => ACTIVE_ENERGY,
    }
}

fn dietary_type(field: MacroField) -> &'static str {
    match field {
        MacroField::Calories => "HKQuantityTypeIdentifierDietaryEnergyConsumed",
        MacroField::Protein => "HKQuantityTypeIdentifierDietaryProtein",
        MacroField::Carbs => "HKQuantityTypeIdentifierDietaryCarbohydrates",
        MacroField::Fat => "HKQuantityTypeIdentifierDietaryFatTotal",
    }
}

/// Binding over the HealthKit module
pub struct HealthKitBinding {
    module: Arc<dyn IHealthKitModule>,
}

impl HealthKitBinding {
    pub fn new(module: Arc<dyn IHealthKitModule>) -> Self {
        Self { module }
    }
}

#[async_trait::async_trait]
impl HealthBinding for HealthKitBinding {
    fn tier(&self) -> BindingTier {
        BindingTier::Direct
    }

    fn name(&self) -> &'static str {
        "healthkit"
    }

    // isHealthDataAvailable is known to never call back in some OS states
    fn assume_available_on_timeout(&self) -> bool {
        true
    }

    async fn probe_availability(&self) -> anyhow::Result<Availability> {
        if self.module.is_health_data_available().await? {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Unavailable(UnavailableReason::NotSupported))
        }
    }

    /// HealthKit never discloses read grants, so a completed sheet counts as
    /// a grant of everything requested.
    async fn request_permissions(&self, request: &PermissionRequest) -> anyhow::Result<Capabilities> {
        let read: Vec<String> = request
            .read
            .iter()
            .map(|metric| metric_type(*metric).to_string())
            .collect();
        let write: Vec<String> = if request.write_nutrition {
            MacroField::ALL
                .iter()
                .map(|field| dietary_type(*field).to_string())
                .collect()
        } else {
            Vec::new()
        };

        self.module.request_authorization(&read, &write).await?;
        Ok(request.as_capabilities())
    }

    async fn read_samples(&self, metric: MetricKind, window: &DayWindow) -> anyhow::Result<Vec<Value>> {
        self.module
            .query_quantity_samples(metric_type(metric), window.start, window.end)
            .await
    }

    async fn write_nutrition(
        &self,
        _date: NaiveDate,
        window: &DayWindow,
        entries: &[(MacroField, f64)],
    ) -> anyhow::Result<()> {
        let samples: Vec<QuantitySample> = entries
            .iter()
            .map(|(field, value)| QuantitySample {
                type_identifier: dietary_type(*field).to_string(),
                value: *value,
                unit: field.unit().to_string(),
                start: window.start,
                end: window.end,
            })
            .collect();
        self.module.save_quantity_samples(&samples).await
    }
}
