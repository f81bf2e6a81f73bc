//! Generic cross-platform binding (generic tier)

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use healthbridge_core::domain::{Capabilities, MacroField};
use healthbridge_core::ports::{GenericDataType, IGenericHealthModule, NativeCallError, NutritionSample};

use crate::binding::{Availability, BindingTier, HealthBinding, MetricKind, PermissionRequest, UnavailableReason};
use crate::samples::DayWindow;

fn data_type(metric: MetricKind) -> GenericDataType {
    match metric {
        MetricKind::Steps => GenericDataType::Steps,
        MetricKind::ActiveCalories => GenericDataType::ActiveEnergyBurned,
    }
}

/// Binding over a lower-fidelity bridging library
///
/// The library answers permission requests with a single yes/no, so a grant
/// is all-or-nothing.
pub struct GenericBinding {
    module: Arc<dyn IGenericHealthModule>,
}

impl GenericBinding {
    pub fn new(module: Arc<dyn IGenericHealthModule>) -> Self {
        Self { module }
    }
}

#[async_trait::async_trait]
impl HealthBinding for GenericBinding {
    fn tier(&self) -> BindingTier {
        BindingTier::Generic
    }

    fn name(&self) -> &'static str {
        "generic_bridge"
    }

    async fn probe_availability(&self) -> anyhow::Result<Availability> {
        if self.module.is_available().await? {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Unavailable(UnavailableReason::NotSupported))
        }
    }

    async fn request_permissions(&self, request: &PermissionRequest) -> anyhow::Result<Capabilities> {
        let read: Vec<GenericDataType> = request.read.iter().map(|m| data_type(*m)).collect();
        let write: Vec<GenericDataType> = if request.write_nutrition {
            vec![GenericDataType::Nutrition]
        } else {
            Vec::new()
        };

        if self.module.request_permissions(&read, &write).await? {
            Ok(request.as_capabilities())
        } else {
            Err(NativeCallError::PermissionDenied("generic bridge refused the request".into()).into())
        }
    }

    async fn read_samples(&self, metric: MetricKind, window: &DayWindow) -> anyhow::Result<Vec<Value>> {
        self.module
            .query(data_type(metric), window.start, window.end)
            .await
    }

    async fn write_nutrition(
        &self,
        date: NaiveDate,
        window: &DayWindow,
        entries: &[(MacroField, f64)],
    ) -> anyhow::Result<()> {
        let samples: Vec<NutritionSample> = entries
            .iter()
            .map(|(field, value)| NutritionSample {
                field: *field,
                value: *value,
                unit: field.unit().to_string(),
                date,
                start: window.start,
                end: window.end,
            })
            .collect();
        self.module.write_nutrition(&samples).await
    }
}
