//! Public bridge facade
//!
//! [`HealthBridge`] is what the rest of the application talks to. It owns one
//! resolver and hands it to each operation, so every operation sees the same
//! binding for the life of the process.

use std::sync::Arc;

use chrono::NaiveDate;

use healthbridge_core::config::TimeoutConfig;
use healthbridge_core::domain::{NutritionTotals, ProviderDescriptor};

use crate::availability::AvailabilityChecker;
use crate::binding::Availability;
use crate::invoker::TimeoutInvoker;
use crate::permissions::{PermissionNegotiator, PermissionOutcome};
use crate::reader::{ActiveCaloriesReading, MetricReader, StepsReading};
use crate::resolver::BindingResolver;
use crate::samples::DayWindow;
use crate::writer::{NutritionWriteOutcome, NutritionWriter};

/// Uniform access to the platform health store
#[derive(Debug, Clone)]
pub struct HealthBridge {
    resolver: Arc<BindingResolver>,
    availability: AvailabilityChecker,
    permissions: PermissionNegotiator,
    reader: MetricReader,
    writer: NutritionWriter,
}

impl HealthBridge {
    pub fn new(resolver: Arc<BindingResolver>, budgets: TimeoutConfig) -> Self {
        let invoker = TimeoutInvoker::new(budgets);
        let availability = AvailabilityChecker::new(Arc::clone(&resolver), invoker.clone());
        let permissions =
            PermissionNegotiator::new(Arc::clone(&resolver), invoker.clone(), availability.clone());
        let reader = MetricReader::new(Arc::clone(&resolver), invoker.clone());
        let writer = NutritionWriter::new(Arc::clone(&resolver), invoker);
        Self {
            resolver,
            availability,
            permissions,
            reader,
            writer,
        }
    }

    pub fn provider_details(&self) -> &ProviderDescriptor {
        self.resolver.descriptor()
    }

    pub fn is_bridge_installed(&self) -> bool {
        self.resolver.is_bridge_installed()
    }

    pub async fn check_availability(&self) -> Availability {
        self.availability.check().await
    }

    pub async fn request_permissions(&self, include_nutrition_write: bool) -> PermissionOutcome {
        self.permissions
            .request_permissions(include_nutrition_write)
            .await
    }

    pub async fn read_today_steps(&self, date: NaiveDate) -> StepsReading {
        self.reader.read_today_steps(date).await
    }

    pub async fn read_today_active_calories(&self, date: NaiveDate) -> ActiveCaloriesReading {
        self.reader.read_today_active_calories(date).await
    }

    /// Steps for an explicit window, for hosts that pin the time zone
    pub async fn read_steps_in(&self, window: &DayWindow) -> StepsReading {
        self.reader.read_steps(window).await
    }

    pub async fn read_active_calories_in(&self, window: &DayWindow) -> ActiveCaloriesReading {
        self.reader.read_active_calories(window).await
    }

    pub async fn write_daily_nutrition(&self, totals: &NutritionTotals) -> NutritionWriteOutcome {
        self.writer.write_daily_nutrition(totals).await
    }

    pub async fn write_nutrition_in(&self, totals: &NutritionTotals, window: &DayWindow) -> NutritionWriteOutcome {
        self.writer.write_in_window(totals, window).await
    }
}
