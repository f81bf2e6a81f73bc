//! Daily metric reads
//!
//! Reads raw samples for one local calendar day, drops those stamped outside
//! the day, and sums what is left. Failures come back as an unsupported
//! reading with a reason; nothing propagates.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::binding::MetricKind;
use crate::invoker::{OperationClass, TimeoutInvoker};
use crate::resolver::BindingResolver;
use crate::samples::{self, DayWindow};

/// Today's step count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepsReading {
    pub steps: Option<u64>,
    pub supported: bool,
    pub sample_count: usize,
    pub reason: Option<String>,
}

/// Today's active energy, in kilocalories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCaloriesReading {
    pub active_calories: Option<f64>,
    pub supported: bool,
    pub sample_count: usize,
    pub reason: Option<String>,
}

/// Reads and aggregates metrics from the active binding
#[derive(Debug, Clone)]
pub struct MetricReader {
    resolver: Arc<BindingResolver>,
    invoker: TimeoutInvoker,
}

impl MetricReader {
    pub fn new(resolver: Arc<BindingResolver>, invoker: TimeoutInvoker) -> Self {
        Self { resolver, invoker }
    }

    /// Steps for `date` in the device's local zone
    pub async fn read_today_steps(&self, date: NaiveDate) -> StepsReading {
        self.read_steps(&DayWindow::local(date)).await
    }

    /// Active calories for `date` in the device's local zone
    pub async fn read_today_active_calories(&self, date: NaiveDate) -> ActiveCaloriesReading {
        self.read_active_calories(&DayWindow::local(date)).await
    }

    pub async fn read_steps(&self, window: &DayWindow) -> StepsReading {
        match self.samples_in_window(MetricKind::Steps, window).await {
            Ok(samples) => {
                let total: f64 = samples.iter().map(samples::step_value).sum();
                StepsReading {
                    steps: Some(samples::round_steps(total)),
                    supported: true,
                    sample_count: samples.len(),
                    reason: None,
                }
            }
            Err(reason) => StepsReading {
                steps: None,
                supported: false,
                sample_count: 0,
                reason: Some(reason),
            },
        }
    }

    pub async fn read_active_calories(&self, window: &DayWindow) -> ActiveCaloriesReading {
        match self.samples_in_window(MetricKind::ActiveCalories, window).await {
            Ok(samples) => {
                let total: f64 = samples.iter().map(samples::energy_kcal).sum();
                ActiveCaloriesReading {
                    active_calories: Some(samples::round_one_decimal(total)),
                    supported: true,
                    sample_count: samples.len(),
                    reason: None,
                }
            }
            Err(reason) => ActiveCaloriesReading {
                active_calories: None,
                supported: false,
                sample_count: 0,
                reason: Some(reason),
            },
        }
    }

    /// Raw samples of `metric` that may belong to `window`
    ///
    /// Samples without a parseable timestamp are trusted to the native query.
    async fn samples_in_window(&self, metric: MetricKind, window: &DayWindow) -> Result<Vec<Value>, String> {
        let Some(binding) = self.resolver.active() else {
            return Err("health_module_missing".to_string());
        };

        let raw = self
            .invoker
            .run(OperationClass::Read, binding.read_samples(metric, window))
            .await
            .map_err(|err| {
                warn!(binding = binding.name(), metric = ?metric, error = %err, "Health read failed");
                err.to_string()
            })?;

        let fetched = raw.len();
        let kept: Vec<Value> = raw
            .into_iter()
            .filter(|sample| samples::sample_timestamp(sample).map_or(true, |at| window.contains(at)))
            .collect();
        debug!(
            binding = binding.name(),
            metric = ?metric,
            fetched,
            kept = kept.len(),
            date = %window.date,
            "Read health samples"
        );
        Ok(kept)
    }
}
