//! Daily nutrition writes
//!
//! Pushes the application's nutrition totals for a day to the native store
//! in a single call. Only positive finite fields are sent.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use healthbridge_core::domain::{MacroField, NutritionTotals};

use crate::invoker::{OperationClass, TimeoutInvoker};
use crate::resolver::BindingResolver;
use crate::samples::DayWindow;

/// Reason reported when no field has a positive value
pub const NUTRITION_TOTALS_ZERO: &str = "nutrition_totals_zero";

/// Result of a nutrition write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NutritionWriteOutcome {
    pub written: bool,
    pub written_fields: Vec<MacroField>,
    pub skipped_fields: Vec<MacroField>,
    pub reason: Option<String>,
}

/// Writes nutrition totals through the active binding
#[derive(Debug, Clone)]
pub struct NutritionWriter {
    resolver: Arc<BindingResolver>,
    invoker: TimeoutInvoker,
}

impl NutritionWriter {
    pub fn new(resolver: Arc<BindingResolver>, invoker: TimeoutInvoker) -> Self {
        Self { resolver, invoker }
    }

    /// Writes `totals` for their day in the device's local zone
    pub async fn write_daily_nutrition(&self, totals: &NutritionTotals) -> NutritionWriteOutcome {
        self.write_in_window(totals, &DayWindow::local(totals.date)).await
    }

    pub async fn write_in_window(&self, totals: &NutritionTotals, window: &DayWindow) -> NutritionWriteOutcome {
        let (writable, skipped) = totals.partition();
        if writable.is_empty() {
            return NutritionWriteOutcome {
                written: false,
                written_fields: Vec::new(),
                skipped_fields: skipped,
                reason: Some(NUTRITION_TOTALS_ZERO.to_string()),
            };
        }

        let attempted: Vec<MacroField> = writable.iter().map(|(field, _)| *field).collect();
        let fail = |reason: String| {
            let mut skipped_fields = skipped.clone();
            skipped_fields.extend(attempted.iter().copied());
            NutritionWriteOutcome {
                written: false,
                written_fields: Vec::new(),
                skipped_fields,
                reason: Some(reason),
            }
        };

        let Some(binding) = self.resolver.active() else {
            return fail("health_module_missing".to_string());
        };

        match self
            .invoker
            .run(
                OperationClass::Write,
                binding.write_nutrition(totals.date, window, &writable),
            )
            .await
        {
            Ok(()) => {
                info!(
                    binding = binding.name(),
                    date = %totals.date,
                    fields = attempted.len(),
                    "Wrote daily nutrition"
                );
                NutritionWriteOutcome {
                    written: true,
                    written_fields: attempted,
                    skipped_fields: skipped,
                    reason: None,
                }
            }
            Err(err) => {
                warn!(binding = binding.name(), date = %totals.date, error = %err, "Nutrition write failed");
                fail(err.to_string())
            }
        }
    }
}
