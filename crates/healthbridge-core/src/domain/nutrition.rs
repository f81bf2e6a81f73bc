//! Daily nutrition totals pushed to the native store

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the four macro fields the writer knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroField {
    Calories,
    Protein,
    Carbs,
    Fat,
}

impl MacroField {
    /// All fields in write order
    pub const ALL: [MacroField; 4] = [
        MacroField::Calories,
        MacroField::Protein,
        MacroField::Carbs,
        MacroField::Fat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MacroField::Calories => "calories",
            MacroField::Protein => "protein",
            MacroField::Carbs => "carbs",
            MacroField::Fat => "fat",
        }
    }

    /// Unit the value is expressed in
    pub fn unit(&self) -> &'static str {
        match self {
            MacroField::Calories => "kcal",
            MacroField::Protein | MacroField::Carbs | MacroField::Fat => "g",
        }
    }
}

impl Display for MacroField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-side nutrition totals for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub date: NaiveDate,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl NutritionTotals {
    /// Returns the value of a single field
    pub fn get(&self, field: MacroField) -> Option<f64> {
        match field {
            MacroField::Calories => self.calories,
            MacroField::Protein => self.protein,
            MacroField::Carbs => self.carbs,
            MacroField::Fat => self.fat,
        }
    }

    /// Splits the fields into those worth writing and those to skip
    ///
    /// A field is writable only when it is present, finite and strictly positive.
    pub fn partition(&self) -> (Vec<(MacroField, f64)>, Vec<MacroField>) {
        let mut writable = Vec::new();
        let mut skipped = Vec::new();
        for field in MacroField::ALL {
            match self.get(field) {
                Some(value) if value.is_finite() && value > 0.0 => writable.push((field, value)),
                _ => skipped.push(field),
            }
        }
        (writable, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(calories: Option<f64>, protein: Option<f64>, carbs: Option<f64>, fat: Option<f64>) -> NutritionTotals {
        NutritionTotals {
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            calories,
            protein,
            carbs,
            fat,
        }
    }

    #[test]
    fn test_partition_skips_zero_negative_absent_nan() {
        let (writable, skipped) =
            totals(Some(1800.0), Some(0.0), None, Some(f64::NAN)).partition();
        assert_eq!(writable, vec![(MacroField::Calories, 1800.0)]);
        assert_eq!(
            skipped,
            vec![MacroField::Protein, MacroField::Carbs, MacroField::Fat]
        );

        let (writable, _) = totals(Some(-5.0), None, None, None).partition();
        assert!(writable.is_empty());
    }

    #[test]
    fn test_units() {
        assert_eq!(MacroField::Calories.unit(), "kcal");
        assert_eq!(MacroField::Fat.unit(), "g");
    }
}
