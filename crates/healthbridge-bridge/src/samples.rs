//! Sample normalization
//!
//! Native libraries disagree on almost everything about a sample: the field
//! holding the number, whether it is nested, how the timestamp is spelled and
//! which energy unit is used. This module turns any of those shapes into a
//! finite number and an optional instant.
//!
//! ## Extraction order
//!
//! 1. Direct numeric fields, in priority order
//! 2. Nested fields, in priority order
//! 3. Nothing found: the sample contributes 0
//!
//! Numeric strings are accepted; `NaN` and infinities never are.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

// ============================================================================
// DayWindow
// ============================================================================

/// A local calendar day expressed as a closed UTC interval
///
/// `start` is local midnight; `end` is the next local midnight minus 1 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window for `date` in the device's local time zone
    pub fn local(date: NaiveDate) -> Self {
        Self::in_zone(date, &Local)
    }

    /// Window for `date` in an arbitrary time zone
    pub fn in_zone<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let start = start_of_day(date, tz);
        let next = date.succ_opt().map_or(start + Duration::days(1), |next| start_of_day(next, tz));
        Self {
            date,
            start,
            end: next - Duration::milliseconds(1),
        }
    }

    /// Returns true if `instant` falls inside the window (both ends inclusive)
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// First instant of `date` in `tz`
///
/// Zones that skip midnight on a DST change start the day at the earliest
/// valid local time after it.
fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut probe = midnight;
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt.with_timezone(&Utc);
        }
        probe += Duration::minutes(30);
    }
    tz.from_utc_datetime(&midnight).with_timezone(&Utc)
}

// ============================================================================
// Numeric extraction
// ============================================================================

/// Direct fields holding a step count, in priority order
pub const STEP_FIELDS: &[&str] = &["value", "count", "steps", "quantity", "sum", "total"];

/// Nested paths holding a step count, in priority order
pub const STEP_NESTED_PATHS: &[&[&str]] = &[
    &["quantity", "value"],
    &["sumQuantity", "value"],
    &["value", "value"],
    &["count", "value"],
    &["data", "value"],
];

/// Direct fields holding an energy value, in priority order
pub const ENERGY_FIELDS: &[&str] = &[
    "value",
    "quantity",
    "activeCalories",
    "kilocalories",
    "calories",
    "energy",
];

/// Nested paths holding an energy value, in priority order
pub const ENERGY_NESTED_PATHS: &[&[&str]] = &[
    &["quantity", "value"],
    &["sumQuantity", "value"],
    &["value", "value"],
    &["data", "value"],
];

/// Fields that may carry a unit label
const UNIT_FIELDS: &[&str] = &["unit", "units", "unitName"];

/// Fields that may carry the sample's start instant, in priority order
const TIMESTAMP_FIELDS: &[&str] = &["startDate", "startTime", "start", "date", "timestamp", "time"];

/// Interprets a JSON value as a finite number
fn as_finite(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn lookup<'a>(sample: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(sample, |current, key| current.get(key))
}

/// Returns the first finite number found in `sample`
///
/// A bare number (or numeric string) is itself a valid sample.
pub fn extract_number(sample: &Value, direct: &[&str], nested: &[&[&str]]) -> Option<f64> {
    locate_number(sample, direct, nested).map(|(number, _)| number)
}

/// Like [`extract_number`], also returning the object that held the number
///
/// For a nested path this is the object one level above the number, so a
/// unit stored next to it can be found.
fn locate_number<'a>(
    sample: &'a Value,
    direct: &[&str],
    nested: &[&[&str]],
) -> Option<(f64, &'a Value)> {
    if let Some(number) = as_finite(sample) {
        return Some((number, sample));
    }
    direct
        .iter()
        .filter_map(|field| sample.get(field))
        .find_map(as_finite)
        .map(|number| (number, sample))
        .or_else(|| {
            nested.iter().find_map(|path| {
                let (last, parents) = path.split_last()?;
                let parent = lookup(sample, parents)?;
                parent.get(last).and_then(as_finite).map(|number| (number, parent))
            })
        })
}

/// Step count carried by a sample, 0 when none can be found
pub fn step_value(sample: &Value) -> f64 {
    extract_number(sample, STEP_FIELDS, STEP_NESTED_PATHS).unwrap_or(0.0)
}

/// Parses an RFC 3339 string or epoch-milliseconds number
fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Start instant of a sample, if it carries a parseable one
pub fn sample_timestamp(sample: &Value) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| sample.get(field))
        .find_map(as_instant)
}

// ============================================================================
// Energy normalization
// ============================================================================

/// Converts an energy value to kilocalories
///
/// Unlabeled or unrecognized units are assumed to be kilocalories already.
pub fn to_kilocalories(value: f64, unit: Option<&str>) -> f64 {
    let Some(unit) = unit.map(str::trim) else {
        return value;
    };
    // Food labels write kilocalories as a capitalised "Cal"
    if unit == "Cal" || unit == "Cals" {
        return value;
    }
    match unit.to_ascii_lowercase().as_str() {
        "kcal" | "kcals" | "kilocalorie" | "kilocalories" | "large_calorie" | "largecalorie" => value,
        "cal" | "cals" | "calorie" | "calories" | "small_calorie" | "smallcalorie" => value / 1000.0,
        "kj" | "kilojoule" | "kilojoules" => value / 4.184,
        "j" | "joule" | "joules" => value / 4184.0,
        _ => value,
    }
}

/// Health Connect energy object keys and their units, in priority order
const ENERGY_OBJECT_KEYS: &[(&str, &str)] = &[
    ("inKilocalories", "kcal"),
    ("inCalories", "cal"),
    ("inKilojoules", "kJ"),
    ("inJoules", "J"),
];

fn unit_of(value: &Value) -> Option<&str> {
    UNIT_FIELDS
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(Value::as_str)
}

/// Reads an `{inKilocalories: ..}` or `{value, unit}` energy object
fn energy_object_kcal(energy: &Value) -> Option<f64> {
    if !energy.is_object() {
        return None;
    }
    ENERGY_OBJECT_KEYS
        .iter()
        .find_map(|&(key, unit)| {
            energy
                .get(key)
                .and_then(as_finite)
                .map(|v| to_kilocalories(v, Some(unit)))
        })
        .or_else(|| {
            energy
                .get("value")
                .and_then(as_finite)
                .map(|v| to_kilocalories(v, unit_of(energy)))
        })
}

/// Active energy carried by a sample, in kilocalories; 0 when none is found
pub fn energy_kcal(sample: &Value) -> f64 {
    if let Some(kcal) = sample.get("energy").and_then(energy_object_kcal) {
        return kcal;
    }
    // Flattened Health Connect shape: {inKilocalories: ..} at the top level
    let flattened = ENERGY_OBJECT_KEYS.iter().find_map(|&(key, unit)| {
        sample
            .get(key)
            .and_then(as_finite)
            .map(|v| to_kilocalories(v, Some(unit)))
    });
    if let Some(kcal) = flattened {
        return kcal;
    }
    locate_number(sample, ENERGY_FIELDS, ENERGY_NESTED_PATHS)
        .map(|(v, holder)| to_kilocalories(v, unit_of(holder).or_else(|| unit_of(sample))))
        .unwrap_or(0.0)
}

// ============================================================================
// Aggregation
// ============================================================================

/// Rounds to the nearest integer, never below zero
pub fn round_steps(sum: f64) -> u64 {
    if sum.is_finite() && sum > 0.0 {
        sum.round() as u64
    } else {
        0
    }
}

/// Rounds to one decimal place
pub fn round_one_decimal(sum: f64) -> f64 {
    if sum.is_finite() {
        (sum * 10.0).round() / 10.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_bounds_in_offset_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let window = DayWindow::in_zone(date(2026, 10, 19), &tz);

        assert_eq!(window.start.to_rfc3339(), "2026-10-18T22:00:00+00:00");
        assert_eq!(
            window.end,
            "2026-10-19T21:59:59.999Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(window.end + Duration::milliseconds(1)));
        assert!(!window.contains(window.start - Duration::milliseconds(1)));
    }

    #[test]
    fn test_extract_prefers_direct_fields_in_order() {
        let sample = json!({"count": 10, "value": 12});
        assert_eq!(step_value(&sample), 12.0);

        let sample = json!({"quantity": {"value": 7}});
        assert_eq!(step_value(&sample), 7.0);

        let sample = json!({"steps": "42"});
        assert_eq!(step_value(&sample), 42.0);

        assert_eq!(step_value(&json!(99)), 99.0);
    }

    #[test]
    fn test_extract_skips_non_finite_and_missing() {
        assert_eq!(step_value(&json!({"value": "NaN", "count": 5})), 5.0);
        assert_eq!(step_value(&json!({"value": "inf"})), 0.0);
        assert_eq!(step_value(&json!({"note": "nothing here"})), 0.0);
        assert_eq!(step_value(&json!(null)), 0.0);
    }

    #[test]
    fn test_timestamp_parsing() {
        let sample = json!({"startDate": "2026-10-19T08:00:00+02:00"});
        assert_eq!(
            sample_timestamp(&sample).unwrap().to_rfc3339(),
            "2026-10-19T06:00:00+00:00"
        );

        let sample = json!({"timestamp": 0});
        assert_eq!(sample_timestamp(&sample).unwrap().timestamp(), 0);

        assert!(sample_timestamp(&json!({"startDate": "yesterday"})).is_none());
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(to_kilocalories(250.0, Some("kcal")), 250.0);
        assert_eq!(to_kilocalories(250.0, None), 250.0);
        assert_eq!(to_kilocalories(250_000.0, Some("calories")), 250.0);
        assert_eq!(to_kilocalories(250.0, Some("Cal")), 250.0);
        assert!((to_kilocalories(4.184, Some("kJ")) - 1.0).abs() < 1e-9);
        assert!((to_kilocalories(4184.0, Some("joules")) - 1.0).abs() < 1e-9);
        assert_eq!(to_kilocalories(3.0, Some("furlongs")), 3.0);
    }

    #[test]
    fn test_energy_shapes() {
        // HealthKit-style
        assert_eq!(energy_kcal(&json!({"value": 250, "unit": "kcal"})), 250.0);
        // Health Connect energy object
        assert_eq!(
            energy_kcal(&json!({"energy": {"inKilocalories": 120.5, "inCalories": 120500}})),
            120.5
        );
        assert_eq!(energy_kcal(&json!({"energy": {"inCalories": 5000}})), 5.0);
        // Energy object with explicit unit
        assert!((energy_kcal(&json!({"energy": {"value": 4.184, "unit": "kilojoules"}})) - 1.0).abs() < 1e-9);
        // Unlabeled number
        assert_eq!(energy_kcal(&json!({"calories": 80})), 80.0);
        // Nothing usable
        assert_eq!(energy_kcal(&json!({"energy": {}})), 0.0);
    }

    #[test]
    fn test_joules_and_kcal_aggregate_equally() {
        let joules = energy_kcal(&json!({"value": 4184, "unit": "J"}));
        let kcal = energy_kcal(&json!({"value": 1, "unit": "kcal"}));
        assert_eq!(round_one_decimal(joules), round_one_decimal(kcal));
    }

    #[test]
    fn test_nested_energy_uses_nested_unit() {
        let kcal = energy_kcal(&json!({"value": 1, "unit": "kcal"}));
        let nested = energy_kcal(&json!({"quantity": {"value": 4184, "unit": "J"}}));
        assert_eq!(round_one_decimal(nested), round_one_decimal(kcal));

        let nested = energy_kcal(&json!({"sumQuantity": {"value": 8.368, "unit": "kJ"}}));
        assert!((nested - 2.0).abs() < 1e-9);

        // A nested number without its own unit falls back to the sample's unit
        let nested = energy_kcal(&json!({"data": {"value": 3000}, "unit": "cal"}));
        assert!((nested - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_steps(4499.5), 4500);
        assert_eq!(round_steps(-3.0), 0);
        assert_eq!(round_steps(f64::NAN), 0);
        assert_eq!(round_one_decimal(250.04), 250.0);
        assert_eq!(round_one_decimal(250.06), 250.1);
    }
}
