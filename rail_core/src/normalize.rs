//! Defensive normalization of collaborator-supplied JSON.
//!
//! Check-ins and baselines arrive as loosely validated JSON. Nothing here
//! returns an error: missing, non-numeric or out-of-range values degrade to
//! safe defaults. Both camelCase and snake_case keys are accepted.

use crate::types::*;
use serde_json::Value;

/// Look up a field by any of its accepted spellings
fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    names.iter().find_map(|n| obj.get(*n)).filter(|v| !v.is_null())
}

/// Read a finite number, accepting numeric strings
fn read_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn read_scaled(value: Option<&Value>, default: u8, min: u8, max: u8) -> u8 {
    match read_number(value) {
        Some(n) => n.round().clamp(f64::from(min), f64::from(max)) as u8,
        None => default,
    }
}

/// Only a literal `true` (or "true") counts as set
fn read_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Normalize an arbitrary JSON value into a check-in
pub fn check_in_from_value(value: &Value) -> CheckIn {
    let panic = field(value, &["safety"])
        .and_then(|s| field(s, &["panic"]))
        .map(|p| read_flag(Some(p)))
        .unwrap_or(false)
        || read_flag(field(value, &["panic", "panicMode", "panic_mode"]));

    CheckIn {
        stress: read_scaled(
            field(value, &["stress"]),
            DEFAULT_STRESS,
            SCALE_MIN,
            SCALE_MAX,
        ),
        sleep_quality: read_scaled(
            field(value, &["sleepQuality", "sleep_quality", "sleep"]),
            DEFAULT_SLEEP_QUALITY,
            SCALE_MIN,
            SCALE_MAX,
        ),
        energy: read_scaled(
            field(value, &["energy"]),
            DEFAULT_ENERGY,
            SCALE_MIN,
            SCALE_MAX,
        ),
        time_available_min: read_scaled(
            field(
                value,
                &["timeAvailableMin", "time_available_min", "timeMin", "time_min"],
            ),
            DEFAULT_TIME_AVAILABLE_MIN,
            TIME_AVAILABLE_MIN_FLOOR,
            TIME_AVAILABLE_MIN_CEILING,
        ),
        safety: SafetyFlags { panic },
    }
}

impl From<Value> for CheckIn {
    fn from(value: Value) -> Self {
        check_in_from_value(&value)
    }
}

/// Normalize an arbitrary JSON value into baseline constraints
pub fn constraints_from_value(value: &Value) -> Constraints {
    let injuries = field(value, &["injuries"])
        .map(|inj| Injuries {
            knee: read_flag(field(inj, &["knee"])),
            shoulder: read_flag(field(inj, &["shoulder"])),
            back: read_flag(field(inj, &["back"])),
            neck: read_flag(field(inj, &["neck"])),
        })
        .unwrap_or_default();

    let mut equipment = field(value, &["equipment"])
        .map(|eq| Equipment {
            none: read_flag(field(eq, &["none"])),
            dumbbells: read_flag(field(eq, &["dumbbells"])),
            bands: read_flag(field(eq, &["bands"])),
            gym: read_flag(field(eq, &["gym"])),
        })
        .unwrap_or_default();
    equipment.none = !(equipment.dumbbells || equipment.bands || equipment.gym);

    let time_of_day_preference = field(value, &["timeOfDayPreference", "time_of_day_preference"])
        .and_then(Value::as_str)
        .map(TimeOfDay::parse_lenient)
        .unwrap_or_default();

    let avoid_tags = field(value, &["diet"])
        .and_then(|d| field(d, &["avoidTags", "avoid_tags"]))
        .and_then(Value::as_array)
        .map(|tags| normalize_tags(tags.iter().filter_map(Value::as_str)))
        .unwrap_or_default();

    Constraints {
        injuries,
        equipment,
        time_of_day_preference,
        diet: DietPrefs { avoid_tags },
    }
}

impl From<Value> for Constraints {
    fn from(value: Value) -> Self {
        constraints_from_value(&value)
    }
}

/// Trim, lowercase, drop empties, sort and dedupe
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
