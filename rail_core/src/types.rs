//! Core domain types for the daily rail engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Check-ins and the long-lived user baseline (constraints)
//! - Content items (resets, movement, nutrition) and the versioned library
//! - Derived scores, profiles and plan focus
//! - Day state, week seeds and the final day contract
//!
//! Input-facing types (`CheckIn`, `Constraints`) deserialize through the
//! defensive normalizers in [`crate::normalize`], so any JSON shape yields a
//! valid value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Check-in
// ============================================================================

pub const DEFAULT_STRESS: u8 = 5;
pub const DEFAULT_SLEEP_QUALITY: u8 = 6;
pub const DEFAULT_ENERGY: u8 = 6;
pub const DEFAULT_TIME_AVAILABLE_MIN: u8 = 10;

pub const SCALE_MIN: u8 = 1;
pub const SCALE_MAX: u8 = 10;
pub const TIME_AVAILABLE_MIN_FLOOR: u8 = 5;
pub const TIME_AVAILABLE_MIN_CEILING: u8 = 60;

/// Safety flags attached to a check-in
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyFlags {
    #[serde(default)]
    pub panic: bool,
}

/// A self-reported daily check-in, already clamped into range.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "serde_json::Value")]
pub struct CheckIn {
    pub stress: u8,
    pub sleep_quality: u8,
    pub energy: u8,
    pub time_available_min: u8,
    pub safety: SafetyFlags,
}

impl CheckIn {
    /// Build a check-in, clamping every field into its declared range
    pub fn new(stress: i64, sleep_quality: i64, energy: i64, time_available_min: i64) -> Self {
        Self {
            stress: clamp_u8(stress, SCALE_MIN, SCALE_MAX),
            sleep_quality: clamp_u8(sleep_quality, SCALE_MIN, SCALE_MAX),
            energy: clamp_u8(energy, SCALE_MIN, SCALE_MAX),
            time_available_min: clamp_u8(
                time_available_min,
                TIME_AVAILABLE_MIN_FLOOR,
                TIME_AVAILABLE_MIN_CEILING,
            ),
            safety: SafetyFlags::default(),
        }
    }

    pub fn with_panic(mut self, panic: bool) -> Self {
        self.safety.panic = panic;
        self
    }

    /// Compact signature used as a selector seed component
    pub fn signature(&self) -> String {
        format!(
            "s{}-q{}-e{}-t{}-p{}",
            self.stress,
            self.sleep_quality,
            self.energy,
            self.time_available_min,
            u8::from(self.safety.panic)
        )
    }
}

impl Default for CheckIn {
    fn default() -> Self {
        Self::new(
            DEFAULT_STRESS.into(),
            DEFAULT_SLEEP_QUALITY.into(),
            DEFAULT_ENERGY.into(),
            DEFAULT_TIME_AVAILABLE_MIN.into(),
        )
    }
}

pub(crate) fn clamp_u8(value: i64, min: u8, max: u8) -> u8 {
    // Bounds are u8 so the clamped value always fits
    value.clamp(i64::from(min), i64::from(max)) as u8
}

// ============================================================================
// Baseline constraints
// ============================================================================

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Injuries {
    pub knee: bool,
    pub shoulder: bool,
    pub back: bool,
    pub neck: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Equipment {
    pub none: bool,
    pub dumbbells: bool,
    pub bands: bool,
    pub gym: bool,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            none: true,
            dumbbells: false,
            bands: false,
            gym: false,
        }
    }
}

/// Preferred time of day for resets
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Midday,
    Evening,
    #[default]
    Any,
}

impl TimeOfDay {
    pub const TAGGED: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Midday, TimeOfDay::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Midday => "midday",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Any => "any",
        }
    }

    /// Lenient parse: anything unrecognised is `Any`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "morning" | "am" => TimeOfDay::Morning,
            "midday" | "noon" | "afternoon" => TimeOfDay::Midday,
            "evening" | "night" | "pm" => TimeOfDay::Evening,
            _ => TimeOfDay::Any,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DietPrefs {
    pub avoid_tags: Vec<String>,
}

/// Long-lived user baseline: injuries, equipment, preferences
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "serde_json::Value")]
pub struct Constraints {
    pub injuries: Injuries,
    pub equipment: Equipment,
    pub time_of_day_preference: TimeOfDay,
    pub diet: DietPrefs,
}

impl Constraints {
    /// Contraindication tags for every active injury
    pub fn active_injury_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.injuries.knee {
            tags.push("injury:knee");
        }
        if self.injuries.shoulder {
            tags.push("injury:shoulder");
        }
        if self.injuries.back {
            tags.push("injury:back");
        }
        if self.injuries.neck {
            tags.push("injury:neck");
        }
        tags
    }

    /// Equipment tags the user can satisfy. A gym covers everything.
    pub fn available_equipment_tags(&self) -> Vec<&'static str> {
        let mut tags = Vec::new();
        if self.equipment.gym {
            return vec!["eq:bands", "eq:dumbbells", "eq:gym"];
        }
        if self.equipment.bands {
            tags.push("eq:bands");
        }
        if self.equipment.dumbbells {
            tags.push("eq:dumbbells");
        }
        tags
    }
}

// ============================================================================
// Content library
// ============================================================================

/// Kind of content item
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Reset,
    Movement,
    Nutrition,
}

/// Shared read access to any content item
pub trait ContentItem {
    const KIND: ContentKind;

    fn id(&self) -> &str;
    fn tags(&self) -> &[String];
    fn contra_tags(&self) -> &[String];
    fn novelty_group(&self) -> Option<&str>;

    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    fn has_any_tag(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }
}

/// A short breathing/relaxation activity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResetItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contra_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty_group: Option<String>,
    pub duration_sec: u32,
}

/// A movement activity with a 1..=5 intensity
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MovementItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contra_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty_group: Option<String>,
    pub duration_min: u32,
    #[serde(default = "default_intensity")]
    pub intensity: u8,
}

fn default_intensity() -> u8 {
    1
}

/// A nutrition tip
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NutritionItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contra_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty_group: Option<String>,
}

macro_rules! impl_content_item {
    ($ty:ty, $kind:expr) => {
        impl ContentItem for $ty {
            const KIND: ContentKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn tags(&self) -> &[String] {
                &self.tags
            }

            fn contra_tags(&self) -> &[String] {
                &self.contra_tags
            }

            fn novelty_group(&self) -> Option<&str> {
                self.novelty_group.as_deref()
            }
        }
    };
}

impl_content_item!(ResetItem, ContentKind::Reset);
impl_content_item!(MovementItem, ContentKind::Movement);
impl_content_item!(NutritionItem, ContentKind::Nutrition);

/// A versioned content library snapshot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub version: String,
    #[serde(default)]
    pub resets: Vec<ResetItem>,
    #[serde(default)]
    pub movement: Vec<MovementItem>,
    #[serde(default)]
    pub nutrition: Vec<NutritionItem>,
}

// ============================================================================
// Derived values
// ============================================================================

/// Load and capacity scores, both 0..=100
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    pub load: u8,
    pub capacity: u8,
}

/// Mutually exclusive daily profile
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Profile {
    #[serde(rename = "Poor Sleep")]
    PoorSleep,
    #[serde(rename = "Depleted/Burned Out")]
    Depleted,
    #[serde(rename = "Wired/Overstimulated")]
    Wired,
    #[serde(rename = "Restless/Anxious")]
    Restless,
    #[serde(rename = "Balanced")]
    Balanced,
}

impl Profile {
    /// Classification priority order
    pub const ALL: [Profile; 5] = [
        Profile::PoorSleep,
        Profile::Depleted,
        Profile::Wired,
        Profile::Restless,
        Profile::Balanced,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Profile::PoorSleep => "Poor Sleep",
            Profile::Depleted => "Depleted/Burned Out",
            Profile::Wired => "Wired/Overstimulated",
            Profile::Restless => "Restless/Anxious",
            Profile::Balanced => "Balanced",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == label)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Overall direction of the day's plan
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Focus {
    Downshift,
    Steady,
    Build,
}

impl Focus {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::PoorSleep | Profile::Depleted => Focus::Downshift,
            Profile::Wired | Profile::Restless => Focus::Steady,
            Profile::Balanced => Focus::Build,
        }
    }
}

// ============================================================================
// Signals and feedback
// ============================================================================

/// One-tap hint that nudges today's plan
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuickSignal {
    Stressed,
    Exhausted,
    TenMinutes,
    MoreEnergy,
}

impl QuickSignal {
    pub const ALL: [QuickSignal; 4] = [
        QuickSignal::Stressed,
        QuickSignal::Exhausted,
        QuickSignal::TenMinutes,
        QuickSignal::MoreEnergy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuickSignal::Stressed => "stressed",
            QuickSignal::Exhausted => "exhausted",
            QuickSignal::TenMinutes => "ten_minutes",
            QuickSignal::MoreEnergy => "more_energy",
        }
    }
}

impl FromStr for QuickSignal {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sig| sig.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| crate::Error::Other(format!("Unknown quick signal: {}", s)))
    }
}

/// How yesterday's plan felt
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    TooHard,
    TooEasy,
    JustRight,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::TooHard => "too_hard",
            Feedback::TooEasy => "too_easy",
            Feedback::JustRight => "just_right",
        }
    }
}

impl FromStr for Feedback {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "too_hard" | "hard" => Ok(Feedback::TooHard),
            "too_easy" | "easy" => Ok(Feedback::TooEasy),
            "just_right" | "ok" => Ok(Feedback::JustRight),
            other => Err(crate::Error::Other(format!("Unknown feedback: {}", other))),
        }
    }
}

// ============================================================================
// Day state and week seed
// ============================================================================

/// What was selected for a user on a given date
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayState {
    #[serde(default)]
    pub reset_id: Option<String>,
    #[serde(default)]
    pub movement_id: Option<String>,
    #[serde(default)]
    pub nutrition_id: Option<String>,
    #[serde(default)]
    pub last_quick_signal: Option<QuickSignal>,
}

/// Precomputed picks for one date of a week seed
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekSeedEntry {
    #[serde(default)]
    pub reset_id: Option<String>,
    #[serde(default)]
    pub movement_id: Option<String>,
    #[serde(default)]
    pub nutrition_id: Option<String>,
}

/// Seven days of precomputed picks, keyed by date key
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekSeed {
    pub start_date: String,
    pub days: BTreeMap<String, WeekSeedEntry>,
}

impl WeekSeed {
    pub fn entry(&self, date_key: &str) -> Option<&WeekSeedEntry> {
        self.days.get(date_key)
    }
}

// ============================================================================
// Selection and contract
// ============================================================================

/// The three picks that make up a day's plan
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub reset: Option<ResetItem>,
    pub movement: Option<MovementItem>,
    pub nutrition: Option<NutritionItem>,
}

impl Selection {
    pub fn reset_id(&self) -> Option<&str> {
        self.reset.as_ref().map(|r| r.id.as_str())
    }

    pub fn movement_id(&self) -> Option<&str> {
        self.movement.as_ref().map(|m| m.id.as_str())
    }

    pub fn nutrition_id(&self) -> Option<&str> {
        self.nutrition.as_ref().map(|n| n.id.as_str())
    }
}

/// Audit and caching metadata for a contract
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractMeta {
    pub input_hash: String,
    pub completed: bool,
    pub applied_rules: Vec<String>,
    pub lib_version: String,
}

/// The engine's output for one user and date
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayContract {
    pub date_key: String,
    pub profile: Profile,
    pub scores: Scores,
    pub focus: Focus,
    pub panic_mode: bool,
    pub reset: Option<ResetItem>,
    pub movement: Option<MovementItem>,
    pub nutrition: Option<NutritionItem>,
    pub rationale: Vec<String>,
    pub meta: ContractMeta,
}

impl DayContract {
    /// The selection carried by this contract
    pub fn selection(&self) -> Selection {
        Selection {
            reset: self.reset.clone(),
            movement: self.movement.clone(),
            nutrition: self.nutrition.clone(),
        }
    }

    /// Day state the persistence layer should write back
    pub fn day_state(&self, last_quick_signal: Option<QuickSignal>) -> DayState {
        DayState {
            reset_id: self.reset.as_ref().map(|r| r.id.clone()),
            movement_id: self.movement.as_ref().map(|m| m.id.clone()),
            nutrition_id: self.nutrition.as_ref().map(|n| n.id.clone()),
            last_quick_signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_in_new_clamps() {
        let c = CheckIn::new(42, -3, 0, 500);
        assert_eq!(c.stress, 10);
        assert_eq!(c.sleep_quality, 1);
        assert_eq!(c.energy, 1);
        assert_eq!(c.time_available_min, 60);
        assert!(!c.safety.panic);
    }

    #[test]
    fn test_check_in_signature() {
        let c = CheckIn::new(5, 6, 7, 10).with_panic(true);
        assert_eq!(c.signature(), "s5-q6-e7-t10-p1");
    }

    #[test]
    fn test_profile_labels_roundtrip() {
        for p in Profile::ALL {
            assert_eq!(Profile::from_label(p.label()), Some(p));
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.label()));
        }
    }

    #[test]
    fn test_gym_grants_all_equipment() {
        let mut c = Constraints::default();
        c.equipment.gym = true;
        c.equipment.none = false;
        assert_eq!(
            c.available_equipment_tags(),
            vec!["eq:bands", "eq:dumbbells", "eq:gym"]
        );
    }

    #[test]
    fn test_quick_signal_parse() {
        assert_eq!("ten_minutes".parse::<QuickSignal>().unwrap(), QuickSignal::TenMinutes);
        assert_eq!(" Stressed ".parse::<QuickSignal>().unwrap(), QuickSignal::Stressed);
        assert!("sleepy".parse::<QuickSignal>().is_err());
    }

    #[test]
    fn test_day_state_from_contract() {
        let contract = DayContract {
            date_key: "2024-03-01".into(),
            profile: Profile::Balanced,
            scores: Scores { load: 40, capacity: 60 },
            focus: Focus::Build,
            panic_mode: false,
            reset: Some(ResetItem {
                id: "r1".into(),
                title: "Box breathing".into(),
                tags: vec![],
                contra_tags: vec![],
                novelty_group: None,
                duration_sec: 120,
            }),
            movement: None,
            nutrition: None,
            rationale: vec![],
            meta: ContractMeta {
                input_hash: String::new(),
                completed: false,
                applied_rules: vec![],
                lib_version: "v1".into(),
            },
        };

        let state = contract.day_state(Some(QuickSignal::Exhausted));
        assert_eq!(state.reset_id.as_deref(), Some("r1"));
        assert_eq!(state.movement_id, None);
        assert_eq!(state.last_quick_signal, Some(QuickSignal::Exhausted));
    }
}
