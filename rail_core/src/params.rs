//! Engine parameters and per-request overrides.
//!
//! `EngineParams` holds every threshold the decision pipeline uses. Deployments
//! set them in the `[engine]` section of the config file; cohort or experiment
//! assignment (owned by a collaborator) may layer `ParamOverrides` on top for a
//! single request.

use crate::profile::ProfileThresholds;
use crate::Profile;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for the decision pipeline
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineParams {
    pub profile: ProfileThresholds,

    /// Days of selection history checked for repeated novelty groups
    pub novelty_days: u32,

    /// Longest reset allowed on a normal day
    pub reset_max_sec: u32,
    /// Longest reset allowed when the user has `short_time_max_min` or less
    pub reset_short_max_sec: u32,
    pub short_time_max_min: u8,

    /// Below this capacity movement is restricted to light/downshift items
    pub low_capacity: u8,

    pub busy_day_max_min: u8,

    pub bad_day_min_stress: u8,
    pub bad_day_max_energy: u8,
    pub bad_day_max_sleep: u8,
    pub bad_day_intensity_cap: u8,

    pub poor_sleep_intensity_cap: u8,
    pub wired_intensity_cap: u8,
    pub depleted_intensity_cap: u8,

    pub recovery_debt_max_sleep: u8,
    pub recovery_debt_min_load: u8,

    pub more_energy_min_capacity: u8,
    pub ten_minutes_reset_max_sec: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            profile: ProfileThresholds::default(),
            novelty_days: 2,
            reset_max_sec: 300,
            reset_short_max_sec: 180,
            short_time_max_min: 5,
            low_capacity: 40,
            busy_day_max_min: 5,
            bad_day_min_stress: 8,
            bad_day_max_energy: 3,
            bad_day_max_sleep: 3,
            bad_day_intensity_cap: 2,
            poor_sleep_intensity_cap: 2,
            wired_intensity_cap: 3,
            depleted_intensity_cap: 2,
            recovery_debt_max_sleep: 5,
            recovery_debt_min_load: 60,
            more_energy_min_capacity: 70,
            ten_minutes_reset_max_sec: 180,
        }
    }
}

/// Preferred content ids supplied by an experiment arm
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentPack {
    pub name: String,
    pub reset_ids: Vec<String>,
    pub nutrition_ids: Vec<String>,
}

/// Per-request parameter overrides from cohort or experiment assignment
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamOverrides {
    pub high_load: Option<u8>,
    pub hysteresis_band: Option<u8>,
    pub novelty_days: Option<u32>,
    pub busy_day_max_min: Option<u8>,
    pub more_energy_min_capacity: Option<u8>,
    pub reset_max_sec: Option<u32>,

    pub force_profile: Option<Profile>,
    pub reset_focus_tag: Option<String>,
    pub force_bad_day: bool,
    pub experiment_pack: Option<ExperimentPack>,

    /// Rule names reported by the collaborator alongside the engine's own
    pub extra_applied_rules: Vec<String>,
}

impl ParamOverrides {
    /// True when any numeric threshold is overridden
    pub fn overrides_thresholds(&self) -> bool {
        self.high_load.is_some()
            || self.hysteresis_band.is_some()
            || self.novelty_days.is_some()
            || self.busy_day_max_min.is_some()
            || self.more_energy_min_capacity.is_some()
            || self.reset_max_sec.is_some()
    }

    /// Layer the numeric overrides on top of base parameters
    pub fn apply(&self, base: &EngineParams) -> EngineParams {
        let mut params = base.clone();
        if let Some(v) = self.high_load {
            params.profile.high_load = v.min(100);
        }
        if let Some(v) = self.hysteresis_band {
            params.profile.hysteresis_band = v.min(50);
        }
        if let Some(v) = self.novelty_days {
            params.novelty_days = v;
        }
        if let Some(v) = self.busy_day_max_min {
            params.busy_day_max_min = v;
        }
        if let Some(v) = self.more_energy_min_capacity {
            params.more_energy_min_capacity = v.min(100);
        }
        if let Some(v) = self.reset_max_sec {
            params.reset_max_sec = v;
        }
        params
    }
}
