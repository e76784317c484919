//! Profile classification with hysteresis.
//!
//! Classification checks, first match wins:
//! 1. Poor Sleep: sleep at or below the poor-sleep ceiling and high load
//! 2. Depleted/Burned Out: high load and low capacity
//! 3. Wired/Overstimulated: high load and capacity above the depleted ceiling
//! 4. Restless/Anxious: elevated load, limited capacity, low energy
//! 5. Balanced
//!
//! The order matters for overlapping bands and must not change.
//!
//! When a prior profile is supplied and the fresh label differs, the prior
//! label is kept if the scores still fall within `hysteresis_band` points of
//! its thresholds and the fresh label would not survive the same band.

use crate::Profile;
use serde::{Deserialize, Serialize};

/// Deployment-configurable classification thresholds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileThresholds {
    pub poor_sleep_max_sleep: u8,
    pub high_load: u8,
    pub depleted_max_capacity: u8,
    pub restless_min_load: u8,
    pub restless_max_capacity: u8,
    pub restless_max_energy: u8,
    /// Score points of tolerance around thresholds for keeping a prior profile.
    /// Zero disables stickiness.
    pub hysteresis_band: u8,
}

impl Default for ProfileThresholds {
    fn default() -> Self {
        Self {
            poor_sleep_max_sleep: 4,
            high_load: 70,
            depleted_max_capacity: 40,
            restless_min_load: 50,
            restless_max_capacity: 50,
            restless_max_energy: 5,
            hysteresis_band: 5,
        }
    }
}

/// Inputs to the classifier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileInput {
    pub load: u8,
    pub capacity: u8,
    pub sleep: u8,
    pub energy: u8,
    pub prior_profile: Option<Profile>,
}

/// Classification result with human-readable drivers for the rationale
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileAssessment {
    pub profile: Profile,
    pub drivers: Vec<String>,
    /// True when the prior profile was kept over a fresh classification
    pub sticky: bool,
}

/// Classify with default thresholds
pub fn assign_profile(input: &ProfileInput) -> Profile {
    assign_stress_profile(input, &ProfileThresholds::default()).profile
}

/// Classify with explicit thresholds and explain the result
pub fn assign_stress_profile(
    input: &ProfileInput,
    thresholds: &ProfileThresholds,
) -> ProfileAssessment {
    let fresh = classify(input, thresholds);
    let band = i32::from(thresholds.hysteresis_band);

    if let Some(prior) = input.prior_profile {
        if prior != fresh
            && band > 0
            && matches(prior, input, thresholds, band)
            && !matches(fresh, input, thresholds, -band)
        {
            tracing::info!(
                "Keeping prior profile {} over fresh {} (within {} point band)",
                prior,
                fresh,
                band
            );
            let mut drivers = drivers_for(prior, input, thresholds);
            drivers.push(format!(
                "Kept yesterday's profile ({}) because today's scores are within {} points of its thresholds",
                prior, band
            ));
            return ProfileAssessment {
                profile: prior,
                drivers,
                sticky: true,
            };
        }
    }

    tracing::debug!(
        "Classified load={} capacity={} sleep={} energy={} as {}",
        input.load,
        input.capacity,
        input.sleep,
        input.energy,
        fresh
    );

    ProfileAssessment {
        profile: fresh,
        drivers: drivers_for(fresh, input, thresholds),
        sticky: false,
    }
}

/// Strict first-match classification
fn classify(input: &ProfileInput, t: &ProfileThresholds) -> Profile {
    Profile::ALL
        .into_iter()
        .find(|p| *p != Profile::Balanced && matches(*p, input, t, 0))
        .unwrap_or(Profile::Balanced)
}

/// Whether a profile's conditions hold with score thresholds shifted by `margin`.
///
/// Positive margins relax the score thresholds, negative margins tighten them.
/// Raw sleep and energy thresholds never move. Balanced matches when no other
/// profile matches under the opposite margin.
fn matches(profile: Profile, input: &ProfileInput, t: &ProfileThresholds, margin: i32) -> bool {
    let load = i32::from(input.load);
    let capacity = i32::from(input.capacity);
    let high_load = i32::from(t.high_load) - margin;
    let depleted_cap = i32::from(t.depleted_max_capacity);

    match profile {
        Profile::PoorSleep => input.sleep <= t.poor_sleep_max_sleep && load >= high_load,
        Profile::Depleted => load >= high_load && capacity <= depleted_cap + margin,
        Profile::Wired => load >= high_load && capacity > depleted_cap - margin,
        Profile::Restless => {
            load >= i32::from(t.restless_min_load) - margin
                && capacity <= i32::from(t.restless_max_capacity) + margin
                && input.energy <= t.restless_max_energy
        }
        Profile::Balanced => Profile::ALL
            .into_iter()
            .filter(|p| *p != Profile::Balanced)
            .all(|p| !matches(p, input, t, -margin)),
    }
}

fn drivers_for(profile: Profile, input: &ProfileInput, t: &ProfileThresholds) -> Vec<String> {
    let high_load = format!(
        "Load {} is at or above {}",
        input.load, t.high_load
    );
    match profile {
        Profile::PoorSleep => vec![
            format!(
                "Sleep quality {}/10 is at or below {}",
                input.sleep, t.poor_sleep_max_sleep
            ),
            high_load,
        ],
        Profile::Depleted => vec![
            high_load,
            format!(
                "Capacity {} is at or below {}",
                input.capacity, t.depleted_max_capacity
            ),
        ],
        Profile::Wired => vec![
            high_load,
            format!(
                "Capacity {} is above {}, so there is energy but it is running hot",
                input.capacity, t.depleted_max_capacity
            ),
        ],
        Profile::Restless => vec![
            format!("Load {} is at or above {}", input.load, t.restless_min_load),
            format!(
                "Capacity {} is at or below {}",
                input.capacity, t.restless_max_capacity
            ),
            format!(
                "Energy {}/10 is at or below {}",
                input.energy, t.restless_max_energy
            ),
        ],
        Profile::Balanced => vec![format!(
            "Load {} and capacity {} sit inside the balanced range",
            input.load, input.capacity
        )],
    }
}
