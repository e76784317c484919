//! Load and capacity scoring.
//!
//! Both scores are averages of three 0..=10 components scaled to 0..=100:
//! - load: stress, sleep deficit, energy deficit
//! - capacity: energy, sleep, available time (60 minutes counts as a full 10)

use crate::{CheckIn, Scores};

const SCORE_MAX: f64 = 100.0;
const FULL_TIME_MIN: f64 = 60.0;

/// Scale a 0..=10 average onto 0..=100, rounding to the nearest point
fn round10(x: f64) -> u8 {
    (x * 10.0).round().clamp(0.0, SCORE_MAX) as u8
}

/// Compute load and capacity for a check-in. Total over all inputs.
pub fn compute_load_capacity(check_in: &CheckIn) -> Scores {
    let stress = f64::from(check_in.stress);
    let sleep = f64::from(check_in.sleep_quality);
    let energy = f64::from(check_in.energy);
    let time_min = f64::from(check_in.time_available_min);

    let load = round10((stress + (10.0 - sleep) + (10.0 - energy)) / 3.0);
    let capacity = round10((energy + sleep + (time_min / FULL_TIME_MIN * 10.0)) / 3.0);

    tracing::debug!(
        "Scored check-in {}: load={} capacity={}",
        check_in.signature(),
        load,
        capacity
    );

    Scores { load, capacity }
}
