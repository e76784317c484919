//! Week seed generation.
//!
//! A week seed fixes a reset, movement and nutrition pick for seven
//! consecutive dates so the plan has a stable fallback before the first
//! check-in of each day. Picks use constraint-only pools with a neutral
//! check-in and the Balanced profile.

use crate::filter::{self, FilterContext};
use crate::library::LibraryIndex;
use crate::params::EngineParams;
use crate::scoring::compute_load_capacity;
use crate::selector::{pick, seed_string, SeedParts};
use crate::types::*;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

pub const WEEK_DAYS: i64 = 7;

/// Parse a `YYYY-MM-DD` date key
pub fn parse_date_key(date_key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_key.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Other(format!("Invalid date key '{}': {}", date_key, e)))
}

/// Generate seven days of picks starting at `start_date`
pub fn generate_week_seed(
    user_id: &str,
    start_date: NaiveDate,
    constraints: &Constraints,
    index: &LibraryIndex,
    params: &EngineParams,
) -> WeekSeed {
    let check_in = CheckIn::default();
    let scores = compute_load_capacity(&check_in);
    let signature = check_in.signature();

    let pools = filter::constraint_pools(
        index,
        &FilterContext {
            constraints,
            time_available_min: check_in.time_available_min,
            capacity: scores.capacity,
            profile: Profile::Balanced,
            recent_novelty_groups: &[],
            params,
        },
    );

    let mut days = BTreeMap::new();
    for offset in 0..WEEK_DAYS {
        let date_key = (start_date + Duration::days(offset))
            .format("%Y-%m-%d")
            .to_string();
        let seed = format!(
            "week|{}",
            seed_string(&SeedParts {
                user_id,
                date_key: &date_key,
                profile: Profile::Balanced,
                last_quick_signal: None,
                lib_version: index.version(),
                check_in_signature: &signature,
            })
        );

        let entry = WeekSeedEntry {
            reset_id: pick(&pools.resets, &seed).map(|r| r.id.clone()),
            movement_id: pick(&pools.movement, &seed).map(|m| m.id.clone()),
            nutrition_id: pick(&pools.nutrition, &seed).map(|n| n.id.clone()),
        };
        days.insert(date_key, entry);
    }

    let start = start_date.format("%Y-%m-%d").to_string();
    tracing::info!("Generated week seed for {} starting {}", user_id, start);

    WeekSeed {
        start_date: start,
        days,
    }
}
