//! Recent selection history for novelty filtering.
//!
//! Novelty works on groups, not ids: a user who did an easy walk yesterday
//! should not get a brisk walk today either. Groups are read from the stored
//! day states of the `days` dates before the request date.

use crate::library::LibraryIndex;
use crate::types::*;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Novelty groups selected in the `days` dates before `date_key`, sorted and deduplicated
pub fn recent_novelty_groups(
    day_states: &BTreeMap<String, DayState>,
    date_key: &str,
    days: u32,
    index: &LibraryIndex,
) -> Vec<String> {
    let today = match NaiveDate::parse_from_str(date_key, "%Y-%m-%d") {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Cannot read history before '{}': {}", date_key, e);
            return Vec::new();
        }
    };

    let mut groups = Vec::new();
    for offset in 1..=i64::from(days) {
        let key = (today - Duration::days(offset)).format("%Y-%m-%d").to_string();
        let Some(state) = day_states.get(&key) else {
            continue;
        };

        let selection = index.resolve(state);
        groups.extend(
            [
                selection.reset.as_ref().and_then(|r| r.novelty_group()),
                selection.movement.as_ref().and_then(|m| m.novelty_group()),
                selection.nutrition.as_ref().and_then(|n| n.novelty_group()),
            ]
            .into_iter()
            .flatten()
            .map(str::to_string),
        );
    }

    groups.sort();
    groups.dedup();
    tracing::debug!("Recent novelty groups before {}: {:?}", date_key, groups);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::default_library;

    fn state(reset: &str, movement: Option<&str>, nutrition: &str) -> DayState {
        DayState {
            reset_id: Some(reset.into()),
            movement_id: movement.map(Into::into),
            nutrition_id: Some(nutrition.into()),
            last_quick_signal: None,
        }
    }

    #[test]
    fn test_window_covers_previous_days_only() {
        let index = LibraryIndex::new(default_library());
        let mut states = BTreeMap::new();
        states.insert(
            "2024-03-01".to_string(),
            state("reset_body_scan", Some("move_easy_walk"), "nut_water_first"),
        );
        states.insert(
            "2024-02-29".to_string(),
            state("reset_box_breath", None, "nut_warm_oats"),
        );
        states.insert(
            "2024-02-27".to_string(),
            state("reset_daylight", None, "nut_caffeine_cutoff"),
        );

        let groups = recent_novelty_groups(&states, "2024-03-02", 2, &index);
        assert_eq!(
            groups,
            vec!["body_scan", "breath_box", "grains", "hydration", "walk"]
        );

        // Today's own state is not history
        let groups = recent_novelty_groups(&states, "2024-03-01", 1, &index);
        assert_eq!(groups, vec!["breath_box", "grains"]);
    }

    #[test]
    fn test_unknown_ids_and_bad_dates_are_ignored() {
        let index = LibraryIndex::new(default_library());
        let mut states = BTreeMap::new();
        states.insert(
            "2024-03-01".to_string(),
            state("retired_reset", None, "nut_water_first"),
        );

        let groups = recent_novelty_groups(&states, "2024-03-02", 2, &index);
        assert_eq!(groups, vec!["hydration"]);
        assert!(recent_novelty_groups(&states, "not-a-date", 2, &index).is_empty());
        assert!(recent_novelty_groups(&states, "2024-03-02", 0, &index).is_empty());
    }
}
