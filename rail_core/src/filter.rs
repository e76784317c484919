//! Constraint and novelty filtering.
//!
//! Filtering runs in a fixed order:
//! 1. Injury contraindications (all kinds). Hard, never relaxed.
//! 2. Equipment requirements (movement)
//! 3. Dietary avoidances (nutrition). Hard.
//! 4. Time budget (resets and movement)
//! 5. Low-capacity restriction (movement)
//! 6. Time-of-day preference (resets). Soft: ignored if it empties the pool.
//! 7. Novelty. Soft: ignored if it empties the pool.
//!
//! An empty pool after a hard step is deliberate; nothing unsafe is added back.

use crate::library::LibraryIndex;
use crate::params::EngineParams;
use crate::types::*;

/// Everything the filter needs to know about the user and the day
#[derive(Clone, Copy, Debug)]
pub struct FilterContext<'a> {
    pub constraints: &'a Constraints,
    pub time_available_min: u8,
    pub capacity: u8,
    pub profile: Profile,
    pub recent_novelty_groups: &'a [String],
    pub params: &'a EngineParams,
}

/// What filtering did to one pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Items removed by injury or diet exclusion
    pub safety_excluded: usize,
    /// Items removed by the novelty step (zero when relaxed)
    pub novelty_excluded: usize,
    /// Novelty would have emptied the pool and was ignored
    pub novelty_relaxed: bool,
}

/// Eligible items per kind, each sorted by id
#[derive(Clone, Debug, Default)]
pub struct EligiblePools {
    pub resets: Vec<ResetItem>,
    pub movement: Vec<MovementItem>,
    pub nutrition: Vec<NutritionItem>,
    pub reset_report: PoolReport,
    pub movement_report: PoolReport,
    pub nutrition_report: PoolReport,
}

impl EligiblePools {
    fn reports(&self) -> [PoolReport; 3] {
        [self.reset_report, self.movement_report, self.nutrition_report]
    }

    /// Novelty removed at least one item somewhere
    pub fn novelty_applied(&self) -> bool {
        self.reports().iter().any(|r| r.novelty_excluded > 0)
    }

    pub fn safety_excluded(&self) -> usize {
        self.reports().iter().map(|r| r.safety_excluded).sum()
    }

    /// Panic narrowing: no movement at all, nutrition limited to simple tips
    pub fn narrow_for_panic(&mut self) {
        self.movement.clear();
        let simple: Vec<_> = self
            .nutrition
            .iter()
            .filter(|n| n.has_tag("simple"))
            .cloned()
            .collect();
        if !simple.is_empty() {
            self.nutrition = simple;
        }
    }
}

/// Full eligibility: constraints, time-of-day preference, then novelty
pub fn eligible(index: &LibraryIndex, ctx: &FilterContext<'_>) -> EligiblePools {
    let mut pools = constraint_pools(index, ctx);

    pools.resets = prefer_time_of_day(pools.resets, ctx.constraints.time_of_day_preference);

    let (resets, report) = apply_novelty(pools.resets, ctx.recent_novelty_groups);
    pools.resets = resets;
    merge_novelty(&mut pools.reset_report, report);

    let (movement, report) = apply_novelty(pools.movement, ctx.recent_novelty_groups);
    pools.movement = movement;
    merge_novelty(&mut pools.movement_report, report);

    let (nutrition, report) = apply_novelty(pools.nutrition, ctx.recent_novelty_groups);
    pools.nutrition = nutrition;
    merge_novelty(&mut pools.nutrition_report, report);

    tracing::debug!(
        "Eligible pools: {} resets, {} movement, {} nutrition",
        pools.resets.len(),
        pools.movement.len(),
        pools.nutrition.len()
    );

    pools
}

/// Safety, equipment, diet, time budget and capacity steps only
pub fn constraint_pools(index: &LibraryIndex, ctx: &FilterContext<'_>) -> EligiblePools {
    let injury_tags = ctx.constraints.active_injury_tags();
    let equipment = ctx.constraints.available_equipment_tags();
    let avoid = &ctx.constraints.diet.avoid_tags;

    let (resets, reset_excluded) = without_contraindications(index.resets(), &injury_tags);
    let reset_limit = reset_time_limit(ctx.time_available_min, ctx.params);
    let resets: Vec<_> = resets
        .into_iter()
        .filter(|r| r.duration_sec <= reset_limit)
        .collect();

    let (movement, movement_excluded) =
        without_contraindications(index.movement(), &injury_tags);
    let restrict_light = needs_light_movement(ctx.capacity, ctx.profile, ctx.params);
    let movement: Vec<_> = movement
        .into_iter()
        .filter(|m| equipment_satisfied(m, &equipment))
        .filter(|m| m.duration_min <= u32::from(ctx.time_available_min))
        .filter(|m| !restrict_light || m.has_any_tag(&["downshift", "light"]))
        .collect();

    let (nutrition, mut nutrition_excluded) =
        without_contraindications(index.nutrition(), &injury_tags);
    let before = nutrition.len();
    let nutrition: Vec<_> = nutrition
        .into_iter()
        .filter(|n| !n.tags.iter().any(|t| avoid.contains(&t.to_lowercase())))
        .collect();
    nutrition_excluded += before - nutrition.len();

    if reset_excluded + movement_excluded + nutrition_excluded > 0 {
        tracing::info!(
            "Safety exclusions: {} resets, {} movement, {} nutrition",
            reset_excluded,
            movement_excluded,
            nutrition_excluded
        );
    }

    EligiblePools {
        resets,
        movement,
        nutrition,
        reset_report: PoolReport {
            safety_excluded: reset_excluded,
            ..PoolReport::default()
        },
        movement_report: PoolReport {
            safety_excluded: movement_excluded,
            ..PoolReport::default()
        },
        nutrition_report: PoolReport {
            safety_excluded: nutrition_excluded,
            ..PoolReport::default()
        },
    }
}

/// Longest reset that fits the time the user has
pub fn reset_time_limit(time_available_min: u8, params: &EngineParams) -> u32 {
    if time_available_min <= params.short_time_max_min {
        params.reset_short_max_sec.min(params.reset_max_sec)
    } else {
        params.reset_max_sec
    }
}

/// Low capacity or a depleted/poor-sleep profile limits movement to light items
pub fn needs_light_movement(capacity: u8, profile: Profile, params: &EngineParams) -> bool {
    capacity < params.low_capacity || matches!(profile, Profile::Depleted | Profile::PoorSleep)
}

fn without_contraindications<T: ContentItem + Clone>(
    items: &[T],
    injury_tags: &[&str],
) -> (Vec<T>, usize) {
    let kept: Vec<T> = items
        .iter()
        .filter(|item| {
            !item
                .contra_tags()
                .iter()
                .any(|c| injury_tags.contains(&c.as_str()))
        })
        .cloned()
        .collect();
    let excluded = items.len() - kept.len();
    (kept, excluded)
}

/// Every `eq:` requirement must be available; items without any are no-equipment items
fn equipment_satisfied(item: &MovementItem, available: &[&str]) -> bool {
    item.contra_tags
        .iter()
        .filter(|c| c.starts_with("eq:"))
        .all(|c| available.contains(&c.as_str()))
}

fn prefer_time_of_day(resets: Vec<ResetItem>, preference: TimeOfDay) -> Vec<ResetItem> {
    if preference == TimeOfDay::Any {
        return resets;
    }

    let others: Vec<&str> = TimeOfDay::TAGGED
        .iter()
        .filter(|t| **t != preference)
        .map(|t| t.as_str())
        .collect();

    let preferred: Vec<_> = resets
        .iter()
        .filter(|r| !r.has_any_tag(&others))
        .cloned()
        .collect();

    if preferred.is_empty() {
        tracing::debug!(
            "No resets suit {} preference, ignoring it",
            preference.as_str()
        );
        resets
    } else {
        preferred
    }
}

/// Drop recently used novelty groups unless that would empty the pool
pub fn apply_novelty<T: ContentItem + Clone>(
    items: Vec<T>,
    recent_groups: &[String],
) -> (Vec<T>, PoolReport) {
    if recent_groups.is_empty() || items.is_empty() {
        return (items, PoolReport::default());
    }

    let fresh: Vec<T> = items
        .iter()
        .filter(|item| {
            item.novelty_group()
                .map_or(true, |g| !recent_groups.iter().any(|r| r == g))
        })
        .cloned()
        .collect();

    if fresh.is_empty() {
        tracing::info!(
            "Novelty filter would empty {:?} pool, ignoring it",
            T::KIND
        );
        return (
            items,
            PoolReport {
                novelty_relaxed: true,
                ..PoolReport::default()
            },
        );
    }

    let excluded = items.len() - fresh.len();
    (
        fresh,
        PoolReport {
            novelty_excluded: excluded,
            ..PoolReport::default()
        },
    )
}

fn merge_novelty(into: &mut PoolReport, report: PoolReport) {
    into.novelty_excluded = report.novelty_excluded;
    into.novelty_relaxed = report.novelty_relaxed;
}
