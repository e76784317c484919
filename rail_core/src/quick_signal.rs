//! Quick-signal adapter.
//!
//! Reacts to a one-tap hint against an already-built selection without
//! re-running scoring. Every transform may only reduce demand:
//! - a reset is only replaced by one that is no longer
//! - movement is only replaced by one that is no more intense and no longer,
//!   or removed
//! - `more_energy` only adds movement when there is none, and only with
//!   enough capacity
//!
//! Each transform is a fixed point after one application, so repeating a
//! signal changes nothing.

use crate::filter::{self, FilterContext};
use crate::library::LibraryIndex;
use crate::params::EngineParams;
use crate::types::*;

const CALMING_TAGS: [&str; 2] = ["breath", "downshift"];
const STRESSED_MAX_INTENSITY: u8 = 2;

/// Day context the adapter needs; scores and profile are taken as given
#[derive(Clone, Copy, Debug)]
pub struct SignalContext<'a> {
    pub scores: Scores,
    pub profile: Profile,
    pub constraints: &'a Constraints,
    pub time_available_min: u8,
    pub panic: bool,
    pub params: &'a EngineParams,
}

/// Apply a quick signal to a selection, drawing replacements from the
/// constraint-eligible library
pub fn apply_quick_signal(
    signal: QuickSignal,
    current: &Selection,
    ctx: &SignalContext<'_>,
    index: &LibraryIndex,
) -> Selection {
    let pools = filter::constraint_pools(
        index,
        &FilterContext {
            constraints: ctx.constraints,
            time_available_min: ctx.time_available_min,
            capacity: ctx.scores.capacity,
            profile: ctx.profile,
            recent_novelty_groups: &[],
            params: ctx.params,
        },
    );

    transform(signal, current, &pools.resets, &pools.movement, ctx)
}

/// Apply a signal to a stored day state and produce the updated state
pub fn apply_signal_to_day_state(
    signal: QuickSignal,
    state: &DayState,
    ctx: &SignalContext<'_>,
    index: &LibraryIndex,
) -> (Selection, DayState) {
    let current = index.resolve(state);
    let next = apply_quick_signal(signal, &current, ctx, index);
    let new_state = DayState {
        reset_id: next.reset.as_ref().map(|r| r.id.clone()),
        movement_id: next.movement.as_ref().map(|m| m.id.clone()),
        nutrition_id: next.nutrition.as_ref().map(|n| n.id.clone()),
        last_quick_signal: Some(signal),
    };
    tracing::info!(
        "Applied {} signal: reset {:?} -> {:?}, movement {:?} -> {:?}",
        signal.as_str(),
        current.reset_id(),
        next.reset_id(),
        current.movement_id(),
        next.movement_id()
    );
    (next, new_state)
}

/// Signal transform over explicit pools
pub(crate) fn transform(
    signal: QuickSignal,
    current: &Selection,
    resets: &[ResetItem],
    movement: &[MovementItem],
    ctx: &SignalContext<'_>,
) -> Selection {
    let mut next = current.clone();

    match signal {
        QuickSignal::Stressed => {
            next.reset = shortest_reset(resets, current.reset.as_ref(), |r| {
                r.has_any_tag(&CALMING_TAGS)
            })
            .or_else(|| current.reset.clone());
            next.movement = current.movement.as_ref().and_then(|m| {
                if m.intensity <= STRESSED_MAX_INTENSITY {
                    Some(m.clone())
                } else {
                    gentlest_movement(movement, |c| {
                        c.intensity <= STRESSED_MAX_INTENSITY && c.duration_min <= m.duration_min
                    })
                }
            });
        }
        QuickSignal::Exhausted => {
            next.reset = shortest_reset(resets, current.reset.as_ref(), |_| true)
                .or_else(|| current.reset.clone());
            next.movement = None;
        }
        QuickSignal::TenMinutes => {
            let cap = current
                .reset
                .as_ref()
                .map_or(ctx.params.ten_minutes_reset_max_sec, |r| {
                    r.duration_sec.min(ctx.params.ten_minutes_reset_max_sec)
                });
            next.reset = longest_reset_within(resets, cap).or_else(|| current.reset.clone());
            next.movement = None;
        }
        QuickSignal::MoreEnergy => {
            if current.movement.is_none()
                && !ctx.panic
                && ctx.scores.capacity >= ctx.params.more_energy_min_capacity
            {
                next.movement = gentlest_movement(movement, |_| true);
            }
        }
    }

    if ctx.panic {
        next.movement = None;
    }

    next
}

/// Shortest matching reset no longer than `current`, ties broken by id
fn shortest_reset(
    resets: &[ResetItem],
    current: Option<&ResetItem>,
    accept: impl Fn(&ResetItem) -> bool,
) -> Option<ResetItem> {
    let limit = current.map_or(u32::MAX, |r| r.duration_sec);
    resets
        .iter()
        .filter(|r| r.duration_sec <= limit && accept(*r))
        .min_by(|a, b| (a.duration_sec, &a.id).cmp(&(b.duration_sec, &b.id)))
        .cloned()
}

/// Longest reset within `cap` seconds, ties broken by lowest id
fn longest_reset_within(resets: &[ResetItem], cap: u32) -> Option<ResetItem> {
    resets
        .iter()
        .filter(|r| r.duration_sec <= cap)
        .min_by(|a, b| {
            b.duration_sec
                .cmp(&a.duration_sec)
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned()
}

/// Lowest intensity, then shortest, then lowest id
pub(crate) fn gentlest_movement(
    movement: &[MovementItem],
    accept: impl Fn(&MovementItem) -> bool,
) -> Option<MovementItem> {
    movement
        .iter()
        .filter(|m| accept(*m))
        .min_by(|a, b| {
            (a.intensity, a.duration_min, &a.id).cmp(&(b.intensity, b.duration_min, &b.id))
        })
        .cloned()
}
