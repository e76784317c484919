//! Day contract builder.
//!
//! Runs the whole flow for one request: score, classify, filter, select with
//! continuity, overlay rules, then assemble the contract and its input hash.
//! The contract is recomputed from scratch on every call.

use crate::filter::{self, FilterContext};
use crate::library::LibraryIndex;
use crate::params::{EngineParams, ParamOverrides};
use crate::pipeline::{run_pipeline, Draft, RuleContext};
use crate::profile::{assign_stress_profile, ProfileInput};
use crate::rules::EnvPolicy;
use crate::scoring::compute_load_capacity;
use crate::selector::{select, seed_string, sha256_hex, Continuity, SeedParts};
use crate::types::*;
use crate::Result;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything the engine needs to plan one user's day
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanRequest {
    pub user_id: String,
    pub date_key: String,
    pub timezone: String,
    pub day_boundary_hour: u8,
    pub check_in: CheckIn,
    pub constraints: Constraints,
    pub day_state: Option<DayState>,
    pub week_seed: Option<WeekSeed>,
    pub prior_profile: Option<Profile>,
    pub recent_novelty_groups: Vec<String>,
    pub feedback: Option<Feedback>,
    pub panic_mode: bool,
    /// Ignore DayState and WeekSeed continuity for this request
    pub rail_reset: bool,
    pub completed: bool,
    pub overrides: ParamOverrides,
}

/// Date key for a local wall-clock time, with days starting at `day_boundary_hour`
pub fn date_key_at(local: NaiveDateTime, day_boundary_hour: u8) -> String {
    let shifted = local - Duration::hours(i64::from(day_boundary_hour.min(23)));
    shifted.format("%Y-%m-%d").to_string()
}

/// Build the day contract for a request
pub fn build_day_contract(
    request: &PlanRequest,
    index: &LibraryIndex,
    base_params: &EngineParams,
    policy: EnvPolicy,
) -> Result<DayContract> {
    let params = request.overrides.apply(base_params);
    let panic = request.check_in.safety.panic || request.panic_mode;
    let check_in = request.check_in.clone().with_panic(panic);
    let scores = compute_load_capacity(&check_in);

    let assessment = assign_stress_profile(
        &ProfileInput {
            load: scores.load,
            capacity: scores.capacity,
            sleep: check_in.sleep_quality,
            energy: check_in.energy,
            prior_profile: request.prior_profile,
        },
        &params.profile,
    );
    let profile = request.overrides.force_profile.unwrap_or(assessment.profile);

    let (day_state, week_entry) = if request.rail_reset {
        tracing::info!("Rail reset requested, ignoring stored continuity");
        (None, None)
    } else {
        (
            request.day_state.as_ref(),
            request
                .week_seed
                .as_ref()
                .and_then(|w| w.entry(&request.date_key)),
        )
    };
    let last_quick_signal = day_state.and_then(|d| d.last_quick_signal);

    let mut pools = filter::eligible(
        index,
        &FilterContext {
            constraints: &request.constraints,
            time_available_min: check_in.time_available_min,
            capacity: scores.capacity,
            profile,
            recent_novelty_groups: &request.recent_novelty_groups,
            params: &params,
        },
    );
    if panic {
        tracing::warn!("Panic mode for user {} on {}", request.user_id, request.date_key);
        pools.narrow_for_panic();
    }

    let signature = check_in.signature();
    let seed = seed_string(&SeedParts {
        user_id: &request.user_id,
        date_key: &request.date_key,
        profile,
        last_quick_signal,
        lib_version: index.version(),
        check_in_signature: &signature,
    });

    let reset = select(
        &pools.resets,
        Continuity {
            day_state_id: day_state.and_then(|d| d.reset_id.as_deref()),
            week_seed_id: week_entry.and_then(|w| w.reset_id.as_deref()),
        },
        &seed,
    );
    let movement = select(
        &pools.movement,
        Continuity {
            day_state_id: day_state.and_then(|d| d.movement_id.as_deref()),
            week_seed_id: week_entry.and_then(|w| w.movement_id.as_deref()),
        },
        &seed,
    );
    let nutrition = select(
        &pools.nutrition,
        Continuity {
            day_state_id: day_state.and_then(|d| d.nutrition_id.as_deref()),
            week_seed_id: week_entry.and_then(|w| w.nutrition_id.as_deref()),
        },
        &seed,
    );

    let reset_source = reset.as_ref().map(|p| p.source);
    let selection = Selection {
        reset: reset.map(|p| p.item),
        movement: movement.map(|p| p.item),
        nutrition: nutrition.map(|p| p.item),
    };

    let mut draft = Draft::new(profile, selection, reset_source);
    draft.rationale = assessment.drivers;

    let output = run_pipeline(
        draft,
        &RuleContext {
            check_in: &check_in,
            scores,
            classified_profile: assessment.profile,
            constraints: &request.constraints,
            pools: &pools,
            params: &params,
            overrides: &request.overrides,
            last_quick_signal,
            feedback: request.feedback,
            panic,
            rail_reset: request.rail_reset,
            seed: &seed,
            policy,
        },
    )?;

    let input_hash = input_hash(request, &check_in, &output.selection, index.version())?;

    tracing::info!(
        "Built contract for {} on {}: profile={} reset={:?} movement={:?} nutrition={:?}",
        request.user_id,
        request.date_key,
        output.profile,
        output.selection.reset_id(),
        output.selection.movement_id(),
        output.selection.nutrition_id()
    );

    Ok(DayContract {
        date_key: request.date_key.clone(),
        profile: output.profile,
        scores,
        focus: output.focus,
        panic_mode: panic,
        reset: output.selection.reset,
        movement: output.selection.movement,
        nutrition: output.selection.nutrition,
        rationale: output.rationale,
        meta: ContractMeta {
            input_hash,
            completed: request.completed,
            applied_rules: output.applied_rules,
            lib_version: index.version().to_string(),
        },
    })
}

/// Canonical hash over everything that shaped the contract
fn input_hash(
    request: &PlanRequest,
    check_in: &CheckIn,
    selection: &Selection,
    lib_version: &str,
) -> Result<String> {
    let opt = |id: Option<&str>| id.unwrap_or("").to_string();
    let prior = request.day_state.clone().unwrap_or_default();
    let week = request
        .week_seed
        .as_ref()
        .and_then(|w| w.entry(&request.date_key))
        .cloned()
        .unwrap_or_default();
    let constraints = serde_json::to_value(&request.constraints)?;
    let mut novelty = request.recent_novelty_groups.clone();
    novelty.sort();
    novelty.dedup();
    // Field order is fixed and experiment id lists are ordered preferences
    let overrides = serde_json::to_string(&request.overrides)?;

    let parts = [
        request.user_id.clone(),
        request.date_key.clone(),
        request.timezone.clone(),
        request.day_boundary_hour.to_string(),
        check_in.stress.to_string(),
        check_in.sleep_quality.to_string(),
        check_in.energy.to_string(),
        check_in.time_available_min.to_string(),
        u8::from(check_in.safety.panic).to_string(),
        opt(selection.reset_id()),
        opt(selection.movement_id()),
        opt(selection.nutrition_id()),
        opt(prior.reset_id.as_deref()),
        opt(prior.movement_id.as_deref()),
        opt(prior.nutrition_id.as_deref()),
        opt(week.reset_id.as_deref()),
        opt(week.movement_id.as_deref()),
        opt(week.nutrition_id.as_deref()),
        opt(request.prior_profile.map(|p| p.label())),
        stable_stringify(&constraints),
        lib_version.to_string(),
        novelty.join(","),
        opt(request.feedback.map(|f| f.as_str())),
        u8::from(request.rail_reset).to_string(),
        u8::from(request.completed).to_string(),
        overrides,
    ];

    Ok(sha256_hex(&parts.join("|")))
}

/// Serialize JSON with object keys and array elements sorted at every level
pub fn stable_stringify(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), stable_stringify(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let mut body: Vec<String> = items.iter().map(stable_stringify).collect();
            body.sort();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
