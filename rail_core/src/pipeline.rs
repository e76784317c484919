//! Ordered rule overlay on top of the base selection.
//!
//! Rules run in `RULES_ORDER`. Each rule inspects the draft and the request
//! context, may adjust the draft, and reports whether it fired. Rules only
//! draw replacements from the eligible pools, so nothing a rule picks can
//! bypass the constraint filter. Panic mode is re-asserted after the last
//! rule: movement is always absent when it is set.

use crate::filter::EligiblePools;
use crate::params::{EngineParams, ParamOverrides};
use crate::quick_signal::{self, SignalContext};
use crate::rules::{normalize_applied_rules, EnvPolicy, RuleName, RULES_ORDER};
use crate::selector::{pick, PickSource};
use crate::types::*;
use crate::Result;

const MAX_INTENSITY: u8 = 5;

pub const SAFETY_RATIONALE: &str =
    "Safety first: movement is paused today. Take slow breaths and reach out to someone you trust if you need support.";

/// Working state the rules adjust
#[derive(Clone, Debug)]
pub struct Draft {
    pub profile: Profile,
    pub focus: Focus,
    pub intensity_cap: u8,
    pub bad_day: bool,
    pub selection: Selection,
    pub reset_source: Option<PickSource>,
    pub rationale: Vec<String>,
    pub fired: Vec<String>,
}

impl Draft {
    pub fn new(profile: Profile, selection: Selection, reset_source: Option<PickSource>) -> Self {
        Self {
            profile,
            focus: Focus::for_profile(profile),
            intensity_cap: MAX_INTENSITY,
            bad_day: false,
            selection,
            reset_source,
            rationale: Vec::new(),
            fired: Vec::new(),
        }
    }

    fn lower_cap(&mut self, cap: u8) {
        self.intensity_cap = self.intensity_cap.min(cap.max(1));
    }
}

/// Read-only request context shared by every rule
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    pub check_in: &'a CheckIn,
    pub scores: Scores,
    pub classified_profile: Profile,
    pub constraints: &'a Constraints,
    pub pools: &'a EligiblePools,
    pub params: &'a EngineParams,
    pub overrides: &'a ParamOverrides,
    pub last_quick_signal: Option<QuickSignal>,
    pub feedback: Option<Feedback>,
    pub panic: bool,
    pub rail_reset: bool,
    pub seed: &'a str,
    pub policy: EnvPolicy,
}

/// Final overlay result
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub profile: Profile,
    pub focus: Focus,
    pub intensity_cap: u8,
    pub selection: Selection,
    pub rationale: Vec<String>,
    pub applied_rules: Vec<String>,
}

/// Run every rule in canonical order and normalize the fired list
pub fn run_pipeline(mut draft: Draft, ctx: &RuleContext<'_>) -> Result<PipelineOutput> {
    for rule in RULES_ORDER {
        if apply_rule(rule, &mut draft, ctx) {
            tracing::debug!("Rule fired: {}", rule);
            draft.fired.push(rule.as_str().to_string());
        }
    }

    draft
        .fired
        .extend(ctx.overrides.extra_applied_rules.iter().cloned());

    if ctx.panic {
        draft.selection.movement = None;
    }

    let applied_rules = normalize_applied_rules(&draft.fired, ctx.policy)?;
    tracing::info!("Applied rules: {}", applied_rules.join(", "));

    Ok(PipelineOutput {
        profile: draft.profile,
        focus: draft.focus,
        intensity_cap: draft.intensity_cap,
        selection: draft.selection,
        rationale: draft.rationale,
        applied_rules,
    })
}

fn apply_rule(rule: RuleName, draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    match rule {
        RuleName::ProfileOverride => profile_override(draft, ctx),
        RuleName::BusyDay => busy_day(draft, ctx),
        RuleName::KeepFocus => keep_focus(draft),
        RuleName::TimeMinConstraint => time_min_constraint(draft, ctx),
        RuleName::PoorSleepConstraint => {
            profile_cap(draft, ctx, Profile::PoorSleep, ctx.params.poor_sleep_intensity_cap)
        }
        RuleName::WiredConstraint => {
            profile_cap(draft, ctx, Profile::Wired, ctx.params.wired_intensity_cap)
        }
        RuleName::DepletedConstraint => {
            profile_cap(draft, ctx, Profile::Depleted, ctx.params.depleted_intensity_cap)
        }
        RuleName::RecoveryDebtBias => recovery_debt_bias(draft, ctx),
        RuleName::SignalOverride => signal_override(draft, ctx),
        RuleName::FeedbackModifier => feedback_modifier(draft, ctx),
        RuleName::ResetFocusOverride => reset_focus_override(draft, ctx),
        RuleName::BadDayMode => bad_day_mode(draft, ctx),
        RuleName::NoveltyAvoidance => novelty_avoidance(draft, ctx),
        RuleName::SafetyBlock => safety_block(draft, ctx),
        RuleName::EmergencyDownshift => emergency_downshift(draft, ctx),
        RuleName::QualityGate => quality_gate(draft, ctx),
        RuleName::QualityGateFallback => quality_gate_fallback(draft, ctx),
        RuleName::ExperimentPack => experiment_pack(draft, ctx),
        RuleName::ParamsOverride => ctx.overrides.overrides_thresholds(),
        RuleName::RailReset => rail_reset(draft, ctx),
    }
}

// ============================================================================
// Rules
// ============================================================================

fn profile_override(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let Some(forced) = ctx.overrides.force_profile else {
        return false;
    };
    if forced != ctx.classified_profile {
        draft.rationale.push(format!(
            "Your program sets today's profile to {} (check-in suggested {})",
            forced, ctx.classified_profile
        ));
    }
    true
}

fn busy_day(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if ctx.check_in.time_available_min > ctx.params.busy_day_max_min {
        return false;
    }

    if let Some(current) = draft.selection.reset.clone() {
        draft.selection.reset = ctx
            .pools
            .resets
            .iter()
            .filter(|r| r.duration_sec <= current.duration_sec)
            .min_by(|a, b| (a.duration_sec, &a.id).cmp(&(b.duration_sec, &b.id)))
            .cloned()
            .or(Some(current));
    }

    if let Some(current) = draft.selection.movement.clone() {
        draft.selection.movement = ctx
            .pools
            .movement
            .iter()
            .filter(|m| m.duration_min <= current.duration_min && m.intensity <= current.intensity)
            .min_by(|a, b| (a.duration_min, a.intensity, &a.id).cmp(&(b.duration_min, b.intensity, &b.id)))
            .cloned()
            .or(Some(current));
    }

    draft
        .rationale
        .push("Short on time today, so every piece is trimmed to its shortest version".into());
    true
}

fn keep_focus(draft: &mut Draft) -> bool {
    match draft.reset_source {
        Some(PickSource::DayState) => {
            draft
                .rationale
                .push("Keeping the reset you already had today since it still fits".into());
            true
        }
        Some(PickSource::WeekSeed) => {
            draft
                .rationale
                .push("Following this week's planned reset since it still fits".into());
            true
        }
        _ => false,
    }
}

fn reset_minutes(selection: &Selection) -> u32 {
    selection
        .reset
        .as_ref()
        .map_or(0, |r| r.duration_sec.div_ceil(60))
}

fn time_min_constraint(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let Some(current) = draft.selection.movement.clone() else {
        return false;
    };

    let available = u32::from(ctx.check_in.time_available_min);
    let reset_min = reset_minutes(&draft.selection);
    if reset_min + current.duration_min <= available {
        return false;
    }

    let budget = available.saturating_sub(reset_min);
    draft.selection.movement = ctx
        .pools
        .movement
        .iter()
        .filter(|m| m.duration_min <= budget && m.intensity <= current.intensity)
        .min_by(|a, b| {
            b.duration_min
                .cmp(&a.duration_min)
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned();

    draft.rationale.push(format!(
        "Movement fitted into the {} minutes left after your reset",
        budget
    ));
    true
}

/// Replace movement above the cap with a capped eligible item, or drop it
fn enforce_cap(draft: &mut Draft, ctx: &RuleContext<'_>) {
    let cap = draft.intensity_cap;
    if let Some(current) = draft.selection.movement.clone() {
        if current.intensity > cap {
            draft.selection.movement = quick_signal::gentlest_movement(&ctx.pools.movement, |m| {
                m.intensity <= cap && m.duration_min <= current.duration_min
            });
            tracing::debug!(
                "Movement {} above cap {}, replaced with {:?}",
                current.id,
                cap,
                draft.selection.movement_id()
            );
        }
    }
}

fn profile_cap(draft: &mut Draft, ctx: &RuleContext<'_>, profile: Profile, cap: u8) -> bool {
    if draft.profile != profile {
        return false;
    }

    draft.lower_cap(cap);
    if matches!(profile, Profile::PoorSleep | Profile::Depleted) {
        draft.focus = Focus::Downshift;
    }
    enforce_cap(draft, ctx);

    let line = match profile {
        Profile::PoorSleep => "After a rough night, movement stays gentle",
        Profile::Wired => "You're running hot, so movement stays moderate and the reset comes first",
        Profile::Depleted => "You're running on empty, so today is about recovery",
        _ => "Movement intensity is capped today",
    };
    draft.rationale.push(line.into());
    true
}

fn recovery_debt_bias(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if ctx.check_in.sleep_quality > ctx.params.recovery_debt_max_sleep
        || ctx.scores.load < ctx.params.recovery_debt_min_load
    {
        return false;
    }

    let already = draft
        .selection
        .nutrition
        .as_ref()
        .is_some_and(|n| n.has_tag("recovery"));
    if !already {
        let recovery: Vec<_> = ctx
            .pools
            .nutrition
            .iter()
            .filter(|n| n.has_tag("recovery"))
            .cloned()
            .collect();
        if let Some(item) = pick(&recovery, ctx.seed) {
            draft.selection.nutrition = Some(item.clone());
        }
    }

    draft
        .rationale
        .push("Short sleep and a heavy load, so nutrition leans toward recovery".into());
    true
}

fn signal_override(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let Some(signal) = ctx.last_quick_signal else {
        return false;
    };

    let signal_ctx = SignalContext {
        scores: ctx.scores,
        profile: draft.profile,
        constraints: ctx.constraints,
        time_available_min: ctx.check_in.time_available_min,
        panic: ctx.panic,
        params: ctx.params,
    };
    draft.selection = quick_signal::transform(
        signal,
        &draft.selection,
        &ctx.pools.resets,
        &ctx.pools.movement,
        &signal_ctx,
    );
    draft.rationale.push(format!(
        "Still honoring your earlier \"{}\" signal",
        signal.as_str().replace('_', " ")
    ));
    true
}

fn feedback_modifier(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    match ctx.feedback {
        Some(Feedback::TooHard) => {
            let cap = draft
                .selection
                .movement
                .as_ref()
                .map_or(draft.intensity_cap, |m| m.intensity.min(draft.intensity_cap))
                .saturating_sub(1);
            draft.lower_cap(cap);
            enforce_cap(draft, ctx);
            draft
                .rationale
                .push("Yesterday felt too hard, so today steps down a notch".into());
            true
        }
        Some(Feedback::TooEasy) => {
            draft.rationale.push(
                "Noted that yesterday felt easy; today's check-in still sets the ceiling".into(),
            );
            true
        }
        Some(Feedback::JustRight) | None => false,
    }
}

fn reset_focus_override(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let Some(tag) = ctx.overrides.reset_focus_tag.as_deref() else {
        return false;
    };

    let limit = draft
        .selection
        .reset
        .as_ref()
        .map_or(u32::MAX, |r| r.duration_sec);
    let tagged: Vec<_> = ctx
        .pools
        .resets
        .iter()
        .filter(|r| r.has_tag(tag) && r.duration_sec <= limit)
        .cloned()
        .collect();

    let already = draft.selection.reset.as_ref().is_some_and(|r| r.has_tag(tag));
    if !already {
        if let Some(item) = pick(&tagged, ctx.seed) {
            draft.selection.reset = Some(item.clone());
        }
    }
    true
}

fn bad_day_mode(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let p = ctx.params;
    let c = ctx.check_in;
    let triggered = (c.stress >= p.bad_day_min_stress
        && (c.energy <= p.bad_day_max_energy || c.sleep_quality <= p.bad_day_max_sleep))
        || ctx.overrides.force_bad_day;
    if !triggered {
        return false;
    }

    draft.bad_day = true;
    draft.focus = Focus::Downshift;
    draft.lower_cap(p.bad_day_intensity_cap);

    draft.selection.reset = ctx
        .pools
        .resets
        .iter()
        .min_by(|a, b| (a.duration_sec, &a.id).cmp(&(b.duration_sec, &b.id)))
        .cloned();
    draft.selection.nutrition = ctx
        .pools
        .nutrition
        .iter()
        .find(|n| n.has_tag("simple"))
        .or_else(|| ctx.pools.nutrition.first())
        .cloned();
    enforce_cap(draft, ctx);

    draft
        .rationale
        .push("Bad day mode: everything is as small and simple as it gets".into());
    true
}

fn novelty_avoidance(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if !ctx.pools.novelty_applied() {
        return false;
    }
    draft.rationale.push(format!(
        "Rotating away from what you did in the last {} days",
        ctx.params.novelty_days
    ));
    true
}

fn safety_block(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if ctx.pools.safety_excluded() == 0 {
        return false;
    }
    draft.rationale.push(
        "Some options were left out because of your injuries or food preferences".into(),
    );
    true
}

fn emergency_downshift(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if !ctx.panic {
        return false;
    }

    draft.focus = Focus::Downshift;
    draft.selection.movement = None;
    let shortest = |breath_only: bool| {
        ctx.pools
            .resets
            .iter()
            .filter(|r| !breath_only || r.has_tag("breath"))
            .min_by(|a, b| (a.duration_sec, &a.id).cmp(&(b.duration_sec, &b.id)))
            .cloned()
    };
    if let Some(reset) = shortest(true).or_else(|| shortest(false)) {
        draft.selection.reset = Some(reset);
    }

    if !draft.rationale.iter().any(|l| l == SAFETY_RATIONALE) {
        draft.rationale.push(SAFETY_RATIONALE.into());
    }
    true
}

fn quality_gate(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let pools = ctx.pools;
    let mut repaired = false;

    if let Some(reset) = &draft.selection.reset {
        if !pools.resets.iter().any(|r| r.id == reset.id) {
            tracing::warn!("Quality gate: reset {} not eligible", reset.id);
            draft.selection.reset = pick(&pools.resets, ctx.seed).cloned();
            repaired = true;
        }
    }

    if let Some(movement) = &draft.selection.movement {
        let eligible = pools.movement.iter().any(|m| m.id == movement.id);
        if !eligible || movement.intensity > draft.intensity_cap || ctx.panic {
            tracing::warn!("Quality gate: movement {} not allowed", movement.id);
            let cap = draft.intensity_cap;
            let capped: Vec<_> = pools
                .movement
                .iter()
                .filter(|m| m.intensity <= cap)
                .cloned()
                .collect();
            draft.selection.movement = if ctx.panic {
                None
            } else {
                pick(&capped, ctx.seed).cloned()
            };
            repaired = true;
        }
    }

    if let Some(nutrition) = &draft.selection.nutrition {
        if !pools.nutrition.iter().any(|n| n.id == nutrition.id) {
            tracing::warn!("Quality gate: nutrition {} not eligible", nutrition.id);
            draft.selection.nutrition = pick(&pools.nutrition, ctx.seed).cloned();
            repaired = true;
        }
    }

    repaired
}

fn quality_gate_fallback(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let mut filled = false;

    if draft.selection.reset.is_none() {
        if let Some(reset) = pick(&ctx.pools.resets, ctx.seed) {
            draft.selection.reset = Some(reset.clone());
            filled = true;
        }
    }
    if draft.selection.nutrition.is_none() {
        if let Some(nutrition) = pick(&ctx.pools.nutrition, ctx.seed) {
            draft.selection.nutrition = Some(nutrition.clone());
            filled = true;
        }
    }

    filled
}

fn experiment_pack(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    let Some(pack) = &ctx.overrides.experiment_pack else {
        return false;
    };

    let limit = draft
        .selection
        .reset
        .as_ref()
        .map_or(u32::MAX, |r| r.duration_sec);
    let preferred_reset = pack.reset_ids.iter().find_map(|id| {
        ctx.pools
            .resets
            .iter()
            .find(|r| &r.id == id && r.duration_sec <= limit)
    });
    if let Some(reset) = preferred_reset {
        draft.selection.reset = Some(reset.clone());
    }

    if !draft.bad_day {
        let preferred_nutrition = pack
            .nutrition_ids
            .iter()
            .find_map(|id| ctx.pools.nutrition.iter().find(|n| &n.id == id));
        if let Some(nutrition) = preferred_nutrition {
            draft.selection.nutrition = Some(nutrition.clone());
        }
    }

    tracing::debug!("Experiment pack '{}' applied", pack.name);
    true
}

fn rail_reset(draft: &mut Draft, ctx: &RuleContext<'_>) -> bool {
    if !ctx.rail_reset {
        return false;
    }
    draft
        .rationale
        .push("Started today's plan fresh at your request".into());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{self, FilterContext};
    use crate::library::{default_library, LibraryIndex};
    use crate::params::ExperimentPack;
    use crate::scoring::compute_load_capacity;

    struct Fixture {
        index: LibraryIndex,
        constraints: Constraints,
        params: EngineParams,
        overrides: ParamOverrides,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                index: LibraryIndex::new(default_library()),
                constraints: Constraints::default(),
                params: EngineParams::default(),
                overrides: ParamOverrides::default(),
            }
        }

        fn pools(&self, check_in: &CheckIn, profile: Profile) -> EligiblePools {
            let scores = compute_load_capacity(check_in);
            filter::eligible(
                &self.index,
                &FilterContext {
                    constraints: &self.constraints,
                    time_available_min: check_in.time_available_min,
                    capacity: scores.capacity,
                    profile,
                    recent_novelty_groups: &[],
                    params: &self.params,
                },
            )
        }

        fn ctx<'a>(
            &'a self,
            check_in: &'a CheckIn,
            pools: &'a EligiblePools,
            profile: Profile,
        ) -> RuleContext<'a> {
            RuleContext {
                check_in,
                scores: compute_load_capacity(check_in),
                classified_profile: profile,
                constraints: &self.constraints,
                pools,
                params: &self.params,
                overrides: &self.overrides,
                last_quick_signal: None,
                feedback: None,
                panic: check_in.safety.panic,
                rail_reset: false,
                seed: "seed",
                policy: EnvPolicy::Test,
            }
        }

        fn selection(&self, reset: &str, movement: Option<&str>, nutrition: &str) -> Selection {
            Selection {
                reset: self.index.reset(reset).cloned(),
                movement: movement.and_then(|m| self.index.movement_item(m)).cloned(),
                nutrition: self.index.nutrition_item(nutrition).cloned(),
            }
        }
    }

    #[test]
    fn test_balanced_day_fires_nothing() {
        let f = Fixture::new();
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let selection = f.selection("reset_box_breath", Some("move_brisk_walk"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection.clone(), Some(PickSource::Seeded)), &ctx).unwrap();
        assert!(out.applied_rules.is_empty());
        assert_eq!(out.selection, selection);
        assert_eq!(out.focus, Focus::Build);
    }

    #[test]
    fn test_bad_day_mode_overrides_upstream() {
        let f = Fixture::new();
        let check_in = CheckIn::new(9, 2, 5, 30);
        let pools = f.pools(&check_in, Profile::PoorSleep);
        let ctx = f.ctx(&check_in, &pools, Profile::PoorSleep);
        let selection = f.selection("reset_body_scan", Some("move_easy_walk"), "nut_greek_yogurt");

        let out = run_pipeline(Draft::new(Profile::PoorSleep, selection, None), &ctx).unwrap();
        assert!(out.applied_rules.contains(&"bad_day_mode".to_string()));
        assert_eq!(out.focus, Focus::Downshift);
        assert!(out.intensity_cap <= 2);
        assert_eq!(out.selection.reset_id(), Some("reset_physiological_sigh"));
        assert!(out.selection.nutrition.as_ref().unwrap().has_tag("simple"));
    }

    #[test]
    fn test_panic_removes_movement_and_adds_safety_line() {
        let f = Fixture::new();
        let check_in = CheckIn::new(6, 6, 6, 30).with_panic(true);
        let mut pools = f.pools(&check_in, Profile::Balanced);
        pools.narrow_for_panic();
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let selection = f.selection("reset_body_scan", Some("move_brisk_walk"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert!(out.selection.movement.is_none());
        assert!(out.rationale.iter().any(|l| l.starts_with("Safety first")));
        assert!(out.applied_rules.contains(&"emergency_downshift".to_string()));
        assert!(out.selection.reset.as_ref().unwrap().has_tag("breath"));
    }

    #[test]
    fn test_profile_caps_replace_intense_movement() {
        let f = Fixture::new();
        let check_in = CheckIn::new(9, 6, 6, 30);
        let pools = f.pools(&check_in, Profile::Wired);
        let mut ctx = f.ctx(&check_in, &pools, Profile::Wired);
        ctx.seed = "wired";
        let selection = f.selection(
            "reset_box_breath",
            Some("move_bodyweight_intervals"),
            "nut_water_first",
        );

        let out = run_pipeline(Draft::new(Profile::Wired, selection, None), &ctx).unwrap();
        assert_eq!(out.applied_rules, vec!["wired_constraint"]);
        assert!(out.selection.movement.as_ref().unwrap().intensity <= 3);
    }

    #[test]
    fn test_time_min_constraint_fits_movement() {
        let f = Fixture::new();
        let check_in = CheckIn::new(3, 8, 8, 12);
        let pools = f.pools(&check_in, Profile::Balanced);
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        // 5 minute reset plus 10 minute walk does not fit in 12
        let selection = f.selection("reset_body_scan", Some("move_easy_walk"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert!(out.applied_rules.contains(&"time_min_constraint".to_string()));
        let movement = out.selection.movement.unwrap();
        assert!(movement.duration_min <= 7);
        assert!(movement.intensity <= 1);
    }

    #[test]
    fn test_signal_override_reapplies_signal() {
        let f = Fixture::new();
        let check_in = CheckIn::new(4, 7, 7, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let mut ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        ctx.last_quick_signal = Some(QuickSignal::Exhausted);
        let selection = f.selection("reset_body_scan", Some("move_brisk_walk"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert!(out.selection.movement.is_none());
        assert_eq!(out.applied_rules, vec!["signal_override"]);
    }

    #[test]
    fn test_feedback_too_hard_steps_down() {
        let f = Fixture::new();
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let mut ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        ctx.feedback = Some(Feedback::TooHard);
        let selection = f.selection("reset_box_breath", Some("move_brisk_walk"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert_eq!(out.intensity_cap, 2);
        assert!(out.selection.movement.unwrap().intensity <= 2);
    }

    #[test]
    fn test_quality_gate_repairs_ineligible_items() {
        let mut f = Fixture::new();
        f.constraints.injuries.knee = true;
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let selection = f.selection("reset_box_breath", Some("move_chair_squats"), "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert!(out.applied_rules.contains(&"quality_gate".to_string()));
        assert!(out.applied_rules.contains(&"safety_block".to_string()));
        assert_ne!(out.selection.movement_id(), Some("move_chair_squats"));
    }

    #[test]
    fn test_fallback_fills_missing_reset() {
        let f = Fixture::new();
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let mut selection = f.selection("reset_box_breath", None, "nut_water_first");
        selection.reset = None;

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert_eq!(out.applied_rules, vec!["quality_gate_fallback"]);
        assert!(out.selection.reset.is_some());
    }

    #[test]
    fn test_experiment_pack_and_params_override() {
        let mut f = Fixture::new();
        f.overrides.experiment_pack = Some(ExperimentPack {
            name: "calm-v2".into(),
            reset_ids: vec!["reset_478_breath".into()],
            nutrition_ids: vec!["nut_caffeine_cutoff".into()],
        });
        f.overrides.novelty_days = Some(3);
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let selection = f.selection("reset_box_breath", None, "nut_water_first");

        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert_eq!(out.applied_rules, vec!["experiment_pack", "params_override"]);
        assert_eq!(out.selection.reset_id(), Some("reset_478_breath"));
        assert_eq!(out.selection.nutrition_id(), Some("nut_caffeine_cutoff"));
    }

    #[test]
    fn test_extra_rules_follow_env_policy() {
        let mut f = Fixture::new();
        f.overrides.extra_applied_rules = vec!["legacy_rule".into(), "rail_reset".into()];
        let check_in = CheckIn::new(3, 8, 8, 30);
        let pools = f.pools(&check_in, Profile::Balanced);
        let selection = f.selection("reset_box_breath", None, "nut_water_first");

        let mut ctx = f.ctx(&check_in, &pools, Profile::Balanced);
        let result = run_pipeline(Draft::new(Profile::Balanced, selection.clone(), None), &ctx);
        assert!(matches!(result, Err(crate::Error::UnknownRule(_))));

        ctx.policy = EnvPolicy::Prod;
        let out = run_pipeline(Draft::new(Profile::Balanced, selection, None), &ctx).unwrap();
        assert_eq!(out.applied_rules, vec!["rail_reset"]);
    }
}
