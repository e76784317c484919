//! Rule identifiers, canonical ordering, and applied-rule normalization.
//!
//! Rule names are a fixed, versioned set. The pipeline reports the rules that
//! fired in whatever order they fired; consumers always receive them
//! deduplicated and sorted by `RULES_ORDER`.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Version of the rule-name contract
pub const RULES_VERSION: u32 = 3;

/// Every rule the pipeline knows about
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    ProfileOverride,
    BusyDay,
    KeepFocus,
    TimeMinConstraint,
    PoorSleepConstraint,
    WiredConstraint,
    DepletedConstraint,
    RecoveryDebtBias,
    SignalOverride,
    FeedbackModifier,
    ResetFocusOverride,
    BadDayMode,
    NoveltyAvoidance,
    SafetyBlock,
    EmergencyDownshift,
    QualityGate,
    QualityGateFallback,
    ExperimentPack,
    ParamsOverride,
    RailReset,
}

/// Canonical application and reporting order
pub const RULES_ORDER: [RuleName; 20] = [
    RuleName::ProfileOverride,
    RuleName::BusyDay,
    RuleName::KeepFocus,
    RuleName::TimeMinConstraint,
    RuleName::PoorSleepConstraint,
    RuleName::WiredConstraint,
    RuleName::DepletedConstraint,
    RuleName::RecoveryDebtBias,
    RuleName::SignalOverride,
    RuleName::FeedbackModifier,
    RuleName::ResetFocusOverride,
    RuleName::BadDayMode,
    RuleName::NoveltyAvoidance,
    RuleName::SafetyBlock,
    RuleName::EmergencyDownshift,
    RuleName::QualityGate,
    RuleName::QualityGateFallback,
    RuleName::ExperimentPack,
    RuleName::ParamsOverride,
    RuleName::RailReset,
];

static RULE_POSITIONS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    RULES_ORDER
        .iter()
        .enumerate()
        .map(|(i, rule)| (rule.as_str(), i))
        .collect()
});

impl RuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::ProfileOverride => "profile_override",
            RuleName::BusyDay => "busy_day",
            RuleName::KeepFocus => "keep_focus",
            RuleName::TimeMinConstraint => "time_min_constraint",
            RuleName::PoorSleepConstraint => "poor_sleep_constraint",
            RuleName::WiredConstraint => "wired_constraint",
            RuleName::DepletedConstraint => "depleted_constraint",
            RuleName::RecoveryDebtBias => "recovery_debt_bias",
            RuleName::SignalOverride => "signal_override",
            RuleName::FeedbackModifier => "feedback_modifier",
            RuleName::ResetFocusOverride => "reset_focus_override",
            RuleName::BadDayMode => "bad_day_mode",
            RuleName::NoveltyAvoidance => "novelty_avoidance",
            RuleName::SafetyBlock => "safety_block",
            RuleName::EmergencyDownshift => "emergency_downshift",
            RuleName::QualityGate => "quality_gate",
            RuleName::QualityGateFallback => "quality_gate_fallback",
            RuleName::ExperimentPack => "experiment_pack",
            RuleName::ParamsOverride => "params_override",
            RuleName::RailReset => "rail_reset",
        }
    }

    /// Position in `RULES_ORDER`
    pub fn position(&self) -> usize {
        RULE_POSITIONS[self.as_str()]
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RULE_POSITIONS
            .get(s)
            .map(|&i| RULES_ORDER[i])
            .ok_or_else(|| Error::UnknownRule(s.to_string()))
    }
}

/// Deployment environment, deciding how strictly the rule contract is enforced
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvPolicy {
    #[default]
    Dev,
    Test,
    Alpha,
    Prod,
}

impl EnvPolicy {
    /// Alpha and prod lock the rule contract: unknown names degrade instead of failing
    pub fn rules_frozen(&self) -> bool {
        matches!(self, EnvPolicy::Alpha | EnvPolicy::Prod)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvPolicy::Dev => "dev",
            EnvPolicy::Test => "test",
            EnvPolicy::Alpha => "alpha",
            EnvPolicy::Prod => "prod",
        }
    }
}

impl FromStr for EnvPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(EnvPolicy::Dev),
            "test" => Ok(EnvPolicy::Test),
            "alpha" => Ok(EnvPolicy::Alpha),
            "prod" | "production" => Ok(EnvPolicy::Prod),
            other => Err(Error::Config(format!("Unknown environment policy: {}", other))),
        }
    }
}

/// What happens to one reported rule name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Applied(RuleName),
    /// Unknown name in a frozen environment: logged and dropped
    Dropped(String),
    /// Unknown name in dev/test: a contract violation
    Rejected(String),
}

pub fn classify_rule(name: &str, policy: EnvPolicy) -> RuleOutcome {
    match name.parse::<RuleName>() {
        Ok(rule) => RuleOutcome::Applied(rule),
        Err(_) if policy.rules_frozen() => RuleOutcome::Dropped(name.to_string()),
        Err(_) => RuleOutcome::Rejected(name.to_string()),
    }
}

/// Drop or reject unknown names, dedupe, and sort by `RULES_ORDER`
pub fn normalize_applied_rules<S: AsRef<str>>(names: &[S], policy: EnvPolicy) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut rules: Vec<RuleName> = Vec::with_capacity(names.len());

    for name in names {
        match classify_rule(name.as_ref(), policy) {
            RuleOutcome::Applied(rule) => {
                if seen.insert(rule) {
                    rules.push(rule);
                }
            }
            RuleOutcome::Dropped(name) => {
                tracing::warn!(
                    "Dropping unknown rule '{}' (rules frozen in {})",
                    name,
                    policy.as_str()
                );
            }
            RuleOutcome::Rejected(name) => {
                tracing::error!("Unknown rule '{}' in {} environment", name, policy.as_str());
                return Err(Error::UnknownRule(name));
            }
        }
    }

    // Stable sort keeps insertion order for equal positions
    rules.sort_by_key(|rule| rule.position());

    Ok(rules.iter().map(|r| r.as_str().to_string()).collect())
}
