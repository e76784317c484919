#![forbid(unsafe_code)]

//! Core decision engine for the daily rail.
//!
//! This crate provides:
//! - Domain types (check-ins, baselines, content items, day contracts)
//! - Defensive input normalization
//! - Scoring, profile classification, filtering and seeded selection
//! - The ordered rule pipeline and the quick-signal adapter
//! - Day contract and week seed builders
//! - A file-backed reference store for local use

pub mod types;
pub mod error;
pub mod normalize;
pub mod library;
pub mod config;
pub mod logging;
pub mod params;
pub mod scoring;
pub mod profile;
pub mod filter;
pub mod selector;
pub mod rules;
pub mod quick_signal;
pub mod pipeline;
pub mod contract;
pub mod week_seed;
pub mod state;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use library::{default_library, LibraryIndex};
pub use params::{EngineParams, ExperimentPack, ParamOverrides};
pub use scoring::compute_load_capacity;
pub use profile::{assign_profile, assign_stress_profile, ProfileInput, ProfileThresholds};
pub use rules::{normalize_applied_rules, EnvPolicy, RuleName, RuleOutcome, RULES_ORDER};
pub use quick_signal::{apply_quick_signal, apply_signal_to_day_state, SignalContext};
pub use contract::{build_day_contract, stable_stringify, PlanRequest};
pub use week_seed::generate_week_seed;
pub use state::UserRecord;
pub use history::recent_novelty_groups;
