//! Integration tests for the rail binary.
//!
//! These tests verify end-to-end behavior including:
//! - Contract output and determinism
//! - Baseline, signal and week seed workflows
//! - Persistence of day state between runs
//! - Library validation and environment policy

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DATE: &str = "2024-03-01";

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI isolated from the user's real config and environment
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rail"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RAIL_ENV")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn today(dir: &Path, extra: &[&str]) -> Value {
    let output = cli(dir)
        .args(["today", "--user", "alex", "--date", DATE])
        .args(extra)
        .output()
        .expect("Failed to run rail");
    assert!(
        output.status.success(),
        "rail today failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("contract JSON")
}

fn applied_rules(contract: &Value) -> Vec<String> {
    contract["meta"]["appliedRules"]
        .as_array()
        .expect("appliedRules array")
        .iter()
        .filter_map(|r| r.as_str().map(String::from))
        .collect()
}

fn user_record(dir: &Path) -> Value {
    let content = fs::read_to_string(dir.join("data/users/alex.json")).expect("user record");
    serde_json::from_str(&content).expect("record JSON")
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily rail"));
}

#[test]
fn test_today_prints_contract() {
    let temp_dir = setup_test_dir();
    let contract = today(
        temp_dir.path(),
        &["--stress", "5", "--sleep", "6", "--energy", "6", "--minutes", "30"],
    );

    assert_eq!(contract["dateKey"], DATE);
    assert_eq!(contract["profile"], "Balanced");
    assert_eq!(contract["panicMode"], false);
    assert!(contract["reset"]["id"].is_string());
    assert!(contract["nutrition"]["id"].is_string());
    assert_eq!(contract["meta"]["inputHash"].as_str().unwrap().len(), 64);
    assert_eq!(contract["meta"]["libVersion"], "2024.1");
}

#[test]
fn test_dry_run_is_deterministic_and_stores_nothing() {
    let temp_dir = setup_test_dir();
    let args = ["--stress", "7", "--sleep", "4", "--energy", "5", "--dry-run"];

    let first = today(temp_dir.path(), &args);
    let second = today(temp_dir.path(), &args);

    assert_eq!(first, second);
    assert!(!temp_dir.path().join("data/users/alex.json").exists());
}

#[test]
fn test_plan_is_kept_across_small_changes() {
    let temp_dir = setup_test_dir();
    let first = today(
        temp_dir.path(),
        &["--stress", "5", "--sleep", "6", "--energy", "6", "--minutes", "30"],
    );
    let second = today(
        temp_dir.path(),
        &["--stress", "6", "--sleep", "6", "--energy", "6", "--minutes", "30"],
    );

    assert_eq!(first["reset"], second["reset"]);
    assert_eq!(first["movement"], second["movement"]);
    assert_eq!(first["nutrition"], second["nutrition"]);
    assert!(applied_rules(&second).contains(&"keep_focus".to_string()));

    let record = user_record(temp_dir.path());
    assert_eq!(record["checkIns"][DATE]["stress"], 6);
    assert_eq!(record["profiles"][DATE], "Balanced");
    assert_eq!(record["dayStates"][DATE]["resetId"], second["reset"]["id"]);
}

#[test]
fn test_panic_mode_output() {
    let temp_dir = setup_test_dir();
    let contract = today(temp_dir.path(), &["--stress", "9", "--panic", "--dry-run"]);

    assert_eq!(contract["panicMode"], true);
    assert!(contract["movement"].is_null());
    assert!(applied_rules(&contract).contains(&"emergency_downshift".to_string()));
    let rationale = contract["rationale"].as_array().unwrap();
    assert!(rationale
        .iter()
        .any(|l| l.as_str().unwrap_or("").starts_with("Safety first")));
}

#[test]
fn test_baseline_excludes_injuries() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args([
            "baseline", "--user", "alex", "--knee", "--back", "--avoid", " Nuts ", "--avoid",
            "dairy",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"knee\": true"))
        .stdout(predicate::str::contains("\"nuts\""));

    let record = user_record(temp_dir.path());
    assert_eq!(record["constraints"]["equipment"]["none"], true);

    for minutes in ["10", "20", "40", "60"] {
        let contract = today(temp_dir.path(), &["--minutes", minutes, "--dry-run"]);
        let movement = &contract["movement"];
        if !movement.is_null() {
            let contra = movement["contraTags"].as_array().unwrap();
            assert!(!contra.iter().any(|t| t == "injury:knee" || t == "injury:back"));
        }
        let tags = contract["nutrition"]["tags"].as_array().unwrap();
        assert!(!tags.iter().any(|t| t == "nuts" || t == "dairy"));
    }
}

#[test]
fn test_signal_updates_day_state() {
    let temp_dir = setup_test_dir();
    today(
        temp_dir.path(),
        &["--stress", "4", "--sleep", "7", "--energy", "7", "--minutes", "30"],
    );

    cli(temp_dir.path())
        .args(["signal", "--user", "alex", "--date", DATE, "exhausted"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"movement\": null"));

    let record = user_record(temp_dir.path());
    assert_eq!(record["dayStates"][DATE]["lastQuickSignal"], "exhausted");
    assert!(record["dayStates"][DATE]["movementId"].is_null());

    // The stored signal keeps shaping the plan on the next request
    let contract = today(temp_dir.path(), &[]);
    assert!(contract["movement"].is_null());
    assert!(applied_rules(&contract).contains(&"signal_override".to_string()));

    // A fresh start drops it
    let contract = today(temp_dir.path(), &["--fresh", "--dry-run"]);
    assert!(applied_rules(&contract).contains(&"rail_reset".to_string()));
    assert!(!applied_rules(&contract).contains(&"signal_override".to_string()));
}

#[test]
fn test_more_energy_keeps_panic_day_still() {
    let temp_dir = setup_test_dir();
    let contract = today(
        temp_dir.path(),
        &["--stress", "2", "--sleep", "9", "--energy", "9", "--minutes", "60", "--panic"],
    );
    assert_eq!(contract["panicMode"], true);
    assert!(contract["movement"].is_null());

    let record = user_record(temp_dir.path());
    assert_eq!(record["checkIns"][DATE]["safety"]["panic"], true);

    let output = cli(temp_dir.path())
        .args(["signal", "--user", "alex", "--date", DATE, "more_energy"])
        .output()
        .expect("Failed to run rail");
    assert!(output.status.success());
    let selection: Value = serde_json::from_slice(&output.stdout).expect("selection JSON");
    assert!(selection["movement"].is_null());

    let record = user_record(temp_dir.path());
    assert!(record["dayStates"][DATE]["movementId"].is_null());
}

#[test]
fn test_signal_without_plan_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["signal", "--user", "alex", "--date", DATE, "stressed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No plan stored"));
}

#[test]
fn test_unknown_signal_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["signal", "--user", "alex", "--date", DATE, "sleepy"])
        .assert()
        .failure();
}

#[test]
fn test_week_seed_feeds_today() {
    let temp_dir = setup_test_dir();
    let output = cli(temp_dir.path())
        .args(["week", "--user", "alex", "--start", "2024-02-28"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let seed: Value = serde_json::from_slice(&output.stdout).unwrap();
    let days = seed["days"].as_object().unwrap();
    assert_eq!(days.len(), 7);
    assert!(days.contains_key(DATE));
    assert!(days.contains_key("2024-03-05"));

    let contract = today(temp_dir.path(), &["--minutes", "30", "--dry-run"]);
    assert!(applied_rules(&contract).contains(&"keep_focus".to_string()));
    assert_eq!(contract["reset"]["id"], days[DATE]["resetId"]);
}

#[test]
fn test_invalid_date_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["today", "--user", "alex", "--date", "2024-02-30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date key"));
}

#[test]
fn test_invalid_user_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["today", "--user", "../alex", "--date", DATE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid user id"));
}

#[test]
fn test_library_validate() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["library", "--validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Library 2024.1"))
        .stdout(predicate::str::contains("Library is valid"));
}

#[test]
fn test_library_validate_rejects_broken_snapshot() {
    let temp_dir = setup_test_dir();
    let library_path = temp_dir.path().join("library.json");
    fs::write(
        &library_path,
        r#"{"version": "test", "resets": [{"id": "r", "title": "", "durationSec": 0}], "movement": [], "nutrition": []}"#,
    )
    .unwrap();

    let config_path = temp_dir.path().join("rail.toml");
    fs::write(
        &config_path,
        format!("[library]\npath = {:?}\n", library_path.to_string_lossy()),
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["library", "--validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("zero duration"));
}

#[test]
fn test_rail_env_must_be_known() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .env("RAIL_ENV", "staging")
        .args(["today", "--user", "alex", "--date", DATE, "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown environment policy"));

    cli(temp_dir.path())
        .env("RAIL_ENV", "prod")
        .args(["today", "--user", "alex", "--date", DATE, "--dry-run"])
        .assert()
        .success();
}
