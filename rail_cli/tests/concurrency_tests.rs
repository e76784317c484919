//! Concurrency tests for the rail binary.
//!
//! These tests verify that multiple processes can safely:
//! - Write different users' records at the same time
//! - Update the same user's record at the same time without losing writes
//! - Read a record while another process rewrites it

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rail"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RAIL_ENV")
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_parallel_users() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let dir = dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["today", "--user", &format!("user-{}", i), "--date", "2024-03-01"])
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    for i in 0..5 {
        let path = dir.join(format!("data/users/user-{}.json", i));
        let content = std::fs::read_to_string(&path).expect("record written");
        let record: serde_json::Value = serde_json::from_str(&content).expect("valid JSON");
        assert!(record["dayStates"]["2024-03-01"].is_object());
    }
}

#[test]
fn test_parallel_days_for_one_user_keep_every_write() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (1..=8)
        .map(|day| {
            let dir = dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["today", "--user", "sam", "--date", &format!("2024-03-0{}", day)])
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let content = std::fs::read_to_string(dir.join("data/users/sam.json")).expect("record");
    let record: serde_json::Value = serde_json::from_str(&content).expect("valid JSON");
    let days = record["dayStates"].as_object().expect("dayStates object");
    assert_eq!(days.len(), 8, "Lost updates: {:?}", days.keys().collect::<Vec<_>>());
    assert_eq!(record["checkIns"].as_object().unwrap().len(), 8);
    assert_eq!(record["profiles"].as_object().unwrap().len(), 8);
}

#[test]
fn test_reads_during_writes_never_see_partial_records() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    cli(&dir)
        .args(["today", "--user", "pat", "--date", "2024-03-01"])
        .assert()
        .success();

    let writer_dir = dir.clone();
    let writer = thread::spawn(move || {
        for day in 2..=6 {
            cli(&writer_dir)
                .args(["today", "--user", "pat", "--date", &format!("2024-03-0{}", day)])
                .assert()
                .success();
        }
    });

    let record_path = dir.join("data/users/pat.json");
    for _ in 0..10 {
        let content = std::fs::read_to_string(&record_path).expect("record readable");
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(&content);
        assert!(parsed.is_ok(), "Partial record observed: {}", content);
    }

    writer.join().expect("Writer panicked");
}
