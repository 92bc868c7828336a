//! End-to-end safety gate behavior through the CLI.
//!
//! These tests exercise the two-tier verdict model: critical findings block
//! a dose unconditionally, warnings block until acknowledged, and `check`
//! never writes anything.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("glucolog"))
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = temp.path().join("config.toml");
    let data_dir = temp.path().join("data");

    cli()
        .arg("init")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success();

    (temp, config_path, data_dir)
}

fn log_cmd(config_path: &PathBuf, data_dir: &PathBuf) -> Command {
    let mut cmd = cli();
    cmd.arg("log")
        .arg("--config")
        .arg(config_path)
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

#[test]
fn test_safe_dose_is_logged() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("120")
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Entry logged"));
}

#[test]
fn test_severe_hypo_blocks_dose() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("50")
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .failure()
        .stdout(predicate::str::contains("CRITICAL"))
        .stdout(predicate::str::contains("severe hypoglycemia"));

    // Nothing was written
    assert!(!data_dir.join("wal/diary.wal").exists());
}

#[test]
fn test_critical_block_cannot_be_acknowledged() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("50")
        .arg("--insulin")
        .arg("rapid=2")
        .arg("--acknowledge-warnings")
        .assert()
        .failure()
        .stderr(predicate::str::contains("blocked"));
}

#[test]
fn test_implausible_dose_blocked_at_normal_glucose() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("120")
        .arg("--insulin")
        .arg("rapid=60")
        .assert()
        .failure()
        .stdout(predicate::str::contains("ceiling"));
}

#[test]
fn test_stacked_dose_warns_until_acknowledged() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("120")
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .success();

    // A second dose right away trips the interval and stacking warnings
    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("120")
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .failure()
        .stderr(predicate::str::contains("acknowledge-warnings"));

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("120")
        .arg("--insulin")
        .arg("rapid=2")
        .arg("--acknowledge-warnings")
        .assert()
        .success()
        .stdout(predicate::str::contains("Entry logged"));
}

#[test]
fn test_dose_without_glucose_reading_warns() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .failure()
        .stdout(predicate::str::contains("glucose reading"));
}

#[test]
fn test_check_reports_clear_verdict_without_logging() {
    let (_temp, config_path, data_dir) = setup();

    cli()
        .arg("check")
        .arg("--config")
        .arg(&config_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--dose")
        .arg("2")
        .arg("--glucose")
        .arg("120")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict: PERMITTED"));

    assert!(!data_dir.join("wal/diary.wal").exists());
}

#[test]
fn test_check_reports_blocked_verdict() {
    let (_temp, config_path, data_dir) = setup();

    cli()
        .arg("check")
        .arg("--config")
        .arg(&config_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--dose")
        .arg("4")
        .arg("--glucose")
        .arg("45")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict: BLOCKED"));
}

#[test]
fn test_check_sees_logged_insulin_as_iob() {
    let (_temp, config_path, data_dir) = setup();

    log_cmd(&config_path, &data_dir)
        .arg("--glucose")
        .arg("150")
        .arg("--insulin")
        .arg("rapid=2")
        .assert()
        .success();

    // A fresh 2 u dose is still fully active moments later
    cli()
        .arg("check")
        .arg("--config")
        .arg(&config_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--dose")
        .arg("1")
        .arg("--glucose")
        .arg("150")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active insulin: 2.00 u"));
}
