//! Integration tests for the Plateau CLI
//!
//! These tests verify the CLI behavior without requiring root privileges
//! or actual storage devices.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the plateau binary
#[allow(deprecated)]
fn plateau() -> Command {
    Command::cargo_bin("plateau").unwrap()
}

/// Command isolated from the user's configuration file
fn plateau_with_config(dir: &TempDir) -> (Command, PathBuf) {
    let path = dir.path().join("plateau_config.toml");
    let mut cmd = plateau();
    cmd.env("PLATEAU_CONFIG", &path);
    (cmd, path)
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    plateau()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("steady-state"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("array"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    plateau()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("plateau"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_no_args_shows_help() {
    plateau()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// ============================================================================
// Subcommand Help Tests
// ============================================================================

#[test]
fn test_run_help() {
    plateau()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--test"))
        .stdout(predicate::str::contains("--array-level"))
        .stdout(predicate::str::contains("--member"))
        .stdout(predicate::str::contains("--window"))
        .stdout(predicate::str::contains("--max-rounds"));
}

#[test]
fn test_array_help() {
    plateau()
        .args(["array", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--level"))
        .stdout(predicate::str::contains("--op"))
        .stdout(predicate::str::contains("erase"))
        .stdout(predicate::str::contains("precondition"));
}

#[test]
fn test_check_help() {
    plateau()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--start"))
        .stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_check_steady_series() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["check", "998", "999", "1000", "998"])
        .assert()
        .success()
        .stdout(predicate::str::contains("STEADY"))
        .stdout(predicate::str::contains("NOT STEADY").not())
        .stdout(predicate::str::contains("over rounds 0-3"))
        .stdout(predicate::str::contains("Average:"));
}

#[test]
fn test_check_ramping_series_not_steady() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["check", "100", "200", "300", "400", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT STEADY"));
}

#[test]
fn test_check_json_output() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    let output = cmd
        .args(["check", "--json", "--start", "4", "10", "10", "10"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["reached"], true);
    assert_eq!(json["rounds"], serde_json::json!([4, 5, 6]));
    assert_eq!(json["average"], 10.0);
}

#[test]
fn test_check_zero_average_fails() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["check", "0", "0", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Degenerate input"));
}

#[test]
fn test_check_requires_values() {
    plateau().arg("check").assert().failure();
}

#[test]
fn test_check_uses_configured_thresholds() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    fs::write(&path, "[steady_state]\nexcursion_pct = 0.001\n").unwrap();

    cmd.args(["check", "998", "999", "1000", "998"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT STEADY"));
}

#[test]
fn test_check_band_rule_from_config() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    fs::write(&path, "[steady_state]\nexcursion_rule = \"band\"\n").unwrap();

    cmd.args(["check", "998", "999", "1000", "998"])
        .assert()
        .success()
        .stdout(predicate::str::contains("band rule"));
}

#[test]
fn test_check_band_width_follows_excursion_pct() {
    // avg 100, furthest value 12 away
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    fs::write(
        &path,
        "[steady_state]\nexcursion_rule = \"band\"\nexcursion_pct = 0.1\n",
    )
    .unwrap();
    cmd.args(["check", "88", "112", "100", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT STEADY"))
        .stdout(predicate::str::contains("limit 10.000, band rule"));

    fs::write(
        &path,
        "[steady_state]\nexcursion_rule = \"band\"\nexcursion_pct = 0.15\n",
    )
    .unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["check", "88", "112", "100", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NOT STEADY").not())
        .stdout(predicate::str::contains("limit 15.000, band rule"));
}

#[test]
fn test_check_start_overflow_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["check", "--start", "18446744073709551615", "1", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("overflow the round index"));
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_path() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    cmd.args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path.display().to_string()));
}

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Plateau Configuration"))
        .stdout(predicate::str::contains("not found, using defaults"))
        .stdout(predicate::str::contains("[steady_state]"))
        .stdout(predicate::str::contains("window_size = 5"))
        .stdout(predicate::str::contains("[fio]"))
        .stdout(predicate::str::contains("plateau config --init"));
}

#[test]
fn test_config_json() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    let output = cmd.args(["config", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["steady_state"]["max_rounds"], 25);
    assert_eq!(json["fio"]["binary"], "fio");
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    cmd.args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("not found").not());

    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["config", "--init"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    let other = dir.path().join("other.toml");
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["--config", other.to_str().unwrap(), "config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("other.toml"));
}

#[test]
fn test_config_warns_on_invalid_values() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, path) = plateau_with_config(&dir);
    fs::write(&path, "[steady_state]\nwindow_size = 30\n").unwrap();

    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning:"))
        .stdout(predicate::str::contains("smaller than the window size"));
}

// ============================================================================
// Run and Array Validation Tests
// ============================================================================

#[test]
fn test_run_member_requires_level() {
    plateau()
        .args(["run", "/dev/md0", "--member", "/dev/sdb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--array-level"));
}

#[test]
fn test_run_unknown_test_rejected() {
    plateau()
        .args(["run", "/dev/sdb", "--test", "sequential"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown test"));
}

#[test]
fn test_run_window_larger_than_budget_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["run", "/dev/sdb", "--window", "10", "--max-rounds", "5", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("smaller than the window size"));
}

#[test]
fn test_run_zero_runtime_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["run", "/dev/sdb", "--runtime", "0", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1 second"));
}

#[test]
fn test_run_array_too_few_members_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args([
        "run",
        "/dev/md0",
        "--array-level",
        "10",
        "--member",
        "/dev/sdb",
        "--member",
        "/dev/sdc",
        "--yes",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("RAID 10 needs at least 4 members"));
}

#[test]
fn test_array_requires_op() {
    plateau()
        .args(["array", "/dev/md0", "--level", "1", "--member", "/dev/sdb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--op"));
}

#[test]
fn test_array_self_member_rejected() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args([
        "array",
        "/dev/md0",
        "--level",
        "1",
        "--member",
        "/dev/md0",
        "--member",
        "/dev/sdb",
        "--op",
        "erase",
        "--yes",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("listed as its own member"));
}

// ============================================================================
// Completions and Man Pages
// ============================================================================

#[test]
fn test_completions_bash() {
    plateau()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plateau"));
}

#[test]
fn test_completions_invalid_shell() {
    plateau()
        .args(["completions", "cmd.exe"])
        .assert()
        .failure();
}

#[test]
fn test_mangen_writes_pages() {
    let dir = TempDir::new().unwrap();
    plateau()
        .args(["mangen", "--out-dir", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("plateau.1"));

    assert!(dir.path().join("plateau.1").exists());
    assert!(dir.path().join("plateau-run.1").exists());
    assert!(dir.path().join("plateau-check.1").exists());
    assert!(!dir.path().join("plateau-mangen.1").exists());
}

// ============================================================================
// Silent Mode
// ============================================================================

#[test]
fn test_silent_check_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let (mut cmd, _) = plateau_with_config(&dir);
    cmd.args(["--silent", "check", "10", "10", "10"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
