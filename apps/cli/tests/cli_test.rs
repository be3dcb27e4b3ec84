//! Integration tests for the `tabpipe` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// A command isolated from the user's global and local config files.
fn tabpipe(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tabpipe").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env_remove("TABPIPE_BASE_URL")
        .env_remove("TABPIPE_BUCKET")
        .env_remove("TABPIPE_EXECUTION_ROLE")
        .env_remove("TABPIPE_LOG_LEVEL");
    cmd
}

fn write_source(temp: &TempDir, rows: usize) -> String {
    let mut text = String::new();
    for row in 0..rows {
        let features: Vec<String> = (1..=20).map(|col| format!("A{}{}", col, row)).collect();
        text.push_str(&format!("{} {}\n", features.join(" "), 1 + row % 2));
    }
    let path = temp.path().join("german.data");
    fs::write(&path, text).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_stages() {
    let temp = TempDir::new().unwrap();
    tabpipe(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare"))
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_show_prints_defaults() {
    let temp = TempDir::new().unwrap();
    tabpipe(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[storage]"))
        .stdout(predicate::str::contains("folder = \"tab-transformer\""))
        .stdout(predicate::str::contains("pytorch-tabtransformerclassification-model"))
        .stdout(predicate::str::contains("epoch = \"100\""));
}

#[test]
fn test_config_precedence_local_file_then_env() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".tabpipe")).unwrap();
    fs::write(
        temp.path().join(".tabpipe").join("config.toml"),
        "[storage]\nfolder = \"global-folder\"\nbucket = \"global-bucket\"\n",
    )
    .unwrap();
    fs::write(temp.path().join("tabpipe.toml"), "[storage]\nbucket = \"local-bucket\"\n").unwrap();

    tabpipe(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bucket = \"local-bucket\""))
        .stdout(predicate::str::contains("folder = \"global-folder\""));

    tabpipe(&temp)
        .env("TABPIPE_BUCKET", "env-bucket")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bucket = \"env-bucket\""));
}

#[test]
fn test_explicit_config_must_exist() {
    let temp = TempDir::new().unwrap();
    tabpipe(&temp)
        .args(["--config", "missing.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    tabpipe(&temp).args(["config", "init"]).assert().success();
    assert!(temp.path().join("tabpipe.toml").is_file());

    tabpipe(&temp)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    tabpipe(&temp).args(["config", "init", "--force"]).assert().success();
}

#[test]
fn test_invalid_config_is_rejected_before_any_stage() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("tabpipe.toml"), "[dataset]\ntest_fraction = 0.5\n").unwrap();

    tabpipe(&temp)
        .args(["prepare", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
    assert!(!temp.path().join("data").exists());
}

#[test]
fn test_dry_run_pipeline() {
    let temp = TempDir::new().unwrap();
    let source = write_source(&temp, 100);

    tabpipe(&temp)
        .args(["prepare", "--dry-run", "--source", &source])
        .assert()
        .success()
        .stdout(predicate::str::contains("train 80, validation 10, test 10"));
    let x = fs::read_to_string(temp.path().join("data").join("X_test.csv")).unwrap();
    let y = fs::read_to_string(temp.path().join("data").join("y_test.csv")).unwrap();
    assert_eq!(x.lines().count(), 10);
    assert_eq!(y.lines().count(), 10);

    tabpipe(&temp)
        .args(["train", "--dry-run", "--epochs", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Endpoint deployed successfully"));

    let output = tabpipe(&temp)
        .args(["evaluate", "--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["endpoint"], "tabpipe-dry-run-endpoint");
    assert_eq!(report["rows"], 10);
    assert!(report["accuracy"].is_number());
}

#[test]
fn test_prepare_reports_malformed_source() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("bad.data");
    fs::write(&source, "A11 6 1\n").unwrap();

    tabpipe(&temp)
        .args(["prepare", "--dry-run", "--source", source.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 21 fields"));
}
