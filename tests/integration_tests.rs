//! Integration smoke tests for the `opswatch` CLI surface.

mod common;

use std::fs;

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: opswatch [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains(env!("CARGO_PKG_VERSION")),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn interval_command_prints_seconds() {
    let cases: [(&str, &str); 4] = [("10m", "600"), ("3d", "259200"), ("2W", "1209600"), ("45", "45")];
    for (expr, expected) in cases {
        let result = common::run_cli_case(&format!("interval_{expr}"), &["interval", expr]);
        assert!(
            result.status.success(),
            "interval {expr} failed; log: {}",
            result.log_path.display()
        );
        assert_eq!(result.stdout.trim(), expected, "log: {}", result.log_path.display());
    }
}

#[test]
fn interval_command_rejects_garbage() {
    let result = common::run_cli_case("interval_rejects_garbage", &["interval", "10x"]);
    assert!(!result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stderr.contains("OPS-1101"),
        "expected interval error code; log: {}",
        result.log_path.display()
    );
}

#[test]
fn calendar_command_reports_match() {
    let result = common::run_cli_case(
        "calendar_command_reports_match",
        &["calendar", "0;9;*;*;1-5", "--at", "2024-06-03T09:00:00+00:00", "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(payload["matches"], true);

    // 2024-06-02 is a Sunday.
    let result = common::run_cli_case(
        "calendar_command_reports_mismatch",
        &["calendar", "0;9;*;*;1-5", "--at", "2024-06-02T09:00:00+00:00", "--json"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(payload["matches"], false);
}

#[test]
fn workers_command_lists_builtin_kinds() {
    let result = common::run_cli_case("workers_command_lists_builtin_kinds", &["workers", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(payload["producers"], serde_json::json!(["heartbeat", "schedule"]));
    assert_eq!(payload["consumers"], serde_json::json!(["journal", "log"]));
}

#[test]
fn check_config_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opswatch.toml");
    fs::write(
        &path,
        r#"
        [daemon]
        producers = ["beat"]
        consumers = ["log"]

        [beat]
        kind = "heartbeat"
        priority = 1
        intervals = ["alive=5m"]

        [log]
        priority = 1
        "#,
    )
    .unwrap();
    let path = path.display().to_string();

    let result = common::run_cli_case("check_config_accepts_valid_file", &["check-config", "--config", &path]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stdout.contains("beat (heartbeat)"), "log: {}", result.log_path.display());
    assert!(!result.stdout.contains("FAIL"), "log: {}", result.log_path.display());
}

#[test]
fn check_config_reads_path_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.toml");
    fs::write(&path, "[daemon]\nconsumers = [\"log\"]\n").unwrap();
    let path = path.display().to_string();

    let result = common::run_cli_case_with_env(
        "check_config_reads_path_from_environment",
        &["check-config", "--json"],
        &[("OPSWATCH_CONFIG", path.as_str())],
    );
    // `[log]` is missing its priority.
    assert!(!result.status.success(), "log: {}", result.log_path.display());
    let payload: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(payload["workers"][0]["section"], "log");
    assert!(
        payload["workers"][0]["error"]
            .as_str()
            .unwrap()
            .contains("OPS-1004")
    );
}

#[test]
fn check_config_reports_missing_file() {
    let result = common::run_cli_case(
        "check_config_reports_missing_file",
        &["check-config", "--config", "/nonexistent/opswatch.toml"],
    );
    assert!(!result.status.success(), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("OPS-1002"), "log: {}", result.log_path.display());
}

#[test]
fn completions_command_generates_shell_script() {
    let result = common::run_cli_case(
        "completions_command_generates_shell_script",
        &["completions", "bash"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert!(
        result.stdout.contains("opswatch"),
        "expected completion script contents; log: {}",
        result.log_path.display()
    );
}
