//! Integration smoke tests for the `sawahguard` CLI surface.

mod common;

use std::io::Write;

use tempfile::NamedTempFile;

fn script_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp script");
    for line in lines {
        writeln!(file, "{line}").expect("write script");
    }
    file
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: sawahguard [OPTIONS] <COMMAND>"),
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
        result.stdout.contains("sawahguard"),
        "missing version output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_show_prints_defaults() {
    let result = common::run_cli_case("config_show_prints_defaults", &["config", "show"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("timeout_ms = 10000")
            && result.stdout.contains("tick_ms = 1000")
            && result.stdout.contains("kontrol/paksa_usir"),
        "unexpected config output; log: {}",
        result.log_path.display()
    );
}

#[test]
fn config_show_json_uses_file_values() {
    let mut config = NamedTempFile::new().expect("temp config");
    writeln!(config, "[liveness]\ntimeout_ms = 4000").expect("write config");
    let path = config.path().to_str().expect("utf-8 path");
    let result = common::run_cli_case(
        "config_show_json_uses_file_values",
        &["--json", "--config", path, "config", "show"],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let parsed: serde_json::Value =
        serde_json::from_str(&result.stdout).expect("config output is JSON");
    assert_eq!(parsed["liveness"]["timeout_ms"], 4000);
    assert_eq!(parsed["liveness"]["tick_ms"], 1000);
}

#[test]
fn missing_config_file_fails_with_code() {
    let result = common::run_cli_case(
        "missing_config_file_fails_with_code",
        &["--config", "/nonexistent/sawahguard.toml", "config", "show"],
    );
    assert!(
        !result.status.success(),
        "expected failure; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("[SG-1002]"),
        "missing error code; log: {}",
        result.log_path.display()
    );
}

#[test]
fn replay_reports_first_load_then_change_then_silence() {
    let script = script_file(&[
        r#"{"at": "2026-03-01T08:00:00Z", "value": {"jarak": 42, "status": "AMAN"}}"#,
        r#"{"at": "2026-03-01T08:00:02Z", "value": {"jarak": 40, "status": "AMAN"}}"#,
        r#"{"at": "2026-03-01T08:00:11Z", "tick": true}"#,
        r#"{"at": "2026-03-01T08:00:13Z", "tick": true}"#,
    ]);
    let path = script.path().to_str().expect("utf-8 path");
    let result = common::run_cli_case(
        "replay_reports_first_load_then_change_then_silence",
        &["--json", "replay", path],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let records: Vec<serde_json::Value> = result
        .stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("replay record is JSON"))
        .collect();
    let online: Vec<bool> = records
        .iter()
        .map(|r| r["online"].as_bool().expect("online flag"))
        .collect();
    assert_eq!(
        online,
        vec![false, true, true, false],
        "log: {}",
        result.log_path.display()
    );
    assert_eq!(records[0]["evidence"], "baseline");
    assert_eq!(records[1]["changed"], true);
    assert_eq!(records[3]["transition"], true);
}

#[test]
fn replay_text_mode_prints_final_verdict() {
    let script = script_file(&[
        r#"{"at": "2026-03-01T08:00:00Z", "value": {"jarak": 42}, "timestamp": "2026-03-01T07:59:59Z"}"#,
    ]);
    let path = script.path().to_str().expect("utf-8 path");
    let result = common::run_cli_case("replay_text_mode_prints_final_verdict", &["replay", path]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("final: ONLINE after 1 steps"),
        "missing verdict; log: {}",
        result.log_path.display()
    );
}

#[test]
fn replay_rejects_malformed_script() {
    let script = script_file(&[r#"{"at": "not-a-time", "tick": true}"#]);
    let path = script.path().to_str().expect("utf-8 path");
    let result = common::run_cli_case("replay_rejects_malformed_script", &["replay", path]);
    assert!(
        !result.status.success(),
        "expected failure; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("[SG-2002]") && result.stderr.contains("replay line 1"),
        "missing decode error; log: {}",
        result.log_path.display()
    );
}

#[test]
fn watch_reports_change_as_online_until_eof() {
    let stdin = [
        r#"{"path": "monitor", "value": {"jarak": 42, "status": "AMAN"}}"#,
        r#"{"path": "monitor", "redeliver": true}"#,
        r#"{"path": "monitor/jarak", "value": 40}"#,
        r#"{"path": "kontrol/paksa_usir", "value": true}"#,
        "garbage",
    ]
    .join("\n");
    let result = common::run_cli_case_with_stdin(
        "watch_reports_change_as_online_until_eof",
        &["--json", "watch"],
        &stdin,
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let events: Vec<serde_json::Value> = result
        .stdout
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    let evidence: Vec<&str> = events
        .iter()
        .filter(|e| e["event"] == "reading")
        .filter_map(|e| e["evidence"].as_str())
        .collect();
    assert_eq!(
        evidence,
        vec!["baseline", "duplicate", "value_changed"],
        "log: {}",
        result.log_path.display()
    );
    assert!(
        events
            .iter()
            .any(|e| e["event"] == "transition" && e["online"] == true),
        "missing online transition; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stderr.contains("skipped input:"),
        "bad line should be reported; log: {}",
        result.log_path.display()
    );
}

#[test]
fn completions_command_generates_shell_script() {
    let result = common::run_cli_case(
        "completions_command_generates_shell_script",
        &["completions", "bash"],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("sawahguard"),
        "expected completion script contents; log: {}",
        result.log_path.display()
    );
}
