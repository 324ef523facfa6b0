//! Shared harness for CLI integration tests: runs the real binary and keeps a
//! per-case log next to the build artifacts for post-mortem inspection.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CliResult {
    run_cli_case_with_stdin(case_name, args, "")
}

pub fn run_cli_case_with_stdin(case_name: &str, args: &[&str], stdin: &str) -> CliResult {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sawahguard"))
        .args(args)
        .env_remove("SAWAHGUARD_TIMEOUT_MS")
        .env_remove("SAWAHGUARD_TICK_MS")
        .env_remove("SAWAHGUARD_LOG_JSONL")
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn sawahguard binary");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for sawahguard");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let log_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("cli-cases");
    std::fs::create_dir_all(&log_dir).expect("create log dir");
    let log_path = log_dir.join(format!("{case_name}.log"));
    let log = format!(
        "args: {args:?}\nstatus: {}\n--- stdin ---\n{stdin}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status
    );
    std::fs::write(&log_path, log).expect("write case log");

    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
