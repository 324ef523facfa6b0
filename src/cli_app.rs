//! Top-level CLI definition and dispatch.

use std::fmt::Write as _;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use crossbeam_channel::select;
use serde::Deserialize;
use serde_json::Value;

use crate::core::config::Config;
use crate::core::errors::{GuardError, Result};
use crate::daemon::dashboard::{DashboardMsg, SharedDashboard};
use crate::daemon::signals::ShutdownFlag;
use crate::daemon::{FanoutSink, LivenessEvent, LivenessService, LivenessSink, ManualOverride};
use crate::feed::MemoryFeed;
use crate::logger::JsonlLogger;
use crate::monitor::reading::parse_server_timestamp;
use crate::monitor::replay::{self, ReplayRecord};
use crate::monitor::{LivenessMonitor, SystemClock};

/// SawahGuard: online/offline monitoring for a remote pest-deterrent sensor.
#[derive(Parser)]
#[command(name = "sawahguard", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Monitor feed events read as JSON lines from stdin until EOF or Ctrl-C.
    Watch,
    /// Replay a recorded JSONL script through the monitor with its own timestamps.
    Replay {
        /// Script file; one step per line.
        script: PathBuf,
    },
    /// Show configuration.
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Generate a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// `config` subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (defaults + file + environment).
    Show,
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Watch => {
            let config = Config::load(cli.config.as_deref())?;
            watch(&config, cli.json)
        }
        Command::Replay { script } => {
            let config = Config::load(cli.config.as_deref())?;
            replay_file(&config, script, cli.json)
        }
        Command::Config { .. } => {
            let config = Config::load(cli.config.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", config.to_toml()?);
            }
            Ok(())
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "sawahguard", &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── watch ────────────────────

/// One line of `watch` input.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FeedLine {
    path: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    timestamp: Option<Value>,
    /// Re-emit the current value at `path` instead of writing.
    #[serde(default)]
    redeliver: bool,
}

/// Prints service events to stdout.
struct StdoutSink {
    json: bool,
    dashboard: SharedDashboard,
}

impl LivenessSink for StdoutSink {
    fn emit(&mut self, event: &LivenessEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => eprintln!("[SG] failed to encode event: {err}"),
            }
            return;
        }
        match event {
            LivenessEvent::Transition { online: true, at } => {
                println!("{} device is {}", at.format("%H:%M:%S"), "ONLINE".green().bold());
            }
            LivenessEvent::Transition { online: false, at } => {
                println!("{} device is {}", at.format("%H:%M:%S"), "OFFLINE".red().bold());
            }
            LivenessEvent::Reading { .. } => {
                println!("{}", self.dashboard.snapshot().summary_line());
            }
            LivenessEvent::FeedError { path, details, .. } => {
                println!("{} {path}: {details}", "feed error".yellow());
            }
            LivenessEvent::Lifecycle { phase, at } => {
                let phase = format!("{phase:?}").to_lowercase();
                println!("{} monitor {}", at.format("%H:%M:%S"), phase.dimmed());
            }
        }
    }
}

fn watch(config: &Config, json: bool) -> Result<()> {
    let shutdown = ShutdownFlag::register()?;
    let feed = MemoryFeed::new();
    let dashboard = SharedDashboard::new();

    // Dashboard first so the printed summary already reflects the event.
    let sink = FanoutSink::new()
        .with(dashboard.clone())
        .with(StdoutSink {
            json,
            dashboard: dashboard.clone(),
        })
        .with(JsonlLogger::open_or_stderr(config.logging.jsonl_path.as_deref()));
    let mut service = LivenessService::new(
        feed.clone(),
        SystemClock,
        &config.feed.monitor_path,
        config.policy(),
        sink,
    );
    let override_view = dashboard.clone();
    let mut control = ManualOverride::new(feed.clone(), &config.feed.control_path)
        .with_listener(move |on| override_view.apply(DashboardMsg::ManualOverride(on)));

    service.start()?;
    control.start()?;

    let lines = spawn_stdin_reader()?;
    while !shutdown.is_requested() {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => apply_feed_line(&feed, &line),
                Err(_) => shutdown.request(),
            },
            default(Duration::from_millis(200)) => {}
        }
    }

    control.stop();
    service.stop()?;
    if !json {
        println!("{}", dashboard.snapshot().summary_line());
    }
    Ok(())
}

fn spawn_stdin_reader() -> Result<crossbeam_channel::Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("sawahguard-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| GuardError::Runtime {
            details: format!("failed to spawn stdin reader: {err}"),
        })?;
    Ok(rx)
}

/// Bad input lines are reported and skipped; watching continues.
fn apply_feed_line(feed: &MemoryFeed, line: &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return;
    }
    let result = serde_json::from_str::<FeedLine>(trimmed)
        .map_err(|err| GuardError::FeedDecode {
            path: "stdin".to_string(),
            details: err.to_string(),
        })
        .and_then(|parsed| {
            if parsed.redeliver {
                feed.redeliver(&parsed.path)
            } else {
                let stamp = parsed.timestamp.as_ref().and_then(parse_server_timestamp);
                feed.publish(&parsed.path, parsed.value, stamp)
            }
        });
    if let Err(err) = result {
        eprintln!("{} {err}", "skipped input:".yellow());
    }
}

// ──────────────────── replay ────────────────────

fn replay_file(config: &Config, script: &Path, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(script).map_err(|err| GuardError::io(script, err))?;
    let steps = replay::parse_script(&raw)?;
    let mut monitor = LivenessMonitor::new(config.policy());
    let records = replay::run(&mut monitor, &steps);

    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{}", describe(record));
        }
    }
    if !json {
        let verdict = if monitor.is_online() {
            "ONLINE".green().bold()
        } else {
            "OFFLINE".red().bold()
        };
        println!("final: {verdict} after {} steps", records.len());
    }
    Ok(())
}

fn describe(record: &ReplayRecord) -> String {
    let mut text = format!(
        "line {:>3} {} {:<6} online={}",
        record.line,
        record.at.format("%H:%M:%S"),
        record.action,
        record.online
    );
    if let Some(changed) = record.changed {
        let _ = write!(text, " changed={changed}");
    }
    if let Some(evidence) = record.evidence {
        let _ = write!(text, " ({evidence:?})");
    }
    if record.transition {
        text.push_str(" <- transition");
    }
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::feed::Feed;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn feed_lines_publish_and_redeliver() {
        let feed = MemoryFeed::new();
        apply_feed_line(&feed, r#"{"path": "monitor", "value": {"jarak": 12}}"#);
        assert_eq!(feed.get("monitor"), json!({"jarak": 12}));

        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&hits);
        let _sub = feed
            .subscribe(
                "monitor",
                std::sync::Arc::new(move |_: &crate::feed::FeedEvent| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }),
            )
            .unwrap();
        apply_feed_line(&feed, r#"{"path": "monitor", "redeliver": true}"#);
        apply_feed_line(&feed, "not json");
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn replay_description_mentions_transition() {
        let record = ReplayRecord {
            line: 4,
            at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            action: "tick",
            changed: None,
            evidence: None,
            online: false,
            transition: true,
        };
        assert_eq!(
            describe(&record),
            "line   4 00:00:00 tick   online=false <- transition"
        );
    }
}
