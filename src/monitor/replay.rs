//! Deterministic replay of recorded feed traffic through a [`LivenessMonitor`].
//!
//! A script is JSON Lines; every step carries its own `at` instant so results
//! never depend on the real clock:
//!
//! ```text
//! {"at": "2026-03-01T08:00:00Z", "value": {"jarak": 42, "status": "AMAN"}}
//! {"at": "2026-03-01T08:00:02Z", "value": {"jarak": 40}, "timestamp": 1772352002000}
//! {"at": "2026-03-01T08:00:03Z", "tick": true}
//! {"at": "2026-03-01T08:00:04Z", "reset": true}
//! ```
//!
//! Blank lines and `#` comments are skipped.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::liveness::{Evidence, LivenessMonitor};
use super::reading::{Observation, Reading, parse_server_timestamp};
use crate::core::errors::{GuardError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayAction {
    Ingest(Observation),
    /// A snapshot that does not normalize to a reading.
    Undecodable(Value),
    Tick,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    /// 1-based line in the script.
    pub line: usize,
    pub at: DateTime<Utc>,
    pub action: ReplayAction,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    at: DateTime<Utc>,
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    tick: bool,
    #[serde(default)]
    reset: bool,
}

/// Keeps an explicit `"value": null` distinguishable from a missing key.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub fn parse_script(script: &str) -> Result<Vec<ReplayStep>> {
    let mut steps = Vec::new();
    for (index, raw_line) in script.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let raw: RawStep = serde_json::from_str(trimmed).map_err(|err| GuardError::FeedDecode {
            path: format!("replay line {line}"),
            details: err.to_string(),
        })?;
        let action = match (raw.value, raw.tick, raw.reset) {
            (Some(value), false, false) => {
                let stamp = raw.timestamp.as_ref().and_then(parse_server_timestamp);
                match Reading::from_feed(&value) {
                    Some(mut observation) => {
                        if stamp.is_some() {
                            observation.server_timestamp = stamp;
                        }
                        ReplayAction::Ingest(observation)
                    }
                    None => ReplayAction::Undecodable(value),
                }
            }
            (None, true, false) => ReplayAction::Tick,
            (None, false, true) => ReplayAction::Reset,
            _ => {
                return Err(GuardError::FeedDecode {
                    path: format!("replay line {line}"),
                    details: "expected exactly one of \"value\", \"tick\", \"reset\"".to_string(),
                });
            }
        };
        steps.push(ReplayStep {
            line,
            at: raw.at,
            action,
        });
    }
    Ok(steps)
}

/// Outcome of one replayed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayRecord {
    pub line: usize,
    pub at: DateTime<Utc>,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    pub online: bool,
    /// `online` flipped on this step.
    pub transition: bool,
}

pub fn run(monitor: &mut LivenessMonitor, steps: &[ReplayStep]) -> Vec<ReplayRecord> {
    steps
        .iter()
        .map(|step| {
            let mut record = ReplayRecord {
                line: step.line,
                at: step.at,
                action: "",
                changed: None,
                evidence: None,
                online: monitor.is_online(),
                transition: false,
            };
            match &step.action {
                ReplayAction::Ingest(observation) => {
                    let outcome = monitor.ingest(observation, step.at);
                    record.action = "ingest";
                    record.changed = Some(outcome.changed);
                    record.evidence = Some(outcome.evidence);
                    record.online = outcome.online;
                    record.transition = outcome.transition.is_some();
                }
                ReplayAction::Undecodable(_) => record.action = "skip",
                ReplayAction::Tick => {
                    let evaluation = monitor.evaluate(step.at);
                    record.action = "tick";
                    record.online = evaluation.online;
                    record.transition = evaluation.transition.is_some();
                }
                ReplayAction::Reset => {
                    let was_online = monitor.is_online();
                    monitor.reset();
                    record.action = "reset";
                    record.online = false;
                    record.transition = was_online;
                }
            }
            record
        })
        .collect()
}
