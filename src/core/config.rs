//! Layered configuration: defaults, optional TOML file, `SAWAHGUARD_*` env overrides.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};

pub const ENV_TIMEOUT_MS: &str = "SAWAHGUARD_TIMEOUT_MS";
pub const ENV_TICK_MS: &str = "SAWAHGUARD_TICK_MS";
pub const ENV_LOG_JSONL: &str = "SAWAHGUARD_LOG_JSONL";

/// Full runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub liveness: LivenessConfig,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

/// Freshness threshold and evaluation cadence. The two are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub timeout_ms: u64,
    pub tick_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            tick_ms: 1_000,
        }
    }
}

/// Feed keys for the sensor snapshot and the manual deterrent switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub monitor_path: String,
    pub control_path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            monitor_path: "monitor".to_string(),
            control_path: "kontrol/paksa_usir".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only activity log. `None` logs to stderr.
    pub jsonl_path: Option<PathBuf>,
}

/// Liveness policy in the units the monitor works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub timeout: Duration,
    pub tick: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        LivenessConfig::default().policy()
    }
}

impl LivenessConfig {
    #[must_use]
    pub const fn policy(&self) -> LivenessPolicy {
        LivenessPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            tick: Duration::from_millis(self.tick_ms),
        }
    }
}

impl Config {
    /// Load configuration. `None` starts from defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            None => Self::default(),
            Some(path) => {
                if !path.exists() {
                    return Err(GuardError::MissingConfig {
                        path: path.to_path_buf(),
                    });
                }
                let raw =
                    std::fs::read_to_string(path).map_err(|err| GuardError::io(path, err))?;
                Self::from_toml_str(&raw)?
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `SAWAHGUARD_*` overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.liveness.timeout_ms = parse_millis(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TICK_MS) {
            self.liveness.tick_ms = parse_millis(ENV_TICK_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_JSONL) {
            let trimmed = raw.trim();
            self.logging.jsonl_path = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.liveness.timeout_ms == 0 {
            return Err(GuardError::InvalidConfig {
                details: "liveness.timeout_ms must be > 0".to_string(),
            });
        }
        if self.liveness.tick_ms == 0 {
            return Err(GuardError::InvalidConfig {
                details: "liveness.tick_ms must be > 0".to_string(),
            });
        }
        for (name, value) in [
            ("feed.monitor_path", &self.feed.monitor_path),
            ("feed.control_path", &self.feed.control_path),
        ] {
            if value.trim_matches('/').is_empty() {
                return Err(GuardError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn policy(&self) -> LivenessPolicy {
        self.liveness.policy()
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| GuardError::Serialization {
            context: "toml",
            details: err.to_string(),
        })
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|err| GuardError::InvalidConfig {
            details: format!("{key}={raw:?} is not a millisecond count: {err}"),
        })
}
