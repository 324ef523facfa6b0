//! SG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Top-level error type for SawahGuard.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("[SG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SG-2001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SG-2002] undecodable feed value at {path}: {details}")]
    FeedDecode { path: String, details: String },

    #[error("[SG-2003] feed closed while accessing {path}")]
    FeedClosed { path: String },

    #[error("[SG-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl GuardError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SG-1001",
            Self::MissingConfig { .. } => "SG-1002",
            Self::ConfigParse { .. } => "SG-1003",
            Self::Serialization { .. } => "SG-2001",
            Self::FeedDecode { .. } => "SG-2002",
            Self::FeedClosed { .. } => "SG-2003",
            Self::Io { .. } => "SG-3001",
            Self::Runtime { .. } => "SG-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_embedded_in_display_output() {
        let err = GuardError::InvalidConfig {
            details: "tick_ms must be > 0".to_string(),
        };
        assert_eq!(err.code(), "SG-1001");
        assert!(err.to_string().starts_with("[SG-1001]"));
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        let io = GuardError::io(
            "/tmp/sawahguard.jsonl",
            std::io::Error::other("disk gone"),
        );
        assert!(io.is_retryable());
        assert!(
            !GuardError::FeedClosed {
                path: "monitor".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn toml_errors_map_to_config_parse() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("liveness = [");
        let err = GuardError::from(parse.unwrap_err());
        assert_eq!(err.code(), "SG-1003");
    }
}
