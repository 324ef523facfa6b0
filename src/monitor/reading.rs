//! Sensor readings as published by the device, and their normalization from
//! raw feed snapshots.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status the device reports while nothing is in range.
pub const STATUS_SAFE: &str = "AMAN";

/// Marker the device puts in its status when a pest is in range.
pub const PEST_MARKER: &str = "HAMA";

/// One ultrasonic reading plus the device's own status label.
///
/// Equality only looks at `distance` and `status`; anything else the device
/// attaches to a snapshot is dropped during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Measured distance in centimetres.
    pub distance: f64,
    pub status: String,
}

impl Reading {
    #[must_use]
    pub fn new(distance: f64, status: impl Into<String>) -> Self {
        Self {
            distance,
            status: status.into(),
        }
    }

    /// Normalize a raw snapshot of the monitor node.
    ///
    /// Returns `None` for empty (`null`) or non-object snapshots. Missing or
    /// malformed fields fall back to `0` cm and [`STATUS_SAFE`].
    #[must_use]
    pub fn from_feed(raw: &Value) -> Option<Observation> {
        let fields = raw.as_object()?;

        let distance = fields
            .get("jarak")
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);
        let status = fields
            .get("status")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(STATUS_SAFE)
            .to_string();
        let server_timestamp = fields.get("timestamp").and_then(parse_server_timestamp);

        Some(Observation {
            value: Self { distance, status },
            server_timestamp,
        })
    }

    #[must_use]
    pub fn threat(&self) -> ThreatLevel {
        if self.status.to_uppercase().contains(PEST_MARKER) {
            ThreatLevel::PestDetected
        } else {
            ThreatLevel::Safe
        }
    }
}

/// A reading together with the feed's authoritative write time, if it sent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: Reading,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    #[must_use]
    pub const fn untimestamped(value: Reading) -> Self {
        Self {
            value,
            server_timestamp: None,
        }
    }

    #[must_use]
    pub const fn timestamped(value: Reading, at: DateTime<Utc>) -> Self {
        Self {
            value,
            server_timestamp: Some(at),
        }
    }
}

/// Parse a server timestamp: integers are epoch milliseconds, strings RFC 3339.
///
/// Anything else is treated as "no timestamp".
#[must_use]
pub fn parse_server_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Safe,
    PestDetected,
}

/// Whether the buzzer/servo deterrent should be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    pub threat: ThreatLevel,
    pub manual_override: bool,
}

impl AlarmState {
    #[must_use]
    pub fn from_reading(reading: &Reading, manual_override: bool) -> Self {
        Self {
            threat: reading.threat(),
            manual_override,
        }
    }

    /// Deterrent runs on a detected pest or on the operator's manual switch.
    #[must_use]
    pub fn deterrent_active(&self) -> bool {
        self.manual_override || self.threat == ThreatLevel::PestDetected
    }
}
