//! Append-only JSON Lines activity log with stderr fallback.
//!
//! Each line is one [`LogRecord`]. When the file cannot be written the logger
//! degrades to stderr instead of failing the caller; [`JsonlLogger::is_degraded`]
//! reports that it happened.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::core::errors::{GuardError, Result};
use crate::daemon::sink::{LivenessEvent, LivenessSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
}

impl Level {
    #[must_use]
    pub const fn of(event: &LivenessEvent) -> Self {
        match event {
            LivenessEvent::Transition { online: false, .. } | LivenessEvent::FeedError { .. } => {
                Self::Warn
            }
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogRecord<'a> {
    /// Wall-clock write time, RFC 3339 with millisecond precision.
    pub ts: String,
    pub level: Level,
    pub component: &'static str,
    pub event: &'a LivenessEvent,
}

enum Target {
    File(BufWriter<File>),
    Stderr,
}

pub struct JsonlLogger {
    target: Target,
    path: Option<PathBuf>,
    degraded: bool,
    lines_written: u64,
}

impl std::fmt::Debug for JsonlLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlLogger")
            .field("path", &self.path)
            .field("degraded", &self.degraded)
            .field("lines_written", &self.lines_written)
            .finish_non_exhaustive()
    }
}

impl JsonlLogger {
    /// Open (or create) `path` for appending, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| GuardError::io(parent, err))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| GuardError::io(path, err))?;
        Ok(Self {
            target: Target::File(BufWriter::new(file)),
            path: Some(path.to_path_buf()),
            degraded: false,
            lines_written: 0,
        })
    }

    #[must_use]
    pub const fn stderr() -> Self {
        Self {
            target: Target::Stderr,
            path: None,
            degraded: false,
            lines_written: 0,
        }
    }

    /// `open`, falling back to a degraded stderr logger on failure.
    #[must_use]
    pub fn open_or_stderr(path: Option<&Path>) -> Self {
        match path {
            None => Self::stderr(),
            Some(path) => Self::open(path).unwrap_or_else(|err| {
                eprintln!("[SG] activity log unavailable, using stderr: {err}");
                Self {
                    path: Some(path.to_path_buf()),
                    degraded: true,
                    ..Self::stderr()
                }
            }),
        }
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub const fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn log(&mut self, event: &LivenessEvent) {
        let record = LogRecord {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: Level::of(event),
            component: "liveness",
            event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                eprintln!("[SG] failed to serialize activity record: {err}");
                return;
            }
        };

        if let Target::File(writer) = &mut self.target {
            match write_line(writer, &line) {
                Ok(()) => {
                    self.lines_written += 1;
                    return;
                }
                Err(err) => {
                    eprintln!("[SG] activity log write failed, switching to stderr: {err}");
                    self.target = Target::Stderr;
                    self.degraded = true;
                }
            }
        }
        if write_line(&mut io::stderr().lock(), &line).is_ok() {
            self.lines_written += 1;
        }
    }
}

fn write_line(writer: &mut impl Write, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl LivenessSink for JsonlLogger {
    fn emit(&mut self, event: &LivenessEvent) {
        self.log(event);
    }
}
