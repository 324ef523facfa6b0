//! Consumer side of the liveness service: events and the sinks that receive them.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::monitor::{Evidence, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Started,
    Stopped,
    Reset,
}

/// Everything a consumer can learn from the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LivenessEvent {
    /// One observation was ingested.
    Reading {
        reading: Reading,
        changed: bool,
        online: bool,
        evidence: Evidence,
        at: DateTime<Utc>,
    },
    /// `online` flipped, either on ingest or on a tick.
    Transition { online: bool, at: DateTime<Utc> },
    /// The feed delivered something that is not a reading.
    FeedError {
        path: String,
        details: String,
        at: DateTime<Utc>,
    },
    Lifecycle {
        phase: Lifecycle,
        at: DateTime<Utc>,
    },
}

impl LivenessEvent {
    /// Short machine name, matching the serialized `event` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reading { .. } => "reading",
            Self::Transition { .. } => "transition",
            Self::FeedError { .. } => "feed_error",
            Self::Lifecycle { .. } => "lifecycle",
        }
    }
}

/// Receives events while the service holds its state lock; keep it quick.
pub trait LivenessSink: Send {
    fn emit(&mut self, event: &LivenessEvent);
}

#[derive(Debug, Default)]
pub struct NullSink;

impl LivenessSink for NullSink {
    fn emit(&mut self, _event: &LivenessEvent) {}
}

/// Forwards events over an unbounded channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<LivenessEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, Receiver<LivenessEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl LivenessSink for ChannelSink {
    fn emit(&mut self, event: &LivenessEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn LivenessSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl LivenessSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl LivenessSink for FanoutSink {
    fn emit(&mut self, event: &LivenessEvent) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }
}
