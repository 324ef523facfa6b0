//! Device liveness state machine.
//!
//! Turns a sparse, possibly duplicated, possibly untimestamped stream of
//! [`Observation`]s into an online/offline signal plus a per-observation
//! "value changed" flag. No I/O happens here: the caller supplies `now` for
//! every decision, so the machine is deterministic and cheap to test.
//!
//! Two evidence sources are accepted:
//!
//! * **Authoritative timestamp**: the feed stamped the write. Fresh stamps
//!   (age within the timeout) prove life; stale stamps prove the device went
//!   quiet and force offline.
//! * **Value change**: without a stamp, only a change relative to the
//!   previous reading proves life. The first observation after a reset may be
//!   a replay of old feed state, so it only establishes the baseline, and an
//!   identical re-delivery proves nothing either way.
//!
//! Silence can only be detected by [`LivenessMonitor::evaluate`], which must
//! run on a fixed tick.
//!
//! Known limitation: a server stamp ahead of the local clock counts as age
//! zero and, since `last_observed_at` never moves backwards, one badly skewed
//! stamp keeps the device online until local time passes that stamp plus the
//! timeout. Future stamps are not capped.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::reading::{Observation, Reading};
use crate::core::config::LivenessPolicy;

/// Mutable liveness state, owned by exactly one [`LivenessMonitor`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessState {
    /// Last reading seen, the baseline for change detection.
    pub last_value: Option<Reading>,
    /// Most recent instant with evidence that the device was active.
    pub last_observed_at: Option<DateTime<Utc>>,
    pub online: bool,
    /// Cleared by the first observation after construction or reset.
    pub first_observation_pending: bool,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self {
            last_value: None,
            last_observed_at: None,
            online: false,
            first_observation_pending: true,
        }
    }
}

/// An online/offline edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub online: bool,
    pub at: DateTime<Utc>,
}

/// Which rule decided the outcome of an `ingest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// Server timestamp within the timeout.
    FreshTimestamp,
    /// Server timestamp older than the timeout.
    StaleTimestamp,
    /// Untimestamped first observation after reset; baseline only.
    Baseline,
    /// Untimestamped value change.
    ValueChanged,
    /// Untimestamped re-delivery of the same value.
    Duplicate,
}

/// Result of feeding one observation to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// The reading differs from the previous one (always true for the first).
    pub changed: bool,
    /// Online flag after the observation was applied.
    pub online: bool,
    pub evidence: Evidence,
    pub transition: Option<Transition>,
}

/// Result of one periodic evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub online: bool,
    pub transition: Option<Transition>,
}

/// Heartbeat monitor for one remote device.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    policy: LivenessPolicy,
    timeout: TimeDelta,
    state: LivenessState,
}

impl LivenessMonitor {
    #[must_use]
    pub fn new(policy: LivenessPolicy) -> Self {
        Self {
            policy,
            timeout: TimeDelta::from_std(policy.timeout).unwrap_or(TimeDelta::MAX),
            state: LivenessState::default(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> LivenessPolicy {
        self.policy
    }

    #[must_use]
    pub const fn state(&self) -> &LivenessState {
        &self.state
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.state.online
    }

    /// Forget everything. Reports offline until new evidence arrives.
    pub fn reset(&mut self) {
        self.state = LivenessState::default();
    }

    /// Apply one observation received at `now`.
    pub fn ingest(&mut self, observation: &Observation, now: DateTime<Utc>) -> IngestOutcome {
        let was_online = self.state.online;
        let first = std::mem::replace(&mut self.state.first_observation_pending, false);
        let changed = self
            .state
            .last_value
            .as_ref()
            .is_none_or(|previous| *previous != observation.value);
        self.state.last_value = Some(observation.value.clone());

        let evidence = match observation.server_timestamp {
            Some(stamped_at) => {
                if self.is_fresh(stamped_at, now) {
                    // Never move backwards: an older fresh stamp still proves
                    // life but must not shorten the window.
                    if self
                        .state
                        .last_observed_at
                        .is_none_or(|current| stamped_at > current)
                    {
                        self.state.last_observed_at = Some(stamped_at);
                    }
                    self.state.online = true;
                    Evidence::FreshTimestamp
                } else {
                    self.state.online = false;
                    Evidence::StaleTimestamp
                }
            }
            None if first => {
                self.state.online = false;
                Evidence::Baseline
            }
            None if changed => {
                self.state.last_observed_at = Some(now);
                self.state.online = true;
                Evidence::ValueChanged
            }
            None => Evidence::Duplicate,
        };

        IngestOutcome {
            changed,
            online: self.state.online,
            evidence,
            transition: edge(was_online, self.state.online, now),
        }
    }

    /// Recompute `online` from `last_observed_at` alone.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Evaluation {
        let was_online = self.state.online;
        self.state.online = self
            .state
            .last_observed_at
            .is_some_and(|observed_at| self.is_fresh(observed_at, now));
        Evaluation {
            online: self.state.online,
            transition: edge(was_online, self.state.online, now),
        }
    }

    /// Age of the newest liveness evidence, clamped at zero.
    #[must_use]
    pub fn silence(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.state.last_observed_at.map(|at| age(at, now))
    }

    fn is_fresh(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        age(at, now) <= self.timeout
    }
}

/// Clock skew (`now` before `at`) counts as zero age.
fn age(at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    now.signed_duration_since(at).max(TimeDelta::zero())
}

fn edge(was_online: bool, online: bool, at: DateTime<Utc>) -> Option<Transition> {
    (was_online != online).then_some(Transition { online, at })
}
