//! Device monitoring: reading normalization, injectable clock, liveness state
//! machine.

pub mod clock;
pub mod liveness;
pub mod reading;
pub mod replay;

pub use clock::{Clock, ManualClock, SystemClock};
pub use liveness::{
    Evaluation, Evidence, IngestOutcome, LivenessMonitor, LivenessState, Transition,
};
pub use reading::{AlarmState, Observation, Reading, ThreatLevel};
