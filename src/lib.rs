//! SawahGuard: liveness monitoring for a remote ultrasonic pest-deterrent
//! sensor.
//!
//! The device publishes `{jarak, status}` snapshots to a realtime key-value
//! feed. [`monitor::LivenessMonitor`] decides from those snapshots whether the
//! device is online; [`daemon::LivenessService`] wires it to a [`feed::Feed`],
//! a periodic tick and a consumer sink.

pub mod core;
pub mod daemon;
pub mod feed;
pub mod logger;
pub mod monitor;

#[cfg(feature = "cli")]
pub mod cli_app;
