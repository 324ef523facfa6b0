//! Daemon subsystem: liveness service lifecycle, consumer sinks, manual
//! override control, dashboard view model, signal handling.

pub mod control;
pub mod dashboard;
pub mod service;
#[cfg(feature = "daemon")]
pub mod signals;
pub mod sink;

pub use control::ManualOverride;
pub use dashboard::{DashboardModel, DashboardMsg, SharedDashboard};
pub use service::LivenessService;
pub use sink::{ChannelSink, FanoutSink, Lifecycle, LivenessEvent, LivenessSink, NullSink};
