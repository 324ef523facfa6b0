//! Elm-style view model for a status display.
//!
//! All display state lives in [`DashboardModel`]; service events and operator
//! actions arrive as [`DashboardMsg`] values and [`update`] applies them. No
//! I/O and no rendering happens here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::sink::{LivenessEvent, LivenessSink};
use crate::monitor::reading::STATUS_SAFE;
use crate::monitor::{AlarmState, Reading};

/// Placeholder status shown before the device has reported anything.
pub const STATUS_WAITING: &str = "Waiting for data...";

/// Messages that drive [`update`].
#[derive(Debug, Clone)]
pub enum DashboardMsg {
    Liveness(LivenessEvent),
    ManualOverride(bool),
    /// The operator signed out; drop device data.
    SignedOut,
}

/// Everything a status display needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardModel {
    pub distance: f64,
    pub status: String,
    pub manual_override: bool,
    pub online: bool,
    pub last_update: Option<DateTime<Utc>>,
    /// True until the monitor node delivered anything, even an empty snapshot.
    pub loading: bool,
}

impl Default for DashboardModel {
    fn default() -> Self {
        Self {
            distance: 0.0,
            status: STATUS_WAITING.to_string(),
            manual_override: false,
            online: false,
            last_update: None,
            loading: true,
        }
    }
}

impl DashboardModel {
    #[must_use]
    pub fn alarm(&self) -> AlarmState {
        let status = if self.status == STATUS_WAITING {
            STATUS_SAFE
        } else {
            self.status.as_str()
        };
        AlarmState::from_reading(&Reading::new(self.distance, status), self.manual_override)
    }

    /// One-line textual status.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let link = if self.loading {
            "CONNECTING"
        } else if self.online {
            "ONLINE"
        } else {
            "OFFLINE"
        };
        let deterrent = if self.alarm().deterrent_active() {
            "ON"
        } else {
            "OFF"
        };
        let updated = self
            .last_update
            .map_or_else(|| "--:--:--".to_string(), |at| at.format("%H:%M:%S").to_string());
        format!(
            "[{link}] {status} | {distance} cm | deterrent {deterrent}{manual} | updated {updated}",
            status = self.status,
            distance = self.distance,
            manual = if self.manual_override { " (manual)" } else { "" },
        )
    }
}

/// Apply one message to the model.
pub fn update(model: &mut DashboardModel, msg: DashboardMsg) {
    match msg {
        DashboardMsg::Liveness(event) => match event {
            LivenessEvent::Reading {
                reading,
                online,
                at,
                ..
            } => {
                model.distance = reading.distance;
                model.status = reading.status;
                model.online = online;
                model.last_update = Some(at);
                model.loading = false;
            }
            LivenessEvent::Transition { online, .. } => model.online = online,
            LivenessEvent::FeedError { .. } => model.loading = false,
            LivenessEvent::Lifecycle { .. } => {}
        },
        DashboardMsg::ManualOverride(on) => model.manual_override = on,
        DashboardMsg::SignedOut => {
            *model = DashboardModel {
                loading: model.loading,
                ..DashboardModel::default()
            };
        }
    }
}

/// Shared model that can be handed to the service as a sink.
#[derive(Debug, Clone, Default)]
pub struct SharedDashboard {
    model: Arc<Mutex<DashboardModel>>,
}

impl SharedDashboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, msg: DashboardMsg) {
        update(&mut self.model.lock(), msg);
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardModel {
        self.model.lock().clone()
    }
}

impl LivenessSink for SharedDashboard {
    fn emit(&mut self, event: &LivenessEvent) {
        self.apply(DashboardMsg::Liveness(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::monitor::Evidence;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    fn reading_event(distance: f64, status: &str, online: bool) -> DashboardMsg {
        DashboardMsg::Liveness(LivenessEvent::Reading {
            reading: Reading::new(distance, status),
            changed: true,
            online,
            evidence: Evidence::ValueChanged,
            at: at(3_725),
        })
    }

    #[test]
    fn starts_loading_and_offline() {
        let model = DashboardModel::default();
        assert!(model.loading);
        assert!(!model.online);
        assert!(!model.alarm().deterrent_active());
        assert!(model.summary_line().starts_with("[CONNECTING]"));
    }

    #[test]
    fn reading_updates_display_fields() {
        let mut model = DashboardModel::default();
        update(&mut model, reading_event(40.0, "AMAN", true));
        assert!(!model.loading);
        assert!(model.online);
        assert_eq!(model.status, "AMAN");
        assert_eq!(
            model.summary_line(),
            "[ONLINE] AMAN | 40 cm | deterrent OFF | updated 01:02:05"
        );
    }

    #[test]
    fn pest_or_manual_switch_raises_alarm() {
        let mut model = DashboardModel::default();
        update(&mut model, reading_event(8.0, "HAMA TERDETEKSI!", true));
        assert!(model.alarm().deterrent_active());

        update(&mut model, reading_event(90.0, "AMAN", true));
        assert!(!model.alarm().deterrent_active());
        update(&mut model, DashboardMsg::ManualOverride(true));
        assert!(model.alarm().deterrent_active());
        assert!(model.summary_line().contains("deterrent ON (manual)"));
    }

    #[test]
    fn transition_and_empty_snapshot_handling() {
        let mut model = DashboardModel::default();
        update(
            &mut model,
            DashboardMsg::Liveness(LivenessEvent::FeedError {
                path: "monitor".to_string(),
                details: "null".to_string(),
                at: at(0),
            }),
        );
        assert!(!model.loading);
        assert_eq!(model.status, STATUS_WAITING);

        update(&mut model, reading_event(40.0, "AMAN", true));
        update(
            &mut model,
            DashboardMsg::Liveness(LivenessEvent::Transition {
                online: false,
                at: at(20),
            }),
        );
        assert!(!model.online);
        assert!(model.summary_line().starts_with("[OFFLINE]"));
    }

    #[test]
    fn sign_out_clears_device_data() {
        let mut model = DashboardModel::default();
        update(&mut model, reading_event(40.0, "HAMA TERDETEKSI!", true));
        update(&mut model, DashboardMsg::ManualOverride(true));
        update(&mut model, DashboardMsg::SignedOut);
        assert_eq!(model.distance, 0.0);
        assert_eq!(model.status, STATUS_WAITING);
        assert!(!model.manual_override);
        assert!(!model.online);
        assert!(!model.loading);
    }

    #[test]
    fn shared_dashboard_acts_as_sink() {
        let dashboard = SharedDashboard::new();
        let mut sink = dashboard.clone();
        sink.emit(&LivenessEvent::Transition {
            online: true,
            at: at(1),
        });
        assert!(dashboard.snapshot().online);
    }
}
