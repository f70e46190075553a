//! Power alert state machine
//!
//! Turns a stream of [`PowerSample`]s into edge-triggered alerts:
//!
//! - **Charger**: fires when the plugged flag changes (the first defined reading
//!   always counts as a change).
//! - **Low battery**: fires once when an unplugged reading is at or below the
//!   threshold, then latches. The latch releases when a reading climbs above the
//!   threshold, so the alert can fire again on the next drop.
//!
//! Missing fields carry no information and never change state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use powersched_simulation_engine::PowerSample;

use crate::config::DEFAULT_LOW_BATTERY_THRESHOLD;

/// Kind of alert, with its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    ChargerConnected,
    ChargerDisconnected,
    LowBattery { percent: u8 },
}

impl AlertKind {
    /// Notification title
    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::ChargerConnected => "Charger Connected",
            AlertKind::ChargerDisconnected => "Charger Disconnected",
            AlertKind::LowBattery { .. } => "Low Battery",
        }
    }

    /// Notification body
    pub fn message(&self) -> String {
        match self {
            AlertKind::ChargerConnected => "Your laptop is now charging.".to_string(),
            AlertKind::ChargerDisconnected => "Laptop is now on battery.".to_string(),
            AlertKind::LowBattery { percent } => {
                format!("Battery at {percent}%. Please connect charger.")
            }
        }
    }
}

/// Notification request for the event sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(flatten)]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind) -> Self {
        Alert {
            kind,
            title: kind.title().to_string(),
            message: kind.message(),
            raised_at: Utc::now(),
        }
    }
}

/// Per-session edge detection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// Last known charger state (`None` until the first defined reading)
    pub last_plugged: Option<bool>,
    /// Low-battery alert already fired for the current drop
    pub low_battery_latched: bool,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Alert rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertStateMachine {
    low_battery_threshold: u8,
}

impl AlertStateMachine {
    pub fn new(low_battery_threshold: u8) -> Self {
        Self {
            low_battery_threshold,
        }
    }

    /// Apply one sample to `state`, returning the alerts it raises (charger first)
    pub fn process(&self, state: &mut AlertState, sample: &PowerSample) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if let Some(plugged) = sample.plugged_in {
            if state.last_plugged != Some(plugged) {
                let kind = if plugged {
                    AlertKind::ChargerConnected
                } else {
                    AlertKind::ChargerDisconnected
                };
                info!(plugged, "Charger state changed");
                alerts.push(Alert::new(kind));
                state.last_plugged = Some(plugged);
            }
        }

        if let Some(percent) = sample.battery() {
            let on_battery = sample.plugged_in != Some(true);

            if percent <= self.low_battery_threshold {
                if on_battery && !state.low_battery_latched {
                    info!(percent, threshold = self.low_battery_threshold, "Low battery");
                    alerts.push(Alert::new(AlertKind::LowBattery { percent }));
                    state.low_battery_latched = true;
                }
            } else if state.low_battery_latched {
                debug!(percent, "Battery above threshold, low-battery alert re-armed");
                state.low_battery_latched = false;
            }
        }

        alerts
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_BATTERY_THRESHOLD)
    }
}
