//! Session configuration
//!
//! Loaded from an optional JSON file; every field has a default so partial files
//! work. CLI flags override individual values after loading.
//!
//! ```json
//! {
//!   "tick_interval_ms": 1000,
//!   "drift_interval_ms": 2000,
//!   "quantum": 2,
//!   "low_battery_threshold": 20,
//!   "processes": [{ "id": 1, "burst": 5, "priority": 2 }]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use powersched_simulation_engine::impact::DEFAULT_DRIFT_PERIOD;
use powersched_simulation_engine::{ImpactBaselines, Process, SimulatorConfig, DEFAULT_QUANTUM};

use crate::error::{OrchestratorError, Result};

/// Default wall time between playback snapshots
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default number of upcoming pids shown in the ready queue preview
pub const DEFAULT_PREVIEW_LEN: usize = 3;

/// Default battery percent at or below which the low-battery alert fires
pub const DEFAULT_LOW_BATTERY_THRESHOLD: u8 = 20;

/// Default power monitor polling interval
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 5000;

/// Configuration for a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall time between playback snapshots
    pub tick_interval_ms: u64,

    /// Wall time between battery impact drift updates
    pub drift_interval_ms: u64,

    /// Upcoming pids included in each ready queue snapshot
    pub preview_len: usize,

    /// Round Robin time slice
    pub quantum: u32,

    /// Low-battery alert threshold (percent)
    pub low_battery_threshold: u8,

    /// Power monitor polling interval
    pub monitor_interval_ms: u64,

    /// Moving-average window for battery readings (1 = raw readings)
    pub smoothing_window: usize,

    /// Fixed RNG seed for impact drift (random when absent)
    pub impact_seed: Option<u64>,

    /// Battery impact baseline tables
    pub baselines: ImpactBaselines,

    /// Process set simulated by each run
    pub processes: Vec<Process>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            drift_interval_ms: DEFAULT_DRIFT_PERIOD.as_millis() as u64,
            preview_len: DEFAULT_PREVIEW_LEN,
            quantum: DEFAULT_QUANTUM,
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            smoothing_window: 1,
            impact_seed: None,
            baselines: ImpactBaselines::default(),
            processes: Process::demo_set(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded session configuration");
        config.validate()?;
        Ok(config)
    }

    /// Reject values the timers and simulator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(OrchestratorError::config("tick_interval_ms must be positive"));
        }
        if self.drift_interval_ms == 0 {
            return Err(OrchestratorError::config("drift_interval_ms must be positive"));
        }
        if self.monitor_interval_ms == 0 {
            return Err(OrchestratorError::config("monitor_interval_ms must be positive"));
        }
        if self.quantum == 0 {
            return Err(OrchestratorError::config("quantum must be positive"));
        }
        if self.smoothing_window == 0 {
            return Err(OrchestratorError::config("smoothing_window must be at least 1"));
        }
        if self.low_battery_threshold > 100 {
            return Err(OrchestratorError::config("low_battery_threshold must be a percentage"));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            quantum: self.quantum,
        }
    }
}
