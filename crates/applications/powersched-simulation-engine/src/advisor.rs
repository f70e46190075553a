//! Battery-aware scheduling advisor
//!
//! Picks a discipline from the current power state and decides, per process, whether
//! it should run now or be held back to save battery.
//!
//! | power state                | cpu load  | discipline          |
//! |----------------------------|-----------|---------------------|
//! | charging                   | < 40%     | SRTF                |
//! | charging                   | 40–70%    | Round Robin (q = 2) |
//! | charging                   | ≥ 70%     | Priority            |
//! | battery > 50%              | < 50%     | SRTF                |
//! | 20% < battery ≤ 50%        | > 70%     | Priority            |
//! | 20% < battery ≤ 50%        | otherwise | Round Robin (q = 3) |
//! | anything else              |           | Priority            |

use serde::{Deserialize, Serialize};

use crate::simulator::DEFAULT_QUANTUM;
use crate::types::{AlgorithmKind, Process};

/// Quantum used on medium battery (longer slices, fewer switches)
pub const MEDIUM_BATTERY_QUANTUM: u32 = 3;

/// Battery level above which nothing is held back
const HIGH_BATTERY_PERCENT: f64 = 50.0;

/// Battery level at or below which low-priority work is paused
const LOW_BATTERY_PERCENT: f64 = 20.0;

/// Point-in-time view of the machine's power and load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub battery_percent: f64,
    pub charging: bool,
    pub cpu_percent: f64,
}

/// Advisor output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub algorithm: AlgorithmKind,
    /// Round Robin time slice to use with this recommendation
    pub quantum: u32,
    pub reason: String,
}

/// What to do with a process under the current power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerDecision {
    Run,
    Batch,
    Defer,
    Throttle,
    Pause,
}

/// Coarse priority band (lower numeric priority = more important)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriorityBand {
    High,
    Medium,
    Low,
}

impl PriorityBand {
    fn of(priority: i32) -> Self {
        match priority {
            i32::MIN..=0 => PriorityBand::High,
            1 => PriorityBand::Medium,
            _ => PriorityBand::Low,
        }
    }
}

fn recommendation(algorithm: AlgorithmKind, quantum: u32, reason: &str) -> Recommendation {
    Recommendation {
        algorithm,
        quantum,
        reason: reason.to_string(),
    }
}

/// Choose a discipline for the given power state
pub fn recommend(snapshot: &SystemSnapshot) -> Recommendation {
    let battery = snapshot.battery_percent;
    let cpu = snapshot.cpu_percent;

    if snapshot.charging {
        return if cpu < 40.0 {
            recommendation(AlgorithmKind::Srtf, DEFAULT_QUANTUM, "charging, light load")
        } else if cpu < 70.0 {
            recommendation(AlgorithmKind::RoundRobin, DEFAULT_QUANTUM, "charging, moderate load")
        } else {
            recommendation(AlgorithmKind::Priority, DEFAULT_QUANTUM, "charging, heavy load")
        };
    }

    if battery > HIGH_BATTERY_PERCENT && cpu < 50.0 {
        recommendation(AlgorithmKind::Srtf, DEFAULT_QUANTUM, "high battery, light load")
    } else if battery > LOW_BATTERY_PERCENT && battery <= HIGH_BATTERY_PERCENT {
        if cpu > 70.0 {
            recommendation(AlgorithmKind::Priority, DEFAULT_QUANTUM, "medium battery, heavy load")
        } else {
            recommendation(
                AlgorithmKind::RoundRobin,
                MEDIUM_BATTERY_QUANTUM,
                "medium battery, longer slices",
            )
        }
    } else {
        recommendation(AlgorithmKind::Priority, DEFAULT_QUANTUM, "low battery or heavy load")
    }
}

/// Decide whether a process with `priority` should run under `snapshot`
pub fn decide(priority: i32, snapshot: &SystemSnapshot) -> PowerDecision {
    if snapshot.charging || snapshot.battery_percent > HIGH_BATTERY_PERCENT {
        return PowerDecision::Run;
    }

    let band = PriorityBand::of(priority);
    if snapshot.battery_percent >= LOW_BATTERY_PERCENT {
        match band {
            PriorityBand::High => PowerDecision::Run,
            PriorityBand::Medium => PowerDecision::Batch,
            PriorityBand::Low => PowerDecision::Defer,
        }
    } else {
        match band {
            PriorityBand::High => PowerDecision::Run,
            PriorityBand::Medium => PowerDecision::Throttle,
            PriorityBand::Low => PowerDecision::Pause,
        }
    }
}

/// Processes allowed to run now, in input order
pub fn runnable(processes: &[Process], snapshot: &SystemSnapshot) -> Vec<Process> {
    processes
        .iter()
        .filter(|p| decide(p.priority, snapshot) == PowerDecision::Run)
        .copied()
        .collect()
}
