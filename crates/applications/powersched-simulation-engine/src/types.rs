//! Core types for the simulation engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Process identifier
pub type Pid = u32;

/// Scheduling discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Fcfs,
    RoundRobin,
    Priority,
    Sjf,
    Srtf,
}

impl AlgorithmKind {
    /// Every discipline, in the order the dashboard lists them
    pub const ALL: [AlgorithmKind; 5] = [
        AlgorithmKind::Fcfs,
        AlgorithmKind::RoundRobin,
        AlgorithmKind::Sjf,
        AlgorithmKind::Srtf,
        AlgorithmKind::Priority,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            AlgorithmKind::Fcfs => "FCFS",
            AlgorithmKind::RoundRobin => "Round Robin",
            AlgorithmKind::Priority => "Priority Scheduling",
            AlgorithmKind::Sjf => "SJF",
            AlgorithmKind::Srtf => "SRTF",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AlgorithmKind {
    type Err = SimulationError;

    /// Parse an algorithm identifier (`fcfs`, `round_robin`, `rr`, `priority`, `sjf`, `srtf`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(AlgorithmKind::Fcfs),
            "round_robin" | "round-robin" | "roundrobin" | "rr" => Ok(AlgorithmKind::RoundRobin),
            "priority" | "priority_scheduling" => Ok(AlgorithmKind::Priority),
            "sjf" => Ok(AlgorithmKind::Sjf),
            "srtf" => Ok(AlgorithmKind::Srtf),
            _ => Err(SimulationError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// A schedulable unit
///
/// Templates are immutable; the simulator copies them and decrements the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: Pid,
    /// Remaining service time in ticks
    pub burst: u32,
    /// Lower value = higher priority
    pub priority: i32,
    /// Tick at which the process becomes eligible to run
    #[serde(default)]
    pub arrival: u64,
}

impl Process {
    /// Process that is ready at tick 0
    pub fn new(id: Pid, burst: u32, priority: i32) -> Self {
        Process {
            id,
            burst,
            priority,
            arrival: 0,
        }
    }

    pub fn arriving_at(mut self, arrival: u64) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.burst == 0
    }

    /// Three-process set the dashboard plays by default
    pub fn demo_set() -> Vec<Process> {
        vec![
            Process::new(1, 5, 2),
            Process::new(2, 3, 1),
            Process::new(3, 8, 3),
        ]
    }
}

/// One tick of simulated CPU time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time: u64,
    pub pid: Pid,
}

/// Ordered execution trace produced by one simulation run
///
/// Ticks are contiguous from 0 and every pid belongs to the originating process set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub algorithm: AlgorithmKind,
    pub entries: Vec<TimelineEntry>,
    /// Processes rejected before scheduling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Pid>,
}

impl Timeline {
    pub fn empty(algorithm: AlgorithmKind) -> Self {
        Timeline {
            algorithm,
            entries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pid running at each tick, in order
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.iter().map(|e| e.pid)
    }

    /// Total ticks granted to `pid`
    pub fn ticks_for(&self, pid: Pid) -> usize {
        self.entries.iter().filter(|e| e.pid == pid).count()
    }

    /// Collapse the trace into `(pid, consecutive ticks)` slices
    pub fn slices(&self) -> Vec<(Pid, usize)> {
        let mut slices: Vec<(Pid, usize)> = Vec::new();
        for pid in self.pids() {
            match slices.last_mut() {
                Some((last, len)) if *last == pid => *len += 1,
                _ => slices.push((pid, 1)),
            }
        }
        slices
    }
}

/// Periodic reading from an external power metrics source
///
/// Either field may be missing on a given tick; absent means "no information".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSample {
    #[serde(default, alias = "battery")]
    pub battery_percent: Option<u8>,
    #[serde(default, alias = "plugged")]
    pub plugged_in: Option<bool>,
}

impl PowerSample {
    pub fn new(battery_percent: Option<u8>, plugged_in: Option<bool>) -> Self {
        PowerSample {
            battery_percent,
            plugged_in,
        }
    }

    /// Battery percent, dropping readings outside 0..=100
    pub fn battery(&self) -> Option<u8> {
        self.battery_percent.filter(|p| *p <= 100)
    }
}
