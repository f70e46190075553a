//! Deterministic scheduling simulator
//!
//! Validates a process set, hands the schedulable copies to the selected policy and
//! packs the resulting per-tick trace into a [`Timeline`].
//!
//! Idle stretches before late arrivals are collapsed out, so timeline ticks stay
//! contiguous and arrivals keep their spacing inside each busy period.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SimulationError};
use crate::policies::policy_for;
use crate::types::{AlgorithmKind, Pid, Process, Timeline, TimelineEntry};

/// Default Round Robin time slice (ticks)
pub const DEFAULT_QUANTUM: u32 = 2;

/// Simulator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Round Robin time slice
    pub quantum: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
        }
    }
}

/// Scheduling simulator
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a simulator with the given configuration
    pub fn new(config: SimulatorConfig) -> Self {
        Simulator { config }
    }

    /// Create a simulator with a custom Round Robin quantum
    pub fn with_quantum(quantum: u32) -> Self {
        Self::new(SimulatorConfig { quantum })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Run `processes` under `algorithm` and return the execution timeline
    ///
    /// Invalid processes are skipped and listed in [`Timeline::skipped`]. An empty
    /// process set yields an empty timeline.
    pub fn simulate(&self, processes: &[Process], algorithm: AlgorithmKind) -> Result<Timeline> {
        let mut policy = policy_for(algorithm, self.config.quantum)?;

        let (valid, skipped) = partition_valid(processes);
        let ready = collapse_idle_gaps(&valid);

        let mut trace: Vec<Pid> = Vec::with_capacity(ready.iter().map(|p| p.burst as usize).sum());
        policy.schedule(ready, &mut trace);

        let entries = trace
            .into_iter()
            .enumerate()
            .map(|(time, pid)| TimelineEntry {
                time: time as u64,
                pid,
            })
            .collect::<Vec<_>>();

        debug!(
            algorithm = %algorithm,
            ticks = entries.len(),
            skipped = skipped.len(),
            "Simulation complete"
        );

        Ok(Timeline {
            algorithm,
            entries,
            skipped,
        })
    }

    /// Same as [`Simulator::simulate`], parsing the algorithm identifier first
    pub fn simulate_named(&self, processes: &[Process], algorithm: &str) -> Result<Timeline> {
        let kind = algorithm.parse::<AlgorithmKind>()?;
        self.simulate(processes, kind)
    }
}

/// Simulate with the default configuration
pub fn simulate(processes: &[Process], algorithm: AlgorithmKind) -> Result<Timeline> {
    Simulator::default().simulate(processes, algorithm)
}

/// Simulate with the default configuration, parsing the algorithm identifier
pub fn simulate_named(processes: &[Process], algorithm: &str) -> Result<Timeline> {
    Simulator::default().simulate_named(processes, algorithm)
}

/// Check a single process against the ids already accepted
fn validate(process: &Process, seen: &HashSet<Pid>) -> Result<()> {
    if process.burst == 0 {
        return Err(SimulationError::invalid_process(process.id, "burst must be at least 1"));
    }
    if seen.contains(&process.id) {
        return Err(SimulationError::invalid_process(process.id, "duplicate process id"));
    }
    Ok(())
}

/// Shift each arrival earlier by the idle time that would precede it
///
/// Every policy keeps the CPU busy while work is ready, so idle stretches depend only
/// on arrivals and bursts. Input order is preserved.
pub(crate) fn collapse_idle_gaps(processes: &[Process]) -> Vec<Process> {
    let mut order: Vec<usize> = (0..processes.len()).collect();
    order.sort_by_key(|&i| processes[i].arrival);

    let mut shifted = processes.to_vec();
    let mut clock = 0u64;
    let mut idle = 0u64;

    for i in order {
        let process = &mut shifted[i];
        if process.arrival > clock {
            idle += process.arrival - clock;
            clock = process.arrival;
        }
        process.arrival = process.arrival.saturating_sub(idle);
        clock += process.burst as u64;
    }

    shifted
}

/// Split into schedulable copies (input order preserved) and skipped ids
fn partition_valid(processes: &[Process]) -> (Vec<Process>, Vec<Pid>) {
    let mut seen = HashSet::new();
    let mut ready = Vec::with_capacity(processes.len());
    let mut skipped = Vec::new();

    for process in processes {
        match validate(process, &seen) {
            Ok(()) => {
                seen.insert(process.id);
                ready.push(*process);
            }
            Err(e) => {
                warn!(pid = process.id, error = %e, "Skipping process");
                skipped.push(process.id);
            }
        }
    }

    (ready, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pids(timeline: &Timeline) -> Vec<Pid> {
        timeline.pids().collect()
    }

    /// Each pid occupies exactly one contiguous run of ticks
    fn assert_contiguous(timeline: &Timeline) {
        let slices = timeline.slices();
        let mut seen = HashSet::new();
        for (pid, _) in slices {
            assert!(seen.insert(pid), "pid {pid} appears in more than one slice");
        }
    }

    fn varied_sets() -> Vec<Vec<Process>> {
        vec![
            Process::demo_set(),
            vec![Process::new(10, 1, 0)],
            vec![
                Process::new(1, 7, 3),
                Process::new(2, 1, 3),
                Process::new(3, 4, -1),
                Process::new(4, 2, 0),
                Process::new(5, 9, 2),
            ],
            (1..=12).map(|i| Process::new(i, (i * 7) % 5 + 1, (i % 4) as i32)).collect(),
        ]
    }

    #[test]
    fn test_priority_scenario() {
        let timeline = simulate(&Process::demo_set(), AlgorithmKind::Priority).unwrap();

        assert_eq!(
            pids(&timeline),
            vec![2, 2, 2, 1, 1, 1, 1, 1, 3, 3, 3, 3, 3, 3, 3, 3]
        );
        assert_eq!(timeline.len(), 16);
    }

    #[test]
    fn test_round_robin_scenario() {
        let timeline = simulate(&Process::demo_set(), AlgorithmKind::RoundRobin).unwrap();

        assert_eq!(
            pids(&timeline),
            vec![1, 1, 2, 2, 3, 3, 1, 1, 2, 3, 3, 1, 3, 3, 3, 3]
        );
        assert_eq!(timeline.len(), 16);
    }

    #[test]
    fn test_ticks_are_contiguous_from_zero() {
        for algorithm in AlgorithmKind::ALL {
            let timeline = simulate(&Process::demo_set(), algorithm).unwrap();
            for (i, entry) in timeline.entries.iter().enumerate() {
                assert_eq!(entry.time, i as u64);
            }
        }
    }

    #[test]
    fn test_fcfs_length_and_contiguity() {
        for processes in varied_sets() {
            let timeline = simulate(&processes, AlgorithmKind::Fcfs).unwrap();
            let total: u32 = processes.iter().map(|p| p.burst).sum();

            assert_eq!(timeline.len(), total as usize);
            assert_contiguous(&timeline);
        }
    }

    #[test]
    fn test_round_robin_slice_bound_and_totals() {
        for quantum in 1..=4 {
            let simulator = Simulator::with_quantum(quantum);
            for processes in varied_sets() {
                let timeline = simulator.simulate(&processes, AlgorithmKind::RoundRobin).unwrap();

                for p in &processes {
                    assert_eq!(timeline.ticks_for(p.id), p.burst as usize);
                }

                // A slice longer than the quantum is only allowed once every other process is done
                let mut remaining: std::collections::HashMap<Pid, usize> =
                    processes.iter().map(|p| (p.id, p.burst as usize)).collect();
                for (pid, len) in timeline.slices() {
                    let others_left = remaining.iter().any(|(other, left)| *other != pid && *left > 0);
                    if others_left {
                        assert!(len <= quantum as usize, "pid {pid} ran {len} ticks with q={quantum}");
                    }
                    *remaining.get_mut(&pid).unwrap() -= len;
                }
            }
        }
    }

    #[test]
    fn test_priority_order_non_decreasing() {
        for processes in varied_sets() {
            let timeline = simulate(&processes, AlgorithmKind::Priority).unwrap();
            assert_contiguous(&timeline);

            let order: Vec<Pid> = timeline.slices().into_iter().map(|(pid, _)| pid).collect();
            let priority_of = |pid: Pid| processes.iter().find(|p| p.id == pid).unwrap().priority;
            for pair in order.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(priority_of(a) <= priority_of(b));
                if priority_of(a) == priority_of(b) {
                    let index = |pid: Pid| processes.iter().position(|p| p.id == pid).unwrap();
                    assert!(index(a) < index(b), "tie between {a} and {b} broke input order");
                }
            }
        }
    }

    #[test]
    fn test_invalid_processes_are_skipped() {
        let processes = vec![
            Process::new(1, 2, 0),
            Process::new(2, 0, 0),
            Process::new(1, 3, 0),
            Process::new(3, 1, 0),
        ];

        let timeline = simulate(&processes, AlgorithmKind::Fcfs).unwrap();
        assert_eq!(pids(&timeline), vec![1, 1, 3]);
        assert_eq!(timeline.skipped, vec![2, 1]);
    }

    #[test]
    fn test_idle_gap_is_collapsed() {
        let processes = vec![Process::new(1, 2, 0), Process::new(2, 3, 0).arriving_at(10)];

        let timeline = simulate(&processes, AlgorithmKind::Fcfs).unwrap();
        assert_eq!(pids(&timeline), vec![1, 1, 2, 2, 2]);
        let times: Vec<u64> = timeline.entries.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_arrival_spacing_survives_collapse() {
        // p3 lands one tick after p2 starts, even though both arrive after an idle gap
        let processes = vec![
            Process::new(1, 2, 0),
            Process::new(2, 5, 0).arriving_at(10),
            Process::new(3, 1, 0).arriving_at(11),
        ];

        let timeline = simulate(&processes, AlgorithmKind::Srtf).unwrap();
        assert_eq!(pids(&timeline), vec![1, 1, 2, 3, 2, 2, 2, 2]);

        let shifted: Vec<u64> = collapse_idle_gaps(&processes).iter().map(|p| p.arrival).collect();
        assert_eq!(shifted, vec![0, 2, 3]);
    }

    #[test]
    fn test_late_first_arrival_starts_at_zero() {
        let processes = vec![Process::new(7, 2, 0).arriving_at(5)];
        let shifted = collapse_idle_gaps(&processes);
        assert_eq!(shifted[0].arrival, 0);
    }

    #[test]
    fn test_empty_process_set() {
        for algorithm in AlgorithmKind::ALL {
            let timeline = simulate(&[], algorithm).unwrap();
            assert!(timeline.is_empty());
            assert_eq!(timeline.algorithm, algorithm);
        }
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let result = simulate_named(&Process::demo_set(), "multilevel_feedback");
        assert!(matches!(result, Err(SimulationError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_zero_quantum_fails_round_robin_only() {
        let simulator = Simulator::with_quantum(0);
        assert!(matches!(
            simulator.simulate(&Process::demo_set(), AlgorithmKind::RoundRobin),
            Err(SimulationError::InvalidQuantum(0))
        ));
        assert!(simulator.simulate(&Process::demo_set(), AlgorithmKind::Fcfs).is_ok());
    }

    #[test]
    fn test_deterministic() {
        for algorithm in AlgorithmKind::ALL {
            let a = simulate(&Process::demo_set(), algorithm).unwrap();
            let b = simulate(&Process::demo_set(), algorithm).unwrap();
            assert_eq!(a, b);
        }
    }
}
