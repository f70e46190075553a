//! Timeline metrics
//!
//! Classic scheduling measures derived from a finished timeline, taken against each
//! process's arrival on the timeline clock (idle gaps collapsed the same way the
//! simulator collapses them):
//!
//! - response time = first tick on the CPU − arrival
//! - turnaround time = completion tick + 1 − arrival
//! - waiting time = turnaround − burst

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::simulator::collapse_idle_gaps;
use crate::types::{AlgorithmKind, Pid, Process, Timeline};

/// Measures for a single process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pid: Pid,
    pub burst: u32,
    pub first_run: u64,
    pub completion: u64,
    pub response_time: u64,
    pub waiting_time: u64,
    pub turnaround_time: u64,
}

/// Aggregate measures for one timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMetrics {
    pub algorithm: AlgorithmKind,
    pub total_ticks: usize,
    pub context_switches: usize,
    pub average_response_time: f64,
    pub average_waiting_time: f64,
    pub average_turnaround_time: f64,
    /// Completed processes per 100 ticks
    pub throughput: f64,
    pub processes: Vec<ProcessMetrics>,
}

impl TimelineMetrics {
    /// Compute metrics for `timeline`, which must have been produced from `processes`
    ///
    /// Processes that never ran (skipped as invalid) are left out.
    pub fn compute(timeline: &Timeline, processes: &[Process]) -> Self {
        let mut first_run: HashMap<Pid, u64> = HashMap::new();
        let mut last_run: HashMap<Pid, u64> = HashMap::new();

        for entry in &timeline.entries {
            first_run.entry(entry.pid).or_insert(entry.time);
            last_run.insert(entry.pid, entry.time);
        }

        // Templates the simulator accepted: first valid one per id
        let mut ran: Vec<Process> = Vec::new();
        for process in processes {
            if process.burst > 0 && first_run.contains_key(&process.id) && !ran.iter().any(|p| p.id == process.id) {
                ran.push(*process);
            }
        }

        let mut per_process = Vec::with_capacity(ran.len());
        for process in collapse_idle_gaps(&ran) {
            let (Some(&first), Some(&last)) = (first_run.get(&process.id), last_run.get(&process.id)) else {
                continue;
            };

            let turnaround = (last + 1).saturating_sub(process.arrival);
            per_process.push(ProcessMetrics {
                pid: process.id,
                burst: process.burst,
                first_run: first,
                completion: last,
                response_time: first.saturating_sub(process.arrival),
                waiting_time: turnaround.saturating_sub(process.burst as u64),
                turnaround_time: turnaround,
            });
        }

        let context_switches = timeline
            .entries
            .windows(2)
            .filter(|pair| pair[0].pid != pair[1].pid)
            .count();

        let average = |f: fn(&ProcessMetrics) -> u64| -> f64 {
            if per_process.is_empty() {
                0.0
            } else {
                per_process.iter().map(f).sum::<u64>() as f64 / per_process.len() as f64
            }
        };

        let throughput = if timeline.is_empty() {
            0.0
        } else {
            per_process.len() as f64 * 100.0 / timeline.len() as f64
        };

        TimelineMetrics {
            algorithm: timeline.algorithm,
            total_ticks: timeline.len(),
            context_switches,
            average_response_time: average(|m| m.response_time),
            average_waiting_time: average(|m| m.waiting_time),
            average_turnaround_time: average(|m| m.turnaround_time),
            throughput,
            processes: per_process,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::simulate;

    #[test]
    fn test_fcfs_metrics() {
        let processes = Process::demo_set();
        let timeline = simulate(&processes, AlgorithmKind::Fcfs).unwrap();
        let metrics = TimelineMetrics::compute(&timeline, &processes);

        assert_eq!(metrics.total_ticks, 16);
        assert_eq!(metrics.context_switches, 2);

        let p2 = metrics.processes.iter().find(|m| m.pid == 2).unwrap();
        assert_eq!(p2.response_time, 5);
        assert_eq!(p2.turnaround_time, 8);
        assert_eq!(p2.waiting_time, 5);

        // waits: p1 0, p2 5, p3 8
        assert!((metrics.average_waiting_time - 13.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sjf_minimises_average_waiting() {
        let processes = Process::demo_set();
        let waiting = |algorithm| {
            let timeline = simulate(&processes, algorithm).unwrap();
            TimelineMetrics::compute(&timeline, &processes).average_waiting_time
        };

        let sjf = waiting(AlgorithmKind::Sjf);
        for algorithm in AlgorithmKind::ALL {
            assert!(sjf <= waiting(algorithm));
        }
    }

    #[test]
    fn test_round_robin_has_more_switches() {
        let processes = Process::demo_set();
        let switches = |algorithm| {
            let timeline = simulate(&processes, algorithm).unwrap();
            TimelineMetrics::compute(&timeline, &processes).context_switches
        };

        assert_eq!(switches(AlgorithmKind::RoundRobin), 7);
        assert!(switches(AlgorithmKind::RoundRobin) > switches(AlgorithmKind::Fcfs));
    }

    #[test]
    fn test_metrics_measure_from_arrival() {
        let processes = vec![Process::new(1, 7, 0), Process::new(2, 2, 0).arriving_at(2)];
        let timeline = simulate(&processes, AlgorithmKind::Srtf).unwrap();
        let metrics = TimelineMetrics::compute(&timeline, &processes);

        let p2 = metrics.processes.iter().find(|m| m.pid == 2).unwrap();
        assert_eq!(p2.response_time, 0);
        assert_eq!(p2.turnaround_time, 2);
        assert_eq!(p2.waiting_time, 0);

        let p1 = metrics.processes.iter().find(|m| m.pid == 1).unwrap();
        assert_eq!(p1.turnaround_time, 9);
        assert_eq!(p1.waiting_time, 2);
    }

    #[test]
    fn test_empty_timeline_metrics() {
        let timeline = Timeline::empty(AlgorithmKind::Fcfs);
        let metrics = TimelineMetrics::compute(&timeline, &[]);

        assert_eq!(metrics.total_ticks, 0);
        assert_eq!(metrics.average_waiting_time, 0.0);
        assert_eq!(metrics.throughput, 0.0);
    }
}
