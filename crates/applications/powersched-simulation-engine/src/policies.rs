//! Scheduling policies
//!
//! Implements the disciplines the dashboard can play:
//! - FCFS: run to completion in arrival order
//! - Round Robin: fixed time slice, FIFO ready queue
//! - Priority: non-preemptive, lower value first
//! - SJF: non-preemptive, shortest burst first
//! - SRTF: preemptive, shortest remaining time re-evaluated every tick
//!
//! A process joins the ready set once the clock (ticks traced so far) reaches its
//! arrival. If nothing is ready, the clock jumps to the next arrival instead of
//! idling. Policies only see already-validated processes (burst ≥ 1, unique ids).

use std::collections::VecDeque;

use crate::error::{Result, SimulationError};
use crate::types::{AlgorithmKind, Pid, Process};

/// Scheduling policy trait
pub trait SchedulingPolicy {
    /// Discipline implemented by this policy
    fn kind(&self) -> AlgorithmKind;

    /// Consume the process set, appending the running pid for every tick to `trace`
    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>);

    /// Get policy name
    fn name(&self) -> &str {
        self.kind().label()
    }
}

/// Build the policy for `kind`
pub fn policy_for(kind: AlgorithmKind, quantum: u32) -> Result<Box<dyn SchedulingPolicy>> {
    let policy: Box<dyn SchedulingPolicy> = match kind {
        AlgorithmKind::Fcfs => Box::new(FcfsPolicy),
        AlgorithmKind::RoundRobin => Box::new(RoundRobinPolicy::new(quantum)?),
        AlgorithmKind::Priority => Box::new(PriorityPolicy),
        AlgorithmKind::Sjf => Box::new(SjfPolicy),
        AlgorithmKind::Srtf => Box::new(SrtfPolicy::new()),
    };
    Ok(policy)
}

/// Processes that have not arrived yet, earliest first (ties keep input order)
struct Arrivals {
    pending: VecDeque<Process>,
}

impl Arrivals {
    fn new(mut processes: Vec<Process>) -> Self {
        // sort_by_key is stable
        processes.sort_by_key(|p| p.arrival);
        Arrivals {
            pending: processes.into(),
        }
    }

    /// Move every process that has arrived by `now` into `ready`
    ///
    /// With `idle` set the clock skips ahead, admitting the next batch of arrivals.
    fn admit(&mut self, now: u64, idle: bool, ready: &mut impl Extend<Process>) {
        let Some(next) = self.pending.front() else {
            return;
        };
        let horizon = if idle { now.max(next.arrival) } else { now };

        let count = self.pending.iter().take_while(|p| p.arrival <= horizon).count();
        ready.extend(self.pending.drain(..count));
    }
}

fn now(trace: &[Pid]) -> u64 {
    trace.len() as u64
}

fn run_to_completion(process: &mut Process, trace: &mut Vec<Pid>) {
    trace.extend(std::iter::repeat_n(process.id, process.burst as usize));
    process.burst = 0;
}

/// Whenever the CPU frees up, run the ready process with the smallest key to completion
///
/// Ties go to the process admitted first.
fn run_non_preemptive<K: Ord>(processes: Vec<Process>, trace: &mut Vec<Pid>, key: impl Fn(&Process) -> K) {
    let mut arrivals = Arrivals::new(processes);
    let mut ready: Vec<Process> = Vec::new();

    loop {
        arrivals.admit(now(trace), ready.is_empty(), &mut ready);

        let Some(next) = ready.iter().enumerate().min_by_key(|&(_, p)| key(p)).map(|(i, _)| i) else {
            break;
        };
        let mut process = ready.remove(next);
        run_to_completion(&mut process, trace);
    }
}

/// First come, first served
pub struct FcfsPolicy;

impl SchedulingPolicy for FcfsPolicy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Fcfs
    }

    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>) {
        run_non_preemptive(processes, trace, |p| p.arrival);
    }
}

/// Round Robin with a fixed quantum
pub struct RoundRobinPolicy {
    quantum: u32,
    /// Slices that ended with burst remaining
    pub preemptions: usize,
}

impl RoundRobinPolicy {
    pub fn new(quantum: u32) -> Result<Self> {
        if quantum == 0 {
            return Err(SimulationError::InvalidQuantum(quantum));
        }
        Ok(RoundRobinPolicy {
            quantum,
            preemptions: 0,
        })
    }
}

impl SchedulingPolicy for RoundRobinPolicy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::RoundRobin
    }

    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>) {
        let mut arrivals = Arrivals::new(processes);
        let mut queue: VecDeque<Process> = VecDeque::new();

        loop {
            // Arrivals during a slice queue up behind the process that was preempted
            arrivals.admit(now(trace), queue.is_empty(), &mut queue);

            let Some(mut process) = queue.pop_front() else {
                break;
            };

            let run = self.quantum.min(process.burst);
            trace.extend(std::iter::repeat_n(process.id, run as usize));
            process.burst -= run;

            if !process.is_finished() {
                self.preemptions += 1;
                queue.push_back(process);
            }
        }
    }
}

/// Non-preemptive priority scheduling (lower value runs first)
pub struct PriorityPolicy;

impl SchedulingPolicy for PriorityPolicy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Priority
    }

    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>) {
        run_non_preemptive(processes, trace, |p| p.priority);
    }
}

/// Non-preemptive shortest job first
pub struct SjfPolicy;

impl SchedulingPolicy for SjfPolicy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Sjf
    }

    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>) {
        run_non_preemptive(processes, trace, |p| p.burst);
    }
}

/// Preemptive shortest remaining time first
pub struct SrtfPolicy {
    /// Times a running process was displaced before finishing
    pub preemptions: usize,
}

impl SrtfPolicy {
    pub fn new() -> Self {
        SrtfPolicy { preemptions: 0 }
    }
}

impl Default for SrtfPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for SrtfPolicy {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Srtf
    }

    fn schedule(&mut self, processes: Vec<Process>, trace: &mut Vec<Pid>) {
        let mut arrivals = Arrivals::new(processes);
        // Append-only, so indices stay valid for `current`
        let mut admitted: Vec<Process> = Vec::new();
        let mut current: Option<usize> = None;

        loop {
            let idle = admitted.iter().all(Process::is_finished);
            arrivals.admit(now(trace), idle, &mut admitted);

            // Shortest remaining first; on ties the running process keeps the CPU, then admission order
            let next = admitted
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.is_finished())
                .min_by_key(|(i, p)| (p.burst, Some(*i) != current, *i))
                .map(|(i, _)| i);

            let Some(next) = next else { break };

            if let Some(running) = current {
                if running != next && !admitted[running].is_finished() {
                    self.preemptions += 1;
                }
            }
            current = Some(next);

            admitted[next].burst -= 1;
            trace.push(admitted[next].id);
        }
    }
}
