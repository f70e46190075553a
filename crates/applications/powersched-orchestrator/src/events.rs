//! Session events and the event sink seam
//!
//! The presentation layer is an external collaborator: it issues
//! [`SessionCommand`]s and receives [`SessionEvent`]s through an [`EventSink`].
//! Events serialize as JSON objects tagged by `event`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use powersched_simulation_engine::{AlgorithmKind, ImpactTable, Pid, PowerSample, Timeline};

use crate::alerts::Alert;

/// Inbound request from the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Simulate the session's process set and start playing it
    StartSimulation { algorithm: AlgorithmKind },
    /// Cancel the current run, if any
    StopSimulation,
    /// Power reading from an external monitor
    PowerSample(PowerSample),
}

/// Outbound notification to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A run was simulated and playback is about to start
    RunStarted {
        run_id: Uuid,
        algorithm: AlgorithmKind,
        timeline: Timeline,
    },

    /// Process on the CPU for this playback tick (`None` once the run finishes)
    RunningChanged {
        run_id: Uuid,
        tick: usize,
        pid: Option<Pid>,
    },

    /// Upcoming pids for this playback tick
    ReadyQueueChanged {
        run_id: Uuid,
        tick: usize,
        queue: Vec<Pid>,
    },

    /// Playback reached the end of the timeline
    RunCompleted { run_id: Uuid },

    /// Battery impact scores changed (baseline load, drift, or highlight cleared)
    AlgorithmImpactChanged { table: ImpactTable },

    /// Charger or battery alert
    Alert { alert: Alert },
}

impl SessionEvent {
    /// Run this event belongs to, for run-scoped events
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            SessionEvent::RunStarted { run_id, .. }
            | SessionEvent::RunningChanged { run_id, .. }
            | SessionEvent::ReadyQueueChanged { run_id, .. }
            | SessionEvent::RunCompleted { run_id } => Some(*run_id),
            SessionEvent::AlgorithmImpactChanged { .. } | SessionEvent::Alert { .. } => None,
        }
    }
}

/// Consumer of session events
///
/// Implementations must not block: events are emitted from timer tasks.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: SessionEvent);
}

impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn emit(&self, event: SessionEvent) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped, discarding event");
        }
    }
}
