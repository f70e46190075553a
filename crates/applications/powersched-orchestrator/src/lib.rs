//! # Powersched Orchestrator
//!
//! Runs scheduler simulations as live sessions for a dashboard or CLI.
//!
//! ## Architecture
//!
//! ```text
//! SessionCommand ──► Session ──► EventSink (channel, CLI printer, ...)
//!                     ├── Simulator (sync) ──► Timeline
//!                     ├── run task: PlaybackClock ──► running / ready-queue snapshots
//!                     │     └── drift task: BatteryImpactModel random walk
//!                     └── AlertStateMachine ◄── PowerMonitor ◄── PowerSource
//! ```
//!
//! The session owns at most one run. Starting another run cancels the previous
//! playback and its drift task and waits for both to stop before the new run emits
//! anything. Power samples are processed in arrival order and raise edge-triggered
//! charger and low-battery alerts.
//!
//! See [`session`] for the run lifecycle and [`alerts`] for the alert rules.

#![warn(clippy::all)]

pub mod alerts;
pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod playback;
pub mod session;
pub mod task;

// ============================================================================
// Public exports
// ============================================================================

pub use alerts::{Alert, AlertKind, AlertState, AlertStateMachine};
pub use config::SessionConfig;
pub use error::{OrchestratorError, Result};
pub use events::{EventSink, SessionCommand, SessionEvent};
pub use monitor::{BatteryHistory, PowerMonitor, PowerSource, TracePowerSource};
pub use playback::{Playback, PlaybackClock, PlaybackSnapshot};
pub use session::Session;
pub use task::{CancelHandle, CancelSignal, ScheduledTask};
