//! Powersched Simulation Engine
//!
//! Deterministic CPU scheduling simulator for comparing scheduling disciplines,
//! plus the battery impact model that scores each discipline while a run plays.
//!
//! ```text
//! Process set ──► Simulator (policy) ──► Timeline ──► metrics
//!                                            │
//!                      BatteryImpactModel ◄──┘ (active algorithm)
//! ```

pub mod error;
pub mod types;
pub mod policies;
pub mod simulator;
pub mod metrics;
pub mod impact;
pub mod advisor;
pub mod power_data;

pub use error::{Result, SimulationError};
pub use types::{AlgorithmKind, Pid, PowerSample, Process, Timeline, TimelineEntry};
pub use simulator::{simulate, simulate_named, Simulator, SimulatorConfig, DEFAULT_QUANTUM};
pub use impact::{BatteryImpactModel, ImpactBaselines, ImpactTable};
