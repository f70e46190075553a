//! Error types for the simulation engine

use thiserror::Error;

use crate::types::Pid;

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors that can occur while building or running a simulation
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Process rejected before scheduling (it is skipped, never fatal to a run)
    #[error("Invalid process {pid}: {reason}")]
    InvalidProcess { pid: Pid, reason: String },

    /// Algorithm identifier that has no scheduling policy
    #[error("Unsupported scheduling algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Round Robin needs a positive time slice
    #[error("Invalid Round Robin quantum: {0}")]
    InvalidQuantum(u32),

    /// Synthetic trace parameter that is not a finite number
    #[error("Invalid trace parameter {name}: {value}")]
    InvalidTraceParameter { name: &'static str, value: f64 },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulationError {
    /// Create an invalid process error
    pub fn invalid_process(pid: Pid, reason: impl Into<String>) -> Self {
        Self::InvalidProcess {
            pid,
            reason: reason.into(),
        }
    }
}
