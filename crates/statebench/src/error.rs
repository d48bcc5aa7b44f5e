//! Error types for statebench

use libstatebench_core::types::InstanceIndex;
use libstatebench_core::StatebenchError;
use libstatebench_ipc::error::codes;
use libstatebench_ipc::IpcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    /// A provisioning step failed; earlier instances are left as they are
    #[error("Provisioning instance {index} failed at {step}: {message}")]
    Provision {
        index: InstanceIndex,
        step: &'static str,
        message: String,
    },

    #[error("Decommissioning instance {index} failed: {message}")]
    Decommission { index: InstanceIndex, message: String },

    #[error("Instance {index}: {message}")]
    Instance { index: InstanceIndex, message: String },

    #[error("Control error: {0}")]
    Control(#[from] IpcError),

    #[error("Core error: {0}")]
    Core(#[from] StatebenchError),

    /// Phase called out of order; the run is unchanged
    #[error("Scenario {scenario}: cannot {phase} while {state}")]
    InvalidTransition {
        scenario: String,
        phase: &'static str,
        state: String,
    },

    #[error("Scenario {scenario} failed during {phase}: {source}")]
    ScenarioFailed {
        scenario: String,
        phase: &'static str,
        #[source]
        source: Box<BenchError>,
    },

    #[error("Not measuring")]
    NotMeasuring,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Error code sent back to the coordinator by a worker
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::Core(e) => e.error_code(),
            BenchError::NotMeasuring => codes::NOT_MEASURING,
            BenchError::Control(_) => codes::WORKER_UNAVAILABLE,
            _ => codes::INTERNAL,
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Config(_) => 2,
            BenchError::Core(e) => e.exit_code(),
            BenchError::Provision { .. } | BenchError::Decommission { .. } => 4,
            BenchError::Control(_) => 6,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
