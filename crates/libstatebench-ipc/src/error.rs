//! IPC error types

use thiserror::Error;

/// Errors that can occur on the control channel
#[derive(Error, Debug)]
pub enum IpcError {
    /// Connection failed
    #[error("Connection to {address} failed: {message}")]
    ConnectionFailed { address: String, message: String },

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Listening socket could not be opened
    #[error("Failed to listen on {address}: {message}")]
    BindFailed { address: String, message: String },

    /// Worker returned an error
    #[error("Worker error [{code}]: {message}")]
    WorkerError { code: String, message: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// NNG error
    #[error("NNG error: {0}")]
    Nng(String),
}

impl From<nng::Error> for IpcError {
    fn from(e: nng::Error) -> Self {
        IpcError::Nng(e.to_string())
    }
}

/// Error codes carried in `IpcErrorPayload::code`
pub mod codes {
    pub const DESERIALIZATION: &str = "deserialization";
    pub const VERSION_MISMATCH: &str = "version_mismatch";
    pub const WRONG_TARGET: &str = "wrong_target";
    pub const WORKER_UNAVAILABLE: &str = "worker_unavailable";
    pub const NOT_MEASURING: &str = "not_measuring";
    pub const INTERNAL: &str = "internal_error";
}
