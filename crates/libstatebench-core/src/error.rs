use thiserror::Error;

/// Main error type for statebench core operations
#[derive(Debug, Error)]
pub enum StatebenchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store busy: {0}")]
    StoreBusy(String),

    /// A bulk data-point operation failed part way through its loop
    #[error("{op} failed at index {index}: {message}")]
    DataOperation {
        op: &'static str,
        index: u64,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("sampler error: {0}")]
    Sampler(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StatebenchError {
    /// Error code used when the failure crosses the control wire
    pub fn error_code(&self) -> &'static str {
        match self {
            StatebenchError::NotFound(_) => "not_found",
            StatebenchError::StoreBusy(_) => "store_busy",
            StatebenchError::DataOperation { .. } => "data_operation",
            StatebenchError::Config(_) => "invalid_args",
            StatebenchError::Io(_) => "io_error",
            StatebenchError::Sled(_) => "db_error",
            StatebenchError::Json(_) => "internal_error",
            StatebenchError::TomlParse(_) => "invalid_args",
            StatebenchError::TomlSerialize(_) => "internal_error",
            StatebenchError::Sampler(_) => "sampler_error",
            StatebenchError::Internal(_) => "internal_error",
        }
    }

    /// Exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            StatebenchError::Config(_) => 2,
            StatebenchError::TomlParse(_) => 2,
            StatebenchError::NotFound(_) => 3,
            StatebenchError::StoreBusy(_) => 5,
            StatebenchError::Io(_) | StatebenchError::Sled(_) => 5,
            _ => 1,
        }
    }

    /// Wrap a store failure with the loop position it happened at
    pub fn data_operation(op: &'static str, index: u64, source: impl std::fmt::Display) -> Self {
        StatebenchError::DataOperation {
            op,
            index,
            message: source.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatebenchError>;
