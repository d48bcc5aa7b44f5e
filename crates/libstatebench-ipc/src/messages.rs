//! Control request and response message types
//!
//! These types define the wire format between coordinator and workers.
//! Wire format is rkyv-serialized; response payloads are JSON strings.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use libstatebench_core::types::{InstanceIndex, ResourceSample};

use crate::error::IpcError;
use crate::IPC_SCHEMA_VERSION;

/// Control request envelope
#[derive(Archive, Serialize, Deserialize, Debug, Clone)]
#[rkyv(derive(Debug))]
pub struct ControlRequest {
    /// Schema version for compatibility checking
    pub ipc_schema_version: u32,
    /// Unique request ID for correlation
    pub request_id: String,
    /// Instance the command is addressed to
    pub target: u32,
    /// The command to execute
    pub command: ControlCommand,
}

impl ControlRequest {
    /// Create a new request with a fresh id and the current schema version
    pub fn new(target: InstanceIndex, command: ControlCommand) -> Self {
        Self {
            ipc_schema_version: IPC_SCHEMA_VERSION,
            request_id: uuid::Uuid::new_v4().to_string(),
            target,
            command,
        }
    }
}

/// Control response envelope
#[derive(Archive, Serialize, Deserialize, Debug, Clone)]
#[rkyv(derive(Debug))]
pub struct ControlResponse {
    /// Schema version (must match request)
    pub ipc_schema_version: u32,
    /// Request ID for correlation
    pub request_id: String,
    /// Whether the command succeeded
    pub ok: bool,
    /// Response data (JSON-encoded)
    pub data: Option<String>,
    /// Error details if ok=false
    pub error: Option<IpcErrorPayload>,
}

impl ControlResponse {
    /// Create a successful response
    pub fn success(request_id: String, data: Option<String>) -> Self {
        Self {
            ipc_schema_version: IPC_SCHEMA_VERSION,
            request_id,
            ok: true,
            data,
            error: None,
        }
    }

    /// Create an error response
    pub fn error(request_id: String, code: String, message: String) -> Self {
        Self {
            ipc_schema_version: IPC_SCHEMA_VERSION,
            request_id,
            ok: false,
            data: None,
            error: Some(IpcErrorPayload {
                code,
                message,
                details: None,
            }),
        }
    }

    /// Acknowledge a stop-measuring command with the collected samples
    pub fn with_samples(request_id: String, samples: &[ResourceSample]) -> Result<Self, IpcError> {
        let data = serde_json::to_string(samples)?;
        Ok(Self::success(request_id, Some(data)))
    }

    /// Samples carried by a stop-measuring acknowledgement
    pub fn samples(&self) -> Result<Vec<ResourceSample>, IpcError> {
        match self.data {
            Some(ref data) => Ok(serde_json::from_str(data)?),
            None => Ok(Vec::new()),
        }
    }

    /// Convert a failed response into an error
    pub fn into_result(self) -> Result<Self, IpcError> {
        if self.ok {
            return Ok(self);
        }
        let (code, message) = match self.error {
            Some(err) => (err.code, err.message),
            None => ("unknown".to_string(), "Unknown error".to_string()),
        };
        Err(IpcError::WorkerError { code, message })
    }
}

/// Error payload in responses
#[derive(Archive, Serialize, Deserialize, Debug, Clone, SerdeSerialize, SerdeDeserialize)]
#[rkyv(derive(Debug))]
pub struct IpcErrorPayload {
    /// Error code (see `error::codes`)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (JSON-encoded)
    pub details: Option<String>,
}

/// Commands a coordinator can send to a worker
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[rkyv(derive(Debug))]
pub enum ControlCommand {
    /// Create `test.0 .. test.{count-1}`
    SetObjects { count: u64 },
    DeleteObjects { count: u64 },
    /// Write value `i` to every `test.i`
    SetStates { count: u64 },
    DeleteStates { count: u64 },
    /// Start the resource sampler on the receiving instance
    StartMeasuring,
    /// Stop the sampler; the acknowledgement carries its samples
    StopMeasuring,
}

/// Command kind without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SetObjects,
    DeleteObjects,
    SetStates,
    DeleteStates,
    StartMeasuring,
    StopMeasuring,
}

impl ControlCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            ControlCommand::SetObjects { .. } => CommandKind::SetObjects,
            ControlCommand::DeleteObjects { .. } => CommandKind::DeleteObjects,
            ControlCommand::SetStates { .. } => CommandKind::SetStates,
            ControlCommand::DeleteStates { .. } => CommandKind::DeleteStates,
            ControlCommand::StartMeasuring => CommandKind::StartMeasuring,
            ControlCommand::StopMeasuring => CommandKind::StopMeasuring,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::SetObjects => "set_objects",
            CommandKind::DeleteObjects => "delete_objects",
            CommandKind::SetStates => "set_states",
            CommandKind::DeleteStates => "delete_states",
            CommandKind::StartMeasuring => "start_measuring",
            CommandKind::StopMeasuring => "stop_measuring",
        }
    }
}
