//! rkyv encoding of control messages
//!
//! One nng message carries one archive. Incoming bytes are copied into an
//! `AlignedVec` before access since archived types require aligned storage.

use rkyv::util::AlignedVec;

use crate::error::IpcError;
use crate::messages::{
    ArchivedControlRequest, ArchivedControlResponse, ControlRequest, ControlResponse,
};
use crate::IPC_SCHEMA_VERSION;

fn aligned(bytes: &[u8]) -> AlignedVec {
    let mut buf = AlignedVec::with_capacity(bytes.len());
    buf.extend_from_slice(bytes);
    buf
}

fn check_version(version: u32) -> Result<(), IpcError> {
    if version != IPC_SCHEMA_VERSION {
        return Err(IpcError::VersionMismatch {
            expected: IPC_SCHEMA_VERSION,
            actual: version,
        });
    }
    Ok(())
}

pub fn encode_request(request: &ControlRequest) -> Result<AlignedVec, IpcError> {
    rkyv::to_bytes::<rkyv::rancor::Error>(request)
        .map_err(|e| IpcError::Serialization(e.to_string()))
}

pub fn encode_response(response: &ControlResponse) -> Result<AlignedVec, IpcError> {
    rkyv::to_bytes::<rkyv::rancor::Error>(response)
        .map_err(|e| IpcError::Serialization(e.to_string()))
}

/// Validate and deserialize a request, checking the schema version first
pub fn decode_request(bytes: &[u8]) -> Result<ControlRequest, IpcError> {
    let buf = aligned(bytes);
    let archived = rkyv::access::<ArchivedControlRequest, rkyv::rancor::Error>(&buf)
        .map_err(|e| IpcError::Deserialization(e.to_string()))?;

    check_version(archived.ipc_schema_version.into())?;

    rkyv::deserialize::<ControlRequest, rkyv::rancor::Error>(archived)
        .map_err(|e| IpcError::Deserialization(e.to_string()))
}

/// Validate and deserialize a response, checking the schema version first
pub fn decode_response(bytes: &[u8]) -> Result<ControlResponse, IpcError> {
    let buf = aligned(bytes);
    let archived = rkyv::access::<ArchivedControlResponse, rkyv::rancor::Error>(&buf)
        .map_err(|e| IpcError::Deserialization(e.to_string()))?;

    check_version(archived.ipc_schema_version.into())?;

    rkyv::deserialize::<ControlResponse, rkyv::rancor::Error>(archived)
        .map_err(|e| IpcError::Deserialization(e.to_string()))
}

/// Best-effort request id from a message that failed full decoding
pub fn peek_request_id(bytes: &[u8]) -> Option<String> {
    let buf = aligned(bytes);
    rkyv::access::<ArchivedControlRequest, rkyv::rancor::Error>(&buf)
        .ok()
        .map(|archived| archived.request_id.as_str().to_string())
}
