//! Control channel wire types and client for statebench workers
//!
//! This crate provides:
//! - Message types for worker control (ControlRequest, ControlResponse, ControlCommand)
//! - rkyv encoding of those messages
//! - An nng request/reply client implementing the `Messenger` capability

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;

pub use client::{ControlClient, Messenger};
pub use error::IpcError;
pub use messages::{CommandKind, ControlCommand, ControlRequest, ControlResponse, IpcErrorPayload};

/// Current control schema version
pub const IPC_SCHEMA_VERSION: u32 = 1;

/// Largest message a worker accepts
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// nng URL for a `host:port` address
pub fn tcp_url(address: &str) -> String {
    format!("tcp://{}", address)
}
