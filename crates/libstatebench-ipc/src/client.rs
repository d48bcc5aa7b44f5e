//! Control client for reaching worker instances
//!
//! Each worker gets its own nng Req0 socket, opened on first use. The socket
//! matches replies to the request it last sent, so a reply that arrives after
//! its request timed out is discarded instead of answering the next one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nng::options::protocol::reqrep::ResendTime;
use nng::options::{Options, RecvTimeout, SendTimeout};
use nng::{Message, Protocol, Socket};
use tracing::{debug, warn};

use libstatebench_core::types::InstanceIndex;
use libstatebench_core::worker_address;

use crate::codec::{decode_response, encode_request};
use crate::error::IpcError;
use crate::messages::{ControlCommand, ControlRequest, ControlResponse};
use crate::{tcp_url, DEFAULT_TIMEOUT_MS};

/// Point-to-point delivery of a command to one instance.
///
/// Resolves once the target has acknowledged the command or the
/// implementation's own timeout expired.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_to_instance(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<ControlResponse, IpcError>;
}

/// Req0 socket plus the lock that keeps one exchange in flight on it
struct WorkerSocket {
    socket: Socket,
    exchange: Mutex<()>,
}

/// nng messenger; worker `i` is dialled at `tcp://host:(base_port + i)`
pub struct ControlClient {
    host: String,
    base_port: u16,
    timeout: Duration,
    overrides: HashMap<InstanceIndex, String>,
    sockets: Mutex<HashMap<InstanceIndex, Arc<WorkerSocket>>>,
}

impl ControlClient {
    pub fn new(host: impl Into<String>, base_port: u16) -> Self {
        Self {
            host: host.into(),
            base_port,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            overrides: HashMap::new(),
            sockets: Mutex::new(HashMap::new()),
        }
    }

    /// Bound on sending a request and on waiting for its reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dial `address` instead of the derived port for `target`
    pub fn with_address(mut self, target: InstanceIndex, address: impl Into<String>) -> Self {
        self.overrides.insert(target, address.into());
        self
    }

    /// Address `target` is dialled on
    pub fn address(&self, target: InstanceIndex) -> String {
        match self.overrides.get(&target) {
            Some(address) => address.clone(),
            None => worker_address(&self.host, self.base_port, target),
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    fn worker_socket(&self, target: InstanceIndex) -> Result<Arc<WorkerSocket>, IpcError> {
        let mut sockets = self.sockets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(worker) = sockets.get(&target) {
            return Ok(worker.clone());
        }

        let worker = Arc::new(WorkerSocket {
            socket: self.open(target)?,
            exchange: Mutex::new(()),
        });
        sockets.insert(target, worker.clone());
        Ok(worker)
    }

    fn open(&self, target: InstanceIndex) -> Result<Socket, IpcError> {
        let address = self.address(target);
        let connection_failed = |e: nng::Error| IpcError::ConnectionFailed {
            address: address.clone(),
            message: e.to_string(),
        };

        let socket = Socket::new(Protocol::Req0)?;
        socket
            .set_opt::<SendTimeout>(Some(self.timeout))
            .map_err(connection_failed)?;
        socket
            .set_opt::<RecvTimeout>(Some(self.timeout))
            .map_err(connection_failed)?;
        // Commands are not idempotent; never resend on our own
        socket
            .set_opt::<ResendTime>(None)
            .map_err(connection_failed)?;

        // nng keeps redialling in the background until the worker listens
        socket
            .dial_async(&tcp_url(&address))
            .map_err(connection_failed)?;
        debug!(instance = target, %address, "dialling worker");
        Ok(socket)
    }
}

/// One request/reply exchange. Holds the socket's exchange lock throughout,
/// so it completes or times out before the next exchange on the same socket
/// starts, even when the caller stopped waiting for it.
fn exchange(
    worker: &WorkerSocket,
    request: &[u8],
    timeout_ms: u64,
) -> Result<ControlResponse, IpcError> {
    let _guard = worker.exchange.lock().unwrap_or_else(|e| e.into_inner());

    worker
        .socket
        .send(Message::from(request))
        .map_err(|(_, e)| nng_error(e, timeout_ms))?;
    let reply = worker
        .socket
        .recv()
        .map_err(|e| nng_error(e, timeout_ms))?;

    decode_response(reply.as_slice())
}

fn nng_error(e: nng::Error, timeout_ms: u64) -> IpcError {
    match e {
        nng::Error::TimedOut => IpcError::Timeout(timeout_ms),
        e => e.into(),
    }
}

#[async_trait]
impl Messenger for ControlClient {
    async fn send_to_instance(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<ControlResponse, IpcError> {
        let request = ControlRequest::new(target, command);
        let bytes = encode_request(&request)?;
        let worker = self.worker_socket(target)?;
        let timeout_ms = self.timeout_ms();

        let result = tokio::task::spawn_blocking(move || exchange(&worker, &bytes, timeout_ms))
            .await
            .map_err(|e| IpcError::ConnectionFailed {
                address: self.address(target),
                message: format!("exchange task failed: {}", e),
            })?;

        match result {
            Ok(response) => response.into_result(),
            Err(e) => {
                warn!(
                    instance = target,
                    command = command.as_str(),
                    "control exchange failed: {}",
                    e
                );
                Err(e)
            }
        }
    }
}
