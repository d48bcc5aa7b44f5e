//! Worker control server
//!
//! A Rep0 socket receives one request at a time. Every command is funnelled
//! through one executor task so commands against this worker never
//! interleave; each request gets its reply over a oneshot channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use libstatebench_core::types::InstanceIdentity;
use libstatebench_ipc::codec::{decode_request, encode_response, peek_request_id};
use libstatebench_ipc::error::codes;
use libstatebench_ipc::{
    tcp_url, ControlCommand, ControlRequest, ControlResponse, IpcError, MAX_MESSAGE_LEN,
};
use nng::options::{Options, RecvMaxSize, RecvTimeout};
use nng::{Message, Protocol, Socket};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::bench::channel::{CommandExecutor, CommandOutcome, LocalExecutor};
use crate::error::Result;

/// How long one blocking receive waits before the shutdown signal is checked
const RECV_POLL: Duration = Duration::from_millis(100);

/// Message sent to the executor task
pub enum WorkerMessage {
    Command {
        request_id: String,
        command: ControlCommand,
        response_tx: oneshot::Sender<ControlResponse>,
    },
}

/// Serves control commands for one instance
pub struct WorkerServer {
    identity: InstanceIdentity,
    executor: Arc<LocalExecutor>,
}

impl WorkerServer {
    pub fn new(identity: InstanceIdentity, executor: Arc<LocalExecutor>) -> Self {
        Self { identity, executor }
    }

    /// Open the Rep0 socket on `address` (`host:port`)
    pub fn bind(address: &str) -> Result<Socket> {
        let bind_failed = |e: nng::Error| IpcError::BindFailed {
            address: address.to_string(),
            message: e.to_string(),
        };

        let socket = Socket::new(Protocol::Rep0).map_err(IpcError::from)?;
        socket
            .set_opt::<RecvTimeout>(Some(RECV_POLL))
            .map_err(bind_failed)?;
        socket
            .set_opt::<RecvMaxSize>(MAX_MESSAGE_LEN)
            .map_err(bind_failed)?;
        socket.listen(&tcp_url(address)).map_err(bind_failed)?;

        info!(%address, "worker listening");
        Ok(socket)
    }

    /// Answer requests until `shutdown` resolves
    pub async fn run<F>(self, socket: Socket, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::channel(64);
        let executor_task = tokio::spawn(run_executor(self.executor.clone(), rx));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(instance = self.identity.index, "worker shutting down");
                    break;
                }
                result = tokio::task::spawn_blocking({
                    let socket = socket.clone();
                    move || socket.recv().map(|msg| msg.as_slice().to_vec())
                }) => {
                    match result {
                        Ok(Ok(bytes)) => {
                            let response = handle_request(&bytes, self.identity, &tx).await;
                            match encode_response(&response) {
                                Ok(reply) => {
                                    if let Err((_, e)) = socket.send(Message::from(reply.as_slice())) {
                                        warn!("Failed to send response: {}", e);
                                    }
                                }
                                Err(e) => error!("Failed to encode response: {}", e),
                            }
                        }
                        Ok(Err(nng::Error::TimedOut)) => continue,
                        Ok(Err(e)) => warn!("Receive error: {}", e),
                        Err(e) => error!("Task join error: {}", e),
                    }
                }
            }
        }

        drop(tx);
        if let Err(e) = executor_task.await {
            error!("Executor task failed: {}", e);
        }
        self.executor.shutdown().await;
        Ok(())
    }
}

async fn run_executor(executor: Arc<LocalExecutor>, mut rx: mpsc::Receiver<WorkerMessage>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WorkerMessage::Command {
                request_id,
                command,
                response_tx,
            } => {
                let response = handle_command(&executor, request_id, command).await;
                let _ = response_tx.send(response);
            }
        }
    }
}

async fn handle_command(
    executor: &LocalExecutor,
    request_id: String,
    command: ControlCommand,
) -> ControlResponse {
    // Target was checked by the receive loop; the executor ignores it
    match executor.execute(0, command).await {
        Ok(CommandOutcome::Done) => ControlResponse::success(request_id, None),
        Ok(CommandOutcome::Samples(samples)) => {
            match ControlResponse::with_samples(request_id.clone(), &samples) {
                Ok(response) => response,
                Err(e) => ControlResponse::error(
                    request_id,
                    codes::INTERNAL.to_string(),
                    e.to_string(),
                ),
            }
        }
        Err(e) => {
            warn!(command = command.as_str(), "command failed: {}", e);
            ControlResponse::error(request_id, e.error_code().to_string(), e.to_string())
        }
    }
}

async fn handle_request(
    bytes: &[u8],
    identity: InstanceIdentity,
    tx: &mpsc::Sender<WorkerMessage>,
) -> ControlResponse {
    match decode_request(bytes) {
        Ok(request) => route(request, identity, tx).await,
        Err(e) => {
            let code = match e {
                IpcError::VersionMismatch { .. } => codes::VERSION_MISMATCH,
                _ => codes::DESERIALIZATION,
            };
            let request_id = peek_request_id(bytes).unwrap_or_else(|| "unknown".to_string());
            warn!(code, "rejected request: {}", e);
            ControlResponse::error(request_id, code.to_string(), e.to_string())
        }
    }
}

async fn route(
    request: ControlRequest,
    identity: InstanceIdentity,
    tx: &mpsc::Sender<WorkerMessage>,
) -> ControlResponse {
    if !identity.is(request.target) {
        return ControlResponse::error(
            request.request_id,
            codes::WRONG_TARGET.to_string(),
            format!(
                "instance {} received a command for instance {}",
                identity.index, request.target
            ),
        );
    }

    let (response_tx, response_rx) = oneshot::channel();
    let msg = WorkerMessage::Command {
        request_id: request.request_id.clone(),
        command: request.command,
        response_tx,
    };
    if tx.send(msg).await.is_err() {
        return ControlResponse::error(
            request.request_id,
            codes::WORKER_UNAVAILABLE.to_string(),
            "Executor channel closed".to_string(),
        );
    }

    match response_rx.await {
        Ok(response) => response,
        Err(_) => ControlResponse::error(
            request.request_id,
            codes::WORKER_UNAVAILABLE.to_string(),
            "Executor dropped the request".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use libstatebench_core::store::StateStore;
    use libstatebench_core::MemoryStore;
    use libstatebench_ipc::codec::decode_response;
    use libstatebench_ipc::{ControlClient, Messenger};

    use super::*;

    fn free_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    fn start_worker(index: u32) -> (String, Arc<MemoryStore>, oneshot::Sender<()>) {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(LocalExecutor::new(store.clone(), Duration::from_millis(5)));
        let address = free_address();
        let socket = WorkerServer::bind(&address).unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = WorkerServer::new(InstanceIdentity::new(index), executor);
        tokio::spawn(server.run(socket, async {
            let _ = stop_rx.await;
        }));
        (address, store, stop_tx)
    }

    fn client_for(target: u32, address: String) -> ControlClient {
        ControlClient::new("127.0.0.1", 0)
            .with_address(target, address)
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_worker_executes_commands() {
        let (address, store, _stop) = start_worker(1);
        let client = client_for(1, address);

        client
            .send_to_instance(1, ControlCommand::SetObjects { count: 20 })
            .await
            .unwrap();
        client
            .send_to_instance(1, ControlCommand::SetStates { count: 20 })
            .await
            .unwrap();
        assert_eq!(store.data_point_count().await.unwrap(), 20);
        assert_eq!(store.value("test.7").unwrap().value, 7.0);

        client
            .send_to_instance(1, ControlCommand::DeleteStates { count: 20 })
            .await
            .unwrap();
        client
            .send_to_instance(1, ControlCommand::DeleteObjects { count: 20 })
            .await
            .unwrap();
        assert_eq!(store.data_point_count().await.unwrap(), 0);
        assert_eq!(store.value_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_worker_measuring_round_trip() {
        let (address, _store, _stop) = start_worker(2);
        let client = client_for(2, address);

        let err = client
            .send_to_instance(2, ControlCommand::StopMeasuring)
            .await
            .unwrap_err();
        assert!(matches!(err, IpcError::WorkerError { ref code, .. } if code == codes::NOT_MEASURING));

        client
            .send_to_instance(2, ControlCommand::StartMeasuring)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let ack = client
            .send_to_instance(2, ControlCommand::StopMeasuring)
            .await
            .unwrap();
        assert!(!ack.samples().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_rejects_foreign_target() {
        let (address, store, _stop) = start_worker(1);
        let client = client_for(3, address);

        let err = client
            .send_to_instance(3, ControlCommand::SetObjects { count: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, IpcError::WorkerError { ref code, .. } if code == codes::WRONG_TARGET));
        assert_eq!(store.data_point_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_worker_answers_undecodable_request() {
        let (address, _store, _stop) = start_worker(1);

        let reply = tokio::task::spawn_blocking(move || {
            let socket = Socket::new(Protocol::Req0).unwrap();
            socket
                .set_opt::<RecvTimeout>(Some(Duration::from_secs(5)))
                .unwrap();
            socket.dial(&tcp_url(&address)).unwrap();
            let garbage: &[u8] = &[0xde, 0xad, 0xbe, 0xef];
            socket.send(Message::from(garbage)).unwrap();
            socket.recv().unwrap().as_slice().to_vec()
        })
        .await
        .unwrap();

        let response = decode_response(&reply).unwrap();
        assert!(!response.ok);
        assert_eq!(response.request_id, "unknown");
        assert_eq!(response.error.unwrap().code, codes::DESERIALIZATION);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(LocalExecutor::new(store, Duration::from_millis(5)));
        let socket = WorkerServer::bind(&free_address()).unwrap();

        let server = WorkerServer::new(InstanceIdentity::new(1), executor);
        let result = tokio::time::timeout(Duration::from_secs(5), server.run(socket, async {}))
            .await
            .unwrap();
        assert!(result.is_ok());
    }
}
