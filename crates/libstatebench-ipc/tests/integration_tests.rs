//! Control channel tests against a real nng Rep0 listener

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libstatebench_core::types::ResourceSample;
use libstatebench_ipc::codec::{decode_request, encode_response};
use libstatebench_ipc::error::codes;
use libstatebench_ipc::{
    tcp_url, ControlClient, ControlCommand, ControlResponse, IpcError, Messenger,
};
use nng::{Message, Protocol, Socket};

fn free_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Minimal worker on a blocking thread: acknowledges everything addressed to
/// `index` and answers `StopMeasuring` with a single sample. The first reply
/// is held back by `first_reply_delay` when set. Returns the number of
/// requests handled so far.
fn spawn_worker_on(
    address: &str,
    index: u32,
    first_reply_delay: Option<Duration>,
) -> Arc<AtomicUsize> {
    let socket = Socket::new(Protocol::Rep0).unwrap();
    socket.listen(&tcp_url(address)).unwrap();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();

    std::thread::spawn(move || {
        let mut delay = first_reply_delay;
        while let Ok(msg) = socket.recv() {
            let request = decode_request(msg.as_slice()).unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = delay.take() {
                std::thread::sleep(delay);
            }

            let response = if request.target != index {
                ControlResponse::error(
                    request.request_id,
                    codes::WRONG_TARGET.to_string(),
                    format!("instance {} got a command for {}", index, request.target),
                )
            } else if request.command == ControlCommand::StopMeasuring {
                let sample = ResourceSample {
                    ts_unix_ms: 1,
                    cpu_percent: 50.0,
                    memory_bytes: 1024,
                    event_loop_lag_ms: 1.5,
                };
                ControlResponse::with_samples(request.request_id, &[sample]).unwrap()
            } else {
                ControlResponse::success(request.request_id, None)
            };
            let bytes = encode_response(&response).unwrap();
            if socket.send(Message::from(bytes.as_slice())).is_err() {
                return;
            }
        }
    });

    handled
}

fn spawn_worker(index: u32) -> (String, Arc<AtomicUsize>) {
    let address = free_address();
    let handled = spawn_worker_on(&address, index, None);
    (address, handled)
}

fn client_for(target: u32, address: String) -> ControlClient {
    ControlClient::new("127.0.0.1", 0)
        .with_address(target, address)
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_bulk_commands_are_acknowledged() {
    let (address, handled) = spawn_worker(1);
    let client = client_for(1, address);

    for command in [
        ControlCommand::SetObjects { count: 10 },
        ControlCommand::SetStates { count: 10 },
        ControlCommand::DeleteStates { count: 10 },
        ControlCommand::DeleteObjects { count: 10 },
    ] {
        let ack = client.send_to_instance(1, command).await.unwrap();
        assert!(ack.ok);
        assert!(ack.data.is_none());
    }
    assert_eq!(handled.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_stop_measuring_carries_samples() {
    let (address, _) = spawn_worker(2);
    let client = client_for(2, address);

    client
        .send_to_instance(2, ControlCommand::StartMeasuring)
        .await
        .unwrap();
    let ack = client
        .send_to_instance(2, ControlCommand::StopMeasuring)
        .await
        .unwrap();

    let samples = ack.samples().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].memory_bytes, 1024);
}

#[tokio::test]
async fn test_worker_error_is_surfaced() {
    let (address, _) = spawn_worker(1);
    // Address instance 3 at a worker that only answers to instance 1
    let client = client_for(3, address);

    let result = client
        .send_to_instance(3, ControlCommand::SetObjects { count: 1 })
        .await;

    match result {
        Err(IpcError::WorkerError { code, .. }) => assert_eq!(code, codes::WRONG_TARGET),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_late_reply_does_not_answer_next_request() {
    let address = free_address();
    let handled = spawn_worker_on(&address, 1, Some(Duration::from_millis(300)));
    let client = ControlClient::new("127.0.0.1", 0)
        .with_address(1, address)
        .with_timeout(Duration::from_millis(100));

    let first = client
        .send_to_instance(1, ControlCommand::SetObjects { count: 5 })
        .await;
    assert!(matches!(first, Err(IpcError::Timeout(100))));

    // Let the held-back acknowledgement arrive before the next request
    tokio::time::sleep(Duration::from_millis(400)).await;

    let ack = client
        .send_to_instance(1, ControlCommand::StopMeasuring)
        .await
        .unwrap();
    assert_eq!(ack.samples().unwrap().len(), 1);
    assert_eq!(handled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_abandoned_request_finishes_before_next() {
    let address = free_address();
    let handled = spawn_worker_on(&address, 1, Some(Duration::from_millis(200)));
    let client = Arc::new(client_for(1, address));

    // Drop the caller's future while the first exchange is still waiting
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        client.send_to_instance(1, ControlCommand::SetObjects { count: 5 }),
    )
    .await;
    assert!(abandoned.is_err());

    let ack = client
        .send_to_instance(1, ControlCommand::StopMeasuring)
        .await
        .unwrap();
    assert_eq!(ack.samples().unwrap().len(), 1);
    assert_eq!(handled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_worker_started_after_first_send_is_reached() {
    let address = free_address();
    let client = client_for(1, address.clone());

    let pending = tokio::spawn(async move {
        client
            .send_to_instance(1, ControlCommand::StartMeasuring)
            .await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    let handled = spawn_worker_on(&address, 1, None);

    let ack = pending.await.unwrap().unwrap();
    assert!(ack.ok);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}
