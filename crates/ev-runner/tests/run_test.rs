//! `Orchestrator::execute_run` against a local agent endpoint.

use ev_core::config::{RetryPolicy, TelemetryConfig};
use ev_core::event::EventKind;
use ev_runner::{Orchestrator, RunnerError};
use ev_stats::memory::MemoryStore;
use ev_stream::CompletionReason;
use ev_trace::store::SpanStore;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const SSE_BODY: &str = "data: {\"type\":\"RUN_STARTED\",\"runId\":\"r\"}\n\n\
                        data: {\"type\":\"TEXT_MESSAGE_CONTENT\",\"delta\":\"hi\"}\n\n\
                        data: {\"type\":\"RUN_FINISHED\"}\n\n";

fn orchestrator(retry: RetryPolicy) -> Orchestrator {
    let mut config = TelemetryConfig::default();
    config.runner.retry = retry;
    let store = Arc::new(MemoryStore::new());
    Orchestrator::new(
        config,
        Arc::new(SpanStore::in_memory().unwrap()),
        store.clone(),
        store,
    )
    .unwrap()
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_ms: 1,
        backoff_multiplier: 1.0,
        max_backoff_ms: 5,
    }
}

/// Read the request head plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&raw[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

async fn respond_sse(socket: &mut TcpStream) {
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/event-stream\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        SSE_BODY.len(),
        SSE_BODY
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.flush().await;
}

/// Serve one SSE run, after hanging up on `drop_first` connections.
async fn agent(drop_first: usize) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/agent", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        for _ in 0..drop_first {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            drop(socket);
        }
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = tx.send(read_request(&mut socket).await);
        respond_sse(&mut socket).await;
    });
    (url, rx)
}

#[tokio::test]
async fn collects_events_until_run_end() {
    let (url, request) = agent(0).await;
    let orch = orchestrator(RetryPolicy::default());
    let body = serde_json::json!({"threadId": "th-1", "messages": []});

    let ctx = orch.execute_run("b1", "run-7", &url, Some(&body)).await.unwrap();

    assert_eq!(ctx.attempts, 1);
    assert_eq!(ctx.completion, Some(CompletionReason::Event(EventKind::RunFinished)));
    let kinds: Vec<_> = ctx.events.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::RunStarted, EventKind::TextMessageContent, EventKind::RunFinished]
    );

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /agent"));
    assert!(request.to_lowercase().contains("x-evtel-run-id: run-7"));
    assert!(request.contains("\"threadId\":\"th-1\""));
}

#[tokio::test]
async fn dropped_connection_is_retried() {
    let (url, _request) = agent(1).await;
    let orch = orchestrator(fast_retry(2));

    let ctx = orch.execute_run("b1", "run-1", &url, None).await.unwrap();
    assert_eq!(ctx.attempts, 2);
    assert_eq!(ctx.events.len(), 3);
}

#[tokio::test]
async fn refused_connection_exhausts_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/agent", listener.local_addr().unwrap());
    drop(listener);

    let orch = orchestrator(fast_retry(2));
    match orch.execute_run("b1", "run-1", &url, None).await {
        Err(RunnerError::RetriesExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(source.is_retryable());
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn without_retries_the_stream_error_surfaces() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/agent", listener.local_addr().unwrap());
    drop(listener);

    let orch = orchestrator(RetryPolicy::default());
    let result = orch.execute_run("b1", "run-1", &url, None).await;
    assert!(matches!(result, Err(RunnerError::Stream(_))));
}
