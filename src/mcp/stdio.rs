//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each `tools/call` runs in its own task so a slow backend call does not
//! hold up the rest of the session. All responses go through one channel to
//! a single writer, so lines never interleave.

use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::protocol::{error_response, id_key, RpcError};
use super::server::{Incoming, McpServer};

const OUTBOUND_CAPACITY: usize = 64;

type InFlight = Arc<Mutex<HashMap<String, AbortHandle>>>;

/// Serve MCP on the process stdin/stdout until EOF or cancellation.
pub async fn serve_stdio(server: McpServer, cancel: CancellationToken) -> io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    serve(server, stdin, tokio::io::stdout(), cancel).await
}

/// Serve MCP over any line reader / writer pair.
///
/// On EOF, in-flight calls are allowed to finish and their responses are
/// flushed. On cancellation they are aborted.
pub async fn serve<R, W>(
    server: McpServer,
    reader: R,
    writer: W,
    cancel: CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Value>(OUTBOUND_CAPACITY);
    let writer_task = tokio::spawn(write_loop(writer, rx));
    let in_flight: InFlight = Arc::default();
    let mut tasks = JoinSet::new();
    let mut lines = reader.lines();

    tracing::info!("MCP stdio session started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(in_flight = tasks.len(), "MCP stdio session cancelled");
                tasks.abort_all();
                break;
            }
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let incoming: Value = match serde_json::from_str(line) {
                    Ok(value) => value,
                    Err(e) => {
                        let error = RpcError::parse_error(format!("Invalid JSON: {e}"));
                        send(&tx, error_response(Value::Null, error)).await;
                        continue;
                    }
                };
                route(&server, incoming, &tx, &in_flight, &mut tasks).await;
            }
        }
    }

    if !cancel.is_cancelled() {
        tokio::select! {
            _ = cancel.cancelled() => tasks.abort_all(),
            _ = async { while tasks.join_next().await.is_some() {} } => {}
        }
    }
    tasks.shutdown().await;
    drop(tx);

    writer_task.await.map_err(io::Error::other)?
}

async fn route(
    server: &McpServer,
    incoming: Value,
    tx: &mpsc::Sender<Value>,
    in_flight: &InFlight,
    tasks: &mut JoinSet<()>,
) {
    if incoming.is_array() {
        let server = server.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            for response in server.handle_message(incoming).await {
                send(&tx, response).await;
            }
        });
        return;
    }

    match Incoming::classify(incoming) {
        Incoming::Notification { method, params } if method == "notifications/cancelled" => {
            let Some(request_id) = params.get("requestId") else {
                return;
            };
            let handle = lock(in_flight).remove(&id_key(request_id));
            if let Some(handle) = handle {
                handle.abort();
                tracing::info!(request_id = %request_id, "tool call cancelled by client");
            }
        }
        Incoming::Request { id, method, params } if method == "tools/call" => {
            let key = id_key(&id);
            let server = server.clone();
            let tx = tx.clone();
            let registry = in_flight.clone();
            let task_key = key.clone();

            // Hold the registry lock across spawn so the task cannot
            // deregister before it is registered.
            let mut guard = lock(in_flight);
            let handle = tasks.spawn(async move {
                let response = server
                    .handle_single(Incoming::Request { id, method, params })
                    .await;
                lock(&registry).remove(&task_key);
                if let Some(response) = response {
                    send(&tx, response).await;
                }
            });
            guard.insert(key, handle);
        }
        other => {
            if let Some(response) = server.handle_single(other).await {
                send(tx, response).await;
            }
        }
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, AbortHandle>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn send(tx: &mpsc::Sender<Value>, response: Value) {
    if tx.send(response).await.is_err() {
        tracing::warn!("stdout writer closed; dropping response");
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Value>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
