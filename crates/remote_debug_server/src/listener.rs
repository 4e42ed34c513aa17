//! TCP front end: one task per connection, one blocking-pool job per
//! request.

use std::sync::Arc;

use remote_debug_core::wire::framing::{read_frame, write_frame};
use remote_debug_core::wire::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use remote_debug_core::RemoteDebugger;
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::dispatch::dispatch;

/// Accepts connections until the listener fails.
pub async fn serve<R>(listener: TcpListener, target: Arc<R>) -> std::io::Result<()>
where
    R: RemoteDebugger + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("Accepted debugger client {}", peer);
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, target).await {
                tracing::warn!("Connection from {} ended with error: {}", peer, e);
            } else {
                tracing::info!("Debugger client {} disconnected", peer);
            }
        });
    }
}

async fn handle_connection<R>(stream: TcpStream, target: Arc<R>) -> std::io::Result<()>
where
    R: RemoteDebugger + 'static,
{
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(message) = read_frame::<_, Value>(&mut reader).await? {
        let response = match serde_json::from_value::<JsonRpcRequest>(message.clone()) {
            Ok(request) => {
                let target = Arc::clone(&target);
                let id = request.id;
                match tokio::task::spawn_blocking(move || dispatch(target.as_ref(), request)).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!("Request {} panicked: {}", id, e);
                        JsonRpcResponse::error(
                            id,
                            JsonRpcError::new(codes::TARGET_ERROR, format!("Internal error: {e}")),
                        )
                    }
                }
            }
            Err(e) => {
                let id = message.get("id").and_then(Value::as_u64).unwrap_or(0);
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(codes::INVALID_REQUEST, format!("Invalid request: {e}")),
                )
            }
        };
        write_frame(&mut write_half, &response).await?;
    }

    Ok(())
}
