use std::sync::Arc;

use anyhow::Context;
use remote_debug_server::{listener, RemoteDebuggerServer, ServerConfig, SnapshotDebugger};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().with_args(std::env::args().skip(1));
    let path = config
        .snapshot
        .clone()
        .context("No snapshot given: pass a path or set RDB_SNAPSHOT")?;

    let debugger = SnapshotDebugger::load(&path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let server = Arc::new(RemoteDebuggerServer::new(debugger));

    let tcp = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    tracing::info!("Starting Remote Debug Server on {}...", tcp.local_addr()?);

    listener::serve(tcp, server).await?;

    Ok(())
}
