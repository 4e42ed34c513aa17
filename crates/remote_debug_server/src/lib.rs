//! Remote Debug Server
//!
//! Target-side half of the remote debugging bridge. Serves the remote
//! contract over framed JSON-RPC on TCP, backed by a local debugger such as
//! [`SnapshotDebugger`].

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod local;
pub mod server;
pub mod snapshot;

pub use config::ServerConfig;
pub use error::ServerError;
pub use local::{DebuggerConsole, LocalDebugger, LocalThread};
pub use server::{RemoteDebuggerServer, ServerState};
pub use snapshot::SnapshotDebugger;
