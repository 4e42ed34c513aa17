use remote_debug_core::DebuggerError;
use thiserror::Error;

/// Failures raised by the local, in-process debugger.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("No thread for {0}")]
    ThreadNotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Target has no console")]
    NoConsole,

    #[error("Unknown console command: {0}")]
    UnknownConsoleCommand(String),

    #[error("Missing or invalid option '{0}'")]
    InvalidOption(&'static str),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Failed to format output")]
    Fmt(#[from] std::fmt::Error),

    #[error(transparent)]
    Debugger(#[from] DebuggerError),
}

impl From<ServerError> for DebuggerError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Debugger(inner) => inner,
            other => DebuggerError::target(other.to_string()),
        }
    }
}
