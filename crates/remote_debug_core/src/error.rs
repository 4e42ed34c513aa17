use std::time::Duration;
use thiserror::Error;

use crate::wire::{codes, JsonRpcError};

/// The round trip itself could not complete.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Connection closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Unmapped address {address:#x}")]
    UnmappedAddress { address: u64 },

    #[error("Address {address:#x} is not aligned to {alignment} bytes")]
    UnalignedAddress { address: u64, alignment: u64 },

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("Not yet implemented: {0}")]
    NotYetImplemented(&'static str),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed {
        command: String,
        message: String,
        output: String,
    },

    #[error("Target error: {message}")]
    Target { message: String },
}

impl DebuggerError {
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// JSON-RPC error code used when this error crosses the wire.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Transport(_) | Self::Target { .. } => codes::TARGET_ERROR,
            Self::UnmappedAddress { .. } => codes::UNMAPPED_ADDRESS,
            Self::UnalignedAddress { .. } => codes::UNALIGNED_ADDRESS,
            Self::UnsupportedArchitecture(_) => codes::UNSUPPORTED_ARCHITECTURE,
            Self::UnsupportedCommand(_) => codes::UNSUPPORTED_COMMAND,
            Self::NotYetImplemented(_) => codes::NOT_YET_IMPLEMENTED,
            Self::CommandFailed { .. } => codes::COMMAND_FAILED,
        }
    }

    pub fn to_rpc(&self) -> JsonRpcError {
        let data = match self {
            Self::UnmappedAddress { address } => Some(serde_json::json!({ "address": address })),
            Self::UnalignedAddress { address, alignment } => Some(serde_json::json!({
                "address": address,
                "alignment": alignment,
            })),
            Self::UnsupportedArchitecture(cpu) => Some(serde_json::json!({ "cpu": cpu })),
            Self::UnsupportedCommand(command) => Some(serde_json::json!({ "command": command })),
            Self::NotYetImplemented(what) => Some(serde_json::json!({ "operation": what })),
            Self::CommandFailed {
                command,
                message,
                output,
            } => Some(serde_json::json!({
                "command": command,
                "message": message,
                "output": output,
            })),
            Self::Transport(_) | Self::Target { .. } => None,
        };

        JsonRpcError {
            code: self.rpc_code(),
            message: match self {
                Self::Target { message } => message.clone(),
                other => other.to_string(),
            },
            data,
        }
    }

    /// Rebuilds the error a server reported. Unknown codes become `Target`.
    pub fn from_rpc(error: JsonRpcError) -> Self {
        let field = |name: &str| error.data.as_ref().and_then(|data| data.get(name));
        let u64_field = |name: &str| field(name).and_then(serde_json::Value::as_u64);
        let str_field = |name: &str| {
            field(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };

        match error.code {
            codes::UNMAPPED_ADDRESS => match u64_field("address") {
                Some(address) => Self::UnmappedAddress { address },
                None => Self::target(error.message),
            },
            codes::UNALIGNED_ADDRESS => match (u64_field("address"), u64_field("alignment")) {
                (Some(address), Some(alignment)) => Self::UnalignedAddress { address, alignment },
                _ => Self::target(error.message),
            },
            codes::UNSUPPORTED_ARCHITECTURE => {
                Self::UnsupportedArchitecture(str_field("cpu").unwrap_or(error.message))
            }
            codes::UNSUPPORTED_COMMAND => {
                Self::UnsupportedCommand(str_field("command").unwrap_or(error.message))
            }
            codes::NOT_YET_IMPLEMENTED => Self::NotYetImplemented("remote operation"),
            codes::COMMAND_FAILED => Self::CommandFailed {
                command: str_field("command").unwrap_or_default(),
                message: str_field("message").unwrap_or_else(|| error.message.clone()),
                output: str_field("output").unwrap_or_default(),
            },
            _ => Self::target(error.message),
        }
    }
}
