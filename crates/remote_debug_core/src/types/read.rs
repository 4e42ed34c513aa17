use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use crate::error::TransportError;
use crate::wire::methods::ReadResultPayload;

/// Outcome of one memory read against the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Data(Vec<u8>),
    /// First address the target could not read.
    Failure { address: u64 },
}

impl ReadResult {
    pub fn failure(address: u64) -> Self {
        Self::Failure { address }
    }

    pub fn to_payload(&self) -> ReadResultPayload {
        match self {
            Self::Data(bytes) => ReadResultPayload {
                data: Some(BASE64_STANDARD.encode(bytes)),
                failure_address: None,
            },
            Self::Failure { address } => ReadResultPayload {
                data: None,
                failure_address: Some(*address),
            },
        }
    }

    pub fn from_payload(payload: ReadResultPayload) -> Result<Self, TransportError> {
        match (payload.data, payload.failure_address) {
            (Some(encoded), None) => BASE64_STANDARD
                .decode(encoded)
                .map(Self::Data)
                .map_err(|e| {
                    TransportError::InvalidResponse(format!("Failed to decode read data: {e}"))
                }),
            (None, Some(address)) => Ok(Self::Failure { address }),
            _ => Err(TransportError::InvalidResponse(
                "read result must carry exactly one of data or failureAddress".into(),
            )),
        }
    }
}
