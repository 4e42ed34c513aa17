//! Remote Debug Core
//!
//! Client side of a remote memory-debugging bridge: inspect the memory,
//! symbols and threads of a target process or core image through a narrow
//! JSON-RPC boundary. Provides the address model, the remote contract, a
//! page-granular read cache, per-architecture register decoding and the
//! wire format shared with the server.

pub mod address;
pub mod arch;
pub mod cache;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod ops;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use address::Address;
pub use arch::{ArchRegistry, BuiltinDecoder, Cpu, ThreadContext, ThreadDecoder};
pub use cache::CacheStats;
pub use client::RemoteDebuggerClient;
pub use config::ClientConfig;
pub use contract::RemoteDebugger;
pub use error::{DebuggerError, TransportError};
pub use transport::RpcClient;
pub use types::{
    MachineDescription, NarrowEncoding, PrimitiveSizes, PrimitiveType, ReadResult, SessionInfo,
    ThreadHandle,
};

/// Result type alias using DebuggerError
pub type Result<T> = std::result::Result<T, DebuggerError>;
