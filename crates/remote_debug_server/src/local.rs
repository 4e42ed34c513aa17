//! The in-process debugger a server delegates to.
//!
//! Implementations are already attached to their target (a live process or
//! a core image); the server only translates calls.

use remote_debug_core::client::parse_hex_address;
use remote_debug_core::{Address, MachineDescription, NarrowEncoding, PrimitiveType, ReadResult};

use crate::ServerError;

/// A mapped image or region, as listed by `pmap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadObject {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosestSymbol {
    pub name: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub pc: u64,
}

pub trait LocalThread: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> String;
    fn integer_register_set(&self) -> Result<Vec<i64>, ServerError>;
    fn hash_code(&self) -> i32;
    /// Whether both handles denote the same OS thread.
    fn same_as(&self, other: &Self) -> bool;
    /// Innermost frame first.
    fn frames(&self) -> Result<Vec<Frame>, ServerError>;
    fn held_locks(&self) -> Vec<String>;
}

pub trait DebuggerConsole: Send + Sync {
    fn prompt(&self) -> String;
    fn execute(&self, command: &str) -> Result<String, ServerError>;
}

pub trait LocalDebugger: Send + Sync {
    type Thread: LocalThread;

    fn os(&self) -> String;
    fn cpu(&self) -> String;
    fn machine_description(&self) -> MachineDescription;
    fn type_size(&self, ty: PrimitiveType) -> u64;
    fn heap_oop_size(&self) -> u64;
    fn klass_ptr_size(&self) -> u64;
    fn narrow_oop(&self) -> NarrowEncoding;
    fn narrow_klass(&self) -> NarrowEncoding;

    fn read_bytes(&self, address: u64, count: u64) -> ReadResult;
    fn lookup(&self, object_name: Option<&str>, symbol: &str) -> Option<u64>;
    fn closest_symbol(&self, address: u64) -> Option<ClosestSymbol>;

    fn parse_address(&self, text: &str) -> Result<Option<Address>, ServerError> {
        parse_hex_address(text).map_err(|_| ServerError::InvalidAddress(text.to_string()))
    }

    fn thread_for_identifier_address(&self, address: Address) -> Result<Self::Thread, ServerError>;
    fn thread_for_id(&self, id: i64) -> Result<Self::Thread, ServerError>;
    fn threads(&self) -> Vec<Self::Thread>;
    fn load_objects(&self) -> Vec<LoadObject>;

    fn console(&self) -> Option<&dyn DebuggerConsole> {
        None
    }
}
