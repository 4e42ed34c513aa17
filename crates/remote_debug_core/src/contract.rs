//! The operations that may cross the RPC boundary.
//!
//! Implemented by the network transport ([`crate::transport::RpcClient`]) and
//! by the target-side server itself, so a client can run against either.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::types::{MachineDescription, PrimitiveType, ReadResult};
use crate::Result;

pub trait RemoteDebugger: Send + Sync {
    fn os(&self) -> Result<String>;
    fn cpu(&self) -> Result<String>;
    fn machine_description(&self) -> Result<MachineDescription>;

    /// Zero means the symbol is not present.
    fn lookup_in_process(&self, object_name: Option<&str>, symbol: &str) -> Result<u64>;

    /// An unmapped range is a successful call returning [`ReadResult::Failure`].
    fn read_bytes_from_process(&self, address: u64, num_bytes: u64) -> Result<ReadResult>;

    fn has_console(&self) -> Result<bool>;
    fn console_prompt(&self) -> Result<String>;
    fn console_execute_command(&self, command: &str) -> Result<String>;

    fn type_size(&self, ty: PrimitiveType) -> Result<u64>;
    fn heap_oop_size(&self) -> Result<u64>;
    fn klass_ptr_size(&self) -> Result<u64>;
    fn narrow_oop_base(&self) -> Result<u64>;
    fn narrow_oop_shift(&self) -> Result<i32>;
    fn narrow_klass_base(&self) -> Result<u64>;
    fn narrow_klass_shift(&self) -> Result<i32>;

    fn threads_equal(
        &self,
        first: i64,
        first_is_address: bool,
        second: i64,
        second_is_address: bool,
    ) -> Result<bool>;
    fn thread_hash_code(&self, id_or_addr: i64, is_address: bool) -> Result<i32>;
    fn thread_integer_register_set(&self, id_or_addr: i64, is_address: bool) -> Result<Vec<i64>>;

    /// Whether [`RemoteDebugger::exec_command_on_server`] is available.
    fn supports_command_tunnel(&self) -> Result<bool>;
    fn exec_command_on_server(&self, command: &str, options: &Map<String, Value>) -> Result<String>;
}

macro_rules! forward_remote_debugger {
    ($($wrapper:ident),*) => {$(
        impl<T: RemoteDebugger + ?Sized> RemoteDebugger for $wrapper<T> {
            fn os(&self) -> Result<String> { (**self).os() }
            fn cpu(&self) -> Result<String> { (**self).cpu() }
            fn machine_description(&self) -> Result<MachineDescription> {
                (**self).machine_description()
            }
            fn lookup_in_process(&self, object_name: Option<&str>, symbol: &str) -> Result<u64> {
                (**self).lookup_in_process(object_name, symbol)
            }
            fn read_bytes_from_process(&self, address: u64, num_bytes: u64) -> Result<ReadResult> {
                (**self).read_bytes_from_process(address, num_bytes)
            }
            fn has_console(&self) -> Result<bool> { (**self).has_console() }
            fn console_prompt(&self) -> Result<String> { (**self).console_prompt() }
            fn console_execute_command(&self, command: &str) -> Result<String> {
                (**self).console_execute_command(command)
            }
            fn type_size(&self, ty: PrimitiveType) -> Result<u64> { (**self).type_size(ty) }
            fn heap_oop_size(&self) -> Result<u64> { (**self).heap_oop_size() }
            fn klass_ptr_size(&self) -> Result<u64> { (**self).klass_ptr_size() }
            fn narrow_oop_base(&self) -> Result<u64> { (**self).narrow_oop_base() }
            fn narrow_oop_shift(&self) -> Result<i32> { (**self).narrow_oop_shift() }
            fn narrow_klass_base(&self) -> Result<u64> { (**self).narrow_klass_base() }
            fn narrow_klass_shift(&self) -> Result<i32> { (**self).narrow_klass_shift() }
            fn threads_equal(&self, first: i64, first_is_address: bool, second: i64, second_is_address: bool) -> Result<bool> {
                (**self).threads_equal(first, first_is_address, second, second_is_address)
            }
            fn thread_hash_code(&self, id_or_addr: i64, is_address: bool) -> Result<i32> {
                (**self).thread_hash_code(id_or_addr, is_address)
            }
            fn thread_integer_register_set(&self, id_or_addr: i64, is_address: bool) -> Result<Vec<i64>> {
                (**self).thread_integer_register_set(id_or_addr, is_address)
            }
            fn supports_command_tunnel(&self) -> Result<bool> { (**self).supports_command_tunnel() }
            fn exec_command_on_server(&self, command: &str, options: &Map<String, Value>) -> Result<String> {
                (**self).exec_command_on_server(command, options)
            }
        }
    )*};
}

forward_remote_debugger!(Arc, Box);
