//! Target-side responder: the remote contract implemented over a local
//! debugger.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use remote_debug_core::{
    DebuggerError, MachineDescription, PrimitiveType, ReadResult, RemoteDebugger, Result,
};
use serde_json::{Map, Value};

use crate::commands;
use crate::local::{LocalDebugger, LocalThread};
use crate::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Executing,
}

/// Clears the executing flag even if the call unwinds.
struct Executing<'a>(&'a AtomicBool);

impl Drop for Executing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RemoteDebuggerServer<D: LocalDebugger> {
    debugger: D,
    gate: Mutex<()>,
    executing: AtomicBool,
}

impl<D: LocalDebugger> RemoteDebuggerServer<D> {
    pub fn new(debugger: D) -> Self {
        Self {
            debugger,
            gate: Mutex::new(()),
            executing: AtomicBool::new(false),
        }
    }

    pub fn debugger(&self) -> &D {
        &self.debugger
    }

    pub fn state(&self) -> ServerState {
        if self.executing.load(Ordering::SeqCst) {
            ServerState::Executing
        } else {
            ServerState::Idle
        }
    }

    /// Runs one call against the local debugger. Calls never overlap.
    fn call<T>(&self, op: impl FnOnce(&D) -> std::result::Result<T, ServerError>) -> Result<T> {
        let _gate = self.gate.lock();
        self.executing.store(true, Ordering::SeqCst);
        let _executing = Executing(&self.executing);
        op(&self.debugger).map_err(DebuggerError::from)
    }

    /// Resolves a wire thread reference. Addresses travel as raw integers
    /// and are re-parsed as hex target addresses.
    fn thread_proxy(&self, id_or_addr: i64, is_address: bool) -> std::result::Result<D::Thread, ServerError> {
        if !is_address {
            return self.debugger.thread_for_id(id_or_addr);
        }
        let text = format!("0x{:x}", id_or_addr as u64);
        let address = self
            .debugger
            .parse_address(&text)?
            .ok_or_else(|| ServerError::InvalidAddress(text))?;
        self.debugger.thread_for_identifier_address(address)
    }
}

fn shift_to_wire(shift: u32) -> std::result::Result<i32, ServerError> {
    i32::try_from(shift).map_err(|_| DebuggerError::target(format!("shift {shift} out of range")).into())
}

impl<D: LocalDebugger> RemoteDebugger for RemoteDebuggerServer<D> {
    fn os(&self) -> Result<String> {
        self.call(|d| Ok(d.os()))
    }

    fn cpu(&self) -> Result<String> {
        self.call(|d| Ok(d.cpu()))
    }

    fn machine_description(&self) -> Result<MachineDescription> {
        self.call(|d| Ok(d.machine_description()))
    }

    fn lookup_in_process(&self, object_name: Option<&str>, symbol: &str) -> Result<u64> {
        self.call(|d| Ok(d.lookup(object_name, symbol).unwrap_or(0)))
    }

    fn read_bytes_from_process(&self, address: u64, num_bytes: u64) -> Result<ReadResult> {
        self.call(|d| Ok(d.read_bytes(address, num_bytes)))
    }

    fn has_console(&self) -> Result<bool> {
        self.call(|d| Ok(d.console().is_some()))
    }

    fn console_prompt(&self) -> Result<String> {
        self.call(|d| Ok(d.console().ok_or(ServerError::NoConsole)?.prompt()))
    }

    fn console_execute_command(&self, command: &str) -> Result<String> {
        self.call(|d| d.console().ok_or(ServerError::NoConsole)?.execute(command))
    }

    fn type_size(&self, ty: PrimitiveType) -> Result<u64> {
        self.call(|d| Ok(d.type_size(ty)))
    }

    fn heap_oop_size(&self) -> Result<u64> {
        self.call(|d| Ok(d.heap_oop_size()))
    }

    fn klass_ptr_size(&self) -> Result<u64> {
        self.call(|d| Ok(d.klass_ptr_size()))
    }

    fn narrow_oop_base(&self) -> Result<u64> {
        self.call(|d| Ok(d.narrow_oop().base))
    }

    fn narrow_oop_shift(&self) -> Result<i32> {
        self.call(|d| shift_to_wire(d.narrow_oop().shift))
    }

    fn narrow_klass_base(&self) -> Result<u64> {
        self.call(|d| Ok(d.narrow_klass().base))
    }

    fn narrow_klass_shift(&self) -> Result<i32> {
        self.call(|d| shift_to_wire(d.narrow_klass().shift))
    }

    fn threads_equal(
        &self,
        first: i64,
        first_is_address: bool,
        second: i64,
        second_is_address: bool,
    ) -> Result<bool> {
        self.call(|_| {
            let a = self.thread_proxy(first, first_is_address)?;
            let b = self.thread_proxy(second, second_is_address)?;
            Ok(a.same_as(&b))
        })
    }

    fn thread_hash_code(&self, id_or_addr: i64, is_address: bool) -> Result<i32> {
        self.call(|_| Ok(self.thread_proxy(id_or_addr, is_address)?.hash_code()))
    }

    fn thread_integer_register_set(&self, id_or_addr: i64, is_address: bool) -> Result<Vec<i64>> {
        self.call(|_| self.thread_proxy(id_or_addr, is_address)?.integer_register_set())
    }

    fn supports_command_tunnel(&self) -> Result<bool> {
        Ok(true)
    }

    fn exec_command_on_server(&self, command: &str, options: &Map<String, Value>) -> Result<String> {
        tracing::debug!("Executing diagnostic command '{}'", command);
        self.call(|d| Ok(commands::execute(d, command, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::sample;
    use crate::snapshot::SnapshotDebugger;
    use remote_debug_core::{ClientConfig, RemoteDebuggerClient};
    use serde_json::json;

    fn server() -> RemoteDebuggerServer<SnapshotDebugger> {
        RemoteDebuggerServer::new(sample())
    }

    #[test]
    fn test_thread_proxy_parses_addresses_as_hex() {
        let server = server();
        assert_eq!(server.thread_integer_register_set(0x7000, true).unwrap(), vec![1, 2, 3]);
        assert_eq!(server.thread_integer_register_set(2, false).unwrap(), vec![4, 5, 6]);
        assert!(server.threads_equal(0x7000, true, 1, false).unwrap());
        assert!(!server.threads_equal(1, false, 2, false).unwrap());
    }

    #[test]
    fn test_unknown_thread_is_target_error() {
        let err = server().thread_hash_code(0x9000, true).unwrap_err();
        assert!(matches!(err, DebuggerError::Target { .. }));
    }

    #[test]
    fn test_findsym_not_found_through_the_contract() {
        let options = json!({"symbol": "foo"});
        let out = server()
            .exec_command_on_server("findsym", options.as_object().unwrap())
            .unwrap();
        assert_eq!(out, "Symbol not found: foo");
    }

    #[test]
    fn test_missing_symbol_looks_up_as_zero() {
        assert_eq!(server().lookup_in_process(None, "nope").unwrap(), 0);
    }

    #[test]
    fn test_state_returns_to_idle() {
        let server = server();
        assert_eq!(server.state(), ServerState::Idle);
        server.os().unwrap();
        assert_eq!(server.state(), ServerState::Idle);
    }

    #[test]
    fn test_client_runs_in_process_against_server() {
        let client = RemoteDebuggerClient::new(server(), &ClientConfig::default()).unwrap();

        assert_eq!(client.session().os, "linux");
        assert_eq!(client.read_jint(0x7000).unwrap(), 0x1234);
        assert_eq!(
            client.read_compressed_oop(0x7000).unwrap().map(|a| a.as_u64()),
            Some(0x1234 << 3)
        );
        assert!(client.has_console().unwrap());
        assert_eq!(client.console_prompt().unwrap(), "snapshot> ");
    }
}
