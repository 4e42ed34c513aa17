//! Client wrappers for the diagnostic commands served through the command
//! tunnel. Command names and option keys are shared with the server.

use serde_json::{Map, Value};

use crate::{RemoteDebugger, RemoteDebuggerClient, Result};

pub const FINDSYM: &str = "findsym";
pub const PMAP: &str = "pmap";
pub const PSTACK: &str = "pstack";

pub const OPT_SYMBOL: &str = "symbol";
pub const OPT_CONCURRENT_LOCKS: &str = "concurrentLocks";
pub const OPT_VERBOSE: &str = "verbose";

/// Text prefix the server answers with when `findsym` misses.
pub const SYMBOL_NOT_FOUND: &str = "Symbol not found: ";

pub fn find_symbol<R: RemoteDebugger>(client: &RemoteDebuggerClient<R>, symbol: &str) -> Result<String> {
    let mut options = Map::new();
    options.insert(OPT_SYMBOL.into(), Value::String(symbol.to_string()));
    client.run_diagnostic_command(FINDSYM, &options)
}

pub fn pmap<R: RemoteDebugger>(client: &RemoteDebuggerClient<R>) -> Result<String> {
    client.run_diagnostic_command(PMAP, &Map::new())
}

pub fn pstack<R: RemoteDebugger>(
    client: &RemoteDebuggerClient<R>,
    concurrent_locks: bool,
) -> Result<String> {
    let mut options = Map::new();
    options.insert(OPT_CONCURRENT_LOCKS.into(), Value::Bool(concurrent_locks));
    client.run_diagnostic_command(PSTACK, &options)
}
