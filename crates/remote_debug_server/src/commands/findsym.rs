use std::fmt::Write;

use remote_debug_core::ops::diagnostics::{OPT_SYMBOL, SYMBOL_NOT_FOUND};
use remote_debug_core::Address;
use serde_json::{Map, Value};

use crate::local::LocalDebugger;
use crate::ServerError;

/// Prints the symbol's address, or a fixed not-found line.
pub fn run<D: LocalDebugger>(
    debugger: &D,
    options: &Map<String, Value>,
    out: &mut String,
) -> Result<(), ServerError> {
    let symbol = options
        .get(OPT_SYMBOL)
        .and_then(Value::as_str)
        .ok_or(ServerError::InvalidOption(OPT_SYMBOL))?;

    match debugger.lookup(None, symbol).and_then(Address::new) {
        Some(address) => write!(out, "{address}")?,
        None => write!(out, "{SYMBOL_NOT_FOUND}{symbol}")?,
    }
    Ok(())
}
