//! Named diagnostics served through the command tunnel.
//!
//! Each command writes into a `String`. When one fails partway, the text
//! written so far travels back inside [`DebuggerError::CommandFailed`].

pub mod findsym;
pub mod pmap;
pub mod pstack;

use remote_debug_core::ops::diagnostics::{FINDSYM, PMAP, PSTACK};
use remote_debug_core::DebuggerError;
use serde_json::{Map, Value};

use crate::local::LocalDebugger;

pub fn execute<D: LocalDebugger>(
    debugger: &D,
    command: &str,
    options: &Map<String, Value>,
) -> Result<String, DebuggerError> {
    let mut out = String::new();
    let outcome = match command {
        FINDSYM => findsym::run(debugger, options, &mut out),
        PMAP => pmap::run(debugger, &mut out),
        PSTACK => pstack::run(debugger, options, &mut out),
        other => {
            tracing::warn!("Rejecting unsupported command '{}'", other);
            return Err(DebuggerError::UnsupportedCommand(other.to_string()));
        }
    };

    match outcome {
        Ok(()) => Ok(out),
        Err(e) => {
            tracing::warn!("Command '{}' failed: {}", command, e);
            Err(DebuggerError::CommandFailed {
                command: command.to_string(),
                message: e.to_string(),
                output: out,
            })
        }
    }
}

fn flag(options: &Map<String, Value>, key: &str) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Hex digits for a full-width address on this target.
fn address_width<D: LocalDebugger>(debugger: &D) -> usize {
    (debugger.machine_description().address_size * 2) as usize
}
