use std::fmt::Write;

use remote_debug_core::ops::diagnostics::{OPT_CONCURRENT_LOCKS, OPT_VERBOSE};
use serde_json::{Map, Value};

use crate::local::{LocalDebugger, LocalThread};
use crate::ServerError;

/// Prints every thread's frames, innermost first. `concurrentLocks` adds the
/// locks each thread holds; `verbose` adds the thread name.
pub fn run<D: LocalDebugger>(
    debugger: &D,
    options: &Map<String, Value>,
    out: &mut String,
) -> Result<(), ServerError> {
    let concurrent_locks = super::flag(options, OPT_CONCURRENT_LOCKS);
    let verbose = super::flag(options, OPT_VERBOSE);
    let width = super::address_width(debugger);

    for thread in debugger.threads() {
        writeln!(out, "----------------- {} -----------------", thread.id())?;
        if verbose {
            writeln!(out, "\"{}\"", thread.name())?;
        }

        for frame in thread.frames()? {
            match debugger.closest_symbol(frame.pc) {
                Some(symbol) => writeln!(
                    out,
                    "0x{:0width$x}\t{}+{:#x}",
                    frame.pc, symbol.name, symbol.offset
                )?,
                None => writeln!(out, "0x{:0width$x}\t????????", frame.pc)?,
            }
        }

        if concurrent_locks {
            writeln!(out, "Locked ownable synchronizers:")?;
            let locks = thread.held_locks();
            if locks.is_empty() {
                writeln!(out, "    - None")?;
            }
            for lock in locks {
                writeln!(out, "    - {lock}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
