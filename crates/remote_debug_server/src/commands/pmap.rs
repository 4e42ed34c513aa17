use std::fmt::Write;

use crate::local::LocalDebugger;
use crate::ServerError;

/// One line per load object: `base<TAB>sizeK<TAB>name`, lowest base first.
pub fn run<D: LocalDebugger>(debugger: &D, out: &mut String) -> Result<(), ServerError> {
    let width = super::address_width(debugger);
    let mut objects = debugger.load_objects();
    objects.sort_by_key(|o| o.base);

    for object in objects {
        writeln!(
            out,
            "0x{:0width$x}\t{}K\t{}",
            object.base,
            object.size.div_ceil(1024),
            object.name
        )?;
    }
    Ok(())
}
