pub mod diagnostics;

pub use diagnostics::{find_symbol, pmap, pstack};
