pub mod machine;
pub mod read;
pub mod thread;

pub use machine::{MachineDescription, NarrowEncoding, PrimitiveSizes, PrimitiveType, SessionInfo};
pub use read::ReadResult;
pub use thread::ThreadHandle;
