use crate::address::Address;
use crate::arch::Cpu;

/// A target thread, named either by its identifying address in the target
/// heap or by an opaque numeric id.
///
/// Only the target knows whether two handles denote the same OS thread, so
/// handles have no `PartialEq`; compare them with the client's
/// `threads_equal`.
#[derive(Debug, Clone)]
pub struct ThreadHandle {
    cpu: Cpu,
    raw: i64,
    is_address: bool,
}

impl ThreadHandle {
    pub fn from_address(cpu: Cpu, address: Address) -> Self {
        Self {
            cpu,
            raw: address.as_raw_value(),
            is_address: true,
        }
    }

    pub fn from_id(cpu: Cpu, id: i64) -> Self {
        Self {
            cpu,
            raw: id,
            is_address: false,
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    pub fn is_address(&self) -> bool {
        self.is_address
    }
}

impl std::fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_address {
            write!(f, "thread@{:#x}", self.raw as u64)
        } else {
            write!(f, "thread#{}", self.raw)
        }
    }
}
