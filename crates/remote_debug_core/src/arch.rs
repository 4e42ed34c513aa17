//! Per-architecture thread-register decoding.
//!
//! The built-in CPUs form a closed enum; anything else must be registered
//! explicitly on an [`ArchRegistry`] before a client session is opened.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DebuggerError;
use crate::Result;

pub const DEFAULT_PAGE_SIZE: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cpu {
    X86,
    Amd64,
    Aarch64,
    Riscv64,
    Ppc64,
    /// Registered out of tree, keyed by its lowercase tag.
    Other(String),
}

impl Cpu {
    /// Maps the tag a target reports. Unknown tags become `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i486" | "i586" | "i686" => Cpu::X86,
            "amd64" | "x86_64" => Cpu::Amd64,
            "aarch64" | "arm64" => Cpu::Aarch64,
            "riscv64" => Cpu::Riscv64,
            "ppc64" | "ppc64le" => Cpu::Ppc64,
            other => Cpu::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Cpu::X86 => "x86",
            Cpu::Amd64 => "amd64",
            Cpu::Aarch64 => "aarch64",
            Cpu::Riscv64 => "riscv64",
            Cpu::Ppc64 => "ppc64",
            Cpu::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Turns a raw integer register set into a [`ThreadContext`].
pub trait ThreadDecoder: Send + Sync {
    fn cpu(&self) -> Cpu;

    /// Register names, in the order the target sends them.
    fn register_names(&self) -> &[&'static str];

    fn pc_index(&self) -> usize;
    fn sp_index(&self) -> usize;
    fn fp_index(&self) -> Option<usize>;

    fn page_size(&self) -> u64 {
        DEFAULT_PAGE_SIZE
    }

    /// Whether 8-byte reads only need 4-byte alignment.
    fn relaxed_alignment(&self) -> bool {
        false
    }

    fn decode(&self, values: Vec<i64>) -> Result<ThreadContext> {
        let names = self.register_names();
        if values.len() != names.len() {
            return Err(DebuggerError::target(format!(
                "{} register set has {} entries, expected {}",
                self.cpu(),
                values.len(),
                names.len()
            )));
        }

        Ok(ThreadContext {
            cpu: self.cpu(),
            names: names.to_vec(),
            values,
            pc: self.pc_index(),
            sp: self.sp_index(),
            fp: self.fp_index(),
        })
    }
}

/// A decoded integer register set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    cpu: Cpu,
    names: Vec<&'static str>,
    values: Vec<i64>,
    pc: usize,
    sp: usize,
    fp: Option<usize>,
}

impl ThreadContext {
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn register(&self, index: usize) -> Option<i64> {
        self.values.get(index).copied()
    }

    pub fn register_by_name(&self, name: &str) -> Option<i64> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| self.register(i))
    }

    pub fn register_name(&self, index: usize) -> Option<&'static str> {
        self.names.get(index).copied()
    }

    pub fn pc(&self) -> i64 {
        self.values[self.pc]
    }

    pub fn sp(&self) -> i64 {
        self.values[self.sp]
    }

    pub fn fp(&self) -> Option<i64> {
        self.fp.map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.names.iter().copied().zip(self.values.iter().copied())
    }

    pub fn into_values(self) -> Vec<i64> {
        self.values
    }
}

const X86_REGISTERS: &[&str] = &[
    "gs", "fs", "es", "ds", "edi", "esi", "ebp", "esp", "ebx", "edx", "ecx", "eax", "trapno",
    "err", "eip", "cs", "efl", "uesp", "ss",
];

const AMD64_REGISTERS: &[&str] = &[
    "r15", "r14", "r13", "r12", "r11", "r10", "r9", "r8", "rdi", "rsi", "rbp", "rbx", "rdx",
    "rcx", "rax", "trapno", "err", "rip", "cs", "rfl", "rsp", "ss", "fs", "gs", "es", "ds",
    "fsbase", "gsbase",
];

const AARCH64_REGISTERS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26",
    "r27", "r28", "fp", "lr", "sp", "pc",
];

const RISCV64_REGISTERS: &[&str] = &[
    "pc", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "fp", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

const PPC64_REGISTERS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26",
    "r27", "r28", "r29", "r30", "r31", "nip", "msr", "orig_r3", "ctr", "lnk", "xer", "ccr",
    "softe", "trap", "dar", "dsisr", "result",
];

/// Decoder for one of the built-in CPUs.
#[derive(Debug, Clone)]
pub struct BuiltinDecoder {
    cpu: Cpu,
}

impl BuiltinDecoder {
    pub fn for_cpu(cpu: &Cpu) -> Option<Self> {
        match cpu {
            Cpu::Other(_) => None,
            cpu => Some(Self { cpu: cpu.clone() }),
        }
    }
}

impl ThreadDecoder for BuiltinDecoder {
    fn cpu(&self) -> Cpu {
        self.cpu.clone()
    }

    fn register_names(&self) -> &[&'static str] {
        match self.cpu {
            Cpu::X86 => X86_REGISTERS,
            Cpu::Amd64 => AMD64_REGISTERS,
            Cpu::Aarch64 => AARCH64_REGISTERS,
            Cpu::Riscv64 => RISCV64_REGISTERS,
            Cpu::Ppc64 => PPC64_REGISTERS,
            Cpu::Other(_) => &[],
        }
    }

    fn pc_index(&self) -> usize {
        match self.cpu {
            Cpu::X86 => 14,
            Cpu::Amd64 => 17,
            Cpu::Aarch64 => 32,
            Cpu::Riscv64 => 0,
            Cpu::Ppc64 => 32,
            Cpu::Other(_) => 0,
        }
    }

    fn sp_index(&self) -> usize {
        match self.cpu {
            Cpu::X86 => 17,
            Cpu::Amd64 => 20,
            Cpu::Aarch64 => 31,
            Cpu::Riscv64 => 2,
            Cpu::Ppc64 => 1,
            Cpu::Other(_) => 0,
        }
    }

    fn fp_index(&self) -> Option<usize> {
        match self.cpu {
            Cpu::X86 => Some(6),
            Cpu::Amd64 => Some(10),
            Cpu::Aarch64 => Some(29),
            Cpu::Riscv64 => Some(8),
            Cpu::Ppc64 => Some(1),
            Cpu::Other(_) => None,
        }
    }

    fn relaxed_alignment(&self) -> bool {
        // 64-bit globals can land on 32-bit boundaries on these targets.
        matches!(self.cpu, Cpu::X86 | Cpu::Amd64 | Cpu::Ppc64)
    }
}

/// Lookup table from CPU tag to decoder.
#[derive(Clone, Default)]
pub struct ArchRegistry {
    extra: HashMap<String, Arc<dyn ThreadDecoder>>,
}

impl ArchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decoder for an out-of-tree CPU. A later registration for the
    /// same tag replaces the earlier one; built-in CPUs cannot be overridden.
    pub fn register(&mut self, tag: &str, decoder: Arc<dyn ThreadDecoder>) -> &mut Self {
        let tag = tag.to_ascii_lowercase();
        tracing::debug!("Registering thread decoder for cpu={}", tag);
        self.extra.insert(tag, decoder);
        self
    }

    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn ThreadDecoder>> {
        let cpu = Cpu::from_tag(tag);
        if let Some(builtin) = BuiltinDecoder::for_cpu(&cpu) {
            return Ok(Arc::new(builtin));
        }

        self.extra
            .get(cpu.tag())
            .cloned()
            .ok_or_else(|| DebuggerError::UnsupportedArchitecture(tag.to_string()))
    }
}

impl fmt::Debug for ArchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchRegistry")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}
