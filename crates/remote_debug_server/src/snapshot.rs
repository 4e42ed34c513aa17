//! A [`LocalDebugger`] over a JSON core image.
//!
//! The image records session facts, memory regions (base64), symbols and
//! threads. Regions must not overlap; unmapped gaps read as failures.

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use remote_debug_core::{
    Address, MachineDescription, NarrowEncoding, PrimitiveSizes, PrimitiveType, ReadResult,
};
use serde::{Deserialize, Serialize};

use crate::local::{ClosestSymbol, DebuggerConsole, Frame, LoadObject, LocalDebugger, LocalThread};
use crate::ServerError;

pub const CONSOLE_PROMPT: &str = "snapshot> ";

const ANONYMOUS_REGION: &str = "[anon]";

fn default_reference_size() -> u64 {
    4
}

/// On-disk form of a core snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub os: String,
    pub cpu: String,
    #[serde(default)]
    pub machine: MachineDescription,
    #[serde(default)]
    pub sizes: PrimitiveSizes,
    #[serde(default = "default_reference_size")]
    pub heap_oop_size: u64,
    #[serde(default = "default_reference_size")]
    pub klass_ptr_size: u64,
    #[serde(default)]
    pub narrow_oop: NarrowEncoding,
    #[serde(default)]
    pub narrow_klass: NarrowEncoding,
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
    #[serde(default)]
    pub symbols: Vec<SymbolRecord>,
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub base: u64,
    /// Region contents, base64.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub address: u64,
    /// Load object defining the symbol, if known.
    #[serde(default)]
    pub object: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: i64,
    /// Identifying address of the thread object in the target heap.
    #[serde(default)]
    pub address: Option<u64>,
    #[serde(default)]
    pub name: String,
    pub registers: Vec<i64>,
    #[serde(default)]
    pub frames: Vec<u64>,
    #[serde(default)]
    pub locks: Vec<String>,
}

struct Region {
    name: String,
    base: u64,
    data: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }
}

/// Thread handle into a loaded snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotThread(Arc<ThreadRecord>);

impl LocalThread for SnapshotThread {
    fn id(&self) -> i64 {
        self.0.id
    }

    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn integer_register_set(&self) -> Result<Vec<i64>, ServerError> {
        Ok(self.0.registers.clone())
    }

    fn hash_code(&self) -> i32 {
        (self.0.id ^ (self.0.id >> 32)) as i32
    }

    fn same_as(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }

    fn frames(&self) -> Result<Vec<Frame>, ServerError> {
        Ok(self.0.frames.iter().map(|pc| Frame { pc: *pc }).collect())
    }

    fn held_locks(&self) -> Vec<String> {
        self.0.locks.clone()
    }
}

pub struct SnapshotDebugger {
    os: String,
    cpu: String,
    machine: MachineDescription,
    sizes: PrimitiveSizes,
    heap_oop_size: u64,
    klass_ptr_size: u64,
    narrow_oop: NarrowEncoding,
    narrow_klass: NarrowEncoding,
    // sorted by base, non-overlapping
    regions: Vec<Region>,
    // sorted by address
    symbols: Vec<SymbolRecord>,
    threads: Vec<Arc<ThreadRecord>>,
}

impl SnapshotDebugger {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        tracing::info!("Loading core snapshot from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ServerError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        Self::from_snapshot(snapshot)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, ServerError> {
        let mut regions = snapshot
            .regions
            .into_iter()
            .map(|record| {
                let data = BASE64_STANDARD.decode(&record.data).map_err(|e| {
                    ServerError::InvalidSnapshot(format!(
                        "region at {:#x} has invalid base64: {e}",
                        record.base
                    ))
                })?;
                if record.base.checked_add(data.len() as u64).is_none() {
                    return Err(ServerError::InvalidSnapshot(format!(
                        "region at {:#x} wraps the address space",
                        record.base
                    )));
                }
                Ok(Region {
                    name: record.name.unwrap_or_else(|| ANONYMOUS_REGION.to_string()),
                    base: record.base,
                    data,
                })
            })
            .collect::<Result<Vec<_>, ServerError>>()?;
        regions.sort_by_key(|r| r.base);
        if let Some(pair) = regions.windows(2).find(|w| w[0].end() > w[1].base) {
            return Err(ServerError::InvalidSnapshot(format!(
                "regions at {:#x} and {:#x} overlap",
                pair[0].base, pair[1].base
            )));
        }

        let mut symbols = snapshot.symbols;
        symbols.sort_by_key(|s| s.address);

        let mut ids: Vec<i64> = snapshot.threads.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ServerError::InvalidSnapshot(format!(
                "duplicate thread id {}",
                pair[0]
            )));
        }

        tracing::debug!(
            "Snapshot: cpu={} regions={} symbols={} threads={}",
            snapshot.cpu,
            regions.len(),
            symbols.len(),
            ids.len()
        );

        Ok(Self {
            os: snapshot.os,
            cpu: snapshot.cpu,
            machine: snapshot.machine,
            sizes: snapshot.sizes,
            heap_oop_size: snapshot.heap_oop_size,
            klass_ptr_size: snapshot.klass_ptr_size,
            narrow_oop: snapshot.narrow_oop,
            narrow_klass: snapshot.narrow_klass,
            regions,
            symbols,
            threads: snapshot.threads.into_iter().map(Arc::new).collect(),
        })
    }

    fn region_containing(&self, address: u64) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.base <= address);
        let region = self.regions.get(idx.checked_sub(1)?)?;
        (address < region.end()).then_some(region)
    }

    fn find_thread(&self, pred: impl Fn(&ThreadRecord) -> bool) -> Option<SnapshotThread> {
        self.threads
            .iter()
            .find(|t| pred(t))
            .cloned()
            .map(SnapshotThread)
    }
}

impl LocalDebugger for SnapshotDebugger {
    type Thread = SnapshotThread;

    fn os(&self) -> String {
        self.os.clone()
    }

    fn cpu(&self) -> String {
        self.cpu.clone()
    }

    fn machine_description(&self) -> MachineDescription {
        self.machine
    }

    fn type_size(&self, ty: PrimitiveType) -> u64 {
        self.sizes.size_of(ty)
    }

    fn heap_oop_size(&self) -> u64 {
        self.heap_oop_size
    }

    fn klass_ptr_size(&self) -> u64 {
        self.klass_ptr_size
    }

    fn narrow_oop(&self) -> NarrowEncoding {
        self.narrow_oop
    }

    fn narrow_klass(&self) -> NarrowEncoding {
        self.narrow_klass
    }

    fn read_bytes(&self, address: u64, count: u64) -> ReadResult {
        // `count` comes off the wire; the buffer only grows by mapped bytes.
        let mut out = Vec::new();
        let mut cursor = address;

        while (out.len() as u64) < count {
            let Some(region) = self.region_containing(cursor) else {
                return ReadResult::failure(cursor);
            };
            let offset = (cursor - region.base) as usize;
            let wanted = (count - out.len() as u64) as usize;
            let take = wanted.min(region.data.len() - offset);
            out.extend_from_slice(&region.data[offset..offset + take]);
            cursor = match cursor.checked_add(take as u64) {
                Some(next) => next,
                None => return ReadResult::failure(u64::MAX),
            };
        }

        ReadResult::Data(out)
    }

    fn lookup(&self, object_name: Option<&str>, symbol: &str) -> Option<u64> {
        self.symbols
            .iter()
            .find(|s| {
                s.name == symbol
                    && object_name.map_or(true, |object| s.object.as_deref() == Some(object))
            })
            .map(|s| s.address)
    }

    fn closest_symbol(&self, address: u64) -> Option<ClosestSymbol> {
        let idx = self.symbols.partition_point(|s| s.address <= address);
        let symbol = self.symbols.get(idx.checked_sub(1)?)?;
        Some(ClosestSymbol {
            name: symbol.name.clone(),
            offset: address - symbol.address,
        })
    }

    fn thread_for_identifier_address(&self, address: Address) -> Result<SnapshotThread, ServerError> {
        self.find_thread(|t| t.address == Some(address.as_u64()))
            .ok_or_else(|| ServerError::ThreadNotFound(format!("address {address}")))
    }

    fn thread_for_id(&self, id: i64) -> Result<SnapshotThread, ServerError> {
        self.find_thread(|t| t.id == id)
            .ok_or_else(|| ServerError::ThreadNotFound(format!("id {id}")))
    }

    fn threads(&self) -> Vec<SnapshotThread> {
        self.threads.iter().cloned().map(SnapshotThread).collect()
    }

    fn load_objects(&self) -> Vec<LoadObject> {
        self.regions
            .iter()
            .map(|r| LoadObject {
                name: r.name.clone(),
                base: r.base,
                size: r.data.len() as u64,
            })
            .collect()
    }

    fn console(&self) -> Option<&dyn DebuggerConsole> {
        Some(self)
    }
}

impl DebuggerConsole for SnapshotDebugger {
    fn prompt(&self) -> String {
        CONSOLE_PROMPT.to_string()
    }

    fn execute(&self, command: &str) -> Result<String, ServerError> {
        let mut out = String::new();
        match command.trim() {
            "" => {}
            "help" => {
                writeln!(out, "help     list commands")?;
                writeln!(out, "threads  list threads")?;
                writeln!(out, "symbols  list symbols")?;
                writeln!(out, "regions  list memory regions")?;
            }
            "threads" => {
                for t in &self.threads {
                    match t.address {
                        Some(address) => writeln!(out, "{}\t{:#x}\t{}", t.id, address, t.name)?,
                        None => writeln!(out, "{}\t-\t{}", t.id, t.name)?,
                    }
                }
            }
            "symbols" => {
                for s in &self.symbols {
                    writeln!(out, "{:#x}\t{}", s.address, s.name)?;
                }
            }
            "regions" => {
                for r in &self.regions {
                    writeln!(out, "{:#x}-{:#x}\t{}", r.base, r.end(), r.name)?;
                }
            }
            other => return Err(ServerError::UnknownConsoleCommand(other.to_string())),
        }
        Ok(out)
    }
}
