//! Debugger-host side of the bridge.
//!
//! [`RemoteDebuggerClient`] owns the per-session page cache and the
//! architecture decoder. Every memory read and thread lookup goes through
//! it, so it is the only place that knows the target's word size,
//! endianness and narrow-reference encodings.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::address::Address;
use crate::arch::{ArchRegistry, Cpu, ThreadContext, ThreadDecoder};
use crate::cache::{CacheStats, PageCache};
use crate::contract::RemoteDebugger;
use crate::error::DebuggerError;
use crate::transport::RpcClient;
use crate::types::{NarrowEncoding, PrimitiveSizes, PrimitiveType, SessionInfo, ThreadHandle};
use crate::{ClientConfig, Result};

/// Upper bound on a C string read, including the terminator search.
const MAX_C_STRING_LEN: u64 = 64 * 1024;

pub struct RemoteDebuggerClient<R: RemoteDebugger> {
    remote: R,
    session: SessionInfo,
    cpu: Cpu,
    decoder: Arc<dyn ThreadDecoder>,
    cache: PageCache,
}

impl RemoteDebuggerClient<RpcClient> {
    /// Opens a TCP session to the server at `config.endpoint`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let rpc = RpcClient::connect(config.clone())?;
        Self::new(rpc, config)
    }
}

impl<R: RemoteDebugger> RemoteDebuggerClient<R> {
    pub fn new(remote: R, config: &ClientConfig) -> Result<Self> {
        Self::with_registry(remote, config, &ArchRegistry::new())
    }

    /// Like [`RemoteDebuggerClient::new`], resolving the CPU through
    /// `registry` so out-of-tree architectures can be served.
    pub fn with_registry(remote: R, config: &ClientConfig, registry: &ArchRegistry) -> Result<Self> {
        let session = fetch_session(&remote)?;
        let decoder = registry.resolve(&session.cpu)?;
        if decoder.page_size() == 0 {
            return Err(DebuggerError::UnsupportedArchitecture(format!(
                "{} (zero page size)",
                session.cpu
            )));
        }
        let cpu = decoder.cpu();
        let cache = PageCache::new(decoder.page_size(), config.cache_bytes);

        tracing::info!(
            "Opened debugger session: os={} cpu={} address_size={} tunnel={}",
            session.os,
            cpu,
            session.address_size(),
            session.supports_command_tunnel
        );

        Ok(Self {
            remote,
            session,
            cpu,
            decoder,
            cache,
        })
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn decoder(&self) -> &dyn ThreadDecoder {
        self.decoder.as_ref()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    // --- memory ---

    pub fn read_bytes(&self, address: u64, count: u64) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.cache.read(address, count, |base, len| {
            self.remote.read_bytes_from_process(base, len)
        })
    }

    /// Reads a `width`-byte integer in target byte order. Alignment is
    /// checked before anything is fetched.
    pub fn read_c_integer(&self, address: u64, width: u64, unsigned: bool) -> Result<i64> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(DebuggerError::target(format!(
                "unsupported integer width {width}"
            )));
        }
        self.check_alignment(address, width)?;

        let bytes = self.read_bytes(address, width)?;
        let raw = if self.session.machine.big_endian {
            bytes.iter().fold(0_u64, |acc, b| (acc << 8) | u64::from(*b))
        } else {
            bytes.iter().rev().fold(0_u64, |acc, b| (acc << 8) | u64::from(*b))
        };

        if unsigned || width == 8 {
            return Ok(raw as i64);
        }
        let shift = 64 - width * 8;
        Ok(((raw << shift) as i64) >> shift)
    }

    fn check_alignment(&self, address: u64, width: u64) -> Result<()> {
        let alignment = if width == 8 && self.decoder.relaxed_alignment() {
            4
        } else {
            width
        };
        if address % alignment != 0 {
            return Err(DebuggerError::UnalignedAddress { address, alignment });
        }
        Ok(())
    }

    pub fn read_address(&self, address: u64) -> Result<Option<Address>> {
        let value = self.read_c_integer(address, self.session.address_size(), true)?;
        Ok(Address::new(value as u64))
    }

    pub fn read_compressed_oop(&self, address: u64) -> Result<Option<Address>> {
        self.read_narrow(address, self.session.heap_oop_size, self.session.narrow_oop)
    }

    pub fn read_compressed_klass(&self, address: u64) -> Result<Option<Address>> {
        self.read_narrow(address, self.session.klass_ptr_size, self.session.narrow_klass)
    }

    fn read_narrow(&self, address: u64, width: u64, encoding: NarrowEncoding) -> Result<Option<Address>> {
        let narrow = self.read_c_integer(address, width, true)? as u64;
        Ok(Address::new(encoding.decode(narrow)))
    }

    fn read_primitive(&self, address: u64, ty: PrimitiveType, unsigned: bool) -> Result<i64> {
        self.read_c_integer(address, self.session.sizes.size_of(ty), unsigned)
    }

    pub fn read_jboolean(&self, address: u64) -> Result<bool> {
        Ok(self.read_primitive(address, PrimitiveType::JBoolean, true)? != 0)
    }

    pub fn read_jbyte(&self, address: u64) -> Result<i8> {
        Ok(self.read_primitive(address, PrimitiveType::JByte, false)? as i8)
    }

    pub fn read_jchar(&self, address: u64) -> Result<u16> {
        Ok(self.read_primitive(address, PrimitiveType::JChar, true)? as u16)
    }

    pub fn read_jshort(&self, address: u64) -> Result<i16> {
        Ok(self.read_primitive(address, PrimitiveType::JShort, false)? as i16)
    }

    pub fn read_jint(&self, address: u64) -> Result<i32> {
        Ok(self.read_primitive(address, PrimitiveType::JInt, false)? as i32)
    }

    pub fn read_jlong(&self, address: u64) -> Result<i64> {
        self.read_primitive(address, PrimitiveType::JLong, false)
    }

    pub fn read_jfloat(&self, address: u64) -> Result<f32> {
        let bits = self.read_primitive(address, PrimitiveType::JFloat, true)?;
        Ok(f32::from_bits(bits as u32))
    }

    pub fn read_jdouble(&self, address: u64) -> Result<f64> {
        let bits = self.read_primitive(address, PrimitiveType::JDouble, true)?;
        Ok(f64::from_bits(bits as u64))
    }

    /// Reads a NUL-terminated string, one page-bounded chunk at a time.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read_c_string(&self, address: u64) -> Result<String> {
        let page_size = self.cache.page_size();
        let mut bytes = Vec::new();
        let mut cursor = address;

        while (bytes.len() as u64) < MAX_C_STRING_LEN {
            let chunk = page_size - cursor % page_size;
            let chunk = chunk.min(MAX_C_STRING_LEN - bytes.len() as u64);
            let (data, unmapped) = match self.read_bytes(cursor, chunk) {
                Ok(data) => (data, None),
                // The terminator may sit before the unreadable tail.
                Err(DebuggerError::UnmappedAddress { address: bad })
                    if bad > cursor && bad - cursor < chunk =>
                {
                    (self.read_bytes(cursor, bad - cursor)?, Some(bad))
                }
                Err(e) => return Err(e),
            };
            if let Some(nul) = data.iter().position(|b| *b == 0) {
                bytes.extend_from_slice(&data[..nul]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            if let Some(address) = unmapped {
                return Err(DebuggerError::UnmappedAddress { address });
            }
            bytes.extend_from_slice(&data);
            cursor = cursor.wrapping_add(chunk);
        }

        Err(DebuggerError::target(format!(
            "no string terminator within {MAX_C_STRING_LEN} bytes of {address:#x}"
        )))
    }

    /// Memory writes are not supported over this bridge.
    pub fn write_bytes(&self, _address: u64, _data: &[u8]) -> Result<()> {
        Err(DebuggerError::NotYetImplemented("write_bytes"))
    }

    // --- symbols and addresses ---

    /// `None` when the target has no such symbol.
    pub fn lookup_symbol(&self, object_name: Option<&str>, symbol: &str) -> Result<Option<Address>> {
        let value = self.remote.lookup_in_process(object_name, symbol)?;
        Ok(Address::new(value))
    }

    /// Parses hex with or without a `0x` prefix. Zero parses to `None`.
    pub fn parse_address(&self, text: &str) -> Result<Option<Address>> {
        parse_hex_address(text)
    }

    /// Renders zero-padded to the target's pointer width.
    pub fn address_to_string(&self, address: Option<&Address>) -> String {
        match address {
            Some(address) => format!(
                "0x{:0width$x}",
                address.as_u64(),
                width = (self.session.address_size() * 2) as usize
            ),
            None => "null".to_string(),
        }
    }

    // --- threads ---

    pub fn thread_for_address(&self, address: Address) -> ThreadHandle {
        ThreadHandle::from_address(self.cpu.clone(), address)
    }

    pub fn thread_for_id(&self, id: i64) -> ThreadHandle {
        ThreadHandle::from_id(self.cpu.clone(), id)
    }

    /// Raw integer registers in the architecture's order. Never cached.
    pub fn get_thread_registers(&self, thread: &ThreadHandle) -> Result<Vec<i64>> {
        self.remote
            .thread_integer_register_set(thread.raw(), thread.is_address())
    }

    pub fn thread_context(&self, thread: &ThreadHandle) -> Result<ThreadContext> {
        let values = self.get_thread_registers(thread)?;
        self.decoder.decode(values)
    }

    pub fn threads_equal(&self, first: &ThreadHandle, second: &ThreadHandle) -> Result<bool> {
        self.remote.threads_equal(
            first.raw(),
            first.is_address(),
            second.raw(),
            second.is_address(),
        )
    }

    pub fn thread_hash_code(&self, thread: &ThreadHandle) -> Result<i32> {
        self.remote.thread_hash_code(thread.raw(), thread.is_address())
    }

    // --- console and diagnostics ---

    pub fn has_console(&self) -> Result<bool> {
        self.remote.has_console()
    }

    pub fn console_prompt(&self) -> Result<String> {
        self.remote.console_prompt()
    }

    pub fn console_execute(&self, command: &str) -> Result<String> {
        self.remote.console_execute_command(command)
    }

    /// Runs a named diagnostic on the server. Fails locally when the
    /// session was opened against a server without the command tunnel.
    pub fn run_diagnostic_command(&self, name: &str, options: &Map<String, Value>) -> Result<String> {
        if !self.session.supports_command_tunnel {
            return Err(DebuggerError::UnsupportedCommand(name.to_string()));
        }
        tracing::debug!("Running diagnostic command '{}'", name);
        self.remote.exec_command_on_server(name, options)
    }

    // --- lifecycle ---

    pub fn attach(&mut self, _target: &str) -> Result<()> {
        Err(DebuggerError::NotYetImplemented("attach"))
    }

    pub fn detach(&mut self) -> Result<()> {
        Err(DebuggerError::NotYetImplemented("detach"))
    }

    pub fn flush_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Shared by the client and the server's thread-handle resolution.
pub fn parse_hex_address(text: &str) -> Result<Option<Address>> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let value = u64::from_str_radix(digits, 16)
        .map_err(|_| DebuggerError::target(format!("Invalid address: {text}")))?;
    Ok(Address::new(value))
}

fn fetch_session<R: RemoteDebugger>(remote: &R) -> Result<SessionInfo> {
    let os = remote.os()?;
    let cpu = remote.cpu()?;
    let machine = remote.machine_description()?;

    let mut sizes = PrimitiveSizes::default();
    for ty in PrimitiveType::ALL {
        sizes.set(ty, remote.type_size(ty)?);
    }

    let narrow_oop = NarrowEncoding::new(
        remote.narrow_oop_base()?,
        shift_from_wire(remote.narrow_oop_shift()?)?,
    );
    let narrow_klass = NarrowEncoding::new(
        remote.narrow_klass_base()?,
        shift_from_wire(remote.narrow_klass_shift()?)?,
    );

    Ok(SessionInfo {
        os,
        cpu,
        machine,
        sizes,
        heap_oop_size: remote.heap_oop_size()?,
        klass_ptr_size: remote.klass_ptr_size()?,
        narrow_oop,
        narrow_klass,
        supports_command_tunnel: remote.supports_command_tunnel()?,
    })
}

fn shift_from_wire(shift: i32) -> Result<u32> {
    u32::try_from(shift)
        .ok()
        .filter(|s| *s < 64)
        .ok_or_else(|| DebuggerError::target(format!("invalid narrow reference shift {shift}")))
}

impl<R: RemoteDebugger> std::fmt::Debug for RemoteDebuggerClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDebuggerClient")
            .field("session", &self.session)
            .field("cache", &self.cache.stats())
            .finish()
    }
}
