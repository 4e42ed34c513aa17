use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const GET_OS: &str = "getOS";
pub const GET_CPU: &str = "getCPU";
pub const GET_MACHINE_DESCRIPTION: &str = "getMachineDescription";
pub const LOOKUP_IN_PROCESS: &str = "lookupInProcess";
pub const READ_BYTES_FROM_PROCESS: &str = "readBytesFromProcess";
pub const HAS_CONSOLE: &str = "hasConsole";
pub const GET_CONSOLE_PROMPT: &str = "getConsolePrompt";
pub const CONSOLE_EXECUTE_COMMAND: &str = "consoleExecuteCommand";
pub const GET_HEAP_OOP_SIZE: &str = "getHeapOopSize";
pub const GET_KLASS_PTR_SIZE: &str = "getKlassPtrSize";
pub const GET_NARROW_OOP_BASE: &str = "getNarrowOopBase";
pub const GET_NARROW_OOP_SHIFT: &str = "getNarrowOopShift";
pub const GET_NARROW_KLASS_BASE: &str = "getNarrowKlassBase";
pub const GET_NARROW_KLASS_SHIFT: &str = "getNarrowKlassShift";
pub const ARE_THREADS_EQUAL: &str = "areThreadsEqual";
pub const GET_THREAD_HASH_CODE: &str = "getThreadHashCode";
pub const GET_THREAD_INTEGER_REGISTER_SET: &str = "getThreadIntegerRegisterSet";
pub const SUPPORTS_COMMAND_TUNNEL: &str = "supportsCommandTunnel";
pub const EXEC_COMMAND_ON_SERVER: &str = "execCommandOnServer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParams {
    #[serde(default)]
    pub object_name: Option<String>,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadBytesParams {
    pub address: u64,
    pub num_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleParams {
    pub command: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadParams {
    pub id_or_addr: i64,
    pub is_address: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThreadPairParams {
    pub first: ThreadParams,
    pub second: ThreadParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCommandParams {
    pub command: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Wire form of a read outcome: exactly one of the two fields is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_address: Option<u64>,
}
