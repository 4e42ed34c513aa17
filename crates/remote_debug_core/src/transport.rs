//! Blocking JSON-RPC transport to a remote debugger server.
//!
//! Calls block the caller: a private current-thread tokio runtime drives a
//! single TCP connection, and a mutex serializes round trips on it.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::timeout;

use crate::contract::RemoteDebugger;
use crate::error::{DebuggerError, TransportError};
use crate::types::{MachineDescription, PrimitiveType, ReadResult};
use crate::wire::framing::{read_frame, write_frame};
use crate::wire::methods::*;
use crate::wire::{JsonRpcRequest, JsonRpcResponse, ResultOrError};
use crate::{ClientConfig, Result};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    // set once a round trip is abandoned midway; the stream is out of sync
    broken: bool,
}

impl Connection {
    async fn round_trip(
        &mut self,
        request: &JsonRpcRequest,
    ) -> std::result::Result<JsonRpcResponse, TransportError> {
        write_frame(&mut self.writer, request).await?;
        read_frame(&mut self.reader)
            .await?
            .ok_or(TransportError::Closed)
    }
}

pub struct RpcClient {
    config: ClientConfig,
    runtime: Runtime,
    connection: Mutex<Connection>,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TransportError::Io)?;

        tracing::debug!("Connecting to remote debugger at {}", config.endpoint);
        let stream = runtime
            .block_on(async { timeout(config.timeout, TcpStream::connect(&config.endpoint)).await })
            .map_err(|_| TransportError::Timeout(config.timeout))?
            .map_err(TransportError::Io)?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;

        let (read_half, write_half) = stream.into_split();
        tracing::info!("Connected to remote debugger at {}", config.endpoint);

        Ok(Self {
            config,
            runtime,
            connection: Mutex::new(Connection {
                reader: BufReader::new(read_half),
                writer: write_half,
                broken: false,
            }),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn send_rpc(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        tracing::debug!("Sending JSON-RPC request: method={}, id={}", method, id);

        let mut connection = self.connection.lock();
        if connection.broken {
            return Err(TransportError::Closed.into());
        }

        let outcome = self.runtime.block_on(async {
            timeout(self.config.timeout, connection.round_trip(&request)).await
        });
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                connection.broken = true;
                return Err(e.into());
            }
            Err(_) => {
                connection.broken = true;
                return Err(TransportError::Timeout(self.config.timeout).into());
            }
        };
        if response.id != id {
            // The stream is out of step with our requests from here on.
            connection.broken = true;
            return Err(TransportError::InvalidResponse(format!(
                "Response ID mismatch: expected {}, got {}",
                id, response.id
            ))
            .into());
        }
        drop(connection);

        match response.result_or_error {
            ResultOrError::Result { result } => {
                tracing::debug!("JSON-RPC request successful: method={}, id={}", method, id);
                Ok(result)
            }
            ResultOrError::Error { error } => {
                tracing::warn!(
                    "JSON-RPC error: code={}, message={}",
                    error.code,
                    error.message
                );
                Err(DebuggerError::from_rpc(error))
            }
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let result = self.send_rpc(method, params)?;
        serde_json::from_value(result).map_err(|e| TransportError::Codec(e).into())
    }

    fn call_with<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: &P) -> Result<T> {
        let params = serde_json::to_value(params).map_err(TransportError::Codec)?;
        self.call(method, Some(params))
    }
}

impl RemoteDebugger for RpcClient {
    fn os(&self) -> Result<String> {
        self.call(GET_OS, None)
    }

    fn cpu(&self) -> Result<String> {
        self.call(GET_CPU, None)
    }

    fn machine_description(&self) -> Result<MachineDescription> {
        self.call(GET_MACHINE_DESCRIPTION, None)
    }

    fn lookup_in_process(&self, object_name: Option<&str>, symbol: &str) -> Result<u64> {
        self.call_with(
            LOOKUP_IN_PROCESS,
            &LookupParams {
                object_name: object_name.map(str::to_string),
                symbol: symbol.to_string(),
            },
        )
    }

    fn read_bytes_from_process(&self, address: u64, num_bytes: u64) -> Result<ReadResult> {
        let payload: ReadResultPayload = self.call_with(
            READ_BYTES_FROM_PROCESS,
            &ReadBytesParams { address, num_bytes },
        )?;
        Ok(ReadResult::from_payload(payload)?)
    }

    fn has_console(&self) -> Result<bool> {
        self.call(HAS_CONSOLE, None)
    }

    fn console_prompt(&self) -> Result<String> {
        self.call(GET_CONSOLE_PROMPT, None)
    }

    fn console_execute_command(&self, command: &str) -> Result<String> {
        self.call_with(
            CONSOLE_EXECUTE_COMMAND,
            &ConsoleParams {
                command: command.to_string(),
            },
        )
    }

    fn type_size(&self, ty: PrimitiveType) -> Result<u64> {
        self.call(ty.size_method(), None)
    }

    fn heap_oop_size(&self) -> Result<u64> {
        self.call(GET_HEAP_OOP_SIZE, None)
    }

    fn klass_ptr_size(&self) -> Result<u64> {
        self.call(GET_KLASS_PTR_SIZE, None)
    }

    fn narrow_oop_base(&self) -> Result<u64> {
        self.call(GET_NARROW_OOP_BASE, None)
    }

    fn narrow_oop_shift(&self) -> Result<i32> {
        self.call(GET_NARROW_OOP_SHIFT, None)
    }

    fn narrow_klass_base(&self) -> Result<u64> {
        self.call(GET_NARROW_KLASS_BASE, None)
    }

    fn narrow_klass_shift(&self) -> Result<i32> {
        self.call(GET_NARROW_KLASS_SHIFT, None)
    }

    fn threads_equal(
        &self,
        first: i64,
        first_is_address: bool,
        second: i64,
        second_is_address: bool,
    ) -> Result<bool> {
        self.call_with(
            ARE_THREADS_EQUAL,
            &ThreadPairParams {
                first: ThreadParams {
                    id_or_addr: first,
                    is_address: first_is_address,
                },
                second: ThreadParams {
                    id_or_addr: second,
                    is_address: second_is_address,
                },
            },
        )
    }

    fn thread_hash_code(&self, id_or_addr: i64, is_address: bool) -> Result<i32> {
        self.call_with(
            GET_THREAD_HASH_CODE,
            &ThreadParams {
                id_or_addr,
                is_address,
            },
        )
    }

    fn thread_integer_register_set(&self, id_or_addr: i64, is_address: bool) -> Result<Vec<i64>> {
        self.call_with(
            GET_THREAD_INTEGER_REGISTER_SET,
            &ThreadParams {
                id_or_addr,
                is_address,
            },
        )
    }

    fn supports_command_tunnel(&self) -> Result<bool> {
        match self.call(SUPPORTS_COMMAND_TUNNEL, None) {
            Ok(supported) => Ok(supported),
            // Servers that predate the capability query reject the method.
            Err(DebuggerError::Target { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exec_command_on_server(&self, command: &str, options: &Map<String, Value>) -> Result<String> {
        self.call_with(
            EXEC_COMMAND_ON_SERVER,
            &ExecCommandParams {
                command: command.to_string(),
                options: options.clone(),
            },
        )
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("config", &self.config)
            .field("request_id", &self.request_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader as TokioBufReader};
    use tokio::net::TcpListener;

    /// Serves `responses` in order on one accepted connection, echoing ids.
    fn spawn_scripted_server(responses: Vec<Value>) -> std::net::SocketAddr {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = TcpListener::from_std(std_listener).unwrap();
                let (stream, _) = listener.accept().await.unwrap();
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = TokioBufReader::new(read_half);
                for mut response in responses {
                    let request: Option<JsonRpcRequest> = read_frame(&mut reader).await.unwrap();
                    let Some(request) = request else { return };
                    if response.get("id").is_none() {
                        response["id"] = json!(request.id);
                    }
                    write_frame(&mut write_half, &response).await.unwrap();
                }
                let _ = write_half.shutdown().await;
            });
        });

        addr
    }

    fn connect(addr: std::net::SocketAddr) -> RpcClient {
        RpcClient::connect(ClientConfig::new(addr.to_string(), Duration::from_secs(5))).unwrap()
    }

    #[test]
    fn test_typed_calls_decode_results() {
        let addr = spawn_scripted_server(vec![
            json!({"jsonrpc": "2.0", "result": "amd64"}),
            json!({"jsonrpc": "2.0", "result": {"addressSize": 8, "bigEndian": false}}),
            json!({"jsonrpc": "2.0", "result": {"failureAddress": 24}}),
        ]);
        let client = connect(addr);

        assert_eq!(client.cpu().unwrap(), "amd64");
        assert_eq!(
            client.machine_description().unwrap(),
            MachineDescription {
                address_size: 8,
                big_endian: false
            }
        );
        assert_eq!(
            client.read_bytes_from_process(0x10, 16).unwrap(),
            ReadResult::failure(0x18)
        );
    }

    #[test]
    fn test_error_responses_map_to_debugger_errors() {
        let addr = spawn_scripted_server(vec![json!({
            "jsonrpc": "2.0",
            "error": {"code": -32004, "message": "Unsupported command: jmap", "data": {"command": "jmap"}}
        })]);
        let client = connect(addr);

        let err = client
            .exec_command_on_server("jmap", &Map::new())
            .unwrap_err();
        assert!(matches!(err, DebuggerError::UnsupportedCommand(ref c) if c == "jmap"));
    }

    #[test]
    fn test_id_mismatch_is_invalid_response_and_poisons() {
        let addr = spawn_scripted_server(vec![
            json!({"jsonrpc": "2.0", "id": 999, "result": "linux"}),
            json!({"jsonrpc": "2.0", "result": "amd64"}),
        ]);
        let client = connect(addr);

        let err = client.os().unwrap_err();
        assert!(matches!(
            err,
            DebuggerError::Transport(TransportError::InvalidResponse(_))
        ));
        assert!(matches!(
            client.cpu().unwrap_err(),
            DebuggerError::Transport(TransportError::Closed)
        ));
    }

    #[test]
    fn test_closed_connection_poisons_the_client() {
        let addr = spawn_scripted_server(vec![]);
        let client = connect(addr);

        assert!(client.os().unwrap_err().is_transport());
        assert!(matches!(
            client.cpu().unwrap_err(),
            DebuggerError::Transport(TransportError::Closed)
        ));
    }

    #[test]
    fn test_connect_failure_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = RpcClient::connect(ClientConfig::new(addr.to_string(), Duration::from_secs(2)))
            .unwrap_err();
        assert!(err.is_transport());
    }
}
