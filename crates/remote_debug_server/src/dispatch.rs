//! Maps JSON-RPC requests onto a [`RemoteDebugger`].

use remote_debug_core::wire::methods::*;
use remote_debug_core::wire::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use remote_debug_core::{PrimitiveType, RemoteDebugger};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub fn dispatch<R: RemoteDebugger + ?Sized>(target: &R, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id;
    if request.jsonrpc != JSONRPC_VERSION {
        return JsonRpcResponse::error(
            id,
            JsonRpcError::new(
                codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
            ),
        );
    }

    tracing::debug!("Dispatching method={} id={}", request.method, id);
    match call(target, &request.method, request.params) {
        Ok(result) => JsonRpcResponse::result(id, result),
        Err(error) => {
            tracing::debug!("method={} id={} failed: {}", request.method, id, error.message);
            JsonRpcResponse::error(id, error)
        }
    }
}

fn call<R: RemoteDebugger + ?Sized>(
    target: &R,
    method: &str,
    params: Option<Value>,
) -> Result<Value, JsonRpcError> {
    match method {
        GET_OS => reply(target.os()),
        GET_CPU => reply(target.cpu()),
        GET_MACHINE_DESCRIPTION => reply(target.machine_description()),
        LOOKUP_IN_PROCESS => {
            let p: LookupParams = parse(params)?;
            reply(target.lookup_in_process(p.object_name.as_deref(), &p.symbol))
        }
        READ_BYTES_FROM_PROCESS => {
            let p: ReadBytesParams = parse(params)?;
            reply(
                target
                    .read_bytes_from_process(p.address, p.num_bytes)
                    .map(|r| r.to_payload()),
            )
        }
        HAS_CONSOLE => reply(target.has_console()),
        GET_CONSOLE_PROMPT => reply(target.console_prompt()),
        CONSOLE_EXECUTE_COMMAND => {
            let p: ConsoleParams = parse(params)?;
            reply(target.console_execute_command(&p.command))
        }
        GET_HEAP_OOP_SIZE => reply(target.heap_oop_size()),
        GET_KLASS_PTR_SIZE => reply(target.klass_ptr_size()),
        GET_NARROW_OOP_BASE => reply(target.narrow_oop_base()),
        GET_NARROW_OOP_SHIFT => reply(target.narrow_oop_shift()),
        GET_NARROW_KLASS_BASE => reply(target.narrow_klass_base()),
        GET_NARROW_KLASS_SHIFT => reply(target.narrow_klass_shift()),
        ARE_THREADS_EQUAL => {
            let p: ThreadPairParams = parse(params)?;
            reply(target.threads_equal(
                p.first.id_or_addr,
                p.first.is_address,
                p.second.id_or_addr,
                p.second.is_address,
            ))
        }
        GET_THREAD_HASH_CODE => {
            let p: ThreadParams = parse(params)?;
            reply(target.thread_hash_code(p.id_or_addr, p.is_address))
        }
        GET_THREAD_INTEGER_REGISTER_SET => {
            let p: ThreadParams = parse(params)?;
            reply(target.thread_integer_register_set(p.id_or_addr, p.is_address))
        }
        SUPPORTS_COMMAND_TUNNEL => reply(target.supports_command_tunnel()),
        EXEC_COMMAND_ON_SERVER => {
            let p: ExecCommandParams = parse(params)?;
            reply(target.exec_command_on_server(&p.command, &p.options))
        }
        other => match PrimitiveType::from_size_method(other) {
            Some(ty) => reply(target.type_size(ty)),
            None => Err(JsonRpcError::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        },
    }
}

fn parse<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::new(codes::INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn reply<T: Serialize>(outcome: remote_debug_core::Result<T>) -> Result<Value, JsonRpcError> {
    let value = outcome.map_err(|e| e.to_rpc())?;
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(codes::TARGET_ERROR, format!("Failed to encode result: {e}")))
}
