use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use remote_debug_core::ops::diagnostics;
use remote_debug_core::{ClientConfig, DebuggerError, RemoteDebuggerClient, RpcClient};
use remote_debug_server::{listener, RemoteDebuggerServer, SnapshotDebugger};
use serde_json::{json, Map};

const HEAP: u64 = 0x7f00_0000_1000;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/core.json")
}

/// Serves the fixture snapshot on an ephemeral port from a background runtime.
fn start_server() -> SocketAddr {
    let debugger = SnapshotDebugger::load(fixture()).unwrap();
    let server = Arc::new(RemoteDebuggerServer::new(debugger));

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let tcp = tokio::net::TcpListener::from_std(std_listener).unwrap();
            let _ = listener::serve(tcp, server).await;
        });
    });

    addr
}

fn connect() -> RemoteDebuggerClient<RpcClient> {
    let addr = start_server();
    let config = ClientConfig::new(addr.to_string(), Duration::from_secs(5));
    RemoteDebuggerClient::connect(&config).unwrap()
}

#[test]
fn session_facts_cross_the_wire() {
    let client = connect();
    let session = client.session();

    assert_eq!(session.os, "linux");
    assert_eq!(session.cpu, "amd64");
    assert_eq!(session.address_size(), 8);
    assert_eq!(session.heap_oop_size, 4);
    assert_eq!(session.narrow_oop.base, 0x8_0000_0000);
    assert_eq!(session.narrow_oop.shift, 3);
    assert!(session.supports_command_tunnel);
}

#[test]
fn reads_are_cached_and_decoded() {
    let client = connect();

    let bytes = client.read_bytes(0x40_0010, 4).unwrap();
    assert_eq!(bytes, vec![0x10, 0x11, 0x12, 0x13]);
    let before = client.cache_stats();
    assert_eq!(client.read_bytes(0x40_0010, 4).unwrap(), bytes);
    assert_eq!(client.cache_stats().misses, before.misses);
    assert_eq!(client.cache_stats().hits, before.hits + 1);

    assert_eq!(client.read_address(HEAP).unwrap().map(|a| a.as_u64()), Some(HEAP));
    assert_eq!(client.read_address(HEAP + 8).unwrap(), None);
    assert_eq!(
        client.read_compressed_oop(HEAP + 16).unwrap().map(|a| a.as_u64()),
        Some(0x8_0000_0000 + (0x200 << 3))
    );
    assert_eq!(client.read_c_string(HEAP + 20).unwrap(), "hello, core");
}

#[test]
fn unmapped_reads_surface_the_first_bad_address() {
    let client = connect();

    let err = client.read_bytes(HEAP + 32, 8).unwrap_err();
    assert!(matches!(err, DebuggerError::UnmappedAddress { address } if address == HEAP + 36));
    assert_eq!(client.cache_stats().resident_pages, 0);
}

#[test]
fn threads_resolve_by_address_and_id() {
    let client = connect();

    let by_address = client.thread_for_address(client.parse_address("0x7f0000001000").unwrap().unwrap());
    let by_id = client.thread_for_id(1);
    assert!(client.threads_equal(&by_address, &by_id).unwrap());
    assert!(!client.threads_equal(&by_id, &client.thread_for_id(2)).unwrap());

    let context = client.thread_context(&by_address).unwrap();
    assert_eq!(context.pc(), 0x40_1010);
    assert_eq!(context.sp(), 0x7ffc_0000);
    assert_eq!(context.fp(), Some(0x7ffc_0040));

    let err = client.thread_hash_code(&client.thread_for_id(99)).unwrap_err();
    assert!(matches!(err, DebuggerError::Target { .. }));
}

#[test]
fn diagnostics_run_through_the_tunnel() {
    let client = connect();

    assert_eq!(diagnostics::find_symbol(&client, "main").unwrap(), "0x0000000000401000");
    assert_eq!(diagnostics::find_symbol(&client, "foo").unwrap(), "Symbol not found: foo");

    let pmap = diagnostics::pmap(&client).unwrap();
    assert_eq!(
        pmap,
        "0x0000000000400000\t4K\tapp\n0x00007f0000001000\t1K\theap\n"
    );

    let pstack = diagnostics::pstack(&client, true).unwrap();
    assert!(pstack.contains("----------------- 1 -----------------"));
    assert!(pstack.contains("0x0000000000401010\tmain+0x10"));
    assert!(pstack.contains("0x0000000000401824\tworker_loop+0x24"));
    assert!(pstack.contains("    - monitor@0x7f0000001000"));

    let err = client
        .run_diagnostic_command("jmap", &Map::new())
        .unwrap_err();
    assert!(matches!(err, DebuggerError::UnsupportedCommand(ref c) if c == "jmap"));

    let err = client.run_diagnostic_command("findsym", &Map::new()).unwrap_err();
    assert!(matches!(err, DebuggerError::CommandFailed { ref command, .. } if command == "findsym"));
}

#[test]
fn console_and_lookup() {
    let client = connect();

    assert!(client.has_console().unwrap());
    assert_eq!(client.console_prompt().unwrap(), "snapshot> ");
    assert!(client.console_execute("regions").unwrap().contains("heap"));

    assert_eq!(
        client.lookup_symbol(Some("app"), "worker_loop").unwrap().map(|a| a.as_u64()),
        Some(0x40_1800)
    );
    assert_eq!(client.lookup_symbol(None, "nope").unwrap(), None);

    let options = json!({"symbol": "main"});
    assert_eq!(
        client
            .run_diagnostic_command("findsym", options.as_object().unwrap())
            .unwrap(),
        "0x0000000000401000"
    );
}
