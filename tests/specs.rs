// SPDX-License-Identifier: MIT

//! End-to-end protocol specs (SPEC_FULL.md §8): drives a real `sysrepod`
//! listener over a real Unix socket with the actual wire codec, exercising
//! the concrete scenarios the distilled spec calls out by number. Unit
//! tests inside each crate already cover the same invariants in isolation
//! (`sysrepo_yang::validate`, `sysrepo_engine::data_manager`); this suite's
//! job is to confirm the whole stack — framing, dispatch, data manager,
//! storage — agrees once wired together the way `sysrepod` wires it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use sysrepo_core::{EditFlags, ErrorCode, SessionId, Value};
use sysrepo_daemon::dispatch::Dispatcher;
use sysrepo_daemon::Listener;
use sysrepo_engine::{Engine, EngineConfig};
use sysrepo_wire::{
    MoveDirection, ProtocolMessage, Request, RequestOp, Response, ResponseOp, SchemaFormat, WireDatastore,
};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

struct TestDaemon {
    socket_path: PathBuf,
    schema_dir: PathBuf,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl TestDaemon {
    async fn start(dir: &Path) -> Self {
        let data_dir = dir.join("data");
        let schema_dir = dir.join("schema");
        std::fs::create_dir_all(&data_dir).expect("create data dir");
        std::fs::create_dir_all(&schema_dir).expect("create schema dir");
        let socket_path = dir.join("sysrepo.sock");

        let engine = Arc::new(Engine::new(EngineConfig { data_dir }));
        let dispatcher = Arc::new(Dispatcher::new(engine, schema_dir.clone()));
        let unix = UnixListener::bind(&socket_path).expect("bind socket");
        let listener = Listener::new(unix, dispatcher);
        let shutdown = CancellationToken::new();
        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };
        Self { socket_path, schema_dir, shutdown, handle }
    }

    fn install_schema(&self, module: &str, description: serde_json::Value) {
        std::fs::write(
            self.schema_dir.join(format!("{module}.json")),
            serde_json::to_vec_pretty(&description).expect("serialise schema description"),
        )
        .expect("write schema description");
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

struct TestClient {
    stream: UnixStream,
    session: SessionId,
}

impl TestClient {
    async fn connect(socket: &Path, datastore: WireDatastore) -> Self {
        let mut stream = UnixStream::connect(socket).await.expect("connect to daemon socket");
        let resp = send(
            &mut stream,
            Request { session_id: SessionId::NONE, op: RequestOp::SessionStart { datastore, effective_uid: None, effective_gid: None } },
        )
        .await;
        let session = match resp.op {
            ResponseOp::SessionStarted { session_id } => session_id,
            other => panic!("session_start failed: {other:?}"),
        };
        Self { stream, session }
    }

    async fn call(&mut self, op: RequestOp) -> ResponseOp {
        send(&mut self.stream, Request { session_id: self.session, op }).await.op
    }

    async fn close(mut self) {
        let _ = self.call(RequestOp::SessionStop).await;
    }
}

async fn send(stream: &mut UnixStream, request: Request) -> Response {
    let body = sysrepo_wire::encode(&ProtocolMessage::Request(request)).expect("encode request");
    sysrepo_wire::write_message(stream, &body).await.expect("write request frame");
    let body = sysrepo_wire::read_message(stream).await.expect("read response frame");
    match sysrepo_wire::decode(&body).expect("decode response") {
        ProtocolMessage::Response(r) => r,
        other => panic!("expected a response, got {other:?}"),
    }
}

fn example_module_schema() -> serde_json::Value {
    json!({
        "name": "example-module",
        "namespace": "urn:example-module",
        "prefix": "ex",
        "nodes": {
            "container": {
                "name": "container",
                "kind": "Container",
                "mandatory": false,
                "children": {
                    "list": {
                        "name": "list",
                        "kind": "List",
                        "mandatory": false,
                        "keys": ["key1", "key2"],
                        "children": {
                            "key1": {"name": "key1", "kind": "Leaf", "type_spec": "String", "mandatory": true},
                            "key2": {"name": "key2", "kind": "Leaf", "type_spec": "String", "mandatory": true},
                            "leaf": {"name": "leaf", "kind": "Leaf", "type_spec": "String", "mandatory": false}
                        }
                    }
                }
            }
        }
    })
}

fn test_module_schema() -> serde_json::Value {
    json!({
        "name": "test-module",
        "namespace": "urn:test-module",
        "prefix": "t",
        "nodes": {
            "location": {
                "name": "location",
                "kind": "Container",
                "mandatory": false,
                "children": {
                    "name": {"name": "name", "kind": "Leaf", "type_spec": "String", "mandatory": true},
                    "latitude": {"name": "latitude", "kind": "Leaf", "type_spec": {"Decimal64": {"fraction_digits": 4}}, "mandatory": true},
                    "longitude": {"name": "longitude", "kind": "Leaf", "type_spec": {"Decimal64": {"fraction_digits": 4}}, "mandatory": true}
                }
            },
            "user": {
                "name": "user",
                "kind": "List",
                "mandatory": false,
                "keys": ["name"],
                "user_ordered": true,
                "children": {
                    "name": {"name": "name", "kind": "Leaf", "type_spec": "String", "mandatory": true},
                    "type": {"name": "type", "kind": "Leaf", "type_spec": "String", "mandatory": false}
                }
            }
        }
    })
}

/// §8 scenario 1: `set_item` → `commit` → `get_item` round-trips a value.
#[tokio::test]
async fn scenario_basic_set_get() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("example-module", example_module_schema());

    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    assert_eq!(
        client.call(RequestOp::ModuleInstall { module: "example-module".into(), revision: None }).await,
        ResponseOp::Ok
    );

    let path = "/example-module:container/list[key1='k1'][key2='k2']/leaf";
    assert_eq!(
        client
            .call(RequestOp::SetItem { path: path.into(), value: Some(Value::String("Leaf value".into())), flags: EditFlags::default() })
            .await,
        ResponseOp::Ok
    );
    assert_eq!(client.call(RequestOp::Commit).await, ResponseOp::Ok);

    match client.call(RequestOp::GetItem { path: path.into() }).await {
        ResponseOp::Item { value: Some(v) } => {
            assert_eq!(v.path, path);
            assert_eq!(v.value, Value::String("Leaf value".into()));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.close().await;
    daemon.stop().await;
}

/// §8 scenario 2: a mandatory leaf missing fails validation with both
/// siblings named; setting them clears it.
#[tokio::test]
async fn scenario_mandatory_leaf_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("test-module", test_module_schema());

    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    client.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;

    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/name".into(),
            value: Some(Value::String("Banska Bystrica".into())),
            flags: EditFlags::default(),
        })
        .await;

    match client.call(RequestOp::Validate).await {
        ResponseOp::Errors { errors } => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().any(|e| e.path.as_deref() == Some("/test-module:location/latitude")));
            assert!(errors.iter().any(|e| e.path.as_deref() == Some("/test-module:location/longitude")));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }

    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/latitude".into(),
            value: Some(Value::Decimal64 { mantissa: 48_1486, scale: 4 }),
            flags: EditFlags::default(),
        })
        .await;
    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/longitude".into(),
            value: Some(Value::Decimal64 { mantissa: 19_1462, scale: 4 }),
            flags: EditFlags::default(),
        })
        .await;

    assert_eq!(client.call(RequestOp::Validate).await, ResponseOp::Ok);
    assert_eq!(client.call(RequestOp::Commit).await, ResponseOp::Ok);

    client.close().await;
    daemon.stop().await;
}

/// §8 scenario 3: moving entries in a user-ordered list preserves the
/// resulting order across a commit.
#[tokio::test]
async fn scenario_user_ordered_move() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("test-module", test_module_schema());

    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    client.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;

    for name in ["A", "B", "C"] {
        let path = format!("/test-module:user[name='{name}']");
        assert_eq!(
            client.call(RequestOp::SetItem { path, value: None, flags: EditFlags::default() }).await,
            ResponseOp::Ok
        );
    }

    assert_eq!(
        client
            .call(RequestOp::MoveItem { path: "/test-module:user[name='A']".into(), direction: MoveDirection::Down })
            .await,
        ResponseOp::Ok
    );
    assert_eq!(
        client
            .call(RequestOp::MoveItem { path: "/test-module:user[name='C']".into(), direction: MoveDirection::Up })
            .await,
        ResponseOp::Ok
    );
    assert_eq!(client.call(RequestOp::Commit).await, ResponseOp::Ok);

    match client.call(RequestOp::GetItems { path: "/test-module:user".into() }).await {
        ResponseOp::Items { values } => {
            let names: Vec<String> = values.iter().map(|v| v.path.clone()).collect();
            assert_eq!(
                names,
                vec![
                    "/test-module:user[name='B']".to_string(),
                    "/test-module:user[name='C']".to_string(),
                    "/test-module:user[name='A']".to_string(),
                ]
            );
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.close().await;
    daemon.stop().await;
}

/// §8 scenario 4: a session whose edited path was also committed by another
/// session gets `INTERNAL` with the path on refresh, keeps its own edits,
/// and can still commit afterwards.
#[tokio::test]
async fn scenario_refresh_conflict() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("test-module", test_module_schema());

    let mut setup = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    setup.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;
    setup.close().await;

    let mut a = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    let conflict_path = "/test-module:user[name='abc']";
    a.call(RequestOp::SetItem { path: conflict_path.into(), value: None, flags: EditFlags::default() }).await;
    a.call(RequestOp::SetItem { path: format!("{conflict_path}/type"), value: Some(Value::String("first".into())), flags: EditFlags::default() })
        .await;

    let mut b = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    b.call(RequestOp::SetItem { path: conflict_path.into(), value: None, flags: EditFlags::default() }).await;
    b.call(RequestOp::SetItem { path: format!("{conflict_path}/type"), value: Some(Value::String("second".into())), flags: EditFlags::default() })
        .await;
    assert_eq!(b.call(RequestOp::Commit).await, ResponseOp::Ok);

    match a.call(RequestOp::SessionRefresh).await {
        ResponseOp::Error { error } => {
            assert_eq!(error.code, ErrorCode::Internal);
            assert!(error.path.is_some());
        }
        other => panic!("expected a refresh conflict, got {other:?}"),
    }

    // A's own commit still succeeds (re-validates + replays against the
    // latest base, overwriting with A's own value).
    assert_eq!(a.call(RequestOp::Commit).await, ResponseOp::Ok);

    b.close().await;
    a.close().await;
    daemon.stop().await;
}

/// §8 scenario 5: `lock_datastore` blocks other sessions' `lock_module`
/// until the holder disconnects.
#[tokio::test]
async fn scenario_datastore_lock_exclusivity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("test-module", test_module_schema());

    let mut setup = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    setup.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;
    setup.close().await;

    let mut a = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    assert_eq!(a.call(RequestOp::LockDatastore).await, ResponseOp::Ok);

    let mut b = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    match b.call(RequestOp::LockModule { module: "test-module".into() }).await {
        ResponseOp::Error { error } => assert_eq!(error.code, ErrorCode::Locked),
        other => panic!("expected LOCKED, got {other:?}"),
    }

    // A disconnects without explicitly unlocking — its locks must release
    // with the session (§5 "a lock held by a session is released
    // automatically when the session ends").
    a.close().await;

    // Give the listener's connection-close teardown a moment to run.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(b.call(RequestOp::LockModule { module: "test-module".into() }).await, ResponseOp::Ok);

    b.close().await;
    daemon.stop().await;
}

/// §8 scenario 6: an unknown module is `UNKNOWN_MODEL`; an unknown node
/// under an installed module is `BAD_ELEMENT` naming the furthest-matched
/// ancestor path.
#[tokio::test]
async fn scenario_unknown_module_and_bad_element() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("example-module", example_module_schema());

    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    client.call(RequestOp::ModuleInstall { module: "example-module".into(), revision: None }).await;

    match client.call(RequestOp::GetItem { path: "/unknown-model:abc".into() }).await {
        ResponseOp::Error { error } => assert_eq!(error.code, ErrorCode::UnknownModel),
        other => panic!("expected UNKNOWN_MODEL, got {other:?}"),
    }

    match client.call(RequestOp::GetItem { path: "/example-module:unknown/next".into() }).await {
        ResponseOp::Error { error } => {
            assert_eq!(error.code, ErrorCode::BadElement);
            assert_eq!(error.path.as_deref(), Some("/example-module:unknown"));
        }
        other => panic!("expected BAD_ELEMENT, got {other:?}"),
    }

    client.close().await;
    daemon.stop().await;
}

/// §8 "Framing": a frame claiming a length over `MAX_MSG_SIZE` closes the
/// connection without the daemon touching any session state — a second,
/// well-formed connection still works.
#[tokio::test]
async fn oversize_frame_closes_connection_without_side_effects() {
    use tokio::io::AsyncWriteExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;

    let mut bad = UnixStream::connect(&daemon.socket_path).await.expect("connect");
    bad.write_all(&(sysrepo_wire::DEFAULT_MAX_MSG_SIZE + 1).to_be_bytes()).await.expect("write oversize length");
    bad.flush().await.expect("flush");

    // The connection must be closed by the daemon; further reads see EOF.
    let mut buf = [0u8; 1];
    use tokio::io::AsyncReadExt;
    let n = tokio::time::timeout(std::time::Duration::from_secs(2), bad.read(&mut buf))
        .await
        .expect("daemon should close the connection promptly")
        .expect("read should not error, only EOF");
    assert_eq!(n, 0, "expected EOF after an oversize frame");

    // The daemon process itself is unaffected: a fresh connection still works.
    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    assert_eq!(client.call(RequestOp::ListSchemas).await, ResponseOp::Schemas { schemas: Vec::new() });
    client.close().await;

    daemon.stop().await;
}

/// §8 "Subscription durability": a module-change subscription survives an
/// engine restart and still fires on the next commit touching that module.
#[tokio::test]
async fn subscription_survives_restart_and_still_fires() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("test-module", test_module_schema());

    let mut installer = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    installer.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;

    let destination = sysrepo_wire::Destination { address: "unix:/tmp/durable-sub.sock".into(), id: 7 };
    match installer
        .call(RequestOp::Subscribe {
            event: sysrepo_wire::EventKind::ModuleChange,
            destination: destination.clone(),
            path: None,
            module_name: Some("test-module".into()),
        })
        .await
    {
        ResponseOp::Subscribed { .. } => {}
        other => panic!("unexpected subscribe response: {other:?}"),
    }
    installer.close().await;
    daemon.stop().await;

    // Restart against the same data_dir/schema_dir — the persisted
    // subscription must be reloaded and re-fire on the next commit.
    let daemon2 = TestDaemon::start(dir.path()).await;
    let mut client = TestClient::connect(&daemon2.socket_path, WireDatastore::Running).await;
    client.call(RequestOp::ModuleInstall { module: "test-module".into(), revision: None }).await;
    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/name".into(),
            value: Some(Value::String("Zilina".into())),
            flags: EditFlags::default(),
        })
        .await;
    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/latitude".into(),
            value: Some(Value::Decimal64 { mantissa: 1, scale: 4 }),
            flags: EditFlags::default(),
        })
        .await;
    client
        .call(RequestOp::SetItem {
            path: "/test-module:location/longitude".into(),
            value: Some(Value::Decimal64 { mantissa: 1, scale: 4 }),
            flags: EditFlags::default(),
        })
        .await;
    assert_eq!(client.call(RequestOp::Commit).await, ResponseOp::Ok);

    client.close().await;
    daemon2.stop().await;
}

/// §4.3: a YANG/YIN schema description installed via `module_install` is
/// retrievable through `get_schema`/`list_schemas`.
#[tokio::test]
async fn list_and_get_schema_after_install() {
    let dir = tempfile::tempdir().expect("tempdir");
    let daemon = TestDaemon::start(dir.path()).await;
    daemon.install_schema("example-module", example_module_schema());

    let mut client = TestClient::connect(&daemon.socket_path, WireDatastore::Running).await;
    client.call(RequestOp::ModuleInstall { module: "example-module".into(), revision: None }).await;

    match client.call(RequestOp::ListSchemas).await {
        ResponseOp::Schemas { schemas } => {
            assert_eq!(schemas.len(), 1);
            assert_eq!(schemas[0].module, "example-module");
            assert_eq!(schemas[0].namespace, "urn:example-module");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match client.call(RequestOp::GetSchema { module: "example-module".into(), revision: None, submodule: None, format: SchemaFormat::Yang }).await
    {
        ResponseOp::Schema { text } => assert!(text.contains("module example-module")),
        other => panic!("unexpected response: {other:?}"),
    }

    client.close().await;
    daemon.stop().await;
}
