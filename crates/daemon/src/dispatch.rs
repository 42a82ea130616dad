// SPDX-License-Identifier: MIT

//! Request Processor (§4.6): translates a decoded [`Request`] into calls
//! against [`sysrepo_engine::Engine`] and builds the matching [`Response`],
//! exactly the way the teacher's `handle_request` matches its own `Request`
//! enum (`listener/mod.rs`). Lives outside the listener module so it can be
//! unit-tested without a socket.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sysrepo_core::{ConnectionId, DataPath, Datastore, ErrorCode, SessionId, SrError, UserId};
use sysrepo_engine::{DataItem, Destination as EngineDestination, Engine, EventKind as EngineEventKind, NotificationRecord};
use sysrepo_wire::{
    Destination as WireDestination, EventKind as WireEventKind, MoveDirection as WireMoveDirection, Request, RequestOp,
    Response, ResponseOp, SchemaFormat as WireSchemaFormat, ValueRecord, WireDatastore, WireError,
};

/// Per-session `get_items_iter`/`get_item_next` cursors (§9 Open Question
/// (b)): a failing `get_item_next` invalidates and removes its entry,
/// returning `DATA_MISSING`; callers must reissue `get_items_iter`.
pub struct Dispatcher {
    engine: Arc<Engine>,
    iterators: Mutex<HashMap<(SessionId, u32), VecDeque<DataItem>>>,
    next_iterator_id: AtomicU32,
    /// This daemon instance's schema description directory, consulted by
    /// `module_install` (§1 "JSON schema-description format").
    schema_dir: std::path::PathBuf,
}

impl Dispatcher {
    pub fn new(engine: Arc<Engine>, schema_dir: std::path::PathBuf) -> Self {
        Self { engine, iterators: Mutex::new(HashMap::new()), next_iterator_id: AtomicU32::new(1), schema_dir }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Forget every iterator belonging to `session` (session end).
    pub fn session_ended(&self, session: SessionId) {
        self.iterators.lock().retain(|(s, _), _| *s != session);
    }

    /// Handle one request, returning the response plus any notifications the
    /// underlying engine call produced (to be routed by the Connection
    /// Manager to their destinations).
    pub fn handle(&self, connection: ConnectionId, peer: UserId, request: &Request) -> (Response, Vec<NotificationRecord>) {
        let session_id = request.session_id;
        let (op, notifications) = self.dispatch(connection, peer, session_id, &request.op);
        (Response { session_id, op }, notifications)
    }

    fn dispatch(
        &self,
        connection: ConnectionId,
        peer: UserId,
        session: SessionId,
        op: &RequestOp,
    ) -> (ResponseOp, Vec<NotificationRecord>) {
        match op {
            RequestOp::SessionStart { datastore, effective_uid, effective_gid } => {
                let effective = match (effective_uid, effective_gid) {
                    (Some(uid), Some(gid)) => UserId::new(*uid, *gid),
                    _ => peer,
                };
                let result = self.engine.session_create(connection, peer, effective, to_datastore(*datastore));
                (ok_or_error(result.map(|session_id| ResponseOp::SessionStarted { session_id })), Vec::new())
            }

            RequestOp::SessionStop => {
                self.session_ended(session);
                self.engine.session_drop(session);
                (ResponseOp::Ok, Vec::new())
            }

            RequestOp::SessionRefresh => (ok_or_error(self.engine.session_refresh(session).map(|()| ResponseOp::Ok)), Vec::new()),

            RequestOp::ListSchemas => {
                let result = self.engine.with_session(session, |dm, _s| dm.list_schemas());
                let response = result.map(|schemas| {
                    ResponseOp::Schemas {
                        schemas: schemas
                            .into_iter()
                            .map(|s| sysrepo_wire::SchemaSummary {
                                module: s.module,
                                namespace: s.namespace,
                                prefix: s.prefix,
                                revision: s.revision,
                                yang_path: s.yang_path,
                                yin_path: s.yin_path,
                                submodules: s.submodules,
                            })
                            .collect(),
                    }
                });
                (ok_or_error(response), Vec::new())
            }

            RequestOp::GetSchema { module, revision: _, submodule: _, format } => {
                let format = to_yang_schema_format(*format);
                let result = self
                    .engine
                    .with_session(session, |dm, _s| dm.get_schema(module, format))
                    .and_then(std::convert::identity);
                (ok_or_error(result.map(|text| ResponseOp::Schema { text })), Vec::new())
            }

            RequestOp::GetItem { path } => {
                let path = DataPath::new(path.clone());
                let result = self.engine.with_session(session, |dm, s| dm.get_item(s, &path)).and_then(std::convert::identity);
                (ok_or_error(result.map(|item| ResponseOp::Item { value: item.map(to_value_record) })), Vec::new())
            }

            RequestOp::GetItems { path } => {
                let path = DataPath::new(path.clone());
                let result = self.engine.with_session(session, |dm, s| dm.get_items(s, &path)).and_then(std::convert::identity);
                (ok_or_error(result.map(|items| ResponseOp::Items { values: items.into_iter().map(to_value_record).collect() })), Vec::new())
            }

            RequestOp::GetItemsIter { path } => {
                let path = DataPath::new(path.clone());
                let result = self.engine.with_session(session, |dm, s| dm.get_items(s, &path)).and_then(std::convert::identity);
                match result {
                    Ok(items) => {
                        let iterator_id = self.next_iterator_id.fetch_add(1, Ordering::Relaxed);
                        self.iterators.lock().insert((session, iterator_id), items.into_iter().collect());
                        (ResponseOp::IteratorOpened { iterator_id }, Vec::new())
                    }
                    Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
                }
            }

            RequestOp::GetItemNext { iterator_id } => {
                let mut iterators = self.iterators.lock();
                let key = (session, *iterator_id);
                let Some(queue) = iterators.get_mut(&key) else {
                    return (ResponseOp::Error { error: WireError { code: ErrorCode::DataMissing, message: Some("unknown iterator".into()), path: None } }, Vec::new());
                };
                match queue.pop_front() {
                    Some(item) => {
                        if queue.is_empty() {
                            iterators.remove(&key);
                        }
                        (ResponseOp::IteratorItem { value: Some(to_value_record(item)) }, Vec::new())
                    }
                    None => {
                        iterators.remove(&key);
                        (ResponseOp::Error { error: WireError { code: ErrorCode::DataMissing, message: Some("iterator exhausted".into()), path: None } }, Vec::new())
                    }
                }
            }

            RequestOp::SetItem { path, value, flags } => {
                let path = DataPath::new(path.clone());
                let result =
                    self.engine.with_session(session, |dm, s| dm.set_item(s, &path, value.clone(), *flags)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::DeleteItem { path, flags } => {
                let path = DataPath::new(path.clone());
                let result = self.engine.with_session(session, |dm, s| dm.delete_item(s, &path, *flags)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::MoveItem { path, direction } => {
                let path = DataPath::new(path.clone());
                let direction = to_yang_move_direction(*direction);
                let result = self.engine.with_session(session, |dm, s| dm.move_list(s, &path, direction)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::Validate => {
                let result = self
                    .engine
                    .with_session(session, |dm, s| {
                        let modules: Vec<String> = s.overlays.keys().cloned().collect();
                        let mut errors = Vec::new();
                        for module in modules {
                            match dm.validate(s, &module) {
                                Ok(mut module_errors) => errors.append(&mut module_errors),
                                Err(e) => errors.push(e),
                            }
                        }
                        errors
                    });
                match result {
                    Ok(errors) if errors.is_empty() => (ResponseOp::Ok, Vec::new()),
                    Ok(errors) => (ResponseOp::Errors { errors: errors.into_iter().map(WireError::from).collect() }, Vec::new()),
                    Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
                }
            }

            RequestOp::Commit => match self.engine.commit(session) {
                Ok(notifications) => (ResponseOp::Ok, notifications),
                Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
            },

            RequestOp::DiscardChanges => {
                let result = self.engine.with_session(session, |dm, s| dm.discard_changes(s));
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::LockModule { module } => {
                let result = self.engine.with_session(session, |dm, s| dm.lock_module(s, module)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::UnlockModule { module } => {
                let result = self.engine.with_session(session, |dm, s| dm.unlock_module(s, module)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::LockDatastore => {
                let result = self.engine.with_session(session, |dm, s| dm.lock_datastore(s)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::UnlockDatastore => {
                let result = self.engine.with_session(session, |dm, s| dm.unlock_datastore(s)).and_then(std::convert::identity);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::ModuleInstall { module, revision } => match self.load_module_description(module, revision.as_deref()) {
                Ok(m) => match self.engine.module_install(session, m) {
                    Ok(notifications) => (ResponseOp::Ok, notifications),
                    Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
                },
                Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
            },

            RequestOp::FeatureEnable { module, feature, on } => match self.engine.feature_enable(session, module, feature, *on) {
                Ok(notifications) => (ResponseOp::Ok, notifications),
                Err(e) => (ResponseOp::Error { error: e.into() }, Vec::new()),
            },

            RequestOp::Subscribe { event, destination, path, module_name } => {
                let Some(module) = module_name else {
                    return (ResponseOp::Error { error: WireError { code: ErrorCode::InvalArg, message: Some("subscribe requires module_name".into()), path: None } }, Vec::new());
                };
                let result = self.engine.subscribe(
                    session,
                    module,
                    to_engine_event_kind(*event),
                    to_engine_destination(destination.clone()),
                    path.clone(),
                );
                (ok_or_error(result.map(|subscription_id| ResponseOp::Subscribed { subscription_id })), Vec::new())
            }

            RequestOp::Unsubscribe { subscription_id } => {
                let result = self.engine.unsubscribe(session, *subscription_id);
                (ok_or_error(result.map(|()| ResponseOp::Ok)), Vec::new())
            }

            RequestOp::Unknown => (
                ResponseOp::Error { error: WireError { code: ErrorCode::Unsupported, message: Some("unknown operation".into()), path: None } },
                Vec::new(),
            ),
        }
    }

    /// `module_install` doesn't carry a schema body on the wire — the YANG/
    /// XPath library is out of scope (SPEC_FULL.md §1), so the module
    /// description is read from `{schema_dir}/{module}.json`, this crate's
    /// small schema-description format (`sysrepo_yang::Module` derives
    /// `Deserialize`).
    fn load_module_description(&self, module: &str, _revision: Option<&str>) -> Result<sysrepo_yang::Module, SrError> {
        let path = self.schema_dir.join(format!("{module}.json"));
        let text = std::fs::read_to_string(&path)
            .map_err(|e| SrError::with_path(ErrorCode::NotFound, format!("schema description not found: {e}"), path.display().to_string()))?;
        serde_json::from_str(&text).map_err(|e| SrError::with_message(ErrorCode::MalformedMsg, e.to_string()))
    }
}

fn ok_or_error(result: Result<ResponseOp, SrError>) -> ResponseOp {
    match result {
        Ok(op) => op,
        Err(e) => ResponseOp::Error { error: e.into() },
    }
}

fn to_datastore(w: WireDatastore) -> Datastore {
    match w {
        WireDatastore::Startup => Datastore::Startup,
        WireDatastore::Running => Datastore::Running,
        WireDatastore::Candidate => Datastore::Candidate,
    }
}

fn to_yang_schema_format(f: WireSchemaFormat) -> sysrepo_yang::SchemaFormat {
    match f {
        WireSchemaFormat::Yang => sysrepo_yang::SchemaFormat::Yang,
        WireSchemaFormat::Yin => sysrepo_yang::SchemaFormat::Yin,
    }
}

fn to_yang_move_direction(d: WireMoveDirection) -> sysrepo_yang::MoveDirection {
    match d {
        WireMoveDirection::Up => sysrepo_yang::MoveDirection::Up,
        WireMoveDirection::Down => sysrepo_yang::MoveDirection::Down,
        WireMoveDirection::First => sysrepo_yang::MoveDirection::First,
        WireMoveDirection::Last => sysrepo_yang::MoveDirection::Last,
    }
}

fn to_engine_event_kind(e: WireEventKind) -> EngineEventKind {
    match e {
        WireEventKind::ModuleInstall => EngineEventKind::ModuleInstall,
        WireEventKind::FeatureEnable => EngineEventKind::FeatureEnable,
        WireEventKind::ModuleChange => EngineEventKind::ModuleChange,
        WireEventKind::Rpc => EngineEventKind::Rpc,
    }
}

fn to_engine_destination(d: WireDestination) -> EngineDestination {
    EngineDestination { address: d.address, id: d.id }
}

fn to_value_record(item: DataItem) -> ValueRecord {
    ValueRecord { path: item.path, value: item.value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysrepo_core::{ConnectionId, EditFlags, Value};
    use sysrepo_engine::{Engine, EngineConfig};
    use sysrepo_wire::EventKind as WEventKind;

    fn root() -> UserId {
        UserId::ROOT
    }

    fn new_dispatcher() -> (Dispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(Engine::new(EngineConfig { data_dir: dir.path().join("data") }));
        (Dispatcher::new(engine, dir.path().join("schema")), dir)
    }

    fn start_session(dispatcher: &Dispatcher) -> SessionId {
        let req = Request { session_id: SessionId::NONE, op: RequestOp::SessionStart { datastore: WireDatastore::Running, effective_uid: None, effective_gid: None } };
        let (resp, _) = dispatcher.handle(ConnectionId(1), root(), &req);
        match resp.op {
            ResponseOp::SessionStarted { session_id } => session_id,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn session_start_then_stop_round_trips() {
        let (dispatcher, _dir) = new_dispatcher();
        let session = start_session(&dispatcher);
        let req = Request { session_id: session, op: RequestOp::SessionStop };
        let (resp, _) = dispatcher.handle(ConnectionId(1), root(), &req);
        assert_eq!(resp.op, ResponseOp::Ok);
    }

    #[test]
    fn get_item_on_uninstalled_module_is_unknown_model() {
        let (dispatcher, _dir) = new_dispatcher();
        let session = start_session(&dispatcher);
        let req = Request { session_id: session, op: RequestOp::GetItem { path: "/no-such-module:leaf".into() } };
        let (resp, _) = dispatcher.handle(ConnectionId(1), root(), &req);
        match resp.op {
            ResponseOp::Error { error } => assert_eq!(error.code, ErrorCode::UnknownModel),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn module_install_reads_schema_description_from_schema_dir() {
        let (dispatcher, dir) = new_dispatcher();
        std::fs::create_dir_all(dir.path().join("schema")).unwrap();
        std::fs::write(
            dir.path().join("schema/example-module.json"),
            r#"{"name":"example-module","namespace":"urn:example-module","prefix":"ex","nodes":{}}"#,
        )
        .unwrap();
        let session = start_session(&dispatcher);
        let req = Request { session_id: session, op: RequestOp::ModuleInstall { module: "example-module".into(), revision: None } };
        let (resp, _) = dispatcher.handle(ConnectionId(1), root(), &req);
        assert_eq!(resp.op, ResponseOp::Ok);
    }

    #[test]
    fn get_item_next_after_exhaustion_is_data_missing_and_invalidates_iterator() {
        let (dispatcher, dir) = new_dispatcher();
        std::fs::create_dir_all(dir.path().join("schema")).unwrap();
        std::fs::write(
            dir.path().join("schema/example-module.json"),
            r#"{"name":"example-module","namespace":"urn:example-module","prefix":"ex","nodes":{"greeting":{"name":"greeting","kind":"Leaf","type_spec":"String","mandatory":false}}}"#,
        )
        .unwrap();
        let session = start_session(&dispatcher);
        dispatcher.handle(
            ConnectionId(1),
            root(),
            &Request { session_id: session, op: RequestOp::ModuleInstall { module: "example-module".into(), revision: None } },
        );
        dispatcher.handle(
            ConnectionId(1),
            root(),
            &Request {
                session_id: session,
                op: RequestOp::SetItem { path: "/example-module:greeting".into(), value: Some(Value::String("hi".into())), flags: EditFlags::default() },
            },
        );
        let (opened, _) =
            dispatcher.handle(ConnectionId(1), root(), &Request { session_id: session, op: RequestOp::GetItemsIter { path: "/example-module:greeting".into() } });
        let iterator_id = match opened.op {
            ResponseOp::IteratorOpened { iterator_id } => iterator_id,
            other => panic!("unexpected response: {other:?}"),
        };
        let (first, _) = dispatcher.handle(ConnectionId(1), root(), &Request { session_id: session, op: RequestOp::GetItemNext { iterator_id } });
        assert!(matches!(first.op, ResponseOp::IteratorItem { value: Some(_) }));
        let (exhausted, _) = dispatcher.handle(ConnectionId(1), root(), &Request { session_id: session, op: RequestOp::GetItemNext { iterator_id } });
        match exhausted.op {
            ResponseOp::Error { error } => assert_eq!(error.code, ErrorCode::DataMissing),
            other => panic!("unexpected response: {other:?}"),
        }
        // The same iterator id is now unknown, not merely empty.
        let (again, _) = dispatcher.handle(ConnectionId(1), root(), &Request { session_id: session, op: RequestOp::GetItemNext { iterator_id } });
        match again.op {
            ResponseOp::Error { error } => assert_eq!(error.code, ErrorCode::DataMissing),
            other => panic!("unexpected response: {other:?}"),
        }
        let _ = WEventKind::Rpc;
    }
}
