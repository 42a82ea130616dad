// SPDX-License-Identifier: MIT

//! The Data Manager (§4.3, §4.5): the engine's central component. Owns the
//! schema context, the per-session overlay/operation-log machinery, the
//! lock table, the access controller, and the two-phase commit protocol
//! that reconciles a session's edits with the on-disk base.

use std::path::PathBuf;
use std::sync::Mutex;

use sysrepo_core::{AccessMode, DataPath, Datastore, EditFlags, ErrorCode, SrError, Value};
use sysrepo_yang::{Module, SchemaContext, SchemaFormat};

use crate::access::AccessController;
use crate::locks::LockTable;
use crate::notification::{EventKind, NotificationProcessor, NotificationRecord};
use crate::oplog::{LogEntry, OpKind};
use crate::overlay::Overlay;
use crate::session::Session;

/// A single path/value pair returned by `get_item` (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub path: String,
    pub value: Value,
}

pub struct DataManager {
    schema: SchemaContext,
    data_dir: PathBuf,
    locks: LockTable,
    access: AccessController,
    notifications: parking_lot::RwLock<NotificationProcessor>,
    /// Process-wide commit guard (§4.5 step 2): linearises the write phase
    /// of every session's commit, even across unrelated modules.
    commit_guard: Mutex<()>,
}

impl DataManager {
    pub fn new(schema: SchemaContext, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut notifications = NotificationProcessor::new();
        restore_persisted_subscriptions(&data_dir, &mut notifications);
        Self {
            access: AccessController::new(data_dir.clone()),
            schema,
            data_dir,
            locks: LockTable::new(),
            notifications: parking_lot::RwLock::new(notifications),
            commit_guard: Mutex::new(()),
        }
    }

    pub fn schema(&self) -> &SchemaContext {
        &self.schema
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn notifications(&self) -> &parking_lot::RwLock<NotificationProcessor> {
        &self.notifications
    }

    pub fn list_schemas(&self) -> Vec<sysrepo_yang::SchemaInfo> {
        self.schema.list_schemas()
    }

    pub fn get_schema(&self, module: &str, format: SchemaFormat) -> Result<String, SrError> {
        self.schema.get_schema(module, format)
    }

    fn module_name_of(path: &DataPath) -> Result<String, SrError> {
        path.module_name()
            .map(str::to_string)
            .ok_or_else(|| SrError::with_path(ErrorCode::InvalArg, "path is not module-qualified", path.as_str()))
    }

    /// Read a module's persisted base and materialise it as a [`sysrepo_yang::DataTree`].
    fn load_base(&self, module: &str, datastore: Datastore) -> Result<sysrepo_yang::DataTree, SrError> {
        let records = sysrepo_storage::read_datastore(&self.data_dir, module, datastore)?;
        self.schema.with_module(module, |schema| records_to_tree(schema, module, &records))?
    }

    /// Ensure `session` has a working-copy overlay for `module`, forking one
    /// from the persisted base on first touch.
    fn ensure_overlay<'s>(&self, session: &'s mut Session, module: &str) -> Result<&'s mut Overlay, SrError> {
        if !session.overlays.contains_key(module) {
            if !self.schema.is_installed(module) {
                return Err(SrError::with_message(ErrorCode::UnknownModel, module.to_string()));
            }
            let tree = self.load_base(module, session.datastore)?;
            let timestamp = source_timestamp(&self.data_dir, module, session.datastore);
            session.overlays.insert(module.to_string(), Overlay::fork(tree, timestamp));
        }
        Ok(session.overlays.get_mut(module).expect("just inserted"))
    }

    pub fn get_item(&self, session: &mut Session, path: &DataPath) -> Result<Option<DataItem>, SrError> {
        let module = Self::module_name_of(path)?;
        self.access.check(&session.user, &module, session.datastore, AccessMode::Read)?;
        let overlay = self.ensure_overlay(session, &module)?;
        let found = self.schema.with_module(&module, |schema| sysrepo_yang::get_item(schema, &overlay.tree, path))??;
        Ok(found.map(|id| {
            let node = overlay.tree.node(id);
            DataItem { path: path.as_str().to_string(), value: node.value.clone() }
        }))
    }

    /// All descendants of every node matching `path` (inclusive), flattened
    /// depth-first (§4.3 `get_items`/`get_items_iter`; this crate does not
    /// model the server-side iterator cursor — the daemon's request layer
    /// slices this list into pages as `get_item_next` is called). An unkeyed
    /// list segment in `path` matches every instance of that list, each
    /// emitted under its own fully-keyed path, not the query path verbatim.
    pub fn get_items(&self, session: &mut Session, path: &DataPath) -> Result<Vec<DataItem>, SrError> {
        let module = Self::module_name_of(path)?;
        self.access.check(&session.user, &module, session.datastore, AccessMode::Read)?;
        let overlay = self.ensure_overlay(session, &module)?;
        let chains = self.schema.with_module(&module, |schema| sysrepo_yang::get_item_paths(schema, &overlay.tree, path))??;
        let mut items = Vec::new();
        for chain in chains {
            let instance = *chain.last().expect("chain always has a root");
            let ancestors = &chain[..chain.len() - 1];
            for (sub_chain, node) in overlay.tree.walk(instance) {
                let full_chain: Vec<sysrepo_yang::NodeId> = ancestors.iter().chain(sub_chain.iter()).copied().collect();
                if full_chain.len() >= 2 {
                    let parent = overlay.tree.node(full_chain[full_chain.len() - 2]);
                    if is_key_leaf_of(parent, &node.name) {
                        continue;
                    }
                }
                items.push(DataItem { path: path_of(&overlay.tree, &full_chain), value: node.value.clone() });
            }
        }
        Ok(items)
    }

    pub fn set_item(
        &self,
        session: &mut Session,
        path: &DataPath,
        value: Option<Value>,
        flags: EditFlags,
    ) -> Result<(), SrError> {
        let module = Self::module_name_of(path)?;
        self.access.check(&session.user, &module, session.datastore, AccessMode::ReadWrite)?;
        let overlay = self.ensure_overlay(session, &module)?;
        self.schema.with_module(&module, |schema| {
            sysrepo_yang::set_item(schema, &mut overlay.tree, path, value.clone(), flags)
        })??;
        overlay.modified = true;
        session.operation_log.push(LogEntry { kind: OpKind::Set, path: path.as_str().to_string(), value, flags });
        Ok(())
    }

    pub fn delete_item(&self, session: &mut Session, path: &DataPath, flags: EditFlags) -> Result<(), SrError> {
        let module = Self::module_name_of(path)?;
        self.access.check(&session.user, &module, session.datastore, AccessMode::ReadWrite)?;
        let overlay = self.ensure_overlay(session, &module)?;
        self.schema.with_module(&module, |schema| sysrepo_yang::delete_item(schema, &mut overlay.tree, path, flags))??;
        overlay.modified = true;
        session.operation_log.push(LogEntry { kind: OpKind::Delete, path: path.as_str().to_string(), value: None, flags });
        Ok(())
    }

    pub fn move_list(
        &self,
        session: &mut Session,
        path: &DataPath,
        direction: sysrepo_yang::MoveDirection,
    ) -> Result<(), SrError> {
        let module = Self::module_name_of(path)?;
        self.access.check(&session.user, &module, session.datastore, AccessMode::ReadWrite)?;
        let overlay = self.ensure_overlay(session, &module)?;
        self.schema.with_module(&module, |schema| sysrepo_yang::move_list(schema, &mut overlay.tree, path, direction))??;
        overlay.modified = true;
        session.operation_log.push(LogEntry {
            kind: OpKind::Move(direction),
            path: path.as_str().to_string(),
            value: None,
            flags: EditFlags::default(),
        });
        Ok(())
    }

    /// `session_refresh` (§4.3 `get_data_info` refresh path, §4.4, §8
    /// scenario 4): for each overlay whose backing file has moved on since
    /// it was forked, check whether any path the session itself edited was
    /// *also* touched by the concurrent writer. A touched-and-changed path
    /// is a conflict — returned as `INTERNAL` with that path, and the
    /// overlay is left untouched so the session's edits survive for a later
    /// `commit` (which re-validates against the latest base anyway).
    /// Overlays with no such conflict are transparently rebased onto the
    /// new file contents, replaying the session's log on top.
    pub fn session_refresh(&self, session: &mut Session) -> Result<(), SrError> {
        let modules: Vec<String> = session.overlays.keys().cloned().collect();
        for module in modules {
            let current_ts = source_timestamp(&self.data_dir, &module, session.datastore);
            let needs_refresh = {
                let overlay = &session.overlays[&module];
                current_ts != overlay.source_timestamp
            };
            if !needs_refresh {
                continue;
            }
            let new_base = self.load_base(&module, session.datastore)?;
            let touched_paths: Vec<String> = session
                .operation_log
                .entries()
                .iter()
                .filter(|e| {
                    sysrepo_core::DataPath::new(e.path.clone()).module_name().map(str::to_string).as_deref()
                        == Some(module.as_str())
                })
                .map(|e| e.path.clone())
                .collect();

            for path in &touched_paths {
                let dp = sysrepo_core::DataPath::new(path.clone());
                let overlay = &session.overlays[&module];
                let old_value = self
                    .schema
                    .with_module(&module, |s| sysrepo_yang::get_item(s, &overlay.original_base, &dp))??
                    .map(|id| overlay.original_base.node(id).value.clone());
                let new_value = self
                    .schema
                    .with_module(&module, |s| sysrepo_yang::get_item(s, &new_base, &dp))??
                    .map(|id| new_base.node(id).value.clone());
                if old_value != new_value {
                    return Err(SrError::with_path(
                        ErrorCode::Internal,
                        "concurrent commit changed a path this session has edited",
                        path.clone(),
                    ));
                }
            }

            let mut tree = new_base.clone();
            self.schema.with_module(&module, |schema| {
                for entry in session.operation_log.entries().iter().filter(|e| {
                    sysrepo_core::DataPath::new(e.path.clone()).module_name().map(str::to_string).as_deref()
                        == Some(module.as_str())
                }) {
                    replay_entry(schema, &mut tree, entry)?;
                }
                Ok::<(), SrError>(())
            })??;

            let overlay = session.overlays.get_mut(&module).expect("checked above");
            overlay.tree = tree;
            overlay.original_base = new_base;
            overlay.source_timestamp = current_ts;
        }
        Ok(())
    }

    /// `module_install` (§4.6): extends the schema context and re-applies
    /// any previously persisted enabled-feature set for this module name
    /// (so re-installing a module after a restart doesn't silently reset
    /// feature toggles), then emits a `module_install` notification.
    pub fn module_install(&self, module: sysrepo_yang::Module) -> Result<Vec<NotificationRecord>, SrError> {
        let name = module.name.clone();
        self.schema.install_module(module);

        let persisted = sysrepo_storage::read_persist(&self.data_dir, &name)?;
        for feature in &persisted.enabled_features {
            let _ = self.schema.set_feature(&name, feature, true);
        }

        let mut processor = self.notifications.write();
        Ok(processor.dispatch(&name, EventKind::ModuleInstall, None))
    }

    /// `feature_enable` (§4.6): toggles the feature in the live schema
    /// context and persists the new enabled-feature set so it survives a
    /// restart (§6 "durable subscriptions and enabled-feature set").
    pub fn feature_enable(&self, module: &str, feature: &str, on: bool) -> Result<Vec<NotificationRecord>, SrError> {
        self.schema.set_feature(module, feature, on)?;

        let mut doc = sysrepo_storage::read_persist(&self.data_dir, module)?;
        if on {
            if !doc.enabled_features.iter().any(|f| f == feature) {
                doc.enabled_features.push(feature.to_string());
            }
        } else {
            doc.enabled_features.retain(|f| f != feature);
        }
        sysrepo_storage::write_persist(&self.data_dir, module, &doc)?;

        let mut processor = self.notifications.write();
        Ok(processor.dispatch(module, EventKind::FeatureEnable, None))
    }

    /// `*_subscribe` (§4.6, §4.7): registers the subscription in memory and,
    /// for `ModuleChange` events, persists it under the module's `.persist`
    /// file so it survives an engine restart (§8 "Subscription durability").
    pub fn subscribe(
        &self,
        module: &str,
        event: EventKind,
        destination: crate::notification::Destination,
        path: Option<String>,
    ) -> Result<sysrepo_core::SubscriptionId, SrError> {
        if !self.schema.is_installed(module) {
            return Err(SrError::with_message(ErrorCode::UnknownModel, module.to_string()));
        }
        let id = self.notifications.write().subscribe(module, event, destination.clone());
        if event == EventKind::ModuleChange {
            let mut doc = sysrepo_storage::read_persist(&self.data_dir, module)?;
            let already = doc
                .subscriptions
                .iter()
                .any(|s| s.destination_address == destination.address && s.destination_id == destination.id);
            if !already {
                doc.subscriptions.push(sysrepo_storage::PersistedSubscription {
                    destination_address: destination.address,
                    destination_id: destination.id,
                    path,
                });
                sysrepo_storage::write_persist(&self.data_dir, module, &doc)?;
            }
        }
        Ok(id)
    }

    /// `unsubscribe` (§4.6): removes the in-memory registration and, if it
    /// was a persisted module-change subscription, its on-disk record too.
    pub fn unsubscribe(&self, subscription: sysrepo_core::SubscriptionId) -> Result<(), SrError> {
        let info = self.notifications.read().describe(subscription);
        self.notifications.write().unsubscribe(subscription);
        if let Some((module, EventKind::ModuleChange, destination)) = info {
            let mut doc = sysrepo_storage::read_persist(&self.data_dir, &module)?;
            doc.subscriptions
                .retain(|s| !(s.destination_address == destination.address && s.destination_id == destination.id));
            sysrepo_storage::write_persist(&self.data_dir, &module, &doc)?;
        }
        Ok(())
    }

    pub fn validate(&self, session: &mut Session, module: &str) -> Result<Vec<SrError>, SrError> {
        let overlay = self.ensure_overlay(session, module)?;
        self.schema.with_module(module, |schema| sysrepo_yang::validate(schema, &overlay.tree))
    }

    pub fn discard_changes(&self, session: &mut Session) {
        session.discard_changes();
    }

    pub fn lock_module(&self, session: &Session, module: &str) -> Result<(), SrError> {
        self.locks.lock_module(session.id, module, self.schema.is_installed(module))
    }

    pub fn unlock_module(&self, session: &Session, module: &str) -> Result<(), SrError> {
        self.locks.unlock_module(session.id, module)
    }

    pub fn lock_datastore(&self, session: &Session) -> Result<(), SrError> {
        self.locks.lock_datastore(session.id)
    }

    pub fn unlock_datastore(&self, session: &Session) -> Result<(), SrError> {
        self.locks.unlock_datastore(session.id)
    }

    pub fn session_ended(&self, session_id: sysrepo_core::SessionId) {
        self.locks.release_all(session_id);
    }

    /// The two-phase commit protocol (§4.5): local validation, commit guard,
    /// per-module file locks, refresh base, replay the operation log,
    /// re-validate, write, publish. Returns the module-change notifications
    /// ready for the Connection Manager to dispatch.
    pub fn commit(&self, session: &mut Session) -> Result<Vec<NotificationRecord>, SrError> {
        let modules: Vec<String> = session.overlays.keys().cloned().collect();
        if modules.is_empty() {
            return Ok(Vec::new());
        }

        // Step 1: local validation against each overlay as the session sees it.
        for module in &modules {
            let errors = self.schema.with_module(module, |schema| {
                let overlay = &session.overlays[module];
                sysrepo_yang::validate(schema, &overlay.tree)
            })?;
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
        }

        // Step 2: commit guard, process-wide.
        let _guard = self.commit_guard.lock().expect("commit guard mutex poisoned");

        for module in &modules {
            if self.locks.is_blocked_for(session.id, module) {
                return Err(SrError::with_path(ErrorCode::Locked, "module is locked by another session", module.clone()));
            }
        }

        // Step 3: per-module file locks, held across refresh + write.
        let mut file_locks = Vec::with_capacity(modules.len());
        for module in &modules {
            let (guard, path) = sysrepo_storage::lock_datastore(&self.data_dir, module, session.datastore)?;
            file_locks.push((module.clone(), guard, path));
        }

        // Step 4: refresh base, step 5: replay this session's log onto it.
        let mut refreshed = Vec::with_capacity(modules.len());
        for module in &modules {
            let records = sysrepo_storage::read_datastore(&self.data_dir, module, session.datastore)?;
            let mut tree = self.schema.with_module(module, |schema| records_to_tree(schema, module, &records))??;
            self.schema.with_module(module, |schema| {
                for entry in session.operation_log.entries().iter().filter(|e| {
                    DataPath::new(e.path.clone()).module_name().map(str::to_string).as_deref() == Some(module.as_str())
                }) {
                    replay_entry(schema, &mut tree, entry)?;
                }
                Ok::<(), SrError>(())
            })??;
            refreshed.push((module.clone(), tree));
        }

        // Step 6: re-validate the refreshed-and-replayed trees.
        for (module, tree) in &refreshed {
            let errors = self.schema.with_module(module, |schema| sysrepo_yang::validate(schema, tree))?;
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
        }

        // Step 7: write.
        for ((_, tree), (_, guard, _)) in refreshed.iter().zip(file_locks.iter_mut()) {
            let records = tree_to_records(tree);
            sysrepo_storage::write_locked(guard, &records)?;
        }

        // Step 8: publish. Locks release as `file_locks` drops; emit
        // module-change notifications and discard the session's overlays.
        let mut notifications = Vec::new();
        {
            let mut processor = self.notifications.write();
            for module in &modules {
                notifications.extend(processor.dispatch(module, EventKind::ModuleChange, None));
            }
        }
        drop(file_locks);
        session.discard_changes();
        Ok(notifications)
    }
}

/// Reload every module's durable module-change subscriptions from its
/// `.persist` file at engine startup (§8 "Subscription durability": after a
/// restart the next commit touching the module must still notify the
/// subscriber). Scans `data_dir` for `*.persist` files rather than
/// depending on the schema context, since modules are installed after the
/// Data Manager is constructed.
fn restore_persisted_subscriptions(data_dir: &std::path::Path, notifications: &mut NotificationProcessor) {
    let Ok(entries) = std::fs::read_dir(data_dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some(module) = file_name.strip_suffix(".persist") else { continue };
        let Ok(doc) = sysrepo_storage::read_persist(data_dir, module) else { continue };
        for sub in doc.subscriptions {
            notifications.subscribe(
                module,
                EventKind::ModuleChange,
                crate::notification::Destination { address: sub.destination_address, id: sub.destination_id },
            );
        }
    }
}

fn replay_entry(module: &Module, tree: &mut sysrepo_yang::DataTree, entry: &LogEntry) -> Result<(), SrError> {
    let path = DataPath::new(entry.path.clone());
    match &entry.kind {
        OpKind::Set => {
            sysrepo_yang::set_item(module, tree, &path, entry.value.clone(), entry.flags)?;
        }
        OpKind::Delete => {
            sysrepo_yang::delete_item(module, tree, &path, entry.flags)?;
        }
        OpKind::Move(direction) => {
            sysrepo_yang::move_list(module, tree, &path, *direction)?;
        }
    }
    Ok(())
}

fn source_timestamp(data_dir: &std::path::Path, module: &str, datastore: Datastore) -> u64 {
    let path = sysrepo_storage::datastore_path(data_dir, module, datastore);
    std::fs::metadata(&path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whether `name` is one of `parent`'s list-instance keys, recorded on the
/// instance node itself (set when the instance was created). Key leaves are
/// never persisted as their own record — they're reconstructed from the
/// instance path's predicates on reload.
fn is_key_leaf_of(parent: &sysrepo_yang::TreeNode, name: &str) -> bool {
    parent.keys.iter().any(|(k, _)| k == name)
}

fn tree_to_records(tree: &sysrepo_yang::DataTree) -> Vec<sysrepo_storage::PersistedNode> {
    let root = tree.root();
    let mut out = Vec::new();
    for (chain, node) in tree.walk(root) {
        if chain.len() < 2 {
            continue;
        }
        let parent = tree.node(chain[chain.len() - 2]);
        if is_key_leaf_of(parent, &node.name) {
            continue;
        }
        out.push(sysrepo_storage::PersistedNode { path: path_of(tree, &chain), value: node.value.clone() });
    }
    out
}

fn path_of(tree: &sysrepo_yang::DataTree, chain: &[sysrepo_yang::NodeId]) -> String {
    let mut out = String::new();
    for (i, &id) in chain.iter().enumerate().skip(1) {
        let node = tree.node(id);
        out.push('/');
        if i == 1 {
            out.push_str(&tree.module);
            out.push(':');
        }
        out.push_str(&node.name);
        for (k, v) in &node.keys {
            out.push_str(&format!("[{k}='{v}']"));
        }
    }
    out
}

fn records_to_tree(
    module: &Module,
    module_name: &str,
    records: &[sysrepo_storage::PersistedNode],
) -> Result<sysrepo_yang::DataTree, SrError> {
    let mut tree = sysrepo_yang::DataTree::new(module_name);
    for record in records {
        let path = DataPath::new(record.path.clone());
        sysrepo_yang::set_item(module, &mut tree, &path, Some(record.value.clone()), EditFlags::default())?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysrepo_core::{EffectiveUser, UserId, Value};
    use sysrepo_yang::{Module as YModule, SchemaNode, TypeSpec};

    fn install_test_module(schema: &SchemaContext) {
        let location = SchemaNode::container(
            "location",
            [
                SchemaNode::leaf("name", TypeSpec::String, true),
                SchemaNode::leaf("latitude", TypeSpec::Decimal64 { fraction_digits: 4 }, false),
            ],
        );
        let user = SchemaNode::list(
            "user",
            vec!["name".into()],
            true,
            [SchemaNode::leaf("name", TypeSpec::String, true), SchemaNode::leaf("type", TypeSpec::String, false)],
        );
        let mut nodes = indexmap::IndexMap::new();
        nodes.insert("location".to_string(), location);
        nodes.insert("user".to_string(), user);
        schema.install_module(YModule {
            name: "test-module".into(),
            namespace: "urn:test-module".into(),
            prefix: "t".into(),
            revision: None,
            submodules: Vec::new(),
            yang_path: None,
            yin_path: None,
            nodes,
            features: indexmap::IndexMap::new(),
        });
    }

    fn test_session() -> Session {
        let mut manager = crate::session::SessionManager::new();
        let id = manager
            .session_create(sysrepo_core::ConnectionId(1), UserId::ROOT, UserId::ROOT, Datastore::Running)
            .unwrap();
        manager.session_drop(id).unwrap()
    }

    #[test]
    fn set_then_commit_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());
        let mut session = test_session();

        dm.set_item(
            &mut session,
            &DataPath::new("/test-module:location/name"),
            Some(Value::String("Brno".into())),
            EditFlags::default(),
        )
        .unwrap();
        dm.set_item(
            &mut session,
            &DataPath::new("/test-module:location/latitude"),
            Some(Value::Decimal64 { mantissa: 49_19, scale: 2 }),
            EditFlags::default(),
        )
        .unwrap();
        dm.commit(&mut session).unwrap();
        assert!(session.overlays.is_empty());

        let mut second = test_session();
        let item = dm.get_item(&mut second, &DataPath::new("/test-module:location/name")).unwrap().unwrap();
        assert_eq!(item.value, Value::String("Brno".into()));
    }

    #[test]
    fn commit_fails_validation_when_mandatory_leaf_missing() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());
        let mut session = test_session();
        dm.set_item(
            &mut session,
            &DataPath::new("/test-module:user[name='A']"),
            None,
            EditFlags::default(),
        )
        .unwrap();
        // Create `location` (with its mandatory `name` set) so it's present,
        // then delete just `name` — the container survives but its mandatory
        // child doesn't, so commit's re-validation must fail.
        dm.set_item(&mut session, &DataPath::new("/test-module:location/name"), Some(Value::String("Banska Bystrica".into())), EditFlags::default()).unwrap();
        dm.delete_item(&mut session, &DataPath::new("/test-module:location/name"), EditFlags::default()).unwrap();
        dm.set_item(&mut session, &DataPath::new("/test-module:user[name='A']/type"), Some(Value::String("x".into())), EditFlags::default()).unwrap();
        let err = dm.commit(&mut session).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn refresh_conflict_replays_edits_onto_concurrent_writer_base() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());

        let mut writer_a = test_session();
        dm.set_item(&mut writer_a, &DataPath::new("/test-module:location/name"), Some(Value::String("A".into())), EditFlags::default()).unwrap();

        let mut writer_b = test_session();
        dm.set_item(&mut writer_b, &DataPath::new("/test-module:user[name='B']"), None, EditFlags::default()).unwrap();
        dm.set_item(&mut writer_b, &DataPath::new("/test-module:user[name='B']/type"), Some(Value::String("t".into())), EditFlags::default()).unwrap();

        dm.commit(&mut writer_a).unwrap();
        dm.commit(&mut writer_b).unwrap();

        let mut reader = test_session();
        assert!(dm.get_item(&mut reader, &DataPath::new("/test-module:location/name")).unwrap().is_some());
        assert!(dm.get_item(&mut reader, &DataPath::new("/test-module:user[name='B']")).unwrap().is_some());
    }

    #[test]
    fn session_refresh_detects_conflicting_concurrent_commit() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());

        let mut a = test_session();
        dm.set_item(&mut a, &DataPath::new("/test-module:user[name='X']"), None, EditFlags::default()).unwrap();
        dm.set_item(&mut a, &DataPath::new("/test-module:user[name='X']/type"), Some(Value::String("first".into())), EditFlags::default()).unwrap();

        let mut b = test_session();
        dm.set_item(&mut b, &DataPath::new("/test-module:user[name='X']"), None, EditFlags::default()).unwrap();
        dm.set_item(&mut b, &DataPath::new("/test-module:user[name='X']/type"), Some(Value::String("second".into())), EditFlags::default()).unwrap();
        dm.commit(&mut b).unwrap();

        let err = dm.session_refresh(&mut a).unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
        // A's edits were not discarded by the failed refresh.
        assert!(!a.operation_log.is_empty());
        // A's subsequent commit succeeds, overwriting with A's own value.
        dm.commit(&mut a).unwrap();
    }

    #[test]
    fn session_refresh_is_a_noop_when_base_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());
        let mut session = test_session();
        dm.set_item(&mut session, &DataPath::new("/test-module:location/name"), Some(Value::String("Kosice".into())), EditFlags::default()).unwrap();
        dm.session_refresh(&mut session).unwrap();
        assert_eq!(
            dm.get_item(&mut session, &DataPath::new("/test-module:location/name")).unwrap().unwrap().value,
            Value::String("Kosice".into())
        );
    }

    #[test]
    fn module_change_subscription_survives_data_manager_restart() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        install_test_module(&schema);
        let dm = DataManager::new(schema, dir.path());
        dm.subscribe(
            "test-module",
            EventKind::ModuleChange,
            crate::notification::Destination { address: "unix:/tmp/sub.sock".into(), id: 1 },
            None,
        )
        .unwrap();

        // Simulate an engine restart: a fresh DataManager over the same data_dir.
        let schema2 = SchemaContext::new();
        install_test_module(&schema2);
        let dm2 = DataManager::new(schema2, dir.path());
        let mut session = test_session();
        dm2.set_item(&mut session, &DataPath::new("/test-module:location/name"), Some(Value::String("Zilina".into())), EditFlags::default()).unwrap();
        dm2.set_item(&mut session, &DataPath::new("/test-module:location/latitude"), Some(Value::Decimal64 { mantissa: 1, scale: 4 }), EditFlags::default()).unwrap();
        let notifications = dm2.commit(&mut session).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].destination.address, "unix:/tmp/sub.sock");
    }

    #[test]
    fn feature_enable_persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaContext::new();
        let mut module = sysrepo_yang::Module {
            name: "test-module".into(),
            namespace: "urn:test-module".into(),
            prefix: "t".into(),
            revision: None,
            submodules: Vec::new(),
            yang_path: None,
            yin_path: None,
            nodes: indexmap::IndexMap::new(),
            features: indexmap::IndexMap::new(),
        };
        module.features.insert("extended".to_string(), false);
        schema.install_module(module.clone());
        let dm = DataManager::new(schema, dir.path());
        dm.feature_enable("test-module", "extended", true).unwrap();

        let schema2 = SchemaContext::new();
        let dm2 = DataManager::new(schema2, dir.path());
        dm2.module_install(module).unwrap();
        assert!(dm2.schema().with_module("test-module", |m| *m.features.get("extended").unwrap()).unwrap());
    }
}
