// SPDX-License-Identifier: MIT

//! The top-level engine handle (Design Notes §9: "encapsulated in an engine
//! handle created at init and threaded through all calls; no free-standing
//! singletons"). Wires the schema context, Data Manager, and Session
//! Manager together; this is the one type the daemon's Request Processor
//! holds on to.

use std::path::PathBuf;

use sysrepo_core::{ConnectionId, Datastore, SessionId, SrError, UserId};
use sysrepo_yang::SchemaContext;

use crate::data_manager::DataManager;
use crate::notification::NotificationRecord;
use crate::session::{Session, SessionManager};

/// Construction-time settings threaded down from the daemon's `Config`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
}

pub struct Engine {
    data_manager: DataManager,
    sessions: parking_lot::RwLock<SessionManager>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            data_manager: DataManager::new(SchemaContext::new(), config.data_dir),
            sessions: parking_lot::RwLock::new(SessionManager::new()),
        }
    }

    pub fn schema(&self) -> &SchemaContext {
        self.data_manager.schema()
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data_manager
    }

    /// §4.2 `session_create`: validates the real/effective user pair before
    /// allocating a session id.
    pub fn session_create(
        &self,
        connection: ConnectionId,
        real: UserId,
        effective: UserId,
        datastore: Datastore,
    ) -> Result<SessionId, SrError> {
        self.sessions
            .write()
            .session_create(connection, real, effective, datastore)
            .map_err(|e| SrError::with_message(sysrepo_core::ErrorCode::Unauthorized, e.to_string()))
    }

    /// §4.2 `session_drop`: releases the session's locks before removing it
    /// from the table. Uncommitted edits are discarded with the session.
    pub fn session_drop(&self, session: SessionId) {
        self.sessions.write().session_drop(session);
        self.data_manager.session_ended(session);
    }

    /// Drop every session belonging to `connection` (peer disconnect).
    pub fn connection_closed(&self, connection: ConnectionId) {
        let ids: Vec<SessionId> = self.sessions.read().sessions_for_connection(connection).collect();
        for id in ids {
            self.session_drop(id);
        }
        self.data_manager
            .notifications()
            .write()
            .purge_destination(&crate::notification::Destination { address: connection_address(connection), id: 0 });
    }

    pub fn with_session<R>(&self, session: SessionId, f: impl FnOnce(&DataManager, &mut Session) -> R) -> Result<R, SrError> {
        let mut sessions = self.sessions.write();
        let session_ref = sessions
            .get_mut(session)
            .ok_or_else(|| SrError::with_message(sysrepo_core::ErrorCode::NotFound, "unknown session"))?;
        Ok(f(&self.data_manager, session_ref))
    }

    pub fn commit(&self, session: SessionId) -> Result<Vec<NotificationRecord>, SrError> {
        self.with_session(session, |dm, s| dm.commit(s))?
    }

    pub fn session_refresh(&self, session: SessionId) -> Result<(), SrError> {
        self.with_session(session, |dm, s| dm.session_refresh(s))?
    }

    /// `module_install`/`feature_enable`/`*_subscribe`/`unsubscribe` act on
    /// engine-wide state (the schema context, the notification processor)
    /// rather than a session's overlay, but still require the calling
    /// session to exist — a dropped or unknown session cannot issue them.
    pub fn module_install(&self, session: SessionId, module: sysrepo_yang::Module) -> Result<Vec<NotificationRecord>, SrError> {
        self.require_session(session)?;
        self.data_manager.module_install(module)
    }

    pub fn feature_enable(&self, session: SessionId, module: &str, feature: &str, on: bool) -> Result<Vec<NotificationRecord>, SrError> {
        self.require_session(session)?;
        self.data_manager.feature_enable(module, feature, on)
    }

    pub fn subscribe(
        &self,
        session: SessionId,
        module: &str,
        event: crate::notification::EventKind,
        destination: crate::notification::Destination,
        path: Option<String>,
    ) -> Result<sysrepo_core::SubscriptionId, SrError> {
        self.require_session(session)?;
        self.data_manager.subscribe(module, event, destination, path)
    }

    pub fn unsubscribe(&self, session: SessionId, subscription: sysrepo_core::SubscriptionId) -> Result<(), SrError> {
        self.require_session(session)?;
        self.data_manager.unsubscribe(subscription)
    }

    fn require_session(&self, session: SessionId) -> Result<(), SrError> {
        if self.sessions.read().get(session).is_some() {
            Ok(())
        } else {
            Err(SrError::with_message(sysrepo_core::ErrorCode::NotFound, "unknown session"))
        }
    }
}

/// The `connection:{id}` destination-address form the Connection Manager
/// assigns a connection's own subscriptions (`sysrepo_daemon::listener::destination_for`).
/// Subscriptions made against an externally-addressed destination (e.g. a
/// separate subscriber socket) are untouched by a connection closing — only
/// subscriptions that named this connection itself as their destination are
/// purged here.
fn connection_address(connection: ConnectionId) -> String {
    format!("connection:{}", connection.0)
}
