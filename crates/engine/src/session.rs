// SPDX-License-Identifier: MIT

//! Session lifecycle and the per-session state the Data Manager mutates
//! (§3 "Session", §4.2 "session_create" / "session_drop").

use std::collections::HashMap;

use sysrepo_core::{ConnectionId, Datastore, EffectiveUser, ErrorList, SessionId, SessionIdGen, UserId};

use crate::oplog::OperationLog;
use crate::overlay::Overlay;

/// An established session: one client's view into one datastore, plus the
/// working-copy overlays and edit history it has accumulated since its last
/// commit or discard.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub connection: ConnectionId,
    pub user: EffectiveUser,
    pub datastore: Datastore,
    /// Per-module working copies, created lazily on first touch.
    pub overlays: HashMap<String, Overlay>,
    pub operation_log: OperationLog,
    pub last_errors: ErrorList,
}

impl Session {
    fn new(id: SessionId, connection: ConnectionId, user: EffectiveUser, datastore: Datastore) -> Self {
        Self {
            id,
            connection,
            user,
            datastore,
            overlays: HashMap::new(),
            operation_log: OperationLog::default(),
            last_errors: ErrorList::default(),
        }
    }

    pub fn discard_changes(&mut self) {
        self.overlays.clear();
        self.operation_log.clear();
    }
}

/// Owns the live session table. `session_create` validates the real/effective
/// user pair (§4.2) before allocating an id; `session_drop` removes the entry
/// — callers are responsible for releasing that session's locks and
/// subscriptions via the lock table and notification processor.
#[derive(Default)]
pub struct SessionManager {
    ids: SessionIdGen,
    sessions: HashMap<SessionId, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_create(
        &mut self,
        connection: ConnectionId,
        real: UserId,
        effective: UserId,
        datastore: Datastore,
    ) -> Result<SessionId, sysrepo_core::AssumeIdentityError> {
        let user = EffectiveUser::new(real, effective)?;
        let id = self.ids.next();
        self.sessions.insert(id, Session::new(id, connection, user, datastore));
        Ok(id)
    }

    pub fn session_drop(&mut self, session: SessionId) -> Option<Session> {
        self.sessions.remove(&session)
    }

    pub fn get(&self, session: SessionId) -> Option<&Session> {
        self.sessions.get(&session)
    }

    pub fn get_mut(&mut self, session: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&session)
    }

    pub fn sessions_for_connection(&self, connection: ConnectionId) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.values().filter(move |s| s.connection == connection).map(|s| s.id)
    }
}
