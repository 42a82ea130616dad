// SPDX-License-Identifier: MIT

//! Real / effective user identity used by session creation and access
//! control (§4.2 "session_create", §4.8 "Access Control").

use serde::{Deserialize, Serialize};

/// Unix uid/gid pair carried by a connection's peer credentials
/// (`SO_PEERCRED`) and by a session's real/effective user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId {
    pub uid: u32,
    pub gid: u32,
}

impl UserId {
    pub const ROOT: UserId = UserId { uid: 0, gid: 0 };

    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// uid 0 may assume any effective user (§4.2).
    pub fn is_privileged(&self) -> bool {
        self.uid == 0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Checked at `session_create`: the connection's real peer identity, and the
/// effective identity operations should be authorized against. Equal for
/// ordinary peers; may diverge only when `real` is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveUser {
    pub real: UserId,
    pub effective: UserId,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("peer {real} is not privileged and cannot assume effective user {effective}")]
pub struct AssumeIdentityError {
    pub real: UserId,
    pub effective: UserId,
}

impl EffectiveUser {
    /// Validate the (real, effective) pair per §4.2: effective must equal
    /// real unless real is privileged.
    pub fn new(real: UserId, effective: UserId) -> Result<Self, AssumeIdentityError> {
        if real == effective || real.is_privileged() {
            Ok(Self { real, effective })
        } else {
            Err(AssumeIdentityError { real, effective })
        }
    }

    pub fn same(user: UserId) -> Self {
        Self { real: user, effective: user }
    }
}

/// Access mode requested when the access controller is consulted (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_privileged_peer_cannot_assume_other_identity() {
        let real = UserId::new(1000, 1000);
        let other = UserId::new(1001, 1001);
        assert!(EffectiveUser::new(real, other).is_err());
        assert!(EffectiveUser::new(real, real).is_ok());
    }

    #[test]
    fn root_peer_may_assume_any_identity() {
        let root = UserId::ROOT;
        let other = UserId::new(1001, 1001);
        assert!(EffectiveUser::new(root, other).is_ok());
    }
}
