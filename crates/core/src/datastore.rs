// SPDX-License-Identifier: MIT

//! The three datastore kinds a session can target (§3, §4.3).

use serde::{Deserialize, Serialize};

/// Which datastore an operation addresses. `Candidate` is optional per
/// module (§4.3 "candidate datastore support is a per-module capability")
/// but the enum itself is unconditional — the engine rejects candidate
/// operations against modules that don't support it at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datastore {
    Startup,
    Running,
    Candidate,
    /// Non-persistent, session-local key/value scratch space (§4.3 operational
    /// data caveat) — values here never reach the Persistence Store.
    Operational,
}

crate::simple_display! {
    Datastore {
        Startup => "startup",
        Running => "running",
        Candidate => "candidate",
        Operational => "operational",
    }
}

impl Datastore {
    /// Whether this datastore kind is ever written to the Persistence Store.
    /// `Operational` data is held only in the per-session overlay.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Datastore::Operational)
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            Datastore::Startup => "startup",
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Operational => "operational",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_is_not_persisted() {
        assert!(!Datastore::Operational.is_persisted());
        assert!(Datastore::Running.is_persisted());
    }

    #[test]
    fn display_matches_lowercase_wire_name() {
        assert_eq!(Datastore::Candidate.to_string(), "candidate");
    }
}
