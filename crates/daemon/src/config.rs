// SPDX-License-Identifier: MIT

//! Daemon configuration, resolved from `SR_`-prefixed environment variables
//! (SPEC_FULL.md AMBIENT STACK), mirroring the teacher's `env.rs`/
//! `lifecycle::Config::load` one-for-one.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon configuration: every path it touches, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (`SR_STATE_DIR`, default `~/.local/state/sysrepo`).
    pub state_dir: PathBuf,
    /// Directory holding per-module datastore and `.persist` files.
    pub data_dir: PathBuf,
    /// Directory of `{module}.json` schema descriptions consulted by
    /// `module_install` (`SR_SCHEMA_DIR`, default `state_dir/schema`).
    pub schema_dir: PathBuf,
    /// Unix socket the Connection Manager binds to.
    pub socket_path: PathBuf,
    /// Exclusive pidfile lock path — one daemon instance per state dir.
    pub lock_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        Ok(Self {
            data_dir: state_dir.join("data"),
            schema_dir: schema_dir(&state_dir),
            socket_path: state_dir.join("sysrepo.sock"),
            lock_path: state_dir.join("sysrepo.pid"),
            state_dir,
        })
    }
}

/// `SR_STATE_DIR` > `XDG_STATE_HOME/sysrepo` > `~/.local/state/sysrepo`.
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SR_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("sysrepo"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/sysrepo"))
}

fn schema_dir(state_dir: &std::path::Path) -> PathBuf {
    std::env::var("SR_SCHEMA_DIR").map(PathBuf::from).unwrap_or_else(|_| state_dir.join("schema"))
}

/// Per-request IPC read/write timeout (`SR_IPC_TIMEOUT_MS`, default 5s).
pub fn ipc_timeout() -> Duration {
    std::env::var("SR_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Whether the Connection Manager should accept only peers whose uid
/// matches the daemon's own effective uid (§4.1 "embedded/local mode").
/// Disabled only for integration tests that connect as a different uid
/// than the daemon runs as (`SR_ALLOW_ANY_PEER_UID=1`).
pub fn local_uid_only() -> bool {
    std::env::var("SR_ALLOW_ANY_PEER_UID").ok().as_deref() != Some("1")
}
