// SPDX-License-Identifier: MIT

//! Daemon startup and shutdown (§6), modelled on the teacher's
//! `lifecycle::startup`: acquire the pidfile lock before touching anything
//! else, write the pid, load the engine, bind the socket last.

use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use fs2::FileExt;
use sysrepo_engine::{Engine, EngineConfig};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire pidfile lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything `main` needs to run the event loop.
pub struct StartupResult {
    pub config: Config,
    pub engine: Arc<Engine>,
    pub listener: UnixListener,
    // Held only to keep the exclusive pidfile lock alive; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config.clone()).await {
        Ok(result) => Ok(result),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.schema_dir)?;

    // Acquire the lock before anything else so a second `sysrepod` fails fast
    // rather than racing the first one for the socket.
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    let engine = Arc::new(Engine::new(EngineConfig { data_dir: config.data_dir.clone() }));

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(socket = %config.socket_path.display(), "sysrepod started");
    Ok(StartupResult { config, engine, listener, lock_file })
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Graceful shutdown (§6): remove the socket and pidfile. The lock itself
/// releases when `StartupResult::lock_file` drops.
pub fn shutdown(config: &Config) {
    info!("sysrepod shutting down");
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}
