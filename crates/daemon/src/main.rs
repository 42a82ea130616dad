// SPDX-License-Identifier: MIT

//! `sysrepod`: the sysrepo Connection Manager daemon binary.
//!
//! Mirrors the teacher's process-lifecycle discipline (pidfile lock before
//! anything else, bind the socket last, SIGTERM/SIGINT stop the event loop
//! cleanly) but the event loop itself is this crate's own listener, not the
//! teacher's job-runner reconciliation loop.

use std::process::ExitCode;
use std::sync::Arc;

use sysrepo_daemon::dispatch::Dispatcher;
use sysrepo_daemon::{lifecycle, Config, Listener};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve configuration");
            return ExitCode::FAILURE;
        }
    };

    let startup = match lifecycle::startup(config.clone()).await {
        Ok(startup) => startup,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&startup.engine), config.schema_dir.clone()));
    let listener = Listener::new(startup.listener, dispatcher);

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    listener.run(shutdown).await;
    signal_task.abort();

    lifecycle::shutdown(&config);
    ExitCode::SUCCESS
}

/// Wait for SIGTERM or SIGINT, then cancel the listener's accept loop.
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    use nix::sys::signal::Signal;
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::from_raw(Signal::SIGTERM as i32)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut int = match signal(SignalKind::from_raw(Signal::SIGINT as i32)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = term.recv() => tracing::info!("received SIGTERM"),
        _ = int.recv() => tracing::info!("received SIGINT"),
    }
    shutdown.cancel();
}
