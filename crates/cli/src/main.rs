// SPDX-License-Identifier: MIT

//! `sysrepoctl`: a thin client for `sysrepod`, mirroring the teacher's
//! `DaemonClient`/`commands::*` split (`oj`'s `client_queries.rs` +
//! `commands/status.rs`) but talking the sysrepo wire protocol instead.
//!
//! One session is opened per invocation, the requested operation is run,
//! and `session_stop` is sent before exit — a CLI has no business holding a
//! long-lived session across invocations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sysrepo_core::{EditFlags, SessionId, Value};
use sysrepo_wire::{
    MoveDirection, ProtocolMessage, Request, RequestOp, Response, ResponseOp, SchemaFormat, WireDatastore,
};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "sysrepoctl", version, about = "Inspect and edit the sysrepo datastore")]
struct Cli {
    /// Path to the daemon's Unix socket (default `$SR_STATE_DIR/sysrepo.sock`
    /// or `~/.local/state/sysrepo/sysrepo.sock`).
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Datastore the session edits against.
    #[arg(long, global = true, value_enum, default_value = "running")]
    datastore: DatastoreArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DatastoreArg {
    Startup,
    Running,
    Candidate,
}

impl From<DatastoreArg> for WireDatastore {
    fn from(d: DatastoreArg) -> Self {
        match d {
            DatastoreArg::Startup => WireDatastore::Startup,
            DatastoreArg::Running => WireDatastore::Running,
            DatastoreArg::Candidate => WireDatastore::Candidate,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List installed schema modules.
    ListSchemas,
    /// Print a module's serialised schema.
    GetSchema {
        module: String,
        #[arg(long, value_enum, default_value = "yang")]
        format: SchemaFormatArg,
    },
    /// Read a single node.
    Get { path: String },
    /// Read every node matching a path.
    GetAll { path: String },
    /// Set a leaf/leaf-list/presence node, then commit.
    Set {
        path: String,
        value: String,
        /// The node's schema type, e.g. STRING, UINT32, BOOL, DECIMAL64.
        #[arg(long, default_value = "STRING")]
        kind: String,
        /// fraction-digits, only meaningful for DECIMAL64.
        #[arg(long, default_value_t = 0)]
        scale: u8,
        /// Fail instead of overwrite if the node already exists.
        #[arg(long)]
        strict: bool,
    },
    /// Delete every node matching a path, then commit.
    Delete {
        path: String,
        #[arg(long)]
        strict: bool,
    },
    /// Reorder a user-ordered list entry, then commit.
    Move {
        path: String,
        #[arg(value_enum)]
        direction: MoveArg,
    },
    /// Validate pending edits without committing.
    Validate,
    /// Commit pending edits.
    Commit,
    /// Discard pending edits.
    DiscardChanges,
    Lock {
        /// Lock a single module instead of the whole datastore.
        module: Option<String>,
    },
    Unlock {
        module: Option<String>,
    },
    /// Install a module from `{schema_dir}/{module}.json` on the daemon.
    ModuleInstall {
        module: String,
        #[arg(long)]
        revision: Option<String>,
    },
    FeatureEnable {
        module: String,
        feature: String,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SchemaFormatArg {
    Yang,
    Yin,
}

impl From<SchemaFormatArg> for SchemaFormat {
    fn from(f: SchemaFormatArg) -> Self {
        match f {
            SchemaFormatArg::Yang => SchemaFormat::Yang,
            SchemaFormatArg::Yin => SchemaFormat::Yin,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum MoveArg {
    Up,
    Down,
    First,
    Last,
}

impl From<MoveArg> for MoveDirection {
    fn from(d: MoveArg) -> Self {
        match d {
            MoveArg::Up => MoveDirection::Up,
            MoveArg::Down => MoveDirection::Down,
            MoveArg::First => MoveDirection::First,
            MoveArg::Last => MoveDirection::Last,
        }
    }
}

/// A single-session connection to `sysrepod`, opened for the lifetime of
/// one `sysrepoctl` invocation.
struct Client {
    stream: UnixStream,
    session: SessionId,
}

impl Client {
    async fn connect(socket: &std::path::Path, datastore: WireDatastore) -> Result<Self> {
        let mut stream = UnixStream::connect(socket)
            .await
            .with_context(|| format!("connecting to {}", socket.display()))?;
        let reply = send_raw(
            &mut stream,
            &Request { session_id: SessionId::NONE, op: RequestOp::SessionStart { datastore, effective_uid: None, effective_gid: None } },
        )
        .await?;
        let session = match reply.op {
            ResponseOp::SessionStarted { session_id } => session_id,
            ResponseOp::Error { error } => bail!("session_start failed: {error:?}"),
            other => bail!("unexpected response to session_start: {other:?}"),
        };
        Ok(Self { stream, session })
    }

    async fn call(&mut self, op: RequestOp) -> Result<ResponseOp> {
        let reply = send_raw(&mut self.stream, &Request { session_id: self.session, op }).await?;
        Ok(reply.op)
    }

    async fn close(mut self) -> Result<()> {
        self.call(RequestOp::SessionStop).await?;
        Ok(())
    }
}

async fn send_raw(stream: &mut UnixStream, request: &Request) -> Result<Response> {
    let body = sysrepo_wire::encode(&ProtocolMessage::Request(request.clone()))?;
    sysrepo_wire::write_message(stream, &body).await?;
    let body = sysrepo_wire::read_message(stream).await?;
    match sysrepo_wire::decode(&body)? {
        ProtocolMessage::Response(r) => Ok(r),
        other => bail!("expected a response, got {other:?}"),
    }
}

fn default_socket() -> PathBuf {
    if let Ok(dir) = std::env::var("SR_STATE_DIR") {
        return PathBuf::from(dir).join("sysrepo.sock");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    PathBuf::from(home).join(".local/state/sysrepo/sysrepo.sock")
}

fn fail_on_error(op: ResponseOp) -> Result<ResponseOp> {
    if let ResponseOp::Error { error } = &op {
        let path = error.path.as_deref().unwrap_or("-");
        let message = error.message.as_deref().unwrap_or("");
        bail!("{} at {path}: {message}", error.code);
    }
    Ok(op)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let socket = cli.socket.clone().unwrap_or_else(default_socket);
    let mut client = Client::connect(&socket, cli.datastore.into()).await?;

    let result = run(&mut client, cli.command).await;
    // Always try to close the session cleanly, but surface the command's
    // own error first if there was one.
    let close_result = client.close().await;
    result?;
    close_result
}

async fn run(client: &mut Client, command: Command) -> Result<()> {
    match command {
        Command::ListSchemas => {
            let op = fail_on_error(client.call(RequestOp::ListSchemas).await?)?;
            match op {
                ResponseOp::Schemas { schemas } => {
                    for schema in schemas {
                        println!(
                            "{}\t{}\t{}",
                            schema.module,
                            schema.namespace,
                            schema.revision.as_deref().unwrap_or("-")
                        );
                    }
                }
                other => bail!("unexpected response: {other:?}"),
            }
        }

        Command::GetSchema { module, format } => {
            let op = fail_on_error(
                client
                    .call(RequestOp::GetSchema { module, revision: None, submodule: None, format: format.into() })
                    .await?,
            )?;
            match op {
                ResponseOp::Schema { text } => println!("{text}"),
                other => bail!("unexpected response: {other:?}"),
            }
        }

        Command::Get { path } => {
            let op = fail_on_error(client.call(RequestOp::GetItem { path }).await?)?;
            match op {
                ResponseOp::Item { value: Some(v) } => println!("{}\t{}\t{}", v.path, v.value.kind_name(), v.value),
                ResponseOp::Item { value: None } => println!("(no value)"),
                other => bail!("unexpected response: {other:?}"),
            }
        }

        Command::GetAll { path } => {
            let op = fail_on_error(client.call(RequestOp::GetItems { path }).await?)?;
            match op {
                ResponseOp::Items { values } => {
                    for v in values {
                        println!("{}\t{}\t{}", v.path, v.value.kind_name(), v.value);
                    }
                }
                other => bail!("unexpected response: {other:?}"),
            }
        }

        Command::Set { path, value, kind, scale, strict } => {
            let value = Value::parse_as(&kind, &value, scale).map_err(anyhow::Error::msg)?;
            let mut flags = EditFlags::empty();
            if strict {
                flags |= EditFlags::STRICT;
            }
            fail_on_error(client.call(RequestOp::SetItem { path, value: Some(value), flags }).await?)?;
            commit(client).await?;
        }

        Command::Delete { path, strict } => {
            let mut flags = EditFlags::empty();
            if strict {
                flags |= EditFlags::STRICT;
            }
            fail_on_error(client.call(RequestOp::DeleteItem { path, flags }).await?)?;
            commit(client).await?;
        }

        Command::Move { path, direction } => {
            fail_on_error(client.call(RequestOp::MoveItem { path, direction: direction.into() }).await?)?;
            commit(client).await?;
        }

        Command::Validate => {
            let op = fail_on_error(client.call(RequestOp::Validate).await?)?;
            match op {
                ResponseOp::Ok => println!("OK"),
                ResponseOp::Errors { errors } => {
                    for e in errors {
                        println!("{}\t{}", e.code, e.path.as_deref().unwrap_or("-"));
                    }
                    bail!("validation failed");
                }
                other => bail!("unexpected response: {other:?}"),
            }
        }

        Command::Commit => commit(client).await?,

        Command::DiscardChanges => {
            fail_on_error(client.call(RequestOp::DiscardChanges).await?)?;
        }

        Command::Lock { module } => {
            let op = match module {
                Some(module) => client.call(RequestOp::LockModule { module }).await?,
                None => client.call(RequestOp::LockDatastore).await?,
            };
            fail_on_error(op)?;
        }

        Command::Unlock { module } => {
            let op = match module {
                Some(module) => client.call(RequestOp::UnlockModule { module }).await?,
                None => client.call(RequestOp::UnlockDatastore).await?,
            };
            fail_on_error(op)?;
        }

        Command::ModuleInstall { module, revision } => {
            fail_on_error(client.call(RequestOp::ModuleInstall { module, revision }).await?)?;
        }

        Command::FeatureEnable { module, feature, off } => {
            fail_on_error(client.call(RequestOp::FeatureEnable { module, feature, on: !off }).await?)?;
        }
    }

    Ok(())
}

async fn commit(client: &mut Client) -> Result<()> {
    let op = fail_on_error(client.call(RequestOp::Commit).await?)?;
    match op {
        ResponseOp::Ok => Ok(()),
        ResponseOp::Errors { errors } => {
            for e in &errors {
                eprintln!("{}\t{}", e.code, e.path.as_deref().unwrap_or("-"));
            }
            bail!("commit failed");
        }
        other => bail!("unexpected response: {other:?}"),
    }
}
