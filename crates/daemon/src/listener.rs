// SPDX-License-Identifier: MIT

//! The Connection Manager (§4.1): accepts connections on the Unix socket,
//! spawns one task pair per connection (reader/dispatcher + writer), and
//! routes asynchronously-generated notifications to the right connection.
//!
//! Modelled on the teacher's `listener::run_unix_only`/`handle_connection`:
//! accept in a loop, spawn a task per connection, race request handling
//! against client-disconnect detection via a `CancellationToken`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sysrepo_core::{ConnectionId, ConnectionIdGen, UserId};
use sysrepo_wire::{ProtocolMessage, Request};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::dispatch::Dispatcher;

/// A message destined for a connection's writer task: either the synchronous
/// reply to one of its own requests, or a notification routed to it as a
/// subscriber (§4.7).
pub enum OutboundMessage {
    Response(sysrepo_wire::Response),
    Notification(sysrepo_wire::Notification),
}

/// §9 Open Question: a bounded queue per connection caps how much a slow or
/// wedged subscriber can make the notification dispatcher buffer on its
/// behalf before the oldest pending notification is dropped.
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// Maps a live connection to the channel its writer task drains, so
/// `NotificationRecord`s produced by one connection's `commit` can be
/// delivered to whichever connection actually subscribed.
#[derive(Default)]
pub struct Registry {
    senders: Mutex<HashMap<ConnectionId, mpsc::Sender<OutboundMessage>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, connection: ConnectionId, sender: mpsc::Sender<OutboundMessage>) {
        self.senders.lock().insert(connection, sender);
    }

    fn remove(&self, connection: ConnectionId) {
        self.senders.lock().remove(&connection);
    }

    /// Route a notification to its destination, parsed back from
    /// `Destination::address` (the connection it named at subscribe time).
    /// A destination whose connection has since disconnected is silently
    /// dropped — the subscription itself is torn down by
    /// `Engine::connection_closed`.
    pub fn route(&self, record: &sysrepo_engine::NotificationRecord) {
        let Some(connection) = parse_connection_address(&record.destination.address) else {
            warn!(address = %record.destination.address, "notification destination is not a connection address");
            return;
        };
        let sender = self.senders.lock().get(&connection).cloned();
        let Some(sender) = sender else {
            debug!(?connection, "dropping notification for disconnected subscriber");
            return;
        };
        let notification = sysrepo_wire::Notification {
            session_id: sysrepo_core::SessionId::NONE,
            op: to_notification_op(record),
        };
        if sender.try_send(OutboundMessage::Notification(notification)).is_err() {
            warn!(?connection, "notification queue full or closed, dropping notification");
        }
    }
}

fn connection_address(connection: ConnectionId) -> String {
    format!("connection:{}", connection.0)
}

fn parse_connection_address(address: &str) -> Option<ConnectionId> {
    address.strip_prefix("connection:").and_then(|s| s.parse().ok()).map(ConnectionId)
}

fn to_notification_op(record: &sysrepo_engine::NotificationRecord) -> sysrepo_wire::NotificationOp {
    use sysrepo_engine::EventKind;
    match record.event {
        EventKind::ModuleInstall => sysrepo_wire::NotificationOp::ModuleInstalled { module: record.module.clone(), revision: None },
        EventKind::FeatureEnable => {
            sysrepo_wire::NotificationOp::FeatureChanged { module: record.module.clone(), feature: String::new(), on: true }
        }
        EventKind::ModuleChange => sysrepo_wire::NotificationOp::ModuleChanged { module: record.module.clone(), changes: Vec::new() },
        EventKind::Rpc => sysrepo_wire::NotificationOp::Unknown,
    }
}

/// The Connection Manager's accept loop.
pub struct Listener {
    unix: UnixListener,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<Registry>,
    connection_ids: Arc<ConnectionIdGen>,
}

impl Listener {
    pub fn new(unix: UnixListener, dispatcher: Arc<Dispatcher>) -> Self {
        Self { unix, dispatcher, registry: Arc::new(Registry::new()), connection_ids: Arc::new(ConnectionIdGen::new()) }
    }

    /// Run until `shutdown` fires, spawning one task per accepted connection.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return;
                }
                accepted = self.unix.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => self.spawn_connection(stream),
                        Err(e) => error!(error = %e, "accept error"),
                    }
                }
            }
        }
    }

    fn spawn_connection(&self, stream: UnixStream) {
        let Some(peer) = peer_credentials(&stream) else {
            warn!("could not determine peer credentials, rejecting connection");
            return;
        };
        if config::local_uid_only() && peer.uid != effective_uid() {
            warn!(peer_uid = peer.uid, "rejecting connection from non-matching uid");
            return;
        }

        let connection = self.connection_ids.next();
        let dispatcher = Arc::clone(&self.dispatcher);
        let registry = Arc::clone(&self.registry);
        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
        registry.insert(connection, tx.clone());

        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            run_connection(connection, peer, reader, writer, dispatcher.clone(), registry.clone(), tx, rx).await;
            dispatcher.engine().connection_closed(connection);
            registry.remove(connection);
            debug!(?connection, "connection closed");
        });
    }
}

/// The real/effective uid/gid of the peer on the other end of a
/// `SOCK_STREAM` Unix socket, via `SO_PEERCRED`. The teacher trusts Unix
/// sockets unconditionally (only its TCP path authenticates, via a Hello
/// token); this daemon additionally restricts local connections to the
/// daemon's own uid by default, since sysrepo sessions carry real/effective
/// identity (§4.2) that must come from a source the kernel vouches for.
fn peer_credentials(stream: &UnixStream) -> Option<UserId> {
    nix::sys::socket::getsockopt(stream, nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| UserId::new(cred.uid(), cred.gid()))
}

fn effective_uid() -> u32 {
    nix::unistd::geteuid().as_raw()
}

async fn run_connection<R, W>(
    connection: ConnectionId,
    peer: UserId,
    mut reader: R,
    writer: W,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<Registry>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: mpsc::Receiver<OutboundMessage>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer_task = tokio::spawn(writer_loop(writer, outbound_rx));

    loop {
        let body = match sysrepo_wire::read_message(&mut reader).await {
            Ok(body) => body,
            Err(sysrepo_wire::ProtocolError::Io(_)) => break,
            Err(e) => {
                warn!(?connection, error = %e, "framing error, closing connection");
                break;
            }
        };

        let message: Request = match sysrepo_wire::decode::<ProtocolMessage>(&body) {
            Ok(ProtocolMessage::Request(r)) => r,
            Ok(_) => {
                warn!(?connection, "expected a request, got another message kind");
                continue;
            }
            Err(e) => {
                warn!(?connection, error = %e, "malformed request");
                continue;
            }
        };

        if matches!(message.op, sysrepo_wire::RequestOp::Commit | sysrepo_wire::RequestOp::Validate) {
            info!(?connection, session = message.session_id.0, "received request");
        } else {
            debug!(?connection, session = message.session_id.0, "received request");
        }

        let (response, notifications) = dispatcher.handle(connection, peer, &message);
        if matches!(message.op, sysrepo_wire::RequestOp::SessionStop) {
            dispatcher.session_ended(message.session_id);
        }
        for record in &notifications {
            registry.route(record);
        }
        if outbound_tx.send(OutboundMessage::Response(response)).await.is_err() {
            break;
        }
    }

    drop(outbound_tx);
    let _ = writer_task.await;
}

async fn writer_loop<W>(mut writer: W, mut outbound_rx: mpsc::Receiver<OutboundMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound_rx.recv().await {
        let encoded = match message {
            OutboundMessage::Response(r) => sysrepo_wire::encode(&ProtocolMessage::Response(r)),
            OutboundMessage::Notification(n) => sysrepo_wire::encode(&ProtocolMessage::Notification(n)),
        };
        let body = match encoded {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if sysrepo_wire::write_message(&mut writer, &body).await.is_err() {
            return;
        }
    }
    let _ = writer.flush().await;
}

/// Build a `Destination` identifying a connection, for `Subscribe` requests.
pub fn destination_for(connection: ConnectionId) -> sysrepo_wire::Destination {
    sysrepo_wire::Destination { address: connection_address(connection), id: 0 }
}
