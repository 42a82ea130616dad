// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sysrepo-wire: length-prefixed framing plus the tagged-union
//! request/response/notification protocol (§4.4, §6).

mod framing;
mod messages;

pub use framing::{decode, encode, read_message, read_message_with_limit, write_message, ProtocolError, DEFAULT_MAX_MSG_SIZE};
pub use messages::{
    Destination, EventKind, MoveDirection, Notification, NotificationOp, ProtocolMessage, Request, RequestOp,
    Response, ResponseOp, SchemaFormat, SchemaSummary, ValueRecord, WireDatastore, WireError,
};
