// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sysrepo-engine: the Data Manager, Session Manager, Notification
//! Processor, and Access Control components that sit between the daemon's
//! Connection Manager and the schema/data-tree primitives in
//! `sysrepo-yang`.

mod access;
mod data_manager;
mod engine;
mod locks;
mod notification;
mod oplog;
mod overlay;
mod session;

pub use access::AccessController;
pub use data_manager::{DataItem, DataManager};
pub use engine::{Engine, EngineConfig};
pub use locks::LockTable;
pub use notification::{Destination, EventKind, NotificationProcessor, NotificationRecord};
pub use oplog::{LogEntry, OpKind, OperationLog};
pub use overlay::Overlay;
pub use session::{Session, SessionManager};
