// SPDX-License-Identifier: MIT

//! The wire message schema (§6): a tagged union of `{Request, Response,
//! Notification}`, each carrying a `session_id` (0 until assigned) and an
//! operation discriminator drawn from §4.6's operation surface table.

use serde::{Deserialize, Serialize};
use sysrepo_core::{EditFlags, ErrorCode, SessionId, SrError, SubscriptionId, Value};

/// A path-addressed, typed value on the wire (§6 "Value encoding").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub path: String,
    #[serde(flatten)]
    pub value: Value,
}

/// Which datastore a `session_start` targets (mirrors `sysrepo_core::Datastore`
/// without pulling in the `Operational` scratch kind, which is never a
/// session's primary datastore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireDatastore {
    Startup,
    Running,
    Candidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaFormat {
    Yang,
    Yin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
    First,
    Last,
}

/// An event kind a subscription can register for (§3 "Subscription").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    ModuleInstall,
    FeatureEnable,
    ModuleChange,
    Rpc,
}

/// An addressable notification recipient (§GLOSSARY "Destination").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Destination {
    pub address: String,
    pub id: u32,
}

/// Operation discriminator for client→server requests (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum RequestOp {
    SessionStart { datastore: WireDatastore, effective_uid: Option<u32>, effective_gid: Option<u32> },
    SessionStop,
    SessionRefresh,
    ListSchemas,
    GetSchema { module: String, revision: Option<String>, submodule: Option<String>, format: SchemaFormat },
    GetItem { path: String },
    GetItems { path: String },
    GetItemsIter { path: String },
    GetItemNext { iterator_id: u32 },
    SetItem { path: String, value: Option<Value>, flags: EditFlags },
    DeleteItem { path: String, flags: EditFlags },
    MoveItem { path: String, direction: MoveDirection },
    Validate,
    Commit,
    DiscardChanges,
    LockModule { module: String },
    UnlockModule { module: String },
    LockDatastore,
    UnlockDatastore,
    ModuleInstall { module: String, revision: Option<String> },
    FeatureEnable { module: String, feature: String, on: bool },
    Subscribe { event: EventKind, destination: Destination, path: Option<String>, module_name: Option<String> },
    Unsubscribe { subscription_id: SubscriptionId },
    /// Forward-compatible catch-all for operations this build doesn't know
    /// about yet — preserved, not an error, per §6's forward-compatibility
    /// requirement.
    #[serde(other, skip_serializing)]
    Unknown,
}

/// Operation result for server→client responses (§4.3, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ResponseOp {
    Ok,
    SessionStarted { session_id: SessionId },
    Schemas { schemas: Vec<SchemaSummary> },
    Schema { text: String },
    Item { value: Option<ValueRecord> },
    Items { values: Vec<ValueRecord> },
    IteratorOpened { iterator_id: u32 },
    IteratorItem { value: Option<ValueRecord> },
    Subscribed { subscription_id: SubscriptionId },
    Errors { errors: Vec<WireError> },
    Error { error: WireError },
    #[serde(other, skip_serializing)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub module: String,
    pub namespace: String,
    pub prefix: String,
    pub revision: Option<String>,
    pub yang_path: Option<String>,
    pub yin_path: Option<String>,
    pub submodules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub code: ErrorCode,
    pub message: Option<String>,
    pub path: Option<String>,
}

impl From<&SrError> for WireError {
    fn from(e: &SrError) -> Self {
        WireError { code: e.code, message: e.message.clone(), path: e.path.clone() }
    }
}

impl From<SrError> for WireError {
    fn from(e: SrError) -> Self {
        WireError { code: e.code, message: e.message, path: e.path }
    }
}

/// Server→client async event delivery (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum NotificationOp {
    ModuleInstalled { module: String, revision: Option<String> },
    FeatureChanged { module: String, feature: String, on: bool },
    ModuleChanged { module: String, changes: Vec<ValueRecord> },
    #[serde(other, skip_serializing)]
    Unknown,
}

/// A client→server request envelope. `session_id` is `SessionId::NONE`
/// until a session exists (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub op: RequestOp,
}

/// A server→client response envelope, correlated to a request by session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub op: ResponseOp,
}

/// A server→client out-of-band event, addressed to the subscribing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub op: NotificationOp,
}

/// The top-level tagged union (§6 "Message schema").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProtocolMessage {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{decode, encode};

    #[test]
    fn request_round_trips_through_json() {
        let req = ProtocolMessage::Request(Request {
            session_id: SessionId(1),
            op: RequestOp::SetItem {
                path: "/example-module:container/leaf".into(),
                value: Some(Value::String("v".into())),
                flags: EditFlags::STRICT,
            },
        });
        let bytes = encode(&req).unwrap();
        let back: ProtocolMessage = decode(&bytes).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn unknown_operation_deserialises_to_catch_all_variant() {
        let json = r#"{"session_id":1,"op":"SomeFutureOperation"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.op, RequestOp::Unknown);
    }

    #[test]
    fn value_record_flattens_path_alongside_tagged_value() {
        let record = ValueRecord { path: "/m:leaf".into(), value: Value::Uint32(7) };
        let bytes = encode(&record).unwrap();
        let back: ValueRecord = decode(&bytes).unwrap();
        assert_eq!(record, back);
    }
}
