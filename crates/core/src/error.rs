// SPDX-License-Identifier: MIT

//! The engine's flat error taxonomy (§7).
//!
//! Every fallible engine operation returns `Result<T, SrError>`. `SrError`
//! carries an [`ErrorCode`] discriminant plus an optional `{message, path}`
//! detail, mirroring what the wire protocol serialises back to the client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The flat error taxonomy from §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    Ok,
    InvalArg,
    NoMem,
    NotFound,
    Internal,
    Unauthorized,
    MalformedMsg,
    TimeOut,
    Unsupported,
    UnknownModel,
    BadElement,
    ValidationFailed,
    DataMissing,
    DataExists,
    Io,
    Locked,
    CommitFailed,
    Sys,
}

crate::simple_display! {
    ErrorCode {
        Ok => "OK",
        InvalArg => "INVAL_ARG",
        NoMem => "NOMEM",
        NotFound => "NOT_FOUND",
        Internal => "INTERNAL",
        Unauthorized => "UNAUTHORIZED",
        MalformedMsg => "MALFORMED_MSG",
        TimeOut => "TIME_OUT",
        Unsupported => "UNSUPPORTED",
        UnknownModel => "UNKNOWN_MODEL",
        BadElement => "BAD_ELEMENT",
        ValidationFailed => "VALIDATION_FAILED",
        DataMissing => "DATA_MISSING",
        DataExists => "DATA_EXISTS",
        Io => "IO",
        Locked => "LOCKED",
        CommitFailed => "COMMIT_FAILED",
        Sys => "SYS",
    }
}

/// An engine error: a code plus optional human message and faulting path.
///
/// Cloned when surfaced to a client (the session keeps the originals in its
/// last-error list until the next operation clears them — see §7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub struct SrError {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl fmt::Display for SrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl SrError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, message: None, path: None }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: Some(message.into()), path: None }
    }

    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self { code, message: Some(message.into()), path: Some(path.into()) }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl From<std::io::Error> for SrError {
    fn from(e: std::io::Error) -> Self {
        SrError::with_message(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for SrError {
    fn from(e: serde_json::Error) -> Self {
        SrError::with_message(ErrorCode::MalformedMsg, e.to_string())
    }
}

/// Bounded ring of a session's most recent errors, most-recent-first (§7).
///
/// Capacity is fixed (not configurable) — this is a debugging aid, not a
/// durable log; unbounded growth from a chatty session would be a leak.
#[derive(Debug, Clone, Default)]
pub struct ErrorList {
    entries: std::collections::VecDeque<SrError>,
}

const ERROR_LIST_CAPACITY: usize = 32;

impl ErrorList {
    pub fn push(&mut self, error: SrError) {
        if self.entries.len() == ERROR_LIST_CAPACITY {
            self.entries.pop_back();
        }
        self.entries.push_front(error);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&SrError> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SrError> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path_and_message() {
        let e = SrError::with_path(ErrorCode::BadElement, "unknown node", "/example-module:unknown");
        assert_eq!(e.to_string(), "BAD_ELEMENT at /example-module:unknown: unknown node");
    }

    #[test]
    fn error_list_is_most_recent_first_and_bounded() {
        let mut list = ErrorList::default();
        for i in 0..(ERROR_LIST_CAPACITY + 5) {
            list.push(SrError::with_message(ErrorCode::Internal, format!("e{i}")));
        }
        assert_eq!(list.iter().count(), ERROR_LIST_CAPACITY);
        assert_eq!(list.latest().unwrap().message.as_deref(), Some("e36"));
    }
}
