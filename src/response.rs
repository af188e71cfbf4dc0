//! Response sink and the bodies written to it.
//!
//! | Kind          | Status (default) | Body |
//! |---------------|------------------|------|
//! | `ClientFault` | 400              | `{ "message": ..., <declared fields> }` |
//! | `Forbidden`   | 403 (fixed)      | `{ "key": "Forbidden", "message": "Access to this resource is forbidden." }` |
//! | `ServerFault` | 500              | `{ "logEntryId": "<uuid>", "exception": { ... } }` (`exception` only in development) |

use crate::contract::FilteredFailure;
use serde::Serialize;
use std::io;
use uuid::Uuid;

/// Content type of every body the dispatcher writes.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Status code forced for access-denial failures.
pub const FORBIDDEN_STATUS: u16 = 403;

/// Where the dispatcher writes status codes and bodies.
///
/// Implemented by the transport layer. Write failures are returned to the
/// dispatcher's caller untouched.
pub trait ResponseSink {
    /// Status code currently set on the response.
    fn status_code(&self) -> u16;

    /// Replace the status code.
    fn set_status_code(&mut self, status_code: u16);

    /// Append `body` (UTF-8 JSON) to the response.
    fn write_body(&mut self, content_type: &str, body: &[u8]) -> io::Result<()>;
}

/// In-memory `ResponseSink`.
///
/// Keeps every write separately, so repeated emissions for one response
/// (aggregate flattening) stay observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedResponse {
    status_code: u16,
    content_type: Option<String>,
    writes: Vec<Vec<u8>>,
}

impl BufferedResponse {
    /// Empty response with the given status code.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            content_type: None,
            writes: Vec::new(),
        }
    }

    /// Content type of the last write.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Each body write, oldest first.
    #[inline]
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// The most recent body write.
    #[inline]
    pub fn last_write(&self) -> Option<&[u8]> {
        self.writes.last().map(Vec::as_slice)
    }

    /// All writes concatenated, as a transport would send them.
    pub fn body(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

impl Default for BufferedResponse {
    /// A fresh response starts out as `200 OK`.
    fn default() -> Self {
        Self::new(200)
    }
}

impl ResponseSink for BufferedResponse {
    #[inline]
    fn status_code(&self) -> u16 {
        self.status_code
    }

    #[inline]
    fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    fn write_body(&mut self, content_type: &str, body: &[u8]) -> io::Result<()> {
        self.content_type = Some(content_type.to_owned());
        self.writes.push(body.to_vec());
        Ok(())
    }
}

/// Shape of an emitted body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// The filtered failure.
    ClientFault,
    /// The fixed access-denial body.
    Forbidden,
    /// Correlation id, plus the root cause in development.
    ServerFault,
}

/// Outcome of classifying one (non-aggregate) failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Status code written to the response sink.
    pub status_code: u16,
    /// Shape of the body.
    pub kind: ResponseKind,
    /// Exactly the bytes written to the response sink.
    pub body: Vec<u8>,
}

impl Classification {
    /// Parse the body back into JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Fixed body for access-denial failures.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForbiddenBody {
    key: &'static str,
    message: &'static str,
}

impl Default for ForbiddenBody {
    fn default() -> Self {
        Self {
            key: "Forbidden",
            message: "Access to this resource is forbidden.",
        }
    }
}

/// Body for server faults.
///
/// `exception` is only populated in development deployments.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorPayload<'a> {
    /// Correlation id, also attached to the error log entry.
    pub log_entry_id: Uuid,
    /// Filtered root cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<FilteredFailure<'a>>,
}
