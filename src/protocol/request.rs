//! Request and Response message types.
//!
//! Defines the wire format for command requests and their responses.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request sent to the debug endpoint.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Runtime.evaluate",
///   "sessionId": "5F1C...",
///   "params": { ... }
/// }
/// ```
///
/// `sessionId` is omitted for browser-level commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Session the command is addressed to.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a browser-level request with a freshly allocated id.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::next(),
            session_id: None,
            command,
        }
    }

    /// Creates a session-scoped request with a freshly allocated id.
    #[inline]
    #[must_use]
    pub fn for_session(session_id: SessionId, command: Command) -> Self {
        Self {
            id: RequestId::next(),
            session_id: Some(session_id),
            command,
        }
    }

    /// Returns a copy of this request under a new id.
    ///
    /// Used to re-issue an identical command.
    #[must_use]
    pub fn reissue(&self) -> Self {
        Self {
            id: RequestId::next(),
            session_id: self.session_id.clone(),
            command: self.command.clone(),
        }
    }

    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.command.method()
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response to a previously sent request.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "No target with given id" } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Session the response belongs to, for session-scoped requests.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<ResponseError>,
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseError {
    /// Numeric error code.
    #[serde(default)]
    pub code: i64,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

impl Response {
    /// Returns `true` if the response carries an `error` field.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::protocol(format!(
                "request {} failed ({}): {}",
                self.id, error.code, error.message
            ))),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Looks up a value in the result by JSON pointer.
    #[inline]
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.result.as_ref().and_then(|v| v.pointer(pointer))
    }

    /// Gets a string from the result by JSON pointer.
    ///
    /// Returns `None` if missing or not a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(Value::as_str)
    }

    /// Returns the class name of the exception an evaluation reported, if any.
    ///
    /// Reads `result.exceptionDetails.exception.className`.
    #[inline]
    #[must_use]
    pub fn exception_class(&self) -> Option<&str> {
        self.get_str("/exceptionDetails/exception/className")
    }

    /// Returns `true` if an evaluation reported any exception.
    #[inline]
    #[must_use]
    pub fn has_exception(&self) -> bool {
        self.pointer("/exceptionDetails").is_some()
    }

    /// Best-effort description of a reported exception.
    #[must_use]
    pub fn exception_description(&self) -> String {
        self.get_str("/exceptionDetails/exception/description")
            .or_else(|| self.get_str("/exceptionDetails/text"))
            .or_else(|| self.exception_class())
            .unwrap_or("unknown exception")
            .to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
