//! DevTools protocol message types.
//!
//! This module defines the JSON messages exchanged over a debug socket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command request |
//! | `Response` | Remote → Local | Command response, correlated by `id` |
//! | `Event` | Remote → Local | Notification, routed by `method` |
//!
//! Incoming text frames are parsed once, at the transport boundary, into
//! [`Message`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, PageCommand, RuntimeCommand, TargetCommand};
pub use event::{Event, ParsedEvent, TargetInfo};
pub use request::{Request, Response, ResponseError};

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Message
// ============================================================================

/// One incoming protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Reply to a request we sent.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

impl Message {
    /// Parses a text frame.
    ///
    /// Anything with an `id` is a response; anything with a `method` and no
    /// `id` is an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not JSON or is neither
    /// shape.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("invalid JSON frame: {e}")))?;

        if value.get("id").is_some() {
            let response = serde_json::from_value(value)
                .map_err(|e| Error::protocol(format!("malformed response: {e}")))?;
            return Ok(Self::Response(response));
        }

        if value.get("method").is_some() {
            let event = serde_json::from_value(value)
                .map_err(|e| Error::protocol(format!("malformed event: {e}")))?;
            return Ok(Self::Event(event));
        }

        Err(Error::protocol(format!(
            "frame is neither response nor event: {text}"
        )))
    }

    /// Returns the response, if this is one.
    #[inline]
    #[must_use]
    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::Event(_) => None,
        }
    }

    /// Returns the event, if this is one.
    #[inline]
    #[must_use]
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Response(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let message = Message::parse(r#"{"id": 12, "result": {}}"#).expect("parse");
        let response = message.as_response().expect("response");
        assert_eq!(response.id.as_u64(), 12);
    }

    #[test]
    fn test_parse_event() {
        let message = Message::parse(r#"{"method": "Page.frameResized", "params": {}}"#)
            .expect("parse");
        assert_eq!(message.as_event().map(|e| e.method.as_str()), Some("Page.frameResized"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Message::parse("not json"),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(
            Message::parse(r#"{"hello": "world"}"#),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(
            Message::parse(r#"{"id": "not-a-number"}"#),
            Err(Error::Protocol { .. })
        ));
    }
}
