//! Event message types.
//!
//! Events are notifications the browser pushes without a matching request.
//! They are routed by `method` name and, on a flattened browser socket, by
//! `sessionId`.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Target` | `targetCreated`, `targetInfoChanged`, `targetDestroyed`, `attachedToTarget`, `detachedFromTarget` |
//! | `Page` | `frameResized`, `loadEventFired` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// Event
// ============================================================================

/// An event notification from the debug endpoint.
///
/// # Format
///
/// ```json
/// {
///   "method": "Target.targetCreated",
///   "params": { "targetInfo": { ... } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Session that emitted the event, when multiplexed.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Returns the domain name from the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a known event lacks a required field.
    /// Unknown methods are not an error and yield [`ParsedEvent::Unknown`].
    pub fn parse(&self) -> Result<ParsedEvent> {
        let parsed = match self.method.as_str() {
            "Target.targetCreated" => ParsedEvent::TargetCreated {
                target_info: self.params_as::<TargetInfoParams>()?.target_info,
            },

            "Target.targetInfoChanged" => ParsedEvent::TargetInfoChanged {
                target_info: self.params_as::<TargetInfoParams>()?.target_info,
            },

            "Target.targetDestroyed" => ParsedEvent::TargetDestroyed {
                target_id: self.params_as::<TargetIdParams>()?.target_id,
            },

            "Target.attachedToTarget" => {
                let params = self.params_as::<AttachedParams>()?;
                ParsedEvent::AttachedToTarget {
                    session_id: params.session_id,
                    target_info: params.target_info,
                }
            }

            "Target.detachedFromTarget" => {
                let params = self.params_as::<DetachedParams>()?;
                ParsedEvent::DetachedFromTarget {
                    session_id: params.session_id,
                    target_id: params.target_id,
                }
            }

            "Page.frameResized" => ParsedEvent::FrameResized,

            "Page.loadEventFired" => ParsedEvent::LoadEventFired,

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        };

        Ok(parsed)
    }

    /// Deserializes params into a typed struct.
    fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.params)
            .map_err(|e| Error::protocol(format!("malformed {} params: {e}", self.method)))
    }
}

// ============================================================================
// TargetInfo
// ============================================================================

/// Description of one target as reported by the `Target` domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetInfo {
    /// Target identifier.
    #[serde(rename = "targetId")]
    pub target_id: TargetId,

    /// Target kind (`page`, `iframe`, `worker`, ...).
    #[serde(rename = "type", default)]
    pub target_type: String,

    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Document URL.
    #[serde(default)]
    pub url: String,

    /// Whether some client is attached.
    #[serde(default)]
    pub attached: bool,
}

#[derive(Deserialize)]
struct TargetInfoParams {
    #[serde(rename = "targetInfo")]
    target_info: TargetInfo,
}

#[derive(Deserialize)]
struct TargetIdParams {
    #[serde(rename = "targetId")]
    target_id: TargetId,
}

#[derive(Deserialize)]
struct AttachedParams {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
    #[serde(rename = "targetInfo")]
    target_info: TargetInfo,
}

#[derive(Deserialize)]
struct DetachedParams {
    #[serde(rename = "sessionId")]
    session_id: SessionId,
    #[serde(rename = "targetId", default)]
    target_id: Option<TargetId>,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A new target appeared.
    TargetCreated {
        /// Target description.
        target_info: TargetInfo,
    },

    /// A target's title, URL or attachment changed.
    TargetInfoChanged {
        /// Updated target description.
        target_info: TargetInfo,
    },

    /// A target went away.
    TargetDestroyed {
        /// Destroyed target.
        target_id: TargetId,
    },

    /// A session was attached (emitted for flattened attachments).
    AttachedToTarget {
        /// New session.
        session_id: SessionId,
        /// Target the session belongs to.
        target_info: TargetInfo,
    },

    /// A session was detached.
    DetachedFromTarget {
        /// Detached session.
        session_id: SessionId,
        /// Target, when the browser reports it.
        target_id: Option<TargetId>,
    },

    /// The page's frame changed size.
    FrameResized,

    /// The page's `load` event fired.
    LoadEventFired,

    /// Any other event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================
