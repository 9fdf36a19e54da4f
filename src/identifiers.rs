//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep request ids, target ids and session ids from being
//! mixed up at compile time. All three serialize transparently.
//!
//! | Type | Wire form | Origin |
//! |------|-----------|--------|
//! | [`RequestId`] | integer | Allocated locally, process-unique |
//! | [`TargetId`] | string | Assigned by the browser |
//! | [`SessionId`] | string | Returned by `Target.attachToTarget` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// RequestId
// ============================================================================

/// Next request id to hand out. Starts at 1 so that 0 never appears on the wire.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier correlating a request with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocates a fresh id, unique for the lifetime of the process.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id, e.g. one read back from a response.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw integer.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Browser-assigned identifier of one page or frame.
    TargetId
);

string_id!(
    /// Identifier of a live attachment to a target.
    ///
    /// Every session-scoped command must carry one.
    SessionId
);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_increasing() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(a.as_u64() > 0);
    }

    #[test]
    fn test_request_id_serializes_as_integer() {
        let id = RequestId::from_raw(42);
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");
    }

    #[test]
    fn test_string_ids_are_transparent() {
        let target: TargetId = serde_json::from_str("\"ABC123\"").expect("parse");
        assert_eq!(target.as_str(), "ABC123");
        assert_eq!(target.to_string(), "ABC123");

        let session = SessionId::from("S1");
        assert_eq!(serde_json::to_string(&session).expect("serialize"), "\"S1\"");
    }
}
