//! WebSocket transport layer.
//!
//! This module owns debug socket connections. A transport serializes
//! outgoing [`Request`]s and hands back one parsed [`Message`] per
//! [`Transport::receive`] call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                          ┌──────────────────┐
//! │  Worker (Rust)   │        WebSocket         │  Browser runtime │
//! │                  │◄────────────────────────►│                  │
//! │ TransportSession │   ws://localhost:PORT/   │  DevTools agent  │
//! │                  │   devtools/{browser,page}│                  │
//! └──────────────────┘                          └──────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `TransportSession::connect` - Open socket and complete the handshake
//! 2. `send` / `receive` - Exchange protocol messages
//! 3. `receive` returns [`Received::Disconnected`] once the peer goes away
//!
//! There is no reconnection inside a transport. The owning worker decides
//! whether a disconnect ends it or sends it back to discovery.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | WebSocket-backed [`TransportSession`] |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket-backed transport session.
pub mod session;

#[cfg(test)]
pub(crate) mod scripted;

// ============================================================================
// Re-exports
// ============================================================================

pub use session::TransportSession;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{Message, Request};

// ============================================================================
// Received
// ============================================================================

/// Outcome of one receive call.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A full protocol message.
    Message(Message),
    /// The peer closed the connection. Terminal for this session.
    Disconnected,
}

// ============================================================================
// Transport
// ============================================================================

/// A bidirectional protocol connection to one debug endpoint.
///
/// Implemented by [`TransportSession`] over a real socket and by scripted
/// doubles in tests.
#[async_trait]
pub trait Transport: Send {
    /// Serializes and writes one request.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the peer already closed
    /// - [`Error::WebSocket`](crate::Error::WebSocket) on any other write failure
    async fn send(&mut self, request: &Request) -> Result<()>;

    /// Suspends until one full message arrives or the connection closes.
    ///
    /// No timeout is applied.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`](crate::Error::Protocol) if a frame cannot be parsed
    /// - [`Error::WebSocket`](crate::Error::WebSocket) on a transport failure that is not a
    ///   clean disconnect
    async fn receive(&mut self) -> Result<Received>;
}
