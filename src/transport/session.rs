//! WebSocket-backed transport session.
//!
//! One [`TransportSession`] owns one socket to either the browser-level
//! debug address or a single page's debug address.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::to_string;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Message, Request};

use super::{Received, Transport};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// TransportSession
// ============================================================================

/// A live socket to one debug endpoint.
///
/// In-flight correlation state lives with the caller; once
/// [`Received::Disconnected`] is returned, every pending request on this
/// session is lost.
pub struct TransportSession {
    /// Underlying WebSocket stream.
    ws: WsStream,
    /// Address this session was opened against.
    address: String,
    /// Set once the peer has gone away.
    closed: bool,
}

impl TransportSession {
    /// Opens a socket to `address` and completes the WebSocket handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the TCP connect or the handshake fails.
    pub async fn connect(address: &str) -> Result<Self> {
        let (ws, _) = connect_async(address)
            .await
            .map_err(|e| Error::connection(format!("{address}: {e}")))?;

        debug!(%address, "Debug socket connected");

        Ok(Self {
            ws,
            address: address.to_string(),
            closed: false,
        })
    }

    /// Returns the address this session is connected to.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns `true` once the peer has closed the socket.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends a close frame. Errors are logged, not returned.
    pub async fn close(mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.ws.close(None).await {
            debug!(address = %self.address, error = %e, "Close handshake failed");
        }
    }
}

#[async_trait]
impl Transport for TransportSession {
    async fn send(&mut self, request: &Request) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let json = to_string(request)?;

        match self.ws.send(WsMessage::Text(json.into())).await {
            Ok(()) => {
                trace!(id = %request.id, method = request.method(), "Request sent");
                Ok(())
            }
            Err(e) if is_disconnect(&e) => {
                self.closed = true;
                Err(Error::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn receive(&mut self) -> Result<Received> {
        if self.closed {
            return Ok(Received::Disconnected);
        }

        loop {
            match self.ws.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Message::parse(text.as_str()).map(Received::Message);
                }

                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(address = %self.address, ?frame, "Debug socket closed by remote");
                    self.closed = true;
                    return Ok(Received::Disconnected);
                }

                Some(Ok(WsMessage::Binary(bytes))) => {
                    warn!(address = %self.address, len = bytes.len(), "Ignoring binary frame");
                }

                // Ping, Pong, raw frames
                Some(Ok(_)) => {}

                Some(Err(e)) if is_disconnect(&e) => {
                    debug!(address = %self.address, error = %e, "Debug socket dropped");
                    self.closed = true;
                    return Ok(Received::Disconnected);
                }

                Some(Err(e)) => return Err(e.into()),

                None => {
                    debug!(address = %self.address, "Debug socket stream ended");
                    self.closed = true;
                    return Ok(Received::Disconnected);
                }
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Returns `true` for errors that mean the peer simply went away.
fn is_disconnect(error: &WsError) -> bool {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => e.kind() == ErrorKind::UnexpectedEof,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Error as IoError;

    #[test]
    fn test_clean_disconnect_classification() {
        assert!(is_disconnect(&WsError::ConnectionClosed));
        assert!(is_disconnect(&WsError::AlreadyClosed));
        assert!(is_disconnect(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
        assert!(is_disconnect(&WsError::Io(IoError::new(
            ErrorKind::UnexpectedEof,
            "eof"
        ))));
    }

    #[test]
    fn test_other_errors_are_not_disconnects() {
        assert!(!is_disconnect(&WsError::Io(IoError::new(
            ErrorKind::ConnectionReset,
            "reset"
        ))));
        assert!(!is_disconnect(&WsError::Io(IoError::new(
            ErrorKind::PermissionDenied,
            "denied"
        ))));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = TransportSession::connect(&format!("ws://127.0.0.1:{port}/devtools")).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
