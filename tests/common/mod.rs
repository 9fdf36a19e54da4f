//! Shared fixtures for integration tests.
//!
//! - A one-shot WebSocket peer standing in for a debug socket
//! - The crate's HTTP fixtures standing in for the discovery endpoints

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::{http_stub, refused_endpoint};

// ============================================================================
// Types
// ============================================================================

pub type Peer = WebSocketStream<TcpStream>;

// ============================================================================
// WebSocket Peer
// ============================================================================

/// Accepts one WebSocket connection and hands it to `handler`.
///
/// Returns the address to connect to.
pub async fn ws_peer<F, Fut>(path: &str, handler: F) -> String
where
    F: FnOnce(Peer) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = accept_async(stream).await.expect("handshake");
            handler(ws).await;
        }
    });

    format!("ws://127.0.0.1:{port}{path}")
}

/// Reads the next text frame as JSON.
pub async fn next_request(ws: &mut Peer) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                return serde_json::from_str(text.as_str()).expect("json request");
            }
            Some(Ok(_)) => {}
            other => panic!("peer stream ended: {other:?}"),
        }
    }
}

/// Sends `value` as a text frame.
pub async fn push(ws: &mut Peer, value: Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("push");
}

/// Replies to `request` with `result`, echoing its session.
pub async fn reply(ws: &mut Peer, request: &Value, result: Value) {
    let mut response = json!({ "id": request["id"], "result": result });
    if let Some(session) = request.get("sessionId") {
        response["sessionId"] = session.clone();
    }
    push(ws, response).await;
}

/// Evaluation result carrying an exception of the given class.
pub fn exception_result(class_name: &str) -> Value {
    json!({
        "result": { "type": "object", "subtype": "error", "className": class_name },
        "exceptionDetails": {
            "exceptionId": 1,
            "text": "Uncaught",
            "exception": { "type": "object", "className": class_name }
        }
    })
}

/// Evaluation result without an exception.
pub fn ok_result() -> Value {
    json!({ "result": { "type": "object", "className": "HTMLElement" } })
}
