//! Scripted in-memory transport for driving workers in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::protocol::{Message, Request};

use super::{Received, Transport};

/// One step the scripted peer performs when the transport is read.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Deliver this raw JSON as a message.
    Raw(Value),
    /// Reply with `result` to the most recently sent request.
    ReplyToLast(Value),
    /// Report that the peer closed the socket.
    Disconnect,
    /// Fail the read with a protocol error.
    Fail(String),
}

/// Transport whose incoming side is a fixed script.
///
/// Sent requests are recorded in a shared log that outlives the transport.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    sent: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            sent: Arc::default(),
        }
    }

    /// Handle to the log of sent requests.
    pub(crate) fn sent_log(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.sent)
    }

    /// Snapshot of sent requests.
    pub(crate) fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    /// Sent method names in order.
    pub(crate) fn sent_methods(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(Request::method).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, request: &Request) -> Result<()> {
        self.sent.lock().push(request.clone());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Received> {
        let Some(step) = self.steps.pop_front() else {
            return Ok(Received::Disconnected);
        };

        match step {
            Step::Raw(value) => Message::parse(&value.to_string()).map(Received::Message),
            Step::ReplyToLast(result) => {
                let id = self
                    .sent
                    .lock()
                    .last()
                    .map(|r| r.id)
                    .ok_or_else(|| Error::protocol("nothing sent to reply to"))?;
                let raw = json!({ "id": id, "result": result });
                Message::parse(&raw.to_string()).map(Received::Message)
            }
            Step::Disconnect => Ok(Received::Disconnected),
            Step::Fail(message) => Err(Error::protocol(message)),
        }
    }
}

/// Evaluation result carrying an exception of the given class.
pub(crate) fn exception_result(class_name: &str) -> Value {
    json!({
        "result": { "type": "object", "subtype": "error", "className": class_name },
        "exceptionDetails": {
            "exceptionId": 1,
            "text": "Uncaught",
            "exception": {
                "type": "object",
                "className": class_name,
                "description": format!("{class_name}: something went wrong")
            }
        }
    })
}

/// Evaluation result without an exception.
pub(crate) fn ok_result() -> Value {
    json!({ "result": { "type": "object", "className": "HTMLScriptElement" } })
}
