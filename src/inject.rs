//! Script injection.
//!
//! Turns style and script payloads into `Runtime.evaluate` expressions and
//! classifies evaluation results. A script-side `TypeError` is the page's
//! "not ready yet" signal: the identical evaluation is re-issued until the
//! page stops rejecting it or the [`RetryPolicy`] runs out.
//!
//! | Payload | Expression | Retry |
//! |---------|------------|-------|
//! | [`Payload::Style`] | append `<style>` with the CSS text | never |
//! | [`Payload::Script`] with [`ScriptDelivery::Source`] | append `<script src=...>` | on `TypeError` |
//! | [`Payload::Script`] with [`ScriptDelivery::Inline`] | append `<script>` with the text | on `TypeError` |

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::options::RetryPolicy;
use crate::protocol::{Command, Message, Request, Response};
use crate::transport::{Received, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Exception class that marks a page as not ready yet.
pub const TYPE_ERROR_CLASS: &str = "TypeError";

// ============================================================================
// Payload
// ============================================================================

/// How a script payload reaches the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDelivery {
    /// The payload is a URL loaded through the `src` attribute.
    Source,
    /// The payload is the script text itself.
    Inline,
}

/// A style or script payload to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Stylesheet text.
    Style(String),
    /// Script, delivered by URL or inline.
    Script {
        /// Script URL or text.
        code: String,
        /// How `code` is attached.
        delivery: ScriptDelivery,
    },
}

impl Payload {
    /// Creates a stylesheet payload.
    #[inline]
    #[must_use]
    pub fn style(css: impl Into<String>) -> Self {
        Self::Style(css.into())
    }

    /// Creates a script payload loaded from a URL.
    #[inline]
    #[must_use]
    pub fn script_source(url: impl Into<String>) -> Self {
        Self::Script {
            code: url.into(),
            delivery: ScriptDelivery::Source,
        }
    }

    /// Creates a script payload carrying its own text.
    #[inline]
    #[must_use]
    pub fn script_inline(code: impl Into<String>) -> Self {
        Self::Script {
            code: code.into(),
            delivery: ScriptDelivery::Inline,
        }
    }

    /// Returns `true` for script payloads.
    #[inline]
    #[must_use]
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }

    /// Short name for logs.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Style(_) => "style",
            Self::Script { .. } => "script",
        }
    }

    /// Builds the expression that appends the payload to the document.
    #[must_use]
    pub fn expression(&self) -> String {
        match self {
            Self::Style(css) => format!(
                "document.head.appendChild(Object.assign(document.createElement('style'), {{ textContent: {} }}))",
                json_string(css)
            ),
            Self::Script {
                code,
                delivery: ScriptDelivery::Source,
            } => format!(
                "document.head.appendChild(Object.assign(document.createElement('script'), {{ src: {} }}))",
                json_string(code)
            ),
            Self::Script {
                code,
                delivery: ScriptDelivery::Inline,
            } => format!(
                "document.head.appendChild(Object.assign(document.createElement('script'), {{ text: {} }}))",
                json_string(code)
            ),
        }
    }

    /// Builds the evaluation request, scoped to `session` when given.
    #[must_use]
    pub fn request(&self, session: Option<&SessionId>) -> Request {
        let command = Command::evaluate(self.expression());
        match session {
            Some(session) => Request::for_session(session.clone(), command),
            None => Request::new(command),
        }
    }
}

// ============================================================================
// InjectionOutcome
// ============================================================================

/// Result of one evaluation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// The page accepted the payload.
    Success,
    /// The page reported the type-error signature.
    RetryableFailure(String),
    /// Any other exception or protocol error.
    FatalFailure(String),
}

impl InjectionOutcome {
    /// Classifies an evaluation response.
    #[must_use]
    pub fn classify(response: &Response) -> Self {
        if let Some(error) = &response.error {
            return Self::FatalFailure(format!("{} ({})", error.message, error.code));
        }

        match response.exception_class() {
            Some(TYPE_ERROR_CLASS) => Self::RetryableFailure(response.exception_description()),
            Some(_) => Self::FatalFailure(response.exception_description()),
            None if response.has_exception() => {
                Self::FatalFailure(response.exception_description())
            }
            None => Self::Success,
        }
    }

    /// Returns `true` for [`InjectionOutcome::Success`].
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for [`InjectionOutcome::RetryableFailure`].
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableFailure(_))
    }

    /// Converts the outcome into a result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptError`] carrying the page's reason for either
    /// failure variant.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::RetryableFailure(reason) | Self::FatalFailure(reason) => {
                Err(Error::script_error(reason))
            }
        }
    }
}

// ============================================================================
// Injector
// ============================================================================

/// Delivers payloads over a transport the caller owns exclusively.
///
/// While waiting for its own response the injector consumes and drops
/// every other message, so it must not run on a socket whose events matter
/// to someone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct Injector {
    retry: RetryPolicy,
}

impl Injector {
    /// Creates an injector with the given retry bound.
    #[inline]
    #[must_use]
    pub const fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Returns the retry bound.
    #[inline]
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns `true` if a request that produced `outcome` on attempt
    /// `attempt` (1-based) should be re-issued.
    #[must_use]
    pub fn should_retry(&self, payload: &Payload, outcome: &InjectionOutcome, attempt: u32) -> bool {
        payload.is_script() && outcome.is_retryable() && self.retry.allows_retry_after(attempt)
    }

    /// Injects `payload` and, for scripts, retries on the type-error signature.
    ///
    /// Style payloads are sent once and reported as [`InjectionOutcome::Success`]
    /// without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors. A disconnect while waiting for
    /// the reply is reported as [`InjectionOutcome::FatalFailure`].
    pub async fn inject<T>(
        &self,
        transport: &mut T,
        session: Option<&SessionId>,
        payload: &Payload,
    ) -> Result<InjectionOutcome>
    where
        T: Transport + ?Sized,
    {
        let mut request = payload.request(session);
        transport.send(&request).await?;

        if !payload.is_script() {
            debug!(kind = payload.kind(), "Payload sent");
            return Ok(InjectionOutcome::Success);
        }

        let mut attempt = 1;
        loop {
            let Some(response) = Self::await_response(transport, &request).await? else {
                return Ok(InjectionOutcome::FatalFailure(
                    "socket closed before evaluation completed".to_string(),
                ));
            };

            let outcome = InjectionOutcome::classify(&response);
            if !self.should_retry(payload, &outcome, attempt) {
                match &outcome {
                    InjectionOutcome::Success => debug!(attempt, "Script injected"),
                    InjectionOutcome::RetryableFailure(reason) => {
                        warn!(attempt, %reason, "Giving up on script injection");
                        return Ok(InjectionOutcome::FatalFailure(format!(
                            "page not ready after {attempt} attempts: {reason}"
                        )));
                    }
                    InjectionOutcome::FatalFailure(reason) => {
                        warn!(attempt, %reason, "Script injection failed");
                    }
                }
                return Ok(outcome);
            }

            debug!(attempt, "Page not ready, re-issuing script");
            if !self.retry.delay.is_zero() {
                tokio::time::sleep(self.retry.delay).await;
            }

            request = request.reissue();
            transport.send(&request).await?;
            attempt += 1;
        }
    }

    /// Reads until the response to `request` arrives.
    ///
    /// Returns `None` if the socket closes first.
    async fn await_response<T>(transport: &mut T, request: &Request) -> Result<Option<Response>>
    where
        T: Transport + ?Sized,
    {
        loop {
            match transport.receive().await? {
                Received::Message(Message::Response(response)) if response.id == request.id => {
                    return Ok(Some(response));
                }
                Received::Message(_) => {}
                Received::Disconnected => return Ok(None),
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Escapes a string as a JavaScript string literal.
pub(crate) fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::RuntimeCommand;
    use crate::transport::scripted::{ScriptedTransport, Step, exception_result, ok_result};

    fn expression_of(request: &Request) -> &str {
        match &request.command {
            Command::Runtime(RuntimeCommand::Evaluate { expression, .. }) => expression,
            other => panic!("expected evaluate, got {other:?}"),
        }
    }

    fn response(value: serde_json::Value) -> Response {
        serde_json::from_value(value).expect("response")
    }

    #[test]
    fn test_style_expression_escapes_css() {
        let expr = Payload::style("body { content: \"x\" }").expression();
        assert!(expr.contains("createElement('style')"));
        assert!(expr.contains(r#"textContent: "body { content: \"x\" }""#));
    }

    #[test]
    fn test_script_expressions() {
        let source = Payload::script_source("https://example.com/a.js").expression();
        assert!(source.contains("createElement('script')"));
        assert!(source.contains(r#"src: "https://example.com/a.js""#));

        let inline = Payload::script_inline("run()").expression();
        assert!(inline.contains(r#"text: "run()""#));
    }

    #[test]
    fn test_request_scoping() {
        let session = SessionId::from("S1");
        let scoped = Payload::style("a{}").request(Some(&session));
        assert_eq!(scoped.session_id, Some(session));
        assert!(Payload::style("a{}").request(None).session_id.is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            InjectionOutcome::classify(&response(json!({ "id": 1, "result": ok_result() }))),
            InjectionOutcome::Success
        );
        assert!(
            InjectionOutcome::classify(&response(
                json!({ "id": 1, "result": exception_result("TypeError") })
            ))
            .is_retryable()
        );
        assert!(matches!(
            InjectionOutcome::classify(&response(
                json!({ "id": 1, "result": exception_result("ReferenceError") })
            )),
            InjectionOutcome::FatalFailure(_)
        ));
        assert!(matches!(
            InjectionOutcome::classify(&response(
                json!({ "id": 1, "error": { "code": -32000, "message": "boom" } })
            )),
            InjectionOutcome::FatalFailure(_)
        ));
    }

    #[test]
    fn test_failed_outcome_becomes_script_error() {
        assert!(InjectionOutcome::Success.into_result().is_ok());

        let err = InjectionOutcome::FatalFailure("SyntaxError: bad".into())
            .into_result()
            .expect_err("fatal");
        assert!(matches!(err, Error::ScriptError { ref message } if message == "SyntaxError: bad"));
        assert!(!err.is_recoverable());

        assert!(matches!(
            InjectionOutcome::RetryableFailure("TypeError".into()).into_result(),
            Err(Error::ScriptError { .. })
        ));
    }

    #[tokio::test]
    async fn test_style_is_fire_and_forget() {
        let mut transport = ScriptedTransport::default();
        let outcome = Injector::default()
            .inject(&mut transport, None, &Payload::style("a{}"))
            .await
            .expect("inject");

        assert_eq!(outcome, InjectionOutcome::Success);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_script_retries_identical_evaluation_on_type_error() {
        let mut transport = ScriptedTransport::new([
            Step::Raw(json!({ "method": "Page.frameResized", "params": {} })),
            Step::ReplyToLast(exception_result("TypeError")),
            Step::ReplyToLast(exception_result("TypeError")),
            Step::ReplyToLast(ok_result()),
        ]);

        let outcome = Injector::default()
            .inject(&mut transport, None, &Payload::script_inline("init()"))
            .await
            .expect("inject");

        assert_eq!(outcome, InjectionOutcome::Success);

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|r| expression_of(r) == expression_of(&sent[0])));
        assert_ne!(sent[0].id, sent[1].id);
    }

    #[tokio::test]
    async fn test_other_exception_ends_loop() {
        let mut transport =
            ScriptedTransport::new([Step::ReplyToLast(exception_result("SyntaxError"))]);

        let outcome = Injector::default()
            .inject(&mut transport, None, &Payload::script_inline("{"))
            .await
            .expect("inject");

        assert!(matches!(outcome, InjectionOutcome::FatalFailure(_)));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_bounded_retry_gives_up() {
        let mut transport = ScriptedTransport::new([
            Step::ReplyToLast(exception_result("TypeError")),
            Step::ReplyToLast(exception_result("TypeError")),
            Step::ReplyToLast(ok_result()),
        ]);

        let outcome = Injector::new(RetryPolicy::bounded(2))
            .inject(&mut transport, None, &Payload::script_inline("init()"))
            .await
            .expect("inject");

        assert!(matches!(outcome, InjectionOutcome::FatalFailure(_)));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting() {
        let mut transport = ScriptedTransport::new([Step::Disconnect]);

        let outcome = Injector::default()
            .inject(&mut transport, None, &Payload::script_inline("init()"))
            .await
            .expect("inject");

        assert!(matches!(outcome, InjectionOutcome::FatalFailure(_)));
    }

    #[test]
    fn test_should_retry_ignores_styles() {
        let injector = Injector::default();
        let retryable = InjectionOutcome::RetryableFailure("TypeError".into());

        assert!(injector.should_retry(&Payload::script_inline("x"), &retryable, 1));
        assert!(!injector.should_retry(&Payload::style("x"), &retryable, 1));
        assert!(!injector.should_retry(&Payload::script_inline("x"), &InjectionOutcome::Success, 1));
    }
}
