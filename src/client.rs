//! Browser-level attach/evaluate state machine.
//!
//! Drives one multiplexed socket against the browser-level debug address.
//! Events and responses for unrelated targets interleave on that socket, so
//! every request is tracked by id in a pending table and every
//! session-scoped command is addressed by the session bound to its target.
//!
//! # Target Flow
//!
//! ```text
//! Target.targetCreated ──► attach ──► response binds sessionId
//!                                         │
//! Target.targetInfoChanged (attached) ────┴──► evaluate {title, url}
//!                                                    │
//!                              settings title? ──────┼──► bootstrap
//!                              rule title match? ────┴──► inject css / js
//! ```
//!
//! A details request is never sent before the session is bound; an early
//! info-changed event is deferred until the attach response arrives.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use crate::config::{Localization, PatchRule};
use crate::directory::{Target, TargetDirectory, TargetPhase};
use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId, TargetId};
use crate::inject::{InjectionOutcome, Injector, Payload};
use crate::options::PatcherOptions;
use crate::protocol::{Command, Event, Message, ParsedEvent, Request, Response, TargetCommand};
use crate::settings_page::SettingsPage;
use crate::transport::{Received, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Worker name used in logs.
pub const WORKER: &str = "browser";

/// Reads the page's current title and URL.
pub const DETAILS_EXPRESSION: &str =
    "(() => { return { title: document.title, url: document.location.href }; })()";

// ============================================================================
// Types
// ============================================================================

/// What an outstanding request was for.
#[derive(Debug, Clone)]
enum Pending {
    /// `Target.attachToTarget`.
    Attach { target_id: TargetId },
    /// Title/URL evaluation.
    Details { target_id: TargetId },
    /// Rule payload evaluation.
    Inject {
        target_id: TargetId,
        payload: Payload,
        request: Request,
        attempt: u32,
    },
    /// Settings-page bootstrap.
    Settings { target_id: TargetId },
}

impl Pending {
    fn target_id(&self) -> &TargetId {
        match self {
            Self::Attach { target_id }
            | Self::Details { target_id }
            | Self::Inject { target_id, .. }
            | Self::Settings { target_id } => target_id,
        }
    }
}

#[derive(Deserialize)]
struct PageDetails {
    title: String,
    #[serde(default)]
    url: String,
}

// ============================================================================
// BrowserClient
// ============================================================================

/// Attach/evaluate state machine over one browser-level transport.
pub struct BrowserClient<T> {
    transport: T,
    directory: TargetDirectory,
    rules: Vec<PatchRule>,
    localization: Arc<Localization>,
    settings_page: SettingsPage,
    injector: Injector,
    pending: FxHashMap<RequestId, Pending>,
}

impl<T: Transport> BrowserClient<T> {
    /// Creates a client over `transport`.
    ///
    /// Only local rules are considered; remote rules are ignored.
    #[must_use]
    pub fn new(
        transport: T,
        rules: Vec<PatchRule>,
        localization: Arc<Localization>,
        options: &PatcherOptions,
    ) -> Self {
        Self {
            transport,
            directory: TargetDirectory::new(),
            rules: rules.into_iter().filter(|r| !r.remote).collect(),
            localization,
            settings_page: SettingsPage::new(options.settings_bundle_url.clone()),
            injector: Injector::new(options.retry),
            pending: FxHashMap::default(),
        }
    }

    /// Returns the target directory.
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &TargetDirectory {
        &self.directory
    }

    /// Returns the local rules with their current `patched` flags.
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Enables target discovery notifications.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn start(&mut self) -> Result<()> {
        let request = Request::new(Command::Target(TargetCommand::SetDiscoverTargets {
            discover: true,
        }));
        self.transport.send(&request).await?;
        debug!(worker = WORKER, "Target discovery enabled");
        Ok(())
    }

    /// Runs until the browser-level socket closes.
    ///
    /// # Errors
    ///
    /// Returns transport errors and protocol parse errors.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        loop {
            match self.transport.receive().await? {
                Received::Message(message) => self.handle_message(message).await?,
                Received::Disconnected => {
                    warn!(
                        worker = WORKER,
                        targets = self.directory.len(),
                        "Browser debug socket closed"
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Applies one incoming message.
    ///
    /// # Errors
    ///
    /// Returns transport errors and protocol parse errors.
    pub async fn handle_message(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Response(response) => self.handle_response(response).await,
            Message::Event(event) => self.handle_event(&event).await,
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    async fn handle_event(&mut self, event: &Event) -> Result<()> {
        match event.parse()? {
            ParsedEvent::TargetCreated { target_info } => {
                let target_id = target_info.target_id.clone();
                self.directory.upsert(Target::from(&target_info));
                self.attach(target_id).await?;
            }

            ParsedEvent::TargetInfoChanged { target_info } => {
                self.directory.upsert(Target::from(&target_info));
                if target_info.attached {
                    self.request_details(&target_info.target_id).await?;
                }
            }

            ParsedEvent::AttachedToTarget {
                session_id,
                target_info,
            } => {
                self.directory.upsert(Target::from(&target_info));
                self.bind_session(&target_info.target_id, session_id).await?;
            }

            ParsedEvent::DetachedFromTarget { session_id, .. } => {
                if let Some(target_id) = self.directory.detach(&session_id) {
                    debug!(worker = WORKER, %target_id, %session_id, "Session detached");
                }
            }

            ParsedEvent::TargetDestroyed { target_id } => {
                self.directory.remove(&target_id);
                self.pending.retain(|_, p| p.target_id() != &target_id);
                debug!(worker = WORKER, %target_id, "Target destroyed");
            }

            ParsedEvent::FrameResized => {}

            ParsedEvent::LoadEventFired | ParsedEvent::Unknown { .. } => {
                trace!(worker = WORKER, method = %event.method, "Ignoring event");
            }
        }

        Ok(())
    }

    async fn attach(&mut self, target_id: TargetId) -> Result<()> {
        let request = Request::new(Command::Target(TargetCommand::AttachToTarget {
            target_id: target_id.clone(),
            flatten: true,
        }));
        self.transport.send(&request).await?;

        self.directory.set_phase(&target_id, TargetPhase::Attaching);
        trace!(worker = WORKER, %target_id, id = %request.id, "Attaching");
        self.pending.insert(request.id, Pending::Attach { target_id });
        Ok(())
    }

    async fn bind_session(&mut self, target_id: &TargetId, session_id: SessionId) -> Result<()> {
        debug!(worker = WORKER, %target_id, %session_id, "Session bound");
        self.directory.mark_attached(target_id, session_id);

        let deferred = self
            .directory
            .get(target_id)
            .is_some_and(|t| t.details_deferred);
        if deferred {
            self.request_details(target_id).await?;
        }
        Ok(())
    }

    async fn request_details(&mut self, target_id: &TargetId) -> Result<()> {
        let Some(session_id) = self.directory.session_for(target_id).cloned() else {
            // Session not bound yet; resume once the attach response arrives.
            if let Some(target) = self.directory.get_mut(target_id) {
                target.details_deferred = true;
            }
            trace!(worker = WORKER, %target_id, "Deferring details until attached");
            return Ok(());
        };

        let request =
            Request::for_session(session_id, Command::evaluate_by_value(DETAILS_EXPRESSION));
        self.transport.send(&request).await?;

        if let Some(target) = self.directory.get_mut(target_id) {
            target.details_deferred = false;
            target.phase = TargetPhase::DetailsRequested;
        }
        self.pending.insert(
            request.id,
            Pending::Details {
                target_id: target_id.clone(),
            },
        );
        Ok(())
    }

    // ========================================================================
    // Responses
    // ========================================================================

    async fn handle_response(&mut self, response: Response) -> Result<()> {
        let Some(pending) = self.pending.remove(&response.id) else {
            trace!(worker = WORKER, id = %response.id, "Uncorrelated response");
            return Ok(());
        };

        match pending {
            Pending::Attach { target_id } => {
                if let Some(error) = &response.error {
                    warn!(worker = WORKER, %target_id, error = %error.message, "Attach failed");
                    self.directory.set_phase(&target_id, TargetPhase::Seen);
                    return Ok(());
                }

                let session_id = response
                    .get_str("/sessionId")
                    .map(SessionId::from)
                    .ok_or_else(|| Error::protocol("attach response lacks sessionId"))?;
                self.bind_session(&target_id, session_id).await
            }

            Pending::Details { target_id } => {
                if response.is_error() || response.has_exception() {
                    debug!(worker = WORKER, %target_id, "Discarding failed details response");
                    return Ok(());
                }

                let value = response
                    .pointer("/result/value")
                    .ok_or_else(|| Error::protocol("details response lacks result value"))?;
                let details = PageDetails::deserialize(value)
                    .map_err(|e| Error::protocol(format!("malformed details: {e}")))?;

                self.apply_details(&target_id, details).await
            }

            Pending::Inject {
                target_id,
                payload,
                request,
                attempt,
            } => {
                let outcome = InjectionOutcome::classify(&response);

                if self.injector.should_retry(&payload, &outcome, attempt) {
                    debug!(worker = WORKER, %target_id, attempt, "Page not ready, re-issuing script");
                    let delay = self.injector.retry_policy().delay;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    let again = request.reissue();
                    self.transport.send(&again).await?;
                    self.pending.insert(
                        again.id,
                        Pending::Inject {
                            target_id,
                            payload,
                            request: again,
                            attempt: attempt + 1,
                        },
                    );
                    return Ok(());
                }

                match outcome.into_result() {
                    Ok(()) => {
                        debug!(worker = WORKER, %target_id, kind = payload.kind(), attempt, "Payload injected");
                    }
                    Err(e) => {
                        warn!(worker = WORKER, %target_id, kind = payload.kind(), attempt, error = %e, "Injection failed");
                    }
                }
                Ok(())
            }

            Pending::Settings { target_id } => {
                if let Err(e) = InjectionOutcome::classify(&response).into_result() {
                    warn!(worker = WORKER, %target_id, error = %e, "Settings bootstrap failed");
                }
                Ok(())
            }
        }
    }

    async fn apply_details(&mut self, target_id: &TargetId, details: PageDetails) -> Result<()> {
        if let Some(target) = self.directory.get_mut(target_id) {
            target.title.clone_from(&details.title);
            target.url.clone_from(&details.url);
        }

        let Some(session_id) = self.directory.session_for(target_id).cloned() else {
            debug!(worker = WORKER, %target_id, "Details arrived after detach");
            return Ok(());
        };

        let title = details.title.as_str();
        let mut matched = false;

        if self.localization.is_settings_title(title) {
            info!(worker = WORKER, %title, "Bootstrapping settings page");
            let request = self
                .settings_page
                .request(session_id.clone(), &self.localization);
            self.transport.send(&request).await?;
            self.pending.insert(
                request.id,
                Pending::Settings {
                    target_id: target_id.clone(),
                },
            );
            matched = true;
        }

        let hits: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches_title(title))
            .map(|(index, _)| index)
            .collect();

        for index in hits {
            info!(worker = WORKER, %title, url = %details.url, "Patching");

            let rule = &mut self.rules[index];
            rule.mark_patched();
            let payloads: Vec<Payload> = rule
                .css
                .iter()
                .map(Payload::style)
                .chain(rule.js.iter().map(Payload::script_source))
                .collect();

            for payload in payloads {
                self.inject(target_id, &session_id, payload).await?;
            }
            matched = true;
        }

        let phase = if matched {
            TargetPhase::Matched
        } else {
            TargetPhase::Unmatched
        };
        self.directory.set_phase(target_id, phase);
        Ok(())
    }

    async fn inject(
        &mut self,
        target_id: &TargetId,
        session_id: &SessionId,
        payload: Payload,
    ) -> Result<()> {
        let request = payload.request(Some(session_id));
        self.transport.send(&request).await?;
        self.pending.insert(
            request.id,
            Pending::Inject {
                target_id: target_id.clone(),
                payload,
                request,
                attempt: 1,
            },
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
