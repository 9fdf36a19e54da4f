//! Remote patch worker.
//!
//! Remote pages are reachable only through their own debug socket. Each
//! discovery round lists the host's pages and, for every page whose URL
//! matches a remote rule, opens a dedicated session, prepares the page and
//! injects the rule's payloads. Injection repeats on every load event until
//! the page goes away.
//!
//! # Page Flow
//!
//! ```text
//! GET /json ──► url match? ──► connect page socket
//!                                   │
//!            Page.setBypassCSP ─────┤
//!            Page.enable ───────────┤
//!            Page.reload ───────────┤
//!                                   ▼
//!                     inject js, css ◄──── Page.loadEventFired
//!                                   │
//!                        disconnect ▼
//!                       back to discovery
//! ```
//!
//! Remote rules never become `patched`: a destroyed page is patched again
//! once discovery reports its replacement.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PatchRule;
use crate::discovery::{Discovery, PageInfo};
use crate::error::Result;
use crate::inject::{Injector, Payload};
use crate::options::PatcherOptions;
use crate::protocol::{Command, Message, PageCommand, ParsedEvent, Request};
use crate::transport::{Received, Transport, TransportSession};

// ============================================================================
// Constants
// ============================================================================

/// Worker name used in logs.
pub const WORKER: &str = "remote";

// ============================================================================
// RemotePatcher
// ============================================================================

/// Discovers remote pages and patches them over their own sockets.
#[derive(Debug, Clone)]
pub struct RemotePatcher {
    discovery: Discovery,
    rules: Vec<PatchRule>,
    injector: Injector,
    interval: Duration,
}

impl RemotePatcher {
    /// Creates a worker for the remote rules in `rules`.
    ///
    /// Local rules are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`](crate::Error::Url) if the discovery endpoint is
    /// not a valid URL.
    pub fn new(rules: Vec<PatchRule>, options: &PatcherOptions) -> Result<Self> {
        let discovery = Discovery::with_timeout(&options.endpoint, options.http_timeout)?;
        Ok(Self::with_discovery(discovery, rules, options))
    }

    /// Creates a worker over an existing discovery client.
    #[must_use]
    pub fn with_discovery(
        discovery: Discovery,
        rules: Vec<PatchRule>,
        options: &PatcherOptions,
    ) -> Self {
        Self {
            discovery,
            rules: rules.into_iter().filter(|r| r.remote).collect(),
            injector: Injector::new(options.retry),
            interval: options.discovery_interval,
        }
    }

    /// Returns the remote rules.
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Runs discovery rounds until a non-recoverable error.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors from a page session.
    pub async fn run(&self) -> Result<()> {
        info!(worker = WORKER, rules = self.rules.len(), "Remote worker started");

        loop {
            self.round().await?;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Performs one discovery round. Returns the number of pages patched.
    ///
    /// A page session that ends by disconnect counts as patched. A
    /// discovery failure is logged and reported as zero pages.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors from a page session.
    pub async fn round(&self) -> Result<usize> {
        let pages = match self.discovery.list_pages().await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(worker = WORKER, error = %e, "Discovery failed, retrying");
                return Ok(0);
            }
        };

        let mut patched = 0;
        for page in &pages {
            for rule in self.rules.iter().filter(|r| r.should_patch(&page.url)) {
                if self.patch(page, rule).await? {
                    patched += 1;
                }
            }
        }
        Ok(patched)
    }

    /// Connects to `page` and serves it until it disconnects.
    ///
    /// Returns `false` if the page has no debug socket or refuses the
    /// connection. A session that ends in an error is closed before the
    /// error is returned.
    async fn patch(&self, page: &PageInfo, rule: &PatchRule) -> Result<bool> {
        let Some(address) = page.web_socket_debugger_url.as_deref() else {
            debug!(worker = WORKER, url = %page.url, "Page has no debug socket");
            return Ok(false);
        };

        let mut session = match TransportSession::connect(address).await {
            Ok(session) => session,
            Err(e) => {
                warn!(worker = WORKER, url = %page.url, error = %e, "Cannot open page socket");
                return Ok(false);
            }
        };

        info!(worker = WORKER, url = %page.url, pattern = %rule.url_pattern, "Patching remote page");
        let served = self.patch_page(&mut session, rule).await;
        session.close().await;
        served?;
        Ok(true)
    }

    /// Prepares the page behind `transport` and keeps it patched.
    ///
    /// Returns once the page disconnects.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub async fn patch_page<T>(&self, transport: &mut T, rule: &PatchRule) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        for command in [
            PageCommand::SetBypassCsp { enabled: true },
            PageCommand::Enable,
            PageCommand::Reload,
        ] {
            transport.send(&Request::new(Command::Page(command))).await?;
        }

        self.inject_rule(transport, rule).await?;

        loop {
            match transport.receive().await? {
                Received::Disconnected => {
                    info!(worker = WORKER, pattern = %rule.url_pattern, "Instance destroyed, restarting discovery");
                    return Ok(());
                }
                Received::Message(Message::Event(event)) => {
                    if matches!(event.parse()?, ParsedEvent::LoadEventFired) {
                        debug!(worker = WORKER, pattern = %rule.url_pattern, "Page loaded, re-injecting");
                        self.inject_rule(transport, rule).await?;
                    }
                }
                Received::Message(Message::Response(_)) => {}
            }
        }
    }

    async fn inject_rule<T>(&self, transport: &mut T, rule: &PatchRule) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let payloads = rule
            .js
            .iter()
            .map(Payload::script_inline)
            .chain(rule.css.iter().map(Payload::style));

        for payload in payloads {
            let outcome = self.injector.inject(transport, None, &payload).await?;
            if let Err(e) = outcome.into_result() {
                warn!(worker = WORKER, kind = payload.kind(), error = %e, "Remote injection failed");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
