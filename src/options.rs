//! Runtime options shared by the workers.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cef_patcher::{PatcherOptions, RetryPolicy};
//!
//! let options = PatcherOptions::new()
//!     .with_endpoint("http://localhost:8080")
//!     .with_discovery_interval(Duration::from_millis(500))
//!     .with_retry_policy(RetryPolicy::bounded(50));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::discovery::{DEFAULT_ENDPOINT, DEFAULT_HTTP_TIMEOUT};
use crate::settings_page::DEFAULT_BUNDLE_URL;

// ============================================================================
// Constants
// ============================================================================

/// Default pause between discovery rounds.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bound on re-issuing a script evaluation that failed with the
/// type-error signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total evaluation attempts allowed. `None` retries until the page settles.
    pub max_attempts: Option<u32>,

    /// Pause before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retries until the page stops rejecting the script.
    #[inline]
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::ZERO,
        }
    }

    /// Gives up after `max_attempts` evaluations in total.
    ///
    /// The first evaluation always happens, so `0` behaves like `1`.
    #[inline]
    #[must_use]
    pub const fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(if max_attempts == 0 { 1 } else { max_attempts }),
            delay: Duration::ZERO,
        }
    }

    /// Sets the pause before each retry.
    #[inline]
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns `true` if another attempt may follow attempt number `attempt`
    /// (1-based).
    #[inline]
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

// ============================================================================
// PatcherOptions
// ============================================================================

/// Options for the patcher workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatcherOptions {
    /// Base URL of the HTTP discovery endpoints.
    pub endpoint: String,

    /// Pause between discovery rounds of the remote worker.
    pub discovery_interval: Duration,

    /// Per-request timeout for discovery queries.
    pub http_timeout: Duration,

    /// Script injection retry bound.
    pub retry: RetryPolicy,

    /// Companion bundle loaded into the settings page.
    pub settings_bundle_url: String,
}

impl Default for PatcherOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl PatcherOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            retry: RetryPolicy::unbounded(),
            settings_bundle_url: DEFAULT_BUNDLE_URL.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl PatcherOptions {
    /// Sets the discovery base URL.
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the pause between discovery rounds.
    #[inline]
    #[must_use]
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Sets the discovery HTTP timeout.
    #[inline]
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the script injection retry bound.
    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the settings-page bundle URL.
    #[inline]
    #[must_use]
    pub fn with_settings_bundle_url(mut self, url: impl Into<String>) -> Self {
        self.settings_bundle_url = url.into();
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
