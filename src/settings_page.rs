//! Settings-page bootstrap.
//!
//! When the host's settings surface is matched, a bootstrap script is
//! evaluated in it. The script defines the page-global
//! `localizedStringInterface` carrying one localized label, then appends
//! the companion UI bundle. Both steps are skipped if the bundle's
//! `<script>` tag is already present, so repeated matches within one page
//! lifetime are harmless.

// ============================================================================
// Imports
// ============================================================================

use crate::config::Localization;
use crate::identifiers::SessionId;
use crate::inject::json_string;
use crate::protocol::{Command, Request};

// ============================================================================
// Constants
// ============================================================================

/// Default companion bundle URL.
pub const DEFAULT_BUNDLE_URL: &str =
    "https://raw.githack.com/ShadowMonster99/millennium-steam-patcher/main/settings_modal/index.js";

/// Page-global the bundle reads its label from.
pub const LABEL_GLOBAL: &str = "localizedStringInterface";

// ============================================================================
// SettingsPage
// ============================================================================

/// Builds the settings-page bootstrap evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPage {
    bundle_url: String,
}

impl Default for SettingsPage {
    fn default() -> Self {
        Self::new(DEFAULT_BUNDLE_URL)
    }
}

impl SettingsPage {
    /// Creates a bootstrap loading the bundle at `bundle_url`.
    #[must_use]
    pub fn new(bundle_url: impl Into<String>) -> Self {
        Self {
            bundle_url: bundle_url.into(),
        }
    }

    /// Returns the bundle URL.
    #[inline]
    #[must_use]
    pub fn bundle_url(&self) -> &str {
        &self.bundle_url
    }

    /// Builds the bootstrap expression for `label`.
    #[must_use]
    pub fn expression(&self, label: &str) -> String {
        let url = json_string(&self.bundle_url);
        let selector = json_string(&format!("script[src={url}]"));
        let define = json_string(&format!("const {LABEL_GLOBAL} = {};", json_string(label)));

        format!(
            "!document.querySelectorAll({selector}).length \
             && document.head.appendChild(Object.assign(document.createElement('script'), {{ text: {define} }})) \
             && document.head.appendChild(Object.assign(document.createElement('script'), {{ src: {url} }}))"
        )
    }

    /// Builds the bootstrap request for `session`.
    #[must_use]
    pub fn request(&self, session: SessionId, localization: &Localization) -> Request {
        let label = localization.get(Localization::SETTINGS_INTERFACE_LABEL);
        Request::for_session(session, Command::evaluate(self.expression(label)))
    }
}

// ============================================================================
// Tests
// ============================================================================
