//! Patch rules and localization strings.
//!
//! Both are loaded once at startup and handed to each worker. The only
//! mutation the workers ever make is flipping [`PatchRule::patched`] on
//! their own copy of the rules.
//!
//! # Patch Configuration Format
//!
//! ```json
//! {
//!   "patch": [
//!     { "url": "SteamUI", "remote": false, "css": "body { background: red }" },
//!     { "url": "steamloopback.host/foo", "remote": true, "js": "console.log(1)" }
//!   ]
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::discovery::BLANK_PAGE;
use crate::error::{Error, Result};

// ============================================================================
// PatchRule
// ============================================================================

/// One page-matching rule with the payloads to inject on a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRule {
    /// Pattern matched against the page title (local rules) or contained in
    /// the page URL (remote rules).
    #[serde(rename = "url")]
    pub url_pattern: String,

    /// Whether the page is only reachable through its own debug socket.
    #[serde(default)]
    pub remote: bool,

    /// Stylesheet text to inject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,

    /// Script to inject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,

    /// Set once the rule has fired in this process.
    #[serde(default)]
    pub patched: bool,
}

impl PatchRule {
    /// Creates a local rule matching pages titled `title`.
    #[must_use]
    pub fn local(title: impl Into<String>) -> Self {
        Self {
            url_pattern: title.into(),
            remote: false,
            css: None,
            js: None,
            patched: false,
        }
    }

    /// Creates a remote rule matching page URLs containing `pattern`.
    #[must_use]
    pub fn remote(pattern: impl Into<String>) -> Self {
        Self {
            remote: true,
            ..Self::local(pattern)
        }
    }

    /// Sets the stylesheet payload.
    #[inline]
    #[must_use]
    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    /// Sets the script payload.
    #[inline]
    #[must_use]
    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    /// Returns `true` if a page at `url` should receive this rule.
    ///
    /// True iff the rule has not fired, `url` contains the pattern and `url`
    /// is not the blank placeholder page.
    #[inline]
    #[must_use]
    pub fn should_patch(&self, url: &str) -> bool {
        !self.patched && url != BLANK_PAGE && url.contains(self.url_pattern.as_str())
    }

    /// Returns `true` if a local page titled `title` should receive this rule.
    #[inline]
    #[must_use]
    pub fn matches_title(&self, title: &str) -> bool {
        !self.remote && !self.patched && title == self.url_pattern
    }

    /// Records that the rule fired.
    #[inline]
    pub fn mark_patched(&mut self) {
        self.patched = true;
    }
}

// ============================================================================
// PatchConfig
// ============================================================================

/// The full patch-rule configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Configured rules, in file order.
    #[serde(default)]
    pub patch: Vec<PatchRule>,

    /// Set when the configuration could not be loaded.
    ///
    /// The remote worker does not start when this is set.
    #[serde(default, skip_serializing)]
    pub config_fail: bool,
}

impl PatchConfig {
    /// Creates a configuration from rules.
    #[must_use]
    pub fn new(patch: Vec<PatchRule>) -> Self {
        Self {
            patch,
            config_fail: false,
        }
    }

    /// Creates the placeholder returned when loading fails.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            patch: Vec::new(),
            config_fail: true,
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid patch config: {e}")))
    }

    /// Loads a configuration file.
    ///
    /// Never fails: unreadable or invalid files yield [`PatchConfig::failed`].
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        let loaded = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| Self::from_json_str(&text));

        match loaded {
            Ok(config) => {
                debug!(path = %path.display(), rules = config.patch.len(), "Patch config loaded");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load patch config");
                Self::failed()
            }
        }
    }

    /// Copies of the rules applied through the browser-level session.
    #[must_use]
    pub fn local_rules(&self) -> Vec<PatchRule> {
        self.patch.iter().filter(|r| !r.remote).cloned().collect()
    }

    /// Copies of the rules applied through per-page sockets.
    #[must_use]
    pub fn remote_rules(&self) -> Vec<PatchRule> {
        self.patch.iter().filter(|r| r.remote).cloned().collect()
    }
}

// ============================================================================
// Localization
// ============================================================================

/// Localized display strings for the active language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Localization {
    strings: FxHashMap<String, String>,
}

impl Localization {
    /// Title of the desktop settings page.
    pub const SETTINGS_TITLE: &'static str = "Settings_Title";

    /// Title of the in-game overlay settings page.
    pub const OVERLAY_SETTINGS_TITLE: &'static str = "AppOverlay_Toolbar_Settings";

    /// Label shown by the settings-page bundle.
    pub const SETTINGS_INTERFACE_LABEL: &'static str = "Settings_Page_Interface";

    /// Creates a localization from key/value pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            strings: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parses a localization object from JSON text.
    ///
    /// Non-string values are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: FxHashMap<String, serde_json::Value> = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("invalid localization: {e}")))?;

        Ok(Self::from_pairs(raw.into_iter().filter_map(|(k, v)| {
            v.as_str().map(|s| (k, s.to_string()))
        })))
    }

    /// Loads a localization file.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Config`] if it is not a JSON object
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns the string for `key`, or `""` if absent.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.strings.get(key).map(String::as_str).unwrap_or_default()
    }

    /// Returns `true` if `title` is one of the settings-page titles.
    ///
    /// Empty titles never match.
    #[must_use]
    pub fn is_settings_title(&self, title: &str) -> bool {
        !title.is_empty()
            && (title == self.get(Self::SETTINGS_TITLE)
                || title == self.get(Self::OVERLAY_SETTINGS_TITLE))
    }
}

// ============================================================================
// Tests
// ============================================================================
