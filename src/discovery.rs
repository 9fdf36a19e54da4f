//! Endpoint discovery over the host's HTTP debug endpoints.
//!
//! | Endpoint | Returns |
//! |----------|---------|
//! | `GET {base}/json` | Open pages with their per-page debug socket |
//! | `GET {base}/json/version` | Browser-level debug socket |
//!
//! Every call is a short-lived request. Failures surface as
//! [`Error::Discovery`] and never end the caller; it retries on its own
//! cadence.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default discovery base URL.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Default per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// Page URL that never receives patches.
pub const BLANK_PAGE: &str = "about:blank";

// ============================================================================
// PageInfo
// ============================================================================

/// One entry of the "list pages" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    /// Target identifier.
    #[serde(default)]
    pub id: String,

    /// Target kind (`page`, `iframe`, ...).
    #[serde(rename = "type", default)]
    pub page_type: String,

    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Document URL.
    #[serde(default)]
    pub url: String,

    /// Standalone debug socket for this page.
    ///
    /// Absent when another client already holds the page.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

impl PageInfo {
    /// Returns `true` for the blank placeholder page.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.url.contains(BLANK_PAGE)
    }
}

#[derive(Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

// ============================================================================
// Discovery
// ============================================================================

/// HTTP client for the host's discovery endpoints.
#[derive(Debug, Clone)]
pub struct Discovery {
    client: reqwest::Client,
    base: Url,
}

impl Discovery {
    /// Creates a discovery client for `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `base_url` is not a valid URL
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a discovery client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::new`].
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base })
    }

    /// Returns the base URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Lists every page the host currently has open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the endpoint is unreachable or the body
    /// is not a JSON page list.
    pub async fn list_pages(&self) -> Result<Vec<PageInfo>> {
        let pages: Vec<PageInfo> = self.get_json("json").await?;
        debug!(count = pages.len(), "Discovered pages");
        Ok(pages)
    }

    /// Returns the browser-level debug socket address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the endpoint is unreachable or the body
    /// lacks `webSocketDebuggerUrl`.
    pub async fn browser_debug_address(&self) -> Result<String> {
        let version: VersionInfo = self.get_json("json/version").await?;
        debug!(address = %version.web_socket_debugger_url, "Browser debug address");
        Ok(version.web_socket_debugger_url)
    }

    /// GETs `path` relative to the base URL and decodes JSON.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let endpoint = self.base.join(path)?;
        trace!(%endpoint, "Discovery request");

        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|e| Error::discovery(endpoint.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::discovery(
                endpoint.as_str(),
                format!("unexpected status {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::discovery(endpoint.as_str(), e.to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::discovery(endpoint.as_str(), format!("malformed body: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::{http_stub, refused_endpoint};

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let discovery = Discovery::new("http://localhost:8080").expect("discovery");
        assert_eq!(discovery.base_url().as_str(), "http://localhost:8080/");
        assert_eq!(
            discovery.base_url().join("json/version").expect("join").as_str(),
            "http://localhost:8080/json/version"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(Discovery::new("not a url"), Err(Error::Url(_))));
    }

    #[test]
    fn test_blank_page() {
        let page = PageInfo {
            id: "1".into(),
            page_type: "page".into(),
            title: String::new(),
            url: "about:blank".into(),
            web_socket_debugger_url: None,
        };
        assert!(page.is_blank());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let base = http_stub(vec![(
            "/json",
            r#"[{"id":"A","type":"page","title":"Store","url":"https://steamloopback.host/foo/bar","webSocketDebuggerUrl":"ws://localhost:8080/devtools/page/A"},{"id":"B","type":"page","title":"","url":"about:blank"}]"#.into(),
        )])
        .await;

        let pages = Discovery::new(&base)
            .expect("discovery")
            .list_pages()
            .await
            .expect("pages");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "Store");
        assert_eq!(
            pages[0].web_socket_debugger_url.as_deref(),
            Some("ws://localhost:8080/devtools/page/A")
        );
        assert!(pages[1].web_socket_debugger_url.is_none());
    }

    #[tokio::test]
    async fn test_browser_debug_address() {
        let base = http_stub(vec![(
            "/json/version",
            r#"{"Browser":"Chrome/126","webSocketDebuggerUrl":"ws://localhost:8080/devtools/browser/xyz"}"#.into(),
        )])
        .await;

        let address = Discovery::new(&base)
            .expect("discovery")
            .browser_debug_address()
            .await
            .expect("address");

        assert_eq!(address, "ws://localhost:8080/devtools/browser/xyz");
    }

    #[tokio::test]
    async fn test_malformed_body_is_discovery_error() {
        let base = http_stub(vec![("/json", r#"{"not":"a list"}"#.into())]).await;

        let result = Discovery::new(&base).expect("discovery").list_pages().await;
        assert!(matches!(result, Err(Error::Discovery { .. })));
    }

    #[tokio::test]
    async fn test_http_error_status_is_discovery_error() {
        let base = http_stub(vec![("/json", "[]".into())]).await;

        let result = Discovery::new(&base)
            .expect("discovery")
            .browser_debug_address()
            .await;
        assert!(matches!(result, Err(Error::Discovery { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused_is_discovery_error() {
        let result = Discovery::new(&refused_endpoint().await)
            .expect("discovery")
            .list_pages()
            .await;

        let err = result.expect_err("refused");
        assert!(err.is_discovery_error());
        assert!(err.is_recoverable());
    }
}
