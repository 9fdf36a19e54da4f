//! Process-level orchestration.
//!
//! A [`Patcher`] owns the loaded configuration, localization and options,
//! and runs three independent workers:
//!
//! | Worker | Socket | Restart policy |
//! |--------|--------|----------------|
//! | `browser` | browser-level debug socket | [`RestartPolicy::Exit`] |
//! | `remote` | one socket per remote page | [`RestartPolicy::Restart`] |
//! | `control` | external collaborator | [`RestartPolicy::Exit`] |
//!
//! Workers share nothing mutable. Each receives its own copy of the rules it
//! needs; localization is shared read-only.
//!
//! # Example
//!
//! ```no_run
//! use cef_patcher::{Localization, PatchConfig, Patcher};
//!
//! # async fn example() -> cef_patcher::Result<()> {
//! let patcher = Patcher::builder()
//!     .config(PatchConfig::load("config.json"))
//!     .localization(Localization::load("english.json")?)
//!     .build()?;
//!
//! patcher.run().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

use crate::client::{self, BrowserClient};
use crate::config::{Localization, PatchConfig, PatchRule};
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::options::PatcherOptions;
use crate::remote::{self, RemotePatcher};
use crate::supervisor::{RestartPolicy, supervise};
use crate::transport::TransportSession;

// ============================================================================
// ControlChannel
// ============================================================================

/// External control listener run alongside the patch workers.
#[async_trait]
pub trait ControlChannel: Send + Sync + 'static {
    /// Serves the channel until it closes.
    ///
    /// # Errors
    ///
    /// Any error ends the control worker; the patch workers keep running.
    async fn serve(&self) -> Result<()>;
}

// ============================================================================
// PatcherBuilder
// ============================================================================

/// Builder for a [`Patcher`].
///
/// Use [`Patcher::builder()`] to create one.
#[derive(Default)]
pub struct PatcherBuilder {
    config: Option<PatchConfig>,
    localization: Option<Localization>,
    options: Option<PatcherOptions>,
    control: Option<Arc<dyn ControlChannel>>,
}

impl fmt::Debug for PatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatcherBuilder")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("control", &self.control.is_some())
            .finish_non_exhaustive()
    }
}

impl PatcherBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the patch configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: PatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the localized strings. Defaults to an empty map.
    #[inline]
    #[must_use]
    pub fn localization(mut self, localization: Localization) -> Self {
        self.localization = Some(localization);
        self
    }

    /// Sets the worker options. Defaults to [`PatcherOptions::default`].
    #[inline]
    #[must_use]
    pub fn options(mut self, options: PatcherOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Runs `channel` as the third worker.
    #[inline]
    #[must_use]
    pub fn control_channel(mut self, channel: impl ControlChannel) -> Self {
        self.control = Some(Arc::new(channel));
        self
    }

    /// Builds the patcher.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no configuration was set
    /// - [`Error::Url`] if the discovery endpoint is not a valid URL
    pub fn build(self) -> Result<Patcher> {
        let config = self.config.ok_or_else(|| {
            Error::config(
                "Patch configuration is required. Use .config() to set it.\n\
                 Example: Patcher::builder().config(PatchConfig::load(\"config.json\"))",
            )
        })?;

        let options = self.options.unwrap_or_default();
        Url::parse(&options.endpoint)?;

        Ok(Patcher {
            config,
            localization: Arc::new(self.localization.unwrap_or_default()),
            options,
            control: self.control,
        })
    }
}

// ============================================================================
// Patcher
// ============================================================================

/// Runs the patch workers for one process lifetime.
pub struct Patcher {
    config: PatchConfig,
    localization: Arc<Localization>,
    options: PatcherOptions,
    control: Option<Arc<dyn ControlChannel>>,
}

impl fmt::Debug for Patcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("control", &self.control.is_some())
            .finish_non_exhaustive()
    }
}

impl Patcher {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> PatcherBuilder {
        PatcherBuilder::new()
    }

    /// Returns the patch configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Returns the worker options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &PatcherOptions {
        &self.options
    }

    /// Spawns every worker and returns their supervisor handles by name.
    ///
    /// The remote worker is skipped when the configuration failed to load.
    #[must_use]
    pub fn spawn(self) -> Vec<(&'static str, JoinHandle<()>)> {
        let mut workers = Vec::with_capacity(3);

        let local = self.config.local_rules();
        let localization = Arc::clone(&self.localization);
        let options = self.options.clone();
        workers.push((
            client::WORKER,
            supervise(client::WORKER, RestartPolicy::Exit, move || {
                run_browser(local.clone(), Arc::clone(&localization), options.clone())
            }),
        ));

        if self.config.config_fail {
            warn!("Patch configuration failed to load, remote worker disabled");
        } else {
            let remote_rules = self.config.remote_rules();
            let options = self.options.clone();
            let policy = RestartPolicy::restart_after(self.options.discovery_interval);
            workers.push((
                remote::WORKER,
                supervise(remote::WORKER, policy, move || {
                    let rules = remote_rules.clone();
                    let options = options.clone();
                    async move { RemotePatcher::new(rules, &options)?.run().await }
                }),
            ));
        }

        if let Some(control) = self.control {
            workers.push((
                "control",
                supervise("control", RestartPolicy::Exit, move || {
                    let control = Arc::clone(&control);
                    async move { control.serve().await }
                }),
            ));
        }

        info!(workers = workers.len(), "Patcher started");
        workers
    }

    /// Runs every worker and waits until all of them have stopped.
    pub async fn run(self) {
        for (name, handle) in self.spawn() {
            if let Err(e) = handle.await {
                error!(worker = name, error = %e, "Supervisor task failed");
            }
        }
        info!("All workers stopped");
    }
}

// ============================================================================
// Browser Worker
// ============================================================================

/// Finds the browser-level socket and runs the attach/evaluate loop on it.
///
/// Discovery is retried until the host answers.
async fn run_browser(
    rules: Vec<PatchRule>,
    localization: Arc<Localization>,
    options: PatcherOptions,
) -> Result<()> {
    let discovery = Discovery::with_timeout(&options.endpoint, options.http_timeout)?;

    let address = loop {
        match discovery.browser_debug_address().await {
            Ok(address) => break address,
            Err(e) if e.is_discovery_error() => {
                warn!(worker = client::WORKER, error = %e, "Browser not reachable, retrying");
                tokio::time::sleep(options.discovery_interval).await;
            }
            Err(e) => return Err(e),
        }
    };

    let session = TransportSession::connect(&address).await?;
    info!(worker = client::WORKER, %address, "Connected to browser");

    BrowserClient::new(session, rules, localization, &options)
        .run()
        .await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::test_support::refused_endpoint;

    struct Flag(Arc<AtomicBool>);

    #[async_trait]
    impl ControlChannel for Flag {
        async fn serve(&self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_build_requires_config() {
        let result = Patcher::builder().build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_bad_endpoint() {
        let result = Patcher::builder()
            .config(PatchConfig::default())
            .options(PatcherOptions::default().with_endpoint("::nope"))
            .build();
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn test_failed_config_skips_remote_worker() {
        let served = Arc::new(AtomicBool::new(false));
        let options = PatcherOptions::default()
            .with_endpoint(refused_endpoint().await)
            .with_discovery_interval(Duration::from_millis(10));

        let workers = Patcher::builder()
            .config(PatchConfig::failed())
            .options(options)
            .control_channel(Flag(Arc::clone(&served)))
            .build()
            .expect("patcher")
            .spawn();

        let names: Vec<&str> = workers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["browser", "control"]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(served.load(Ordering::SeqCst));
        assert!(!workers[0].1.is_finished(), "browser keeps retrying discovery");

        for (_, handle) in workers {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_loaded_config_runs_remote_worker() {
        let options = PatcherOptions::default().with_endpoint(refused_endpoint().await);
        let workers = Patcher::builder()
            .config(PatchConfig::new(vec![PatchRule::remote("store").with_js("x")]))
            .options(options)
            .build()
            .expect("patcher")
            .spawn();

        let names: Vec<&str> = workers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["browser", "remote"]);

        for (_, handle) in workers {
            handle.abort();
        }
    }
}
