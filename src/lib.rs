//! CEF Patcher - style and script injection for embedded browser pages.
//!
//! This library speaks the DevTools protocol to a Chromium-embedded host and
//! applies configured patches to the pages it renders.
//!
//! # Architecture
//!
//! Two patch workers run side by side:
//!
//! - **Browser worker**: one multiplexed socket to the browser-level debug
//!   address. Attaches to every target, reads its title, and injects the
//!   matching local rules once per process run.
//! - **Remote worker**: polls the HTTP discovery endpoint and opens a
//!   dedicated socket to each page whose URL matches a remote rule, then
//!   re-injects on every load.
//!
//! Key design principles:
//!
//! - Each worker owns its sockets and state; nothing mutable is shared
//! - Incoming frames are parsed once into typed [`protocol`] messages
//! - A disconnect is a [`Received::Disconnected`] value, not an error
//! - A script-side `TypeError` means "page not ready": the evaluation is
//!   re-issued under the configured [`RetryPolicy`]
//!
//! # Quick Start
//!
//! ```no_run
//! use cef_patcher::{PatchConfig, Patcher, PatcherOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let patcher = Patcher::builder()
//!         .config(PatchConfig::load("config.json"))
//!         .options(PatcherOptions::new().with_endpoint("http://localhost:8080"))
//!         .build()?;
//!
//!     patcher.run().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Browser-level attach/evaluate state machine |
//! | [`config`] | Patch rules and localized strings |
//! | [`directory`] | Known targets and their sessions |
//! | [`discovery`] | HTTP discovery endpoints |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`inject`] | Payload expressions and the retry loop |
//! | [`options`] | Worker options |
//! | [`patcher`] | Worker orchestration |
//! | [`protocol`] | DevTools message types |
//! | [`remote`] | Remote page worker |
//! | [`settings_page`] | Settings-page bootstrap |
//! | [`supervisor`] | Worker restart policies |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Browser-level attach/evaluate state machine.
pub mod client;

/// Patch rules and localized strings.
pub mod config;

/// Known targets and their sessions.
pub mod directory;

/// HTTP discovery endpoints.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Payload expressions and the type-error retry loop.
pub mod inject;

/// Worker options.
pub mod options;

/// Worker orchestration.
///
/// Use [`Patcher::builder()`] to configure and start the workers.
pub mod patcher;

/// DevTools protocol message types.
pub mod protocol;

/// Remote page worker.
pub mod remote;

/// Settings-page bootstrap.
pub mod settings_page;

/// Worker restart policies.
pub mod supervisor;

/// WebSocket transport layer.
pub mod transport;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Worker types
pub use client::BrowserClient;
pub use patcher::{ControlChannel, Patcher, PatcherBuilder};
pub use remote::RemotePatcher;
pub use supervisor::{RestartPolicy, supervise};

// Configuration types
pub use config::{Localization, PatchConfig, PatchRule};
pub use options::{PatcherOptions, RetryPolicy};

// Discovery types
pub use discovery::{Discovery, PageInfo};

// Injection types
pub use inject::{InjectionOutcome, Injector, Payload, ScriptDelivery};
pub use settings_page::SettingsPage;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionId, TargetId};

// Transport types
pub use transport::{Received, Transport, TransportSession};
