//! Command definitions organized by protocol domain.
//!
//! Commands follow the `Domain.methodName` format of the DevTools protocol.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Target discovery and attachment |
//! | `Page` | CSP bypass, lifecycle events, reload |
//! | `Runtime` | Script evaluation |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::TargetId;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Target(TargetCommand::SetDiscoverTargets { .. }) => "Target.setDiscoverTargets",
            Self::Target(TargetCommand::AttachToTarget { .. }) => "Target.attachToTarget",
            Self::Page(PageCommand::SetBypassCsp { .. }) => "Page.setBypassCSP",
            Self::Page(PageCommand::Enable) => "Page.enable",
            Self::Page(PageCommand::Reload) => "Page.reload",
            Self::Runtime(RuntimeCommand::Evaluate { .. }) => "Runtime.evaluate",
        }
    }

    /// Shorthand for a `Runtime.evaluate` returning a remote object reference.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Runtime(RuntimeCommand::Evaluate {
            expression: expression.into(),
            return_by_value: None,
        })
    }

    /// Shorthand for a `Runtime.evaluate` returning its result by value.
    #[inline]
    #[must_use]
    pub fn evaluate_by_value(expression: impl Into<String>) -> Self {
        Self::Runtime(RuntimeCommand::Evaluate {
            expression: expression.into(),
            return_by_value: Some(true),
        })
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Enable or disable target lifecycle notifications.
    #[serde(rename = "Target.setDiscoverTargets")]
    SetDiscoverTargets {
        /// Whether to emit `Target.targetCreated` and friends.
        discover: bool,
    },

    /// Attach to a target, creating a session.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
        /// Multiplex the session over the current socket.
        flatten: bool,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Toggle content-security-policy enforcement.
    #[serde(rename = "Page.setBypassCSP")]
    SetBypassCsp {
        /// `true` disables CSP for the page.
        enabled: bool,
    },

    /// Enable page lifecycle events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Reload the page.
    #[serde(rename = "Page.reload")]
    Reload,
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the page's main world.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript source.
        expression: String,
        /// Return the result as JSON instead of an object reference.
        #[serde(rename = "returnByValue", skip_serializing_if = "Option::is_none", default)]
        return_by_value: Option<bool>,
    },
}

// ============================================================================
// Tests
// ============================================================================
