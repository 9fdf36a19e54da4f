//! Command-line entry point.
//!
//! Loads the patch configuration and localization, then runs the patch
//! workers until all of them have stopped.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use cef_patcher::discovery::DEFAULT_ENDPOINT;
use cef_patcher::{Localization, PatchConfig, Patcher, PatcherOptions, Result, RetryPolicy};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Injects style and script patches into embedded browser pages.
#[derive(Parser, Debug)]
#[command(name = "cef-patcher", version, about)]
struct Args {
    /// Patch configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Localized strings for the active language.
    #[arg(long)]
    localization: Option<PathBuf>,

    /// Base URL of the host's discovery endpoints.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Pause between remote discovery rounds.
    #[arg(long, default_value_t = 1000)]
    discovery_interval_ms: u64,

    /// Give up on a script after this many evaluations. Unbounded if unset.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_inject_attempts: Option<u32>,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn options(&self) -> PatcherOptions {
        let retry = self
            .max_inject_attempts
            .map_or_else(RetryPolicy::unbounded, RetryPolicy::bounded);

        PatcherOptions::new()
            .with_endpoint(self.endpoint.clone())
            .with_discovery_interval(Duration::from_millis(self.discovery_interval_ms))
            .with_retry_policy(retry)
    }

    fn localization(&self) -> Localization {
        let Some(path) = &self.localization else {
            return Localization::default();
        };

        Localization::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Failed to load localization");
            Localization::default()
        })
    }
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let fallback = if debug {
        "cef_patcher=debug"
    } else {
        "cef_patcher=info"
    };
    let filter = if debug {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let patcher = Patcher::builder()
        .config(PatchConfig::load(&args.config))
        .localization(args.localization())
        .options(args.options())
        .build()?;

    patcher.run().await;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("cef-patcher").chain(extra.iter().copied()))
    }

    #[test]
    fn test_zero_inject_attempts_rejected() {
        let err = parse(&["--max-inject-attempts", "0"]).expect_err("zero attempts");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_inject_attempts_bound_the_retry_policy() {
        let args = parse(&["--max-inject-attempts", "3"]).expect("args");
        assert_eq!(args.options().retry, RetryPolicy::bounded(3));

        let args = parse(&[]).expect("args");
        assert_eq!(args.options().retry, RetryPolicy::unbounded());
    }
}
