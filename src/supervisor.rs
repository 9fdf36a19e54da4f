//! Worker supervision.
//!
//! Every long-running worker body runs inline inside one supervisor task.
//! The supervisor logs how the body ended (error or panic included) and
//! applies the worker's [`RestartPolicy`]. Aborting the supervisor handle
//! drops the running body with it.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::Result;

// ============================================================================
// RestartPolicy
// ============================================================================

/// What the supervisor does once a worker body has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Let the worker stay down.
    Exit,
    /// Start the worker again after `delay`.
    Restart {
        /// Pause before restarting.
        delay: Duration,
    },
}

impl RestartPolicy {
    /// Restart after `delay`.
    #[inline]
    #[must_use]
    pub const fn restart_after(delay: Duration) -> Self {
        Self::Restart { delay }
    }
}

// ============================================================================
// Supervision
// ============================================================================

/// Spawns `factory`'s worker body under `policy`.
///
/// The returned handle resolves once the supervisor gives up on the worker.
/// A body that returns an error or panics is logged with its worker name;
/// neither aborts the process. Aborting the handle stops the body.
pub fn supervise<F, Fut>(name: &'static str, policy: RestartPolicy, mut factory: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut runs: u64 = 0;

        loop {
            runs += 1;
            match AssertUnwindSafe(factory()).catch_unwind().await {
                Ok(Ok(())) => info!(worker = name, runs, "Worker finished"),
                Ok(Err(e)) => error!(worker = name, runs, error = %e, "Worker failed"),
                Err(panic) => {
                    error!(worker = name, runs, reason = panic_reason(&*panic), "Worker panicked");
                }
            }

            match policy {
                RestartPolicy::Exit => return,
                RestartPolicy::Restart { delay } => {
                    tokio::time::sleep(delay).await;
                    info!(worker = name, "Restarting worker");
                }
            }
        }
    })
}

/// Best-effort text of a panic payload.
fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test]
    async fn test_exit_runs_once_after_error() {
        let runs = counter();
        let seen = Arc::clone(&runs);

        supervise("test", RestartPolicy::Exit, move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::protocol("bad frame"))
            }
        })
        .await
        .expect("supervisor");

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let blow_up = true;
        let handle = supervise("test", RestartPolicy::Exit, move || async move {
            if blow_up {
                panic!("worker blew up");
            }
            Ok::<(), Error>(())
        });

        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_abort_stops_running_body() {
        let ticks = counter();
        let seen = Arc::clone(&ticks);

        let handle = supervise("test", RestartPolicy::Exit, move || {
            let seen = Arc::clone(&seen);
            async move {
                while seen.fetch_add(1, Ordering::SeqCst) < usize::MAX {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Ok::<(), Error>(())
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
        assert!(handle.await.is_err_and(|e| e.is_cancelled()));

        let at_abort = ticks.load(Ordering::SeqCst);
        assert!(at_abort > 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), at_abort);
    }

    #[test]
    fn test_panic_reason() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_reason(&*text), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_reason(&*owned), "owned boom");

        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_reason(&*other), "unknown panic");
    }

    #[tokio::test]
    async fn test_restart_runs_again() {
        let runs = counter();
        let seen = Arc::clone(&runs);

        let handle = supervise(
            "test",
            RestartPolicy::restart_after(Duration::from_millis(5)),
            move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::ConnectionClosed)
                }
            },
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("restarted");

        handle.abort();
    }
}
