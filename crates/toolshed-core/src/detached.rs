//! Fire-and-forget background work.
//!
//! Telemetry, notifications, and bookkeeping writes run detached from the
//! code path that triggered them. Their failures, including panics, are
//! reported through the supplied handler and never reach the caller.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::warn;

/// Spawn `future` without awaiting it.
///
/// `on_error` receives the error if the future fails. A panic is logged under
/// `label`. The returned handle completes once both have been handled, and
/// may be dropped.
pub fn spawn_detached<F, E, H>(label: &'static str, future: F, on_error: H) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
    H: FnOnce(E) + Send + 'static,
{
    let inner = tokio::spawn(future);
    tokio::spawn(async move {
        match inner.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => on_error(e),
            Err(join_error) => warn!(task = label, error = %join_error, "Detached task panicked"),
        }
    })
}

/// Error handler that logs the failure at warn level under `label`.
pub fn log_failure<E: Display>(label: &'static str) -> impl FnOnce(E) + Send + 'static {
    move |e| warn!(task = label, error = %e, "Detached task failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_error_reaches_handler() {
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);
        spawn_detached(
            "test",
            async { Err::<(), _>("nope") },
            move |e: &str| {
                assert_eq!(e, "nope");
                flag.store(true, Ordering::SeqCst);
            },
        )
        .await
        .unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_success_skips_handler() {
        spawn_detached(
            "test",
            async { Ok::<(), String>(()) },
            |_e: String| panic!("handler must not run"),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handle = spawn_detached(
            "test",
            async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                Ok::<(), String>(())
            },
            log_failure::<String>("test"),
        );
        assert!(handle.await.is_ok());
    }
}
