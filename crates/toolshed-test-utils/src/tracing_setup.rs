//! Tracing initialisation helpers for tests.
//!
//! [`init_test_tracing`] installs a process-wide subscriber writing to the
//! test harness. [`capture_faults`] installs a thread-scoped subscriber that
//! also records warnings and errors, for tests asserting that a failure was
//! logged.

use toolshed_core::logging::{FaultLog, FaultReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects the `RUST_LOG` environment variable.
///
/// Safe to call multiple times; later calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

/// Capture warnings and errors emitted on the current thread until the guard
/// is dropped.
///
/// Events from tasks running on other runtime workers are not captured; use
/// a current-thread runtime (the `#[tokio::test]` default).
///
/// # Example
///
/// ```ignore
/// let (faults, _guard) = toolshed_test_utils::tracing_setup::capture_faults();
/// tracing::warn!(tool = "jwt", "Check failed");
/// assert_eq!(faults.for_tool("jwt").len(), 1);
/// ```
pub fn capture_faults() -> (FaultReader, DefaultGuard) {
    let log = FaultLog::new(256);
    let reader = log.reader();
    let guard = tracing_subscriber::registry()
        .with(log)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .set_default();
    (reader, guard)
}
