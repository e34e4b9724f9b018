//! Affinity context: the single place where presentation-visible state
//! changes.
//!
//! Selection transitions, menu publication, and auto-navigation decisions are
//! marshaled through a [`UiDispatcher`]. Matcher evaluation and descriptor
//! lookups may run anywhere.
//!
//! [`AffinityThread`] is the stock dispatcher: one task draining a high- and a
//! low-priority job queue, running jobs strictly one at a time.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::BoxFuture;

/// Scheduling priority for affinity jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Runs before any queued low-priority job.
    High,
    Low,
}

/// A unit of work for the affinity context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors from dispatching onto the affinity context.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("affinity context has shut down")]
    Closed,

    #[error("affinity job panicked")]
    Panicked,
}

/// Runs jobs on the affinity context.
pub trait UiDispatcher: Send + Sync {
    /// Queue `job`; the returned future resolves once the job has run.
    fn dispatch(&self, priority: Priority, job: Job) -> BoxFuture<'_, Result<(), DispatchError>>;
}

/// Run `f` on the affinity context and return its result.
pub async fn run_on_affinity<F, R>(
    dispatcher: &dyn UiDispatcher,
    priority: Priority,
    f: F,
) -> Result<R, DispatchError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (result_tx, result_rx) = oneshot::channel();
    dispatcher
        .dispatch(
            priority,
            Box::new(move || {
                let _ = result_tx.send(f());
            }),
        )
        .await?;
    result_rx.await.map_err(|_| DispatchError::Closed)
}

struct QueuedJob {
    job: Job,
    done: oneshot::Sender<Result<(), DispatchError>>,
}

/// The affinity loop. Create with [`AffinityThread::new`] and drive with
/// [`AffinityThread::run`], or use [`AffinityThread::spawn`].
pub struct AffinityThread {
    high_rx: mpsc::UnboundedReceiver<QueuedJob>,
    low_rx: mpsc::UnboundedReceiver<QueuedJob>,
}

/// Handle for queueing jobs onto a running [`AffinityThread`].
///
/// The loop stops once every handle has been dropped.
#[derive(Clone)]
pub struct AffinityHandle {
    high_tx: mpsc::UnboundedSender<QueuedJob>,
    low_tx: mpsc::UnboundedSender<QueuedJob>,
}

impl AffinityThread {
    pub fn new() -> (Self, AffinityHandle) {
        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (low_tx, low_rx) = mpsc::unbounded_channel();
        (Self { high_rx, low_rx }, AffinityHandle { high_tx, low_tx })
    }

    /// Start the loop on the current tokio runtime.
    pub fn spawn() -> AffinityHandle {
        let (thread, handle) = Self::new();
        tokio::spawn(thread.run());
        handle
    }

    /// Run jobs until every handle is dropped.
    pub async fn run(mut self) {
        info!("Affinity context started");

        loop {
            let queued = tokio::select! {
                biased;
                Some(queued) = self.high_rx.recv() => queued,
                Some(queued) = self.low_rx.recv() => queued,
                else => break,
            };

            let outcome = match catch_unwind(AssertUnwindSafe(queued.job)) {
                Ok(()) => Ok(()),
                Err(_) => {
                    warn!("Affinity job panicked");
                    Err(DispatchError::Panicked)
                }
            };
            let _ = queued.done.send(outcome);
        }

        debug!("Affinity context stopped");
    }
}

impl UiDispatcher for AffinityHandle {
    fn dispatch(&self, priority: Priority, job: Job) -> BoxFuture<'_, Result<(), DispatchError>> {
        let (done, done_rx) = oneshot::channel();
        let queue = match priority {
            Priority::High => &self.high_tx,
            Priority::Low => &self.low_tx,
        };
        let sent = queue.send(QueuedJob { job, done });

        Box::pin(async move {
            sent.map_err(|_| DispatchError::Closed)?;
            done_rx.await.map_err(|_| DispatchError::Closed)?
        })
    }
}

/// Dispatcher that runs jobs immediately on the caller.
///
/// Useful where the caller already is the affinity context.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn dispatch(&self, _priority: Priority, job: Job) -> BoxFuture<'_, Result<(), DispatchError>> {
        let outcome = catch_unwind(AssertUnwindSafe(job)).map_err(|_| DispatchError::Panicked);
        Box::pin(async move { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_run_on_affinity_returns_value() {
        let handle = AffinityThread::spawn();
        let value = run_on_affinity(&handle, Priority::Low, || 40 + 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_high_priority_runs_first() {
        let (thread, handle) = AffinityThread::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        // Queue before the loop starts so both queues are non-empty
        let low = {
            let order = Arc::clone(&order);
            handle.dispatch(Priority::Low, Box::new(move || order.lock().unwrap().push("low")))
        };
        let high = {
            let order = Arc::clone(&order);
            handle.dispatch(Priority::High, Box::new(move || order.lock().unwrap().push("high")))
        };

        tokio::spawn(thread.run());
        high.await.unwrap();
        low.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_loop() {
        let handle = AffinityThread::spawn();
        let result = handle.dispatch(Priority::High, Box::new(|| panic!("boom"))).await;
        assert!(matches!(result, Err(DispatchError::Panicked)));

        let value = run_on_affinity(&handle, Priority::High, || "still alive").await.unwrap();
        assert_eq!(value, "still alive");
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown() {
        let (thread, handle) = AffinityThread::new();
        drop(thread);
        let result = run_on_affinity(&handle, Priority::Low, || ()).await;
        assert!(matches!(result, Err(DispatchError::Closed)));
    }

    #[tokio::test]
    async fn test_inline_dispatcher() {
        let value = run_on_affinity(&InlineDispatcher, Priority::High, || 7).await.unwrap();
        assert_eq!(value, 7);
    }
}
