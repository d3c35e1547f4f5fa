//! Single-slot cooperative background-operation supervisor.
//!
//! A [`TaskRunner`] manages at most one concurrently running background
//! operation. Cancellation is advisory: the operation receives a
//! [`CancellationToken`] and is expected to check it at every natural
//! suspension point (poll tick, timed receive). The runner never aborts the
//! underlying task — a loop that overruns its stop timeout keeps running
//! until it next observes the token.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error type for runner misuse.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunnerError {
    /// `start` was called while a prior operation had not completed.
    ///
    /// This is a programming-usage error on the caller's side, not a
    /// transient condition to retry.
    #[error("a background operation is already running")]
    AlreadyRunning,
}

/// Outcome of a bounded stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The operation observed cancellation and exited within the timeout.
    Stopped,
    /// The timeout elapsed first. The operation is still running and owns
    /// its backend resources until it next checks the token.
    TimedOut,
}

struct ActiveRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
    /// Dropped by the wrapper task when the operation ends, however it ends.
    done_rx: watch::Receiver<()>,
}

/// Supervisor for at most one background operation.
pub struct TaskRunner {
    active: Mutex<Option<ActiveRun>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }

    /// Start a background operation.
    ///
    /// The operation is constructed from the cancellation token it must
    /// honor. Fails with [`RunnerError::AlreadyRunning`] if a prior
    /// operation has not completed — including one whose stop request timed
    /// out and which is still winding down.
    pub fn start<F, Fut>(&self, op: F) -> Result<(), RunnerError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock();
        if let Some(run) = active.as_ref() {
            if !run.handle.is_finished() {
                return Err(RunnerError::AlreadyRunning);
            }
        }

        let token = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(());
        let fut = op(token.clone());
        let handle = tokio::spawn(async move {
            fut.await;
            drop(done_tx);
        });

        *active = Some(ActiveRun {
            token,
            handle,
            done_rx,
        });
        Ok(())
    }

    /// Whether an operation is currently running.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Raise the cancellation signal and wait up to `timeout` for the
    /// operation to exit.
    ///
    /// Returns [`StopOutcome::TimedOut`] if the operation did not observe
    /// cancellation in time; it is left running, never forcibly terminated,
    /// because killing it could leave backend resources (handles, shared
    /// memory) in a corrupt state.
    pub async fn request_stop(&self, timeout: Duration) -> StopOutcome {
        let waiter = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(run) if !run.handle.is_finished() => {
                    run.token.cancel();
                    Some(run.done_rx.clone())
                }
                _ => None,
            }
        };

        let Some(mut done_rx) = waiter else {
            return StopOutcome::Stopped;
        };

        let wait = async {
            // `changed` resolves with Err once the wrapper drops the sender.
            let _ = done_rx.changed().await;
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => {
                debug!("background operation stopped");
                StopOutcome::Stopped
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "background operation did not stop within timeout; leaving it to wind down"
                );
                StopOutcome::TimedOut
            }
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRunner {
    /// Raises cancellation without blocking. The running operation, if any,
    /// exits on its own once it observes the token.
    fn drop(&mut self) {
        if let Some(run) = self.active.get_mut() {
            run.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_when_idle_succeeds() {
        let runner = TaskRunner::new();
        let result = runner.start(|cancel| async move {
            cancel.cancelled().await;
        });
        assert!(result.is_ok());
        assert!(runner.is_running());
        runner.request_stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let runner = TaskRunner::new();
        assert_eq!(
            runner.request_stop(Duration::from_millis(10)).await,
            StopOutcome::Stopped
        );
    }

    #[tokio::test]
    async fn test_completed_operation_frees_the_slot() {
        let runner = TaskRunner::new();
        runner.start(|_| async {}).expect("first start");

        // Give the trivial operation time to finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!runner.is_running());
        assert!(runner.start(|_| async {}).is_ok());
    }
}
