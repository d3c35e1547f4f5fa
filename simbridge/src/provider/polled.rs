//! Timed-poll backend link for shared-memory table backends.
//!
//! SimConnect, FSUIPC, and Falcon BMS all expose their state as a table the
//! bridge polls on a fixed interval. The table layout and its parsing are
//! external collaborators behind [`TableReader`]; this link owns the poll
//! cadence, reconnect backoff, and error classification plumbing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::{backoff_delay, BackendCommand, BackendKind, BackendLink, LinkContext, LinkHandle};
use crate::error::ProviderError;
use crate::snapshot::TelemetrySnapshot;

/// A classified fault from a table reader.
///
/// `fatal` marks errors the loop cannot recover from (e.g. a handle
/// permanently invalidated); the loop exits and the provider transitions to
/// `Failed`. Transient faults trigger a close/reopen cycle with backoff.
#[derive(Debug)]
pub struct TableFault {
    pub error: ProviderError,
    pub fatal: bool,
}

impl TableFault {
    pub fn transient(error: ProviderError) -> Self {
        Self {
            error,
            fatal: false,
        }
    }

    pub fn fatal(error: ProviderError) -> Self {
        Self { error, fatal: true }
    }
}

/// External collaborator that parses one backend's shared-memory table.
pub trait TableReader: Send + 'static {
    /// Attach to the backend (open shared memory, register data areas).
    fn open(&mut self) -> Result<(), TableFault>;

    /// Read one consistent table poll as a normalized snapshot.
    fn read(&mut self) -> Result<TelemetrySnapshot, TableFault>;

    /// Translate and write one command into the backend.
    fn write(&mut self, command: &BackendCommand) -> Result<(), TableFault>;

    /// Release backend resources. Must be safe to call when not open.
    fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct PolledLinkConfig {
    /// Which shared-memory backend this link fronts.
    pub kind: BackendKind,

    /// Interval between table polls.
    pub poll_interval: Duration,
}

impl PolledLinkConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Backend link that polls a [`TableReader`] on a fixed interval.
pub struct PolledLink<T: TableReader> {
    config: PolledLinkConfig,
    reader: Mutex<T>,
}

impl<T: TableReader> PolledLink<T> {
    pub fn new(config: PolledLinkConfig, reader: T) -> Self {
        Self {
            config,
            reader: Mutex::new(reader),
        }
    }

    /// Attach to the backend, backing off between attempts until cancelled.
    ///
    /// Returns `false` if cancellation or a fatal fault ended the attempt.
    async fn open_with_backoff(
        &self,
        handle: &LinkHandle,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> bool {
        let mut attempts: u32 = 0;
        loop {
            handle.mark_connecting();
            match self.reader.lock().open() {
                Ok(()) => {
                    info!(backend = %self.config.kind, "Backend table attached");
                    return true;
                }
                Err(fault) => {
                    let fatal = fault.fatal;
                    handle.report_error(fault.error, fatal);
                    if fatal {
                        return false;
                    }
                }
            }

            attempts += 1;
            let delay = backoff_delay(attempts);
            debug!(
                backend = %self.config.kind,
                delay_secs = delay.as_secs(),
                attempts,
                "Backend unreachable, backing off"
            );
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl<T: TableReader> BackendLink for PolledLink<T> {
    fn kind(&self) -> BackendKind {
        self.config.kind
    }

    fn run(self: Arc<Self>, ctx: LinkContext) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let LinkContext {
                handle,
                cancel,
                mut commands,
            } = ctx;

            info!(
                backend = %self.config.kind,
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                "Polled backend link started"
            );

            'session: loop {
                if !self.open_with_backoff(&handle, &cancel).await {
                    break;
                }

                let mut ticker = tokio::time::interval(self.config.poll_interval);
                let mut announced_ready = false;

                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => {
                            debug!(backend = %self.config.kind, "Polled link cancelled");
                            break 'session;
                        }

                        command = commands.recv() => {
                            match command {
                                Some(command) => {
                                    if let Err(fault) = self.reader.lock().write(&command) {
                                        let fatal = fault.fatal;
                                        handle.report_error(
                                            fault.error.with_context(
                                                "command",
                                                command.name().to_string(),
                                            ),
                                            fatal,
                                        );
                                        if fatal {
                                            break 'session;
                                        }
                                    } else {
                                        trace!(
                                            backend = %self.config.kind,
                                            command = command.name(),
                                            "Command written"
                                        );
                                    }
                                }
                                None => {
                                    debug!(backend = %self.config.kind, "Command channel closed");
                                    break 'session;
                                }
                            }
                        }

                        _ = ticker.tick() => {
                            // Bind the result so the reader guard drops
                            // before the error arm re-locks to close.
                            let poll = self.reader.lock().read();
                            match poll {
                                Ok(snapshot) => {
                                    handle.publish_snapshot(snapshot);
                                    if !announced_ready {
                                        handle.notify_ready_to_fly();
                                        announced_ready = true;
                                    }
                                }
                                Err(fault) => {
                                    let fatal = fault.fatal;
                                    handle.report_error(fault.error, fatal);
                                    self.reader.lock().close();
                                    if fatal {
                                        break 'session;
                                    }
                                    // Transient: reattach with backoff.
                                    continue 'session;
                                }
                            }
                        }
                    }
                }
            }

            self.reader.lock().close();
            info!(backend = %self.config.kind, "Polled backend link stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::provider::ProviderState;

    /// Table reader that serves a scripted sequence of reads.
    struct ScriptedReader {
        opens: u32,
        reads: Vec<Result<TelemetrySnapshot, TableFault>>,
        writes: Vec<String>,
        closed: bool,
    }

    impl ScriptedReader {
        fn new(reads: Vec<Result<TelemetrySnapshot, TableFault>>) -> Self {
            Self {
                opens: 0,
                reads,
                writes: Vec::new(),
                closed: false,
            }
        }
    }

    impl TableReader for ScriptedReader {
        fn open(&mut self) -> Result<(), TableFault> {
            self.opens += 1;
            self.closed = false;
            Ok(())
        }

        fn read(&mut self) -> Result<TelemetrySnapshot, TableFault> {
            if self.reads.is_empty() {
                return Ok(TelemetrySnapshot::default());
            }
            self.reads.remove(0)
        }

        fn write(&mut self, command: &BackendCommand) -> Result<(), TableFault> {
            self.writes.push(command.name().to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn snapshot_with_title(title: &str) -> TelemetrySnapshot {
        TelemetrySnapshot {
            aircraft_title: title.to_string(),
            polled_at: Some(chrono::Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_polled_link_publishes_and_connects() {
        let reader = ScriptedReader::new(vec![Ok(snapshot_with_title("Viper"))]);
        let mut config = PolledLinkConfig::new(BackendKind::FalconBms);
        config.poll_interval = Duration::from_millis(10);

        let provider = Provider::new(Arc::new(PolledLink::new(config, reader)));
        provider.initialize();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.state(), ProviderState::Connected);
        assert_eq!(provider.snapshot().aircraft_title, "Viper");

        provider.deinitialize(Duration::from_secs(1)).await;
        assert_eq!(provider.state(), ProviderState::Uninitialized);
    }

    #[tokio::test]
    async fn test_fatal_fault_fails_the_provider() {
        let fault = TableFault::fatal(
            ProviderError::connection(BackendKind::Fsuipc, "handle invalidated").with_code(6),
        );
        let reader = ScriptedReader::new(vec![Err(fault)]);
        let mut config = PolledLinkConfig::new(BackendKind::Fsuipc);
        config.poll_interval = Duration::from_millis(10);

        let provider = Provider::new(Arc::new(PolledLink::new(config, reader)));
        let mut events = provider.subscribe();
        provider.initialize();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.state(), ProviderState::Failed);
        let err = provider.last_error().expect("error recorded");
        assert_eq!(err.code(), Some(6));

        let mut saw_error_event = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, crate::provider::ProviderEvent::Error(_)) {
                saw_error_event = true;
            }
        }
        assert!(saw_error_event);

        provider.deinitialize(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_transient_fault_reattaches() {
        let fault = TableFault::transient(ProviderError::connection(
            BackendKind::SimConnect,
            "sim closed",
        ));
        let reader = ScriptedReader::new(vec![
            Ok(snapshot_with_title("C172")),
            Err(fault),
            Ok(snapshot_with_title("C172")),
        ]);
        let mut config = PolledLinkConfig::new(BackendKind::SimConnect);
        config.poll_interval = Duration::from_millis(10);

        let provider = Provider::new(Arc::new(PolledLink::new(config, reader)));
        let mut events = provider.subscribe();
        provider.initialize();

        // The fault disconnects, then the reattach succeeds immediately and
        // polls resume; the provider ends up Connected again.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(provider.state(), ProviderState::Connected);

        let mut saw_error = false;
        let mut connected_events = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                crate::provider::ProviderEvent::Error(_) => saw_error = true,
                crate::provider::ProviderEvent::Connected => connected_events += 1,
                _ => {}
            }
        }
        assert!(saw_error);
        assert_eq!(connected_events, 2);

        provider.deinitialize(Duration::from_secs(1)).await;
    }
}
