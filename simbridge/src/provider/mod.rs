//! Backend adapters behind one uniform provider contract.
//!
//! Each simulator backend (SimConnect, FSUIPC, X-Plane UDP, Falcon BMS
//! shared memory, or the synthetic offline backend) is exposed through the
//! same [`Provider`] surface: a lifecycle state machine, wholesale snapshot
//! publication, broadcast events, and fire-and-forget commands. Adapters
//! differ only in their [`BackendLink`] loop — the piece that talks the
//! backend's wire format.
//!
//! # Architecture
//!
//! ```text
//! BackendLink loop ──► LinkHandle ──► SnapshotStore ──► consumers (pull)
//!        │                  │
//!        │                  └──► broadcast<ProviderEvent> ──► consumers (push)
//!        │
//!        ◄── mpsc<BackendCommand> ◄── Provider::send_command / send_control
//! ```

mod polled;
mod registry;
mod synthetic;
mod udp;

pub use polled::{PolledLink, PolledLinkConfig, TableFault, TableReader};
pub use registry::{ProviderRegistry, RegistryBuilder};
pub use synthetic::{SyntheticLink, SyntheticLinkConfig};
pub use udp::{DatagramDecoder, UdpLink, UdpLinkConfig};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::facility::Facility;
use crate::runner::{StopOutcome, TaskRunner};
use crate::snapshot::{SnapshotStore, TelemetrySnapshot};

/// Capacity of the provider event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the command channel into the link loop.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Maximum reconnect backoff for link loops.
pub(crate) const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential reconnect backoff: 2^n seconds, capped at [`MAX_BACKOFF`].
pub(crate) fn backoff_delay(consecutive_errors: u32) -> Duration {
    let secs = 2u64.saturating_pow(consecutive_errors.min(20));
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// The simulator backends this process knows how to bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// COM-style shared-memory/event API (MSFS/FSX family).
    SimConnect,
    /// Polled shared-memory offset table.
    Fsuipc,
    /// UDP datagram stream (X-Plane).
    XplaneUdp,
    /// Vendor-specific shared memory (Falcon BMS).
    FalconBms,
    /// Fixed synthetic data for demos and offline development.
    Synthetic,
}

impl BackendKind {
    /// All kinds, in the fixed order used for deterministic teardown.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::SimConnect,
        BackendKind::Fsuipc,
        BackendKind::XplaneUdp,
        BackendKind::FalconBms,
        BackendKind::Synthetic,
    ];

    /// Whether this backend can exist on the current platform.
    ///
    /// The shared-memory backends only exist on Windows; elsewhere the
    /// registry exposes them as absent rather than failing.
    pub fn is_available(&self) -> bool {
        match self {
            BackendKind::SimConnect | BackendKind::Fsuipc | BackendKind::FalconBms => {
                cfg!(windows)
            }
            BackendKind::XplaneUdp | BackendKind::Synthetic => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimConnect => write!(f, "SimConnect"),
            Self::Fsuipc => write!(f, "FSUIPC"),
            Self::XplaneUdp => write!(f, "X-Plane UDP"),
            Self::FalconBms => write!(f, "Falcon BMS"),
            Self::Synthetic => write!(f, "Synthetic"),
        }
    }
}

/// Provider lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderState {
    /// No background activity.
    #[default]
    Uninitialized,
    /// Background loop running, backend not yet reached.
    Connecting,
    /// Backend reached; snapshots flowing.
    Connected,
    /// Backend lost; loop retrying or winding down.
    Disconnected,
    /// Unrecoverable backend failure; loop exited.
    Failed,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Events pushed to consumers, delivered on the link loop's own task.
///
/// A single provider's events arrive in the order its loop observed them;
/// there is no ordering guarantee across different providers.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Fired once on each entry into the `Connected` state.
    Connected,
    /// A successful poll replaced the snapshot.
    FlightDataReceived,
    /// The backend reports the aircraft is ready to fly.
    ReadyToFly,
    /// The loaded aircraft changed.
    AircraftChange { title: String },
    /// The backend is shutting down.
    Quit,
    /// The snapshot's traffic table changed.
    TrafficReceived,
    /// A classified error from the backend loop.
    Error(ProviderError),
    /// Backend-specific: the simulator paused or resumed.
    Paused(bool),
    /// Backend-specific: a batch of navigation facilities was loaded.
    FacilitiesLoaded(Vec<Facility>),
}

/// A fire-and-forget request to the backend.
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Named discrete command (e.g. "GEAR_TOGGLE").
    Command(String),
    /// Named continuous control with a value (e.g. "THROTTLE", 0.75).
    Control(String, f64),
}

impl BackendCommand {
    pub fn name(&self) -> &str {
        match self {
            Self::Command(name) | Self::Control(name, _) => name,
        }
    }
}

/// Shared provider internals mutated by the link loop.
struct ProviderInner {
    kind: BackendKind,
    store: SnapshotStore,
    state: RwLock<ProviderState>,
    last_error: RwLock<Option<ProviderError>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl ProviderInner {
    fn set_state(&self, next: ProviderState) {
        let mut state = self.state.write();
        if *state != next {
            debug!(backend = %self.kind, from = %*state, to = %next, "Provider state change");
            *state = next;
        }
    }

    fn emit(&self, event: ProviderEvent) {
        // No receivers is fine; events are best-effort push.
        let _ = self.events.send(event);
    }
}

/// Handle given to a [`BackendLink`] loop for publishing into its provider.
#[derive(Clone)]
pub struct LinkHandle {
    inner: Arc<ProviderInner>,
}

impl LinkHandle {
    /// Publish a completed poll, transitioning to `Connected` if needed.
    ///
    /// Emits `Connected` once on entry, then `AircraftChange` if the title
    /// changed, `FlightDataReceived`, and `TrafficReceived` if the traffic
    /// table differs from the previous poll's.
    pub fn publish_snapshot(&self, snapshot: TelemetrySnapshot) {
        let previous = self.inner.store.latest();
        let title_changed =
            !snapshot.aircraft_title.is_empty() && snapshot.aircraft_title != previous.aircraft_title;
        let traffic_changed = snapshot.traffic != previous.traffic;
        let new_title = snapshot.aircraft_title.clone();

        self.inner.store.publish(snapshot);

        let was_connected = *self.inner.state.read() == ProviderState::Connected;
        if !was_connected {
            self.inner.set_state(ProviderState::Connected);
            self.inner.emit(ProviderEvent::Connected);
        }
        if title_changed {
            self.inner
                .emit(ProviderEvent::AircraftChange { title: new_title });
        }
        self.inner.emit(ProviderEvent::FlightDataReceived);
        if traffic_changed {
            self.inner.emit(ProviderEvent::TrafficReceived);
        }
    }

    /// Report a classified error from the loop boundary.
    ///
    /// Recoverable errors transition to `Disconnected` (the loop keeps
    /// retrying); fatal errors transition to `Failed` (the loop exits).
    pub fn report_error(&self, error: ProviderError, fatal: bool) {
        warn!(backend = %self.inner.kind, error = %error, fatal, "Backend error");
        *self.inner.last_error.write() = Some(error.clone());
        self.inner.set_state(if fatal {
            ProviderState::Failed
        } else {
            ProviderState::Disconnected
        });
        self.inner.emit(ProviderEvent::Error(error));
    }

    /// Mark the loop as attempting to reach the backend.
    pub fn mark_connecting(&self) {
        self.inner.set_state(ProviderState::Connecting);
    }

    pub fn notify_ready_to_fly(&self) {
        self.inner.emit(ProviderEvent::ReadyToFly);
    }

    pub fn notify_quit(&self) {
        self.inner.emit(ProviderEvent::Quit);
    }

    pub fn notify_paused(&self, paused: bool) {
        self.inner.emit(ProviderEvent::Paused(paused));
    }

    /// Publish a facility batch from the backend's facility-loaded feed.
    pub fn publish_facilities(&self, facilities: Vec<Facility>) {
        self.inner.emit(ProviderEvent::FacilitiesLoaded(facilities));
    }

    pub fn kind(&self) -> BackendKind {
        self.inner.kind
    }

    pub fn state(&self) -> ProviderState {
        *self.inner.state.read()
    }

    /// The provider's latest snapshot, for loops that fold partial updates.
    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.inner.store.latest()
    }
}

/// Everything a [`BackendLink`] loop needs: the publishing handle, the
/// cancellation token to honor at every suspension point, and the command
/// channel to drain.
pub struct LinkContext {
    pub handle: LinkHandle,
    pub cancel: CancellationToken,
    pub commands: mpsc::Receiver<BackendCommand>,
}

/// The backend-specific loop a provider drives.
///
/// The loop must check `ctx.cancel` at every natural suspension point and
/// exit promptly when it is set. It must also exit when the command channel
/// closes — that is the provider tearing down.
pub trait BackendLink: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    /// Drive the backend until cancelled.
    fn run(self: Arc<Self>, ctx: LinkContext) -> BoxFuture<'static, ()>;
}

/// One backend exposed through the uniform contract.
///
/// Identity is the backend kind: exactly one live instance per kind for the
/// process lifetime, constructed by the registry and never reconstructed. A
/// torn-down provider is not replaced, only silenced.
pub struct Provider {
    inner: Arc<ProviderInner>,
    link: Arc<dyn BackendLink>,
    runner: TaskRunner,
    command_tx: Mutex<Option<mpsc::Sender<BackendCommand>>>,
}

impl Provider {
    pub fn new(link: Arc<dyn BackendLink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ProviderInner {
                kind: link.kind(),
                store: SnapshotStore::new(),
                state: RwLock::new(ProviderState::Uninitialized),
                last_error: RwLock::new(None),
                events,
            }),
            link,
            runner: TaskRunner::new(),
            command_tx: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.inner.kind
    }

    /// Start the backend loop. Idempotent: a no-op if already initialized.
    pub fn initialize(&self) {
        // The command_tx lock doubles as the initialize critical section:
        // the running check, loop start, and sender install happen under it,
        // so a concurrent initialize can never replace (and thereby close)
        // the sender feeding an already-started loop.
        let mut command_tx = self.command_tx.lock();
        if self.runner.is_running() {
            debug!(backend = %self.inner.kind, "Already initialized");
            return;
        }

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        self.inner.set_state(ProviderState::Connecting);

        let inner = Arc::clone(&self.inner);
        let link = Arc::clone(&self.link);
        let started = self.runner.start(move |cancel| {
            let ctx = LinkContext {
                handle: LinkHandle { inner },
                cancel,
                commands: rx,
            };
            link.run(ctx)
        });

        match started {
            Ok(()) => {
                *command_tx = Some(tx);
                info!(backend = %self.inner.kind, "Provider initialized");
            }
            // The existing sender stays in place; the running loop keeps it.
            Err(_) => debug!(backend = %self.inner.kind, "Initialize raced; already running"),
        }
    }

    /// Request a cooperative stop and release backend resources.
    ///
    /// Idempotent. If the loop overruns `timeout` it keeps running until it
    /// next checks the cancellation token; resources may not be released the
    /// instant this returns.
    pub async fn deinitialize(&self, timeout: Duration) -> StopOutcome {
        // Closing the command channel is a second stop signal the loop
        // observes at its suspension points.
        self.command_tx.lock().take();

        let outcome = self.runner.request_stop(timeout).await;
        if outcome == StopOutcome::TimedOut {
            warn!(backend = %self.inner.kind, "Backend loop overran stop timeout");
        }
        self.inner.set_state(ProviderState::Uninitialized);
        info!(backend = %self.inner.kind, "Provider deinitialized");
        outcome
    }

    /// Send a named discrete command. Fire-and-forget: at-most-once, no
    /// acknowledgment, undefined ordering relative to the next snapshot.
    pub fn send_command(&self, name: impl Into<String>) {
        self.dispatch(BackendCommand::Command(name.into()));
    }

    /// Send a named continuous control value. Fire-and-forget.
    pub fn send_control(&self, name: impl Into<String>, value: f64) {
        self.dispatch(BackendCommand::Control(name.into(), value));
    }

    fn dispatch(&self, command: BackendCommand) {
        let guard = self.command_tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                if let Err(err) = tx.try_send(command) {
                    debug!(backend = %self.inner.kind, error = %err, "Command dropped");
                }
            }
            None => debug!(backend = %self.inner.kind, "Command dropped: not initialized"),
        }
    }

    /// The latest snapshot; the last known value while disconnected.
    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.inner.store.latest()
    }

    pub fn state(&self) -> ProviderState {
        *self.inner.state.read()
    }

    pub fn last_error(&self) -> Option<ProviderError> {
        self.inner.last_error.read().clone()
    }

    /// Subscribe to this provider's events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(12), MAX_BACKOFF);
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::XplaneUdp.to_string(), "X-Plane UDP");
        assert_eq!(BackendKind::Fsuipc.to_string(), "FSUIPC");
    }

    #[test]
    fn test_udp_and_synthetic_always_available() {
        assert!(BackendKind::XplaneUdp.is_available());
        assert!(BackendKind::Synthetic.is_available());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_shared_memory_kinds_absent_off_windows() {
        assert!(!BackendKind::SimConnect.is_available());
        assert!(!BackendKind::Fsuipc.is_available());
        assert!(!BackendKind::FalconBms.is_available());
    }

    fn test_handle(kind: BackendKind) -> (LinkHandle, broadcast::Receiver<ProviderEvent>) {
        let (events, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let handle = LinkHandle {
            inner: Arc::new(ProviderInner {
                kind,
                store: SnapshotStore::new(),
                state: RwLock::new(ProviderState::Connecting),
                last_error: RwLock::new(None),
                events,
            }),
        };
        (handle, rx)
    }

    #[test]
    fn test_publish_snapshot_emits_connected_once() {
        let (handle, mut rx) = test_handle(BackendKind::Synthetic);

        handle.publish_snapshot(TelemetrySnapshot::default());
        handle.publish_snapshot(TelemetrySnapshot::default());

        assert!(matches!(rx.try_recv(), Ok(ProviderEvent::Connected)));
        assert!(matches!(rx.try_recv(), Ok(ProviderEvent::FlightDataReceived)));
        // Second poll: no second Connected.
        assert!(matches!(rx.try_recv(), Ok(ProviderEvent::FlightDataReceived)));
        assert_eq!(handle.state(), ProviderState::Connected);
    }

    #[test]
    fn test_publish_snapshot_detects_aircraft_change() {
        let (handle, mut rx) = test_handle(BackendKind::Synthetic);

        handle.publish_snapshot(TelemetrySnapshot {
            aircraft_title: "Cub".to_string(),
            ..Default::default()
        });
        handle.publish_snapshot(TelemetrySnapshot {
            aircraft_title: "DC-3".to_string(),
            ..Default::default()
        });

        let mut saw_change = false;
        while let Ok(event) = rx.try_recv() {
            if let ProviderEvent::AircraftChange { title } = event {
                assert_eq!(title, "DC-3");
                saw_change = true;
            }
        }
        assert!(saw_change);
    }

    #[test]
    fn test_report_error_recoverable_disconnects() {
        let (handle, mut rx) = test_handle(BackendKind::XplaneUdp);
        handle.publish_snapshot(TelemetrySnapshot::default());

        let err = ProviderError::connection(BackendKind::XplaneUdp, "stream timed out");
        handle.report_error(err, false);
        assert_eq!(handle.state(), ProviderState::Disconnected);

        // Reconnect re-enters Connected and re-emits the event.
        handle.publish_snapshot(TelemetrySnapshot::default());
        assert_eq!(handle.state(), ProviderState::Connected);

        let mut connected_events = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ProviderEvent::Connected) {
                connected_events += 1;
            }
        }
        assert_eq!(connected_events, 2);
    }

    #[test]
    fn test_report_error_fatal_fails() {
        let (handle, _rx) = test_handle(BackendKind::Fsuipc);
        let err = ProviderError::connection(BackendKind::Fsuipc, "handle invalidated");
        handle.report_error(err, true);
        assert_eq!(handle.state(), ProviderState::Failed);
    }
}
