//! Event host: fans provider events out to registered consumers.
//!
//! Consumers implement [`TelemetryConsumer`] and attach once under a key.
//! The host spawns one forwarding task per (consumer, provider) pair reading
//! the provider's broadcast channel, so callbacks run on the host's tasks —
//! consumers that update shared state must marshal to their own context.
//!
//! Wiring is idempotent per key, teardown is symmetric (the attachment's
//! cancellation token stops every forwarding task), and full shutdown
//! detaches consumers *before* tearing providers down, in the fixed
//! [`BackendKind::ALL`](crate::provider::BackendKind::ALL) order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::facility::Facility;
use crate::provider::{BackendKind, Provider, ProviderEvent, ProviderRegistry};
use crate::snapshot::TelemetrySnapshot;

/// Callback set a consumer registers with the host.
///
/// All methods default to no-ops so a consumer implements only what it
/// cares about. Callbacks may be invoked from any provider's loop context;
/// no ordering is guaranteed across different providers.
pub trait TelemetryConsumer: Send + Sync {
    fn on_connected(&self, _backend: BackendKind) {}
    fn on_flight_data(&self, _backend: BackendKind, _snapshot: &TelemetrySnapshot) {}
    fn on_ready_to_fly(&self, _backend: BackendKind) {}
    fn on_aircraft_change(&self, _backend: BackendKind, _title: &str) {}
    fn on_quit(&self, _backend: BackendKind) {}
    fn on_traffic(&self, _backend: BackendKind, _snapshot: &TelemetrySnapshot) {}
    fn on_error(&self, _backend: BackendKind, _error: &ProviderError) {}
    fn on_paused(&self, _backend: BackendKind, _paused: bool) {}
    fn on_facilities_loaded(&self, _backend: BackendKind, _facilities: &[Facility]) {}
}

/// Opaque handle identifying one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachHandle {
    key: String,
}

impl AttachHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct Attachment {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Wires consumers to the active subset of providers.
pub struct EventHost {
    registry: Arc<ProviderRegistry>,
    attachments: Mutex<HashMap<String, Attachment>>,
}

impl EventHost {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            attachments: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a consumer under a key, wiring it to every available provider.
    ///
    /// Idempotent: attaching the same key again is a no-op returning the
    /// existing handle, so events are never delivered twice per occurrence.
    pub fn attach(&self, key: impl Into<String>, consumer: Arc<dyn TelemetryConsumer>) -> AttachHandle {
        let key = key.into();
        let mut attachments = self.attachments.lock();

        if attachments.contains_key(&key) {
            debug!(key = %key, "Consumer already attached; ignoring duplicate");
            return AttachHandle { key };
        }

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        for kind in self.registry.available() {
            let Some(provider) = self.registry.get(kind) else {
                continue;
            };
            let receiver = provider.subscribe();
            tasks.push(tokio::spawn(forward(
                provider,
                receiver,
                Arc::clone(&consumer),
                cancel.clone(),
            )));
        }

        info!(key = %key, providers = tasks.len(), "Consumer attached");
        attachments.insert(key.clone(), Attachment { cancel, tasks });
        AttachHandle { key }
    }

    /// Detach one consumer. Symmetric to [`attach`](Self::attach): the
    /// forwarding tasks are cancelled and no further callbacks fire.
    pub fn detach(&self, handle: &AttachHandle) {
        if let Some(attachment) = self.attachments.lock().remove(&handle.key) {
            attachment.cancel.cancel();
            info!(
                key = %handle.key,
                tasks = attachment.tasks.len(),
                "Consumer detached"
            );
        }
    }

    /// Detach every consumer.
    pub fn detach_all(&self) {
        let mut attachments = self.attachments.lock();
        for (key, attachment) in attachments.drain() {
            attachment.cancel.cancel();
            debug!(key = %key, "Consumer detached");
        }
    }

    /// Number of currently attached consumers.
    pub fn attached_count(&self) -> usize {
        self.attachments.lock().len()
    }

    /// Full teardown: consumers first, then providers in fixed order, so no
    /// event fires into a destroyed consumer.
    pub async fn shutdown(&self, timeout: Duration) {
        self.detach_all();
        self.registry.deinitialize_all(timeout).await;
        info!("Event host shut down");
    }
}

async fn forward(
    provider: Arc<Provider>,
    mut receiver: broadcast::Receiver<ProviderEvent>,
    consumer: Arc<dyn TelemetryConsumer>,
    cancel: CancellationToken,
) {
    let backend = provider.kind();
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = receiver.recv() => {
                match event {
                    Ok(event) => dispatch(backend, &provider, consumer.as_ref(), event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(backend = %backend, skipped, "Consumer lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

fn dispatch(
    backend: BackendKind,
    provider: &Provider,
    consumer: &dyn TelemetryConsumer,
    event: ProviderEvent,
) {
    match event {
        ProviderEvent::Connected => consumer.on_connected(backend),
        ProviderEvent::FlightDataReceived => {
            consumer.on_flight_data(backend, &provider.snapshot())
        }
        ProviderEvent::ReadyToFly => consumer.on_ready_to_fly(backend),
        ProviderEvent::AircraftChange { title } => consumer.on_aircraft_change(backend, &title),
        ProviderEvent::Quit => consumer.on_quit(backend),
        ProviderEvent::TrafficReceived => consumer.on_traffic(backend, &provider.snapshot()),
        ProviderEvent::Error(error) => consumer.on_error(backend, &error),
        ProviderEvent::Paused(paused) => consumer.on_paused(backend, paused),
        ProviderEvent::FacilitiesLoaded(facilities) => {
            consumer.on_facilities_loaded(backend, &facilities)
        }
    }
}
