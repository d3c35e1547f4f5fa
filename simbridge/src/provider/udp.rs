//! UDP datagram stream backend link (X-Plane).
//!
//! Owns the socket and receive loop; the wire format itself is an external
//! collaborator behind [`DatagramDecoder`]. Decode failures surface as
//! protocol errors without terminating the loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, trace, warn};

use super::{backoff_delay, BackendCommand, BackendKind, BackendLink, LinkContext, LinkHandle};
use crate::error::ProviderError;
use crate::snapshot::TelemetrySnapshot;

/// Maximum datagram size we expect.
const MAX_PACKET_SIZE: usize = 2048;

/// Decodes one backend datagram into a normalized snapshot.
///
/// Implementations fold each datagram into the previous snapshot: a packet
/// that only carries attitude returns a snapshot with updated attitude and
/// everything else carried over. `Ok(None)` means the packet contributed no
/// complete update yet (partial protocol state).
pub trait DatagramDecoder: Send + Sync + 'static {
    fn decode(
        &self,
        datagram: &[u8],
        previous: &TelemetrySnapshot,
    ) -> Result<Option<TelemetrySnapshot>, ProviderError>;

    /// Encode a command as an outbound datagram; `None` if the backend has
    /// no wire representation for it (the command is rejected).
    fn encode_command(&self, command: &BackendCommand) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct UdpLinkConfig {
    /// UDP port to listen on (X-Plane's data output default).
    pub port: u16,

    /// Where to send encoded commands, if the backend accepts any.
    pub command_addr: Option<SocketAddr>,

    /// Timeout for socket receive operations; this is the loop's suspension
    /// point, so it bounds how quickly cancellation is observed.
    pub recv_timeout: Duration,

    /// Minimum interval between snapshot publications.
    pub min_update_interval: Duration,

    /// With no packets for this long while connected, the stream is
    /// considered lost.
    pub stale_after: Duration,
}

impl Default for UdpLinkConfig {
    fn default() -> Self {
        Self {
            port: 49002,
            command_addr: None,
            recv_timeout: Duration::from_millis(500),
            min_update_interval: Duration::from_millis(100),
            stale_after: Duration::from_secs(5),
        }
    }
}

/// Backend link for a UDP datagram stream.
pub struct UdpLink<D: DatagramDecoder> {
    config: UdpLinkConfig,
    decoder: D,
}

impl<D: DatagramDecoder> UdpLink<D> {
    pub fn new(config: UdpLinkConfig, decoder: D) -> Self {
        Self { config, decoder }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    async fn listen(&self, handle: &LinkHandle, ctx: &mut LoopState<'_>) -> ListenEnd {
        let socket = match UdpSocket::bind(("0.0.0.0", self.config.port)).await {
            Ok(socket) => socket,
            Err(err) => {
                handle.report_error(
                    ProviderError::connection(
                        BackendKind::XplaneUdp,
                        format!("failed to bind UDP port {}: {err}", self.config.port),
                    )
                    .with_context("port", self.config.port.to_string()),
                    false,
                );
                return ListenEnd::Retry;
            }
        };

        info!(port = self.config.port, "UDP telemetry listener started");
        handle.mark_connecting();

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let mut last_publish: Option<Instant> = None;
        let mut last_packet: Option<Instant> = None;
        let mut announced_ready = false;
        let mut packets_received: u64 = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return ListenEnd::Shutdown;
            }
            if self.drain_commands(handle, ctx, &socket).await == CommandDrain::Closed {
                return ListenEnd::Shutdown;
            }

            let received =
                tokio::time::timeout(self.config.recv_timeout, socket.recv(&mut buffer)).await;

            match received {
                Ok(Ok(len)) => {
                    packets_received += 1;
                    last_packet = Some(Instant::now());
                    if packets_received == 1 {
                        info!(len, "Received first telemetry packet");
                    }

                    let previous = handle.snapshot_base();
                    match self.decoder.decode(&buffer[..len], &previous) {
                        Ok(Some(snapshot)) => {
                            let due = last_publish.map_or(true, |at| {
                                at.elapsed() >= self.config.min_update_interval
                            });
                            if due {
                                handle.publish_snapshot(snapshot);
                                last_publish = Some(Instant::now());
                                if !announced_ready {
                                    handle.notify_ready_to_fly();
                                    announced_ready = true;
                                }
                            }
                        }
                        Ok(None) => trace!("Partial packet, no complete update yet"),
                        Err(err) => {
                            // Malformed data is not fatal; keep listening.
                            handle.report_error(err, false);
                        }
                    }
                }
                Ok(Err(err)) => {
                    handle.report_error(
                        ProviderError::connection(
                            BackendKind::XplaneUdp,
                            format!("UDP receive error: {err}"),
                        ),
                        false,
                    );
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(_) => {
                    // Receive timeout: check for stream loss.
                    if let Some(seen) = last_packet {
                        if seen.elapsed() >= self.config.stale_after
                            && handle.state() == super::ProviderState::Connected
                        {
                            handle.report_error(
                                ProviderError::connection(
                                    BackendKind::XplaneUdp,
                                    "telemetry stream timed out",
                                )
                                .with_context(
                                    "stale_secs",
                                    seen.elapsed().as_secs().to_string(),
                                ),
                                false,
                            );
                        }
                    }
                    trace!("No telemetry data received (timeout)");
                }
            }
        }
    }

    async fn drain_commands(
        &self,
        handle: &LinkHandle,
        ctx: &mut LoopState<'_>,
        socket: &UdpSocket,
    ) -> CommandDrain {
        loop {
            match ctx.commands.try_recv() {
                Ok(command) => self.send_command(handle, socket, &command).await,
                Err(TryRecvError::Empty) => return CommandDrain::Open,
                Err(TryRecvError::Disconnected) => {
                    debug!("Command channel closed, stopping UDP listener");
                    return CommandDrain::Closed;
                }
            }
        }
    }

    async fn send_command(&self, handle: &LinkHandle, socket: &UdpSocket, command: &BackendCommand) {
        let Some(addr) = self.config.command_addr else {
            handle.report_error(
                ProviderError::command_rejected(
                    BackendKind::XplaneUdp,
                    "no command address configured",
                )
                .with_context("command", command.name().to_string()),
                false,
            );
            return;
        };

        match self.decoder.encode_command(command) {
            Some(datagram) => {
                if let Err(err) = socket.send_to(&datagram, addr).await {
                    handle.report_error(
                        ProviderError::connection(
                            BackendKind::XplaneUdp,
                            format!("failed to send command: {err}"),
                        )
                        .with_context("command", command.name().to_string()),
                        false,
                    );
                } else {
                    trace!(command = command.name(), "Command sent");
                }
            }
            None => handle.report_error(
                ProviderError::command_rejected(
                    BackendKind::XplaneUdp,
                    "backend has no encoding for command",
                )
                .with_context("command", command.name().to_string()),
                false,
            ),
        }
    }
}

/// Why a listen pass ended.
#[derive(PartialEq, Eq)]
enum ListenEnd {
    Retry,
    Shutdown,
}

#[derive(PartialEq, Eq)]
enum CommandDrain {
    Open,
    Closed,
}

struct LoopState<'a> {
    cancel: &'a tokio_util::sync::CancellationToken,
    commands: &'a mut tokio::sync::mpsc::Receiver<BackendCommand>,
}

impl LinkHandle {
    /// Previous snapshot for decoders to fold partial updates into.
    fn snapshot_base(&self) -> TelemetrySnapshot {
        (*self.snapshot()).clone()
    }
}

impl<D: DatagramDecoder> BackendLink for UdpLink<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::XplaneUdp
    }

    fn run(self: Arc<Self>, ctx: LinkContext) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let LinkContext {
                handle,
                cancel,
                mut commands,
            } = ctx;

            let mut consecutive_failures: u32 = 0;

            loop {
                let mut state = LoopState {
                    cancel: &cancel,
                    commands: &mut commands,
                };

                match self.listen(&handle, &mut state).await {
                    ListenEnd::Shutdown => break,
                    ListenEnd::Retry => {
                        consecutive_failures += 1;
                        let delay = backoff_delay(consecutive_failures);
                        warn!(
                            delay_secs = delay.as_secs(),
                            consecutive_failures, "UDP listener retrying after failure"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }

            info!("UDP telemetry listener stopped");
        })
    }
}
