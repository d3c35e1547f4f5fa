//! Synthetic backend link for demos and offline development.
//!
//! Substitutes a fixed snapshot and a fixed-interval timer for real backend
//! I/O while satisfying the identical provider contract.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, info, trace};

use super::{BackendKind, BackendLink, LinkContext};
use crate::snapshot::TelemetrySnapshot;

/// Default publish interval for the synthetic backend.
pub const DEFAULT_SYNTHETIC_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SyntheticLinkConfig {
    /// Interval between snapshot publications.
    pub interval: Duration,
}

impl Default for SyntheticLinkConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNTHETIC_INTERVAL,
        }
    }
}

/// Backend link that emits a fixed synthetic snapshot on a timer.
pub struct SyntheticLink {
    config: SyntheticLinkConfig,
    base: TelemetrySnapshot,
}

impl SyntheticLink {
    pub fn new(config: SyntheticLinkConfig) -> Self {
        Self {
            config,
            base: demo_snapshot(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SyntheticLinkConfig::default())
    }

    /// Use a caller-provided snapshot instead of the built-in demo state.
    pub fn with_snapshot(config: SyntheticLinkConfig, base: TelemetrySnapshot) -> Self {
        Self { config, base }
    }
}

/// The fixed demo state: parked at Wiley Post (KPWA), engine off.
fn demo_snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        latitude: 35.5342,
        longitude: -97.6471,
        altitude_ft: 1300.0,
        on_ground: true,
        heading_deg: 178.0,
        com1_active: 118.3,
        com1_standby: 121.7,
        nav1_active: 113.4,
        nav1_standby: 110.2,
        transponder_code: 0o1200,
        parking_brake: true,
        fuel_total_gal: 24.0,
        aircraft_title: "Simbridge Demo Cub".to_string(),
        ..Default::default()
    }
}

impl BackendLink for SyntheticLink {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn run(self: Arc<Self>, ctx: LinkContext) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let LinkContext {
                handle,
                cancel,
                mut commands,
            } = ctx;

            info!(
                interval_ms = self.config.interval.as_millis() as u64,
                "Synthetic backend started"
            );

            let mut ticker = tokio::time::interval(self.config.interval);
            let mut announced_ready = false;

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Synthetic backend cancelled");
                        break;
                    }

                    command = commands.recv() => {
                        match command {
                            Some(command) => {
                                // The synthetic backend accepts everything;
                                // "quit" demonstrates a backend-driven exit.
                                trace!(command = command.name(), "Synthetic command accepted");
                                if command.name().eq_ignore_ascii_case("quit") {
                                    handle.notify_quit();
                                    break;
                                }
                            }
                            None => {
                                debug!("Command channel closed, stopping synthetic backend");
                                break;
                            }
                        }
                    }

                    _ = ticker.tick() => {
                        let mut snapshot = self.base.clone();
                        snapshot.polled_at = Some(Utc::now());
                        handle.publish_snapshot(snapshot);

                        if !announced_ready {
                            handle.notify_ready_to_fly();
                            announced_ready = true;
                        }
                    }
                }
            }

            info!("Synthetic backend stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyntheticLinkConfig::default();
        assert_eq!(config.interval, DEFAULT_SYNTHETIC_INTERVAL);
    }

    #[test]
    fn test_demo_snapshot_is_parked() {
        let snap = demo_snapshot();
        assert!(snap.on_ground);
        assert!(snap.parking_brake);
        assert_eq!(snap.transponder_code, 0o1200);
        assert!(!snap.aircraft_title.is_empty());
    }

    #[test]
    fn test_kind_is_synthetic() {
        let link = SyntheticLink::with_defaults();
        assert_eq!(link.kind(), BackendKind::Synthetic);
    }
}
