//! Normalized telemetry read-model.
//!
//! Every backend adapter, whatever its wire format, populates the same
//! [`TelemetrySnapshot`]. The snapshot is a flat value replaced wholesale on
//! each successful poll through [`SnapshotStore`], so a reader can never
//! observe fields from two different polls mixed together.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// One entry in the snapshot's traffic table, keyed by callsign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficEntry {
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub heading_deg: f64,
    pub ground_speed_kt: f64,
    pub on_ground: bool,
}

/// Aircraft and simulation state at the moment of the most recent poll.
///
/// Internally consistent with a single backend poll. Replaced wholesale via
/// [`SnapshotStore::publish`], never mutated field-by-field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    // Position
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub on_ground: bool,

    // Attitude
    pub pitch_deg: f64,
    pub bank_deg: f64,
    pub heading_deg: f64,

    // Speeds
    pub indicated_airspeed_kt: f64,
    pub true_airspeed_kt: f64,
    pub ground_speed_kt: f64,
    pub vertical_speed_fpm: f64,

    // Autopilot
    pub ap_master: bool,
    pub ap_heading_deg: f64,
    pub ap_altitude_ft: f64,
    pub ap_speed_kt: f64,
    pub ap_vertical_speed_fpm: f64,
    pub ap_nav_hold: bool,

    // Engines and systems
    pub throttle_ratio: f64,
    pub engine_rpm: f64,
    pub fuel_total_gal: f64,
    pub fuel_flow_gph: f64,
    pub gear_down: bool,
    pub flaps_ratio: f64,
    pub parking_brake: bool,

    // Radios
    pub com1_active: f64,
    pub com1_standby: f64,
    pub com2_active: f64,
    pub com2_standby: f64,
    pub nav1_active: f64,
    pub nav1_standby: f64,
    pub nav2_active: f64,
    pub nav2_standby: f64,
    pub transponder_code: u16,

    // Flight-plan progress
    pub next_waypoint_id: String,
    pub waypoint_distance_nm: f64,
    pub waypoint_bearing_deg: f64,
    pub waypoint_ete_sec: f64,

    // Identity and traffic
    pub aircraft_title: String,
    pub traffic: HashMap<String, TrafficEntry>,

    /// When the producing backend completed this poll. `None` only for the
    /// initial empty snapshot.
    pub polled_at: Option<DateTime<Utc>>,
}

/// Publishes snapshots wholesale and hands out the latest one.
///
/// Readers clone an `Arc`, so a snapshot handed out stays valid and unchanged
/// even while newer polls replace the store's current value.
pub struct SnapshotStore {
    current: RwLock<Arc<TelemetrySnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding an empty initial snapshot.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(TelemetrySnapshot::default())),
        }
    }

    /// Replace the current snapshot wholesale.
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// The most recent snapshot. Never blocks waiting for fresh data; while a
    /// backend is disconnected this keeps returning the last known value.
    pub fn latest(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&self.current.read())
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
