//! Configuration file handling for ~/.simbridge/config.ini.
//!
//! Starts from [`BridgeConfig::default`] and overlays any values found in
//! the INI, so a partial file is fine. Unknown keys are logged and ignored
//! rather than rejected, which keeps old config files working across
//! versions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::warn;

use crate::facility::FacilityCategory;

pub const DEFAULT_UDP_PORT: u16 = 49002;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 100;
pub const DEFAULT_XREF_BASE_URL: &str = "https://xref.simbridge.dev/api/v1";
pub const DEFAULT_XREF_TIMEOUT_SECS: u64 = 10;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Telemetry transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySettings {
    /// UDP port the datagram backend listens on.
    pub udp_port: u16,

    /// Table poll interval for shared-memory backends.
    pub poll_interval: Duration,

    /// Minimum spacing between published datagram updates.
    pub min_update_interval: Duration,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            min_update_interval: Duration::from_millis(DEFAULT_MIN_UPDATE_INTERVAL_MS),
        }
    }
}

/// Aircraft cross-reference service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct XrefSettings {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for XrefSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_XREF_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_XREF_TIMEOUT_SECS),
        }
    }
}

/// Per-category nearest-facility threshold overrides, in nautical miles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilitySettings {
    pub airport_threshold_nm: Option<f64>,
    pub waypoint_threshold_nm: Option<f64>,
    pub vor_threshold_nm: Option<f64>,
    pub ndb_threshold_nm: Option<f64>,
}

impl FacilitySettings {
    /// Effective threshold for one category: the override if set, else the
    /// category default.
    pub fn threshold_nm(&self, category: FacilityCategory) -> f64 {
        let over = match category {
            FacilityCategory::Airport => self.airport_threshold_nm,
            FacilityCategory::Waypoint => self.waypoint_threshold_nm,
            FacilityCategory::Vor => self.vor_threshold_nm,
            FacilityCategory::Ndb => self.ndb_threshold_nm,
        };
        over.unwrap_or_else(|| category.default_threshold_nm())
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeConfig {
    pub telemetry: TelemetrySettings,
    pub xref: XrefSettings,
    pub facility: FacilitySettings,
}

impl BridgeConfig {
    /// Load configuration from the default path (~/.simbridge/config.ini).
    ///
    /// A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path. A missing file yields
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Load from the default path, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Config file unusable, using defaults");
                Self::default()
            }
        }
    }
}

/// Path to the config directory (~/.simbridge).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".simbridge")
}

/// Path to the config file (~/.simbridge/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

fn parse_ini(ini: &Ini) -> Result<BridgeConfig, ConfigError> {
    let mut config = BridgeConfig::default();

    if let Some(section) = ini.section(Some("telemetry")) {
        for (key, value) in section.iter() {
            match key {
                "udp_port" => {
                    config.telemetry.udp_port = parse_value("telemetry", key, value, "must be a valid port number (1-65535)")?;
                }
                "poll_interval_ms" => {
                    let ms: u64 = parse_value("telemetry", key, value, "must be a positive integer (milliseconds)")?;
                    config.telemetry.poll_interval = Duration::from_millis(ms);
                }
                "min_update_interval_ms" => {
                    let ms: u64 = parse_value("telemetry", key, value, "must be a positive integer (milliseconds)")?;
                    config.telemetry.min_update_interval = Duration::from_millis(ms);
                }
                other => warn!(section = "telemetry", key = other, "Unknown config key ignored"),
            }
        }
    }

    if let Some(section) = ini.section(Some("xref")) {
        for (key, value) in section.iter() {
            match key {
                "base_url" => {
                    let value = value.trim();
                    if !value.is_empty() {
                        config.xref.base_url = value.to_string();
                    }
                }
                "timeout_secs" => {
                    let secs: u64 = parse_value("xref", key, value, "must be a positive integer (seconds)")?;
                    config.xref.timeout = Duration::from_secs(secs);
                }
                other => warn!(section = "xref", key = other, "Unknown config key ignored"),
            }
        }
    }

    if let Some(section) = ini.section(Some("facility")) {
        for (key, value) in section.iter() {
            let slot = match key {
                "airport_threshold_nm" => &mut config.facility.airport_threshold_nm,
                "waypoint_threshold_nm" => &mut config.facility.waypoint_threshold_nm,
                "vor_threshold_nm" => &mut config.facility.vor_threshold_nm,
                "ndb_threshold_nm" => &mut config.facility.ndb_threshold_nm,
                other => {
                    warn!(section = "facility", key = other, "Unknown config key ignored");
                    continue;
                }
            };
            let threshold: f64 =
                parse_value("facility", key, value, "must be a positive number (nautical miles)")?;
            if threshold <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    section: "facility".to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be a positive number (nautical miles)".to_string(),
                });
            }
            *slot = Some(threshold);
        }
    }

    Ok(config)
}

fn parse_value<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = BridgeConfig::load_from(&temp_dir.path().join("config.ini")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(
            &path,
            r#"
[telemetry]
udp_port = 48002
"#,
        )
        .unwrap();

        let config = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(config.telemetry.udp_port, 48002);
        assert_eq!(
            config.telemetry.poll_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert_eq!(config.xref.base_url, DEFAULT_XREF_BASE_URL);
    }

    #[test]
    fn test_full_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(
            &path,
            r#"
[telemetry]
udp_port = 49010
poll_interval_ms = 100
min_update_interval_ms = 50

[xref]
base_url = https://xref.example.com/api
timeout_secs = 5

[facility]
airport_threshold_nm = 15
vor_threshold_nm = 60.5
"#,
        )
        .unwrap();

        let config = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(config.telemetry.udp_port, 49010);
        assert_eq!(config.telemetry.poll_interval, Duration::from_millis(100));
        assert_eq!(
            config.telemetry.min_update_interval,
            Duration::from_millis(50)
        );
        assert_eq!(config.xref.base_url, "https://xref.example.com/api");
        assert_eq!(config.xref.timeout, Duration::from_secs(5));
        assert_eq!(config.facility.airport_threshold_nm, Some(15.0));
        assert_eq!(config.facility.vor_threshold_nm, Some(60.5));
        assert_eq!(config.facility.waypoint_threshold_nm, None);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(
            &path,
            r#"
[telemetry]
udp_port = not-a-port
"#,
        )
        .unwrap();

        let err = BridgeConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("udp_port"));
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(
            &path,
            r#"
[facility]
ndb_threshold_nm = -5
"#,
        )
        .unwrap();

        let err = BridgeConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("ndb_threshold_nm"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(
            &path,
            r#"
[telemetry]
udp_port = 49005
legacy_setting = whatever
"#,
        )
        .unwrap();

        let config = BridgeConfig::load_from(&path).unwrap();
        assert_eq!(config.telemetry.udp_port, 49005);
    }

    #[test]
    fn test_effective_threshold_prefers_override() {
        let settings = FacilitySettings {
            airport_threshold_nm: Some(25.0),
            ..Default::default()
        };
        assert_eq!(settings.threshold_nm(FacilityCategory::Airport), 25.0);
        assert_eq!(
            settings.threshold_nm(FacilityCategory::Vor),
            FacilityCategory::Vor.default_threshold_nm()
        );
    }
}
