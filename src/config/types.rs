//! Configuration type definitions.

use crate::constants::{DEFAULT_MIN_CONFIDENCE, gps, remote};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local store settings.
    pub store: StoreConfig,

    /// Remote server settings.
    pub remote: RemoteConfig,

    /// Detection filtering settings.
    pub detection: DetectionConfig,

    /// Position source settings.
    pub gps: GpsConfig,

    /// Reconciliation scheduling.
    pub sync: SyncConfig,
}

/// Local store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database path (default: platform data directory).
    pub path: Option<PathBuf>,
}

/// Remote server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the server, without trailing endpoint.
    pub base_url: String,

    /// Set to false to run fully offline.
    pub enabled: bool,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: remote::DEFAULT_BASE_URL.to_string(),
            enabled: true,
            connect_timeout_secs: remote::DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_secs: remote::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RemoteConfig {
    /// Connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Detection filtering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence (inclusive) for a detection to be recorded.
    pub min_confidence: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Where positions come from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GpsSourceKind {
    /// Query a gpsd daemon.
    #[default]
    Gpsd,
    /// Use the configured latitude/longitude for every detection.
    Fixed,
}

impl std::fmt::Display for GpsSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gpsd => write!(f, "gpsd"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Position source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Which position source to use.
    pub source: GpsSourceKind,

    /// gpsd host.
    pub host: String,

    /// gpsd port.
    pub port: u16,

    /// Maximum time to wait for a fix, in seconds.
    pub timeout_secs: u64,

    /// Latitude for the fixed source.
    pub latitude: Option<f64>,

    /// Longitude for the fixed source.
    pub longitude: Option<f64>,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            source: GpsSourceKind::Gpsd,
            host: gps::DEFAULT_HOST.to_string(),
            port: gps::DEFAULT_PORT,
            timeout_secs: gps::DEFAULT_TIMEOUT_SECS,
            latitude: None,
            longitude: None,
        }
    }
}

/// Reconciliation scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between passes while the session runs (0 disables).
    pub interval_secs: u64,

    /// Run a final pass when the session stops.
    pub on_exit: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            on_exit: true,
        }
    }
}

impl SyncConfig {
    /// Interval between passes, if periodic sync is enabled.
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_secs))
        }
    }
}
