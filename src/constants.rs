//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "fieldlog";

/// Default database file name inside the data directory.
pub const DEFAULT_DB_FILE: &str = "detections.db";

/// Default minimum confidence for a detection to be recorded.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

/// Confidence assigned to records learned from the remote server.
///
/// Confidence is not part of the natural key, so this has no effect on
/// deduplication.
pub const REMOTE_CONFIDENCE: f64 = 1.0;

/// Lock file extension appended to the database path.
pub const LOCK_FILE_EXTENSION: &str = ".lock";

/// Age after which a lock whose holder cannot be checked counts as stale.
pub const STALE_LOCK_AGE_SECS: u64 = 24 * 60 * 60;

/// Timestamp format used in the `detections` table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Confidence value bounds.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f64 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f64 = 1.0;
    /// Decimal places for confidence formatting.
    pub const DECIMAL_PLACES: usize = 4;
}

/// Remote server defaults and endpoints.
pub mod remote {
    /// Default server base URL.
    pub const DEFAULT_BASE_URL: &str = "http://192.168.0.102:3000";
    /// Endpoint returning the server's full record set.
    pub const FETCH_PATH: &str = "get_all_data";
    /// Endpoint accepting a single record.
    pub const PUSH_PATH: &str = "add_data";
    /// Default TCP connect timeout in seconds.
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
    /// Default whole-request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
}

/// gpsd defaults.
pub mod gps {
    /// Default gpsd host.
    pub const DEFAULT_HOST: &str = "127.0.0.1";
    /// Default gpsd port.
    pub const DEFAULT_PORT: u16 = 2947;
    /// Default time to wait for a fix in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
    /// Command that switches gpsd into JSON streaming mode.
    pub const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true};\n";
}
