//! Error types for fieldlog.

/// Result type alias for fieldlog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for fieldlog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Data directory could not be determined.
    #[error("could not determine data directory for this platform")]
    DataDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Failed to open the local detection store.
    #[error("failed to open detection store '{path}'")]
    StoreOpen {
        /// Path to the database file.
        path: std::path::PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write against the local store failed.
    ///
    /// Fatal to the calling operation: silent data loss is worse than a
    /// visible failure.
    #[error("persistence failure while trying to {operation}")]
    Persistence {
        /// What the store was doing when it failed.
        operation: &'static str,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// A stored row could not be decoded.
    #[error("corrupt detection row {id}: {reason}")]
    CorruptRecord {
        /// Row identifier.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// The store is held by another process.
    #[error("detection store is locked by another process: {path}")]
    StoreLocked {
        /// Path to the lock file.
        path: std::path::PathBuf,
    },

    /// Failed to create lock file.
    #[error("failed to create lock file '{path}'")]
    LockCreate {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove lock file.
    #[error("failed to remove lock file '{path}'")]
    LockRemove {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The remote server could not be reached or answered unusably.
    ///
    /// Recoverable: the next reconciliation pass retries.
    #[error("remote unavailable at '{url}': {source}")]
    NetworkUnavailable {
        /// URL that failed.
        url: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client")]
    HttpClientBuild {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// No position fix could be obtained.
    #[error("GPS position unavailable: {reason}")]
    GpsUnavailable {
        /// Why no fix was produced.
        reason: String,
    },

    /// The frame source failed to deliver a frame.
    #[error("failed to grab frame: {reason}")]
    FrameGrab {
        /// Description of the failure.
        reason: String,
    },

    /// The detector failed on a frame.
    #[error("detection failed: {reason}")]
    Detection {
        /// Description of the failure.
        reason: String,
    },

    /// Failed to open the detection event feed.
    #[error("failed to open detection feed '{path}'")]
    FeedOpen {
        /// Path to the feed.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid latitude value.
    #[error("invalid latitude: {value} (must be -90.0 to 90.0)")]
    InvalidLatitude {
        /// Invalid latitude value.
        value: f64,
    },

    /// Invalid longitude value.
    #[error("invalid longitude: {value} (must be -180.0 to 180.0)")]
    InvalidLongitude {
        /// Invalid longitude value.
        value: f64,
    },

    /// Invalid confidence value.
    #[error("invalid confidence: {value} (must be 0.0 to 1.0)")]
    InvalidConfidence {
        /// Invalid confidence value.
        value: f64,
    },

    /// Class label was empty.
    #[error("class label must not be empty")]
    EmptyClassLabel,

    /// Failed to write CSV export.
    #[error("failed to write CSV export '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Failed to write JSON export.
    #[error("failed to write JSON export '{path}'")]
    JsonWrite {
        /// Path to the JSON file.
        path: std::path::PathBuf,
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Whether the session can keep running after this error.
    ///
    /// Network and GPS failures only cost the current cycle; everything
    /// else aborts the operation that raised it.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable { .. } | Self::GpsUnavailable { .. }
        )
    }

    /// Build a [`Error::NetworkUnavailable`] for `url`.
    ///
    /// Lets custom [`crate::remote::RemoteClient`] implementations report
    /// failures the reconciler treats as recoverable.
    pub fn network(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::NetworkUnavailable {
            url: url.into(),
            source: source.into(),
        }
    }
}
