//! SQLite-backed local detection store.

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use crate::store::{DetectionRecord, NaturalKey, NewDetection};
use chrono::NaiveDateTime;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior, params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS detections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        class TEXT NOT NULL,
        confidence REAL NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_detections_natural_key
        ON detections (class, latitude, longitude);
";

const INSERT_DETECTION: &str = "
    INSERT INTO detections (class, confidence, latitude, longitude, timestamp)
    VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%d %H:%M:%S', 'now'))
";

const KEY_EXISTS: &str = "
    SELECT EXISTS (
        SELECT 1 FROM detections WHERE class = ?1 AND latitude = ?2 AND longitude = ?3
    )
";

const SELECT_COLUMNS: &str =
    "SELECT id, class, confidence, latitude, longitude, timestamp FROM detections";

/// Append-only detection log in a single SQLite table.
///
/// One instance is the single writer for its database; pass it explicitly
/// to whatever needs to read or append.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|source| Error::StoreOpen {
            path: path.to_path_buf(),
            source,
        })?;

        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init()?;

        info!("Detection store opened at {}", path.display());
        Ok(store)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::StoreOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let store = Self { conn, path: None };
        store.init()?;
        Ok(store)
    }

    /// Database path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the `detections` table and key index if absent.
    ///
    /// Safe to call any number of times.
    pub fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA)
            .map_err(|source| Error::Persistence {
                operation: "create detections schema",
                source,
            })
    }

    /// Append a detection, assigning its id and timestamp.
    ///
    /// Does not check the natural key; callers that need deduplication use
    /// [`Self::insert_if_absent`].
    pub fn insert(&self, detection: &NewDetection) -> Result<i64> {
        insert_row(&self.conn, detection)
    }

    /// Append a detection unless its natural key is already stored.
    ///
    /// The lookup and the insert share one transaction. Returns the new id,
    /// or `None` when the key was present.
    pub fn insert_if_absent(&mut self, detection: &NewDetection) -> Result<Option<i64>> {
        let tx = self.begin()?;
        let id = if key_exists(&tx, &detection.key())? {
            None
        } else {
            Some(insert_row(&tx, detection)?)
        };
        commit(tx)?;
        Ok(id)
    }

    /// Append every detection whose key is not yet stored, in one transaction.
    ///
    /// Duplicate keys within `detections` are inserted once. Returns the
    /// number of rows written.
    pub fn insert_missing(&mut self, detections: &[NewDetection]) -> Result<usize> {
        if detections.is_empty() {
            return Ok(0);
        }

        let tx = self.begin()?;
        let mut inserted = 0;
        for detection in detections {
            if !key_exists(&tx, &detection.key())? {
                insert_row(&tx, detection)?;
                inserted += 1;
            }
        }
        commit(tx)?;

        debug!("Inserted {inserted} of {} detections", detections.len());
        Ok(inserted)
    }

    /// Whether a record with this natural key is stored.
    pub fn contains(&self, key: &NaturalKey) -> Result<bool> {
        key_exists(&self.conn, key)
    }

    /// Every natural key currently stored.
    pub fn all_keys(&self) -> Result<HashSet<NaturalKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT class, latitude, longitude FROM detections")
            .map_err(|source| Error::Persistence {
                operation: "prepare key query",
                source,
            })?;

        let keys = stmt
            .query_map([], |row| {
                let class: String = row.get(0)?;
                Ok(NaturalKey::new(&class, row.get(1)?, row.get(2)?))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<HashSet<_>>>())
            .map_err(|source| Error::Persistence {
                operation: "read natural keys",
                source,
            })?;

        Ok(keys)
    }

    /// All records in insertion order.
    pub fn all(&self) -> Result<Vec<DetectionRecord>> {
        self.query_records(&format!("{SELECT_COLUMNS} ORDER BY id ASC"), params![])
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<DetectionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_records(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))
            .map_err(|source| Error::Persistence {
                operation: "count detections",
                source,
            })?;
        usize::try_from(count).map_err(|_| Error::Internal {
            message: format!("negative row count {count}"),
        })
    }

    fn begin(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| Error::Persistence {
                operation: "begin transaction",
                source,
            })
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<DetectionRecord>> {
        let mut stmt = self.conn.prepare(sql).map_err(|source| Error::Persistence {
            operation: "prepare record query",
            source,
        })?;

        let rows: Vec<RawRow> = stmt
            .query_map(params, RawRow::from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|source| Error::Persistence {
                operation: "read detections",
                source,
            })?;

        rows.into_iter().map(RawRow::into_record).collect()
    }
}

/// Row as read from SQLite, before the timestamp is parsed.
struct RawRow {
    id: i64,
    class_label: String,
    confidence: f64,
    latitude: f64,
    longitude: f64,
    timestamp: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            class_label: row.get("class")?,
            confidence: row.get("confidence")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            timestamp: row.get("timestamp")?,
        })
    }

    fn into_record(self) -> Result<DetectionRecord> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| Error::CorruptRecord {
                id: self.id,
                reason: format!("invalid timestamp '{}': {e}", self.timestamp),
            })?;

        Ok(DetectionRecord {
            id: self.id,
            class_label: self.class_label,
            confidence: self.confidence,
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp,
        })
    }
}

fn insert_row(conn: &Connection, detection: &NewDetection) -> Result<i64> {
    conn.execute(
        INSERT_DETECTION,
        params![
            detection.class_label,
            detection.confidence,
            detection.latitude,
            detection.longitude,
        ],
    )
    .map_err(|source| Error::Persistence {
        operation: "insert detection",
        source,
    })?;
    Ok(conn.last_insert_rowid())
}

fn key_exists(conn: &Connection, key: &NaturalKey) -> Result<bool> {
    conn.query_row(
        KEY_EXISTS,
        params![key.class_label(), key.latitude(), key.longitude()],
        |row| row.get(0),
    )
    .map_err(|source| Error::Persistence {
        operation: "look up natural key",
        source,
    })
}

fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit().map_err(|source| Error::Persistence {
        operation: "commit transaction",
        source,
    })
}
