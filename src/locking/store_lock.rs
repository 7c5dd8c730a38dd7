//! Single-writer lock for the detection database.

use crate::constants::{LOCK_FILE_EXTENSION, STALE_LOCK_AGE_SECS};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Lock file content, for finding out who holds the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock.
    pub pid: u32,
    /// Hostname of the machine.
    pub hostname: String,
    /// When the lock was acquired.
    pub started: DateTime<Utc>,
    /// Database the lock guards.
    pub database: PathBuf,
}

/// RAII guard marking a database as in use by this process.
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock for `db_path`, failing if another process holds it.
    ///
    /// A lock left behind by a dead process is removed and taken over.
    pub fn acquire(db_path: &Path) -> Result<Self> {
        match Self::try_create(db_path) {
            Err(Error::StoreLocked { path })
                if Self::is_stale(db_path, Duration::from_secs(STALE_LOCK_AGE_SECS)) =>
            {
                warn!("Taking over stale lock {}", path.display());
                Self::break_lock(db_path)?;
                Self::try_create(db_path)
            }
            other => other,
        }
    }

    fn try_create(db_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path_for(db_path);

        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);

        match file {
            Ok(mut f) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    hostname: this_host(),
                    started: Utc::now(),
                    database: db_path.to_path_buf(),
                };

                let json = serde_json::to_string_pretty(&info).unwrap_or_else(|_| "{}".to_string());
                let _ = f.write_all(json.as_bytes());

                register_lock(&lock_path);

                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::StoreLocked { path: lock_path })
            }
            Err(e) => Err(Error::LockCreate {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// Lock file path for a database: `<db>.lock` next to it.
    pub fn lock_path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(LOCK_FILE_EXTENSION);
        PathBuf::from(name)
    }

    /// Check if a lock file exists.
    pub fn is_locked(db_path: &Path) -> bool {
        Self::lock_path_for(db_path).exists()
    }

    /// Read the holder of an existing lock, if the file is readable.
    pub fn holder(db_path: &Path) -> Option<LockInfo> {
        let content = fs::read_to_string(Self::lock_path_for(db_path)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Check if an existing lock belongs to nobody.
    ///
    /// A holder on this host is stale once its pid is gone. Locks from
    /// another host, or without readable holder info, go stale after
    /// `max_age`.
    pub fn is_stale(db_path: &Path, max_age: Duration) -> bool {
        if let Some(holder) = Self::holder(db_path)
            && holder.hostname == this_host()
            && let Some(alive) = process_alive(holder.pid)
        {
            return !alive;
        }

        let lock_path = Self::lock_path_for(db_path);
        if let Ok(metadata) = fs::metadata(&lock_path)
            && let Ok(modified) = metadata.modified()
        {
            return modified.elapsed().unwrap_or_default() > max_age;
        }
        false
    }

    /// Remove a lock left behind by a crashed process.
    pub fn break_lock(db_path: &Path) -> Result<()> {
        let lock_path = Self::lock_path_for(db_path);
        fs::remove_file(&lock_path).map_err(|e| Error::LockRemove {
            path: lock_path,
            source: e,
        })
    }

    /// Path of the lock file this guard owns.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        unregister_lock(&self.lock_path);
    }
}

fn this_host() -> String {
    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}

/// Whether `pid` is running, or `None` where that cannot be told.
#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}

/// Global registry of active lock paths for cleanup on signal.
static ACTIVE_LOCKS: std::sync::LazyLock<std::sync::Mutex<Vec<PathBuf>>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(Vec::new()));

fn register_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.push(path.to_path_buf());
    }
}

fn unregister_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.retain(|p| p != path);
    }
}

/// Remove every lock this process holds. Called on a second Ctrl+C.
pub fn cleanup_all_locks() {
    if let Ok(locks) = ACTIVE_LOCKS.lock() {
        for lock_path in locks.iter() {
            let _ = fs::remove_file(lock_path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_acquire_and_release_lock() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");

        let lock = StoreLock::acquire(&db).unwrap();
        assert!(StoreLock::is_locked(&db));

        let holder = StoreLock::holder(&db).unwrap();
        assert_eq!(holder.pid, std::process::id());
        assert_eq!(holder.database, db);

        drop(lock);
        assert!(!StoreLock::is_locked(&db));
    }

    #[test]
    #[serial]
    fn test_second_writer_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");

        let _first = StoreLock::acquire(&db).unwrap();
        let second = StoreLock::acquire(&db);

        assert!(matches!(second, Err(Error::StoreLocked { .. })));
    }

    #[test]
    #[serial]
    fn test_break_stale_lock() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");
        File::create(StoreLock::lock_path_for(&db)).unwrap();

        assert!(StoreLock::holder(&db).is_none());
        StoreLock::break_lock(&db).unwrap();
        assert!(StoreLock::acquire(&db).is_ok());
    }

    fn write_holder(db: &Path, pid: u32, hostname: String) {
        let info = LockInfo {
            pid,
            hostname,
            started: Utc::now(),
            database: db.to_path_buf(),
        };
        fs::write(
            StoreLock::lock_path_for(db),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_lock_of_dead_process_is_taken_over() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");
        // Above the kernel's pid_max, so never a live process.
        write_holder(&db, 4_194_305, this_host());

        assert!(StoreLock::is_stale(&db, Duration::from_secs(3600)));
        let lock = StoreLock::acquire(&db).unwrap();

        assert_eq!(StoreLock::holder(&db).unwrap().pid, std::process::id());
        drop(lock);
    }

    #[test]
    #[serial]
    fn test_live_holder_is_not_stale() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");
        write_holder(&db, std::process::id(), this_host());

        assert!(!StoreLock::is_stale(&db, Duration::from_secs(3600)));
        assert!(matches!(
            StoreLock::acquire(&db),
            Err(Error::StoreLocked { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_foreign_lock_goes_stale_with_age() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("detections.db");
        write_holder(&db, 1, "some-other-host".to_string());

        assert!(!StoreLock::is_stale(&db, Duration::from_secs(3600)));

        let file = OpenOptions::new()
            .write(true)
            .open(StoreLock::lock_path_for(&db))
            .unwrap();
        file.set_modified(std::time::SystemTime::now() - Duration::from_secs(7200))
            .unwrap();

        assert!(StoreLock::is_stale(&db, Duration::from_secs(3600)));
    }

    #[test]
    fn test_lock_path_format() {
        let path = StoreLock::lock_path_for(Path::new("/data/detections.db"));
        assert_eq!(path.to_string_lossy(), "/data/detections.db.lock");
    }

    #[test]
    #[serial]
    fn test_cleanup_all_locks_removes_registered_files() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("orphan.db.lock");
        File::create(&lock_path).unwrap();

        register_lock(&lock_path);
        cleanup_all_locks();

        assert!(!lock_path.exists());
        unregister_lock(&lock_path);
    }
}
