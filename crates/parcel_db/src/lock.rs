//! Single-writer lock for on-disk databases.
//!
//! A writer holds an `fs2` exclusive lock on `<db>.lock` for as long as its
//! connection lives. Next to it, `<db>.lock.json` names the holding process
//! so a refused writer can say who is in the way.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LockError {
    /// Another writer holds the database.
    #[error(
        "{} is held by {}",
        .db_path.display(),
        .holder.as_ref().map_or_else(|| "another process".to_string(), ToString::to_string)
    )]
    Held {
        db_path: PathBuf,
        holder: Option<LockHolder>,
    },

    #[error("Lock file {}: {source}", .lock_path.display())]
    Io {
        lock_path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Process recorded as holding a writer lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub exe: Option<String>,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            exe: std::env::current_exe()
                .ok()
                .map(|exe| exe.display().to_string()),
            acquired_at: Utc::now(),
        }
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.pid)?;
        if let Some(exe) = &self.exe {
            write!(f, " ({})", exe)?;
        }
        write!(f, " since {}", self.acquired_at.to_rfc3339())
    }
}

/// Exclusive writer lock. Dropping it releases the lock and removes the
/// holder record.
pub struct WriterLock {
    _file: File,
    lock_path: PathBuf,
    holder_path: PathBuf,
}

impl WriterLock {
    /// Take the writer lock for `db_path` without blocking.
    pub fn acquire(db_path: &Path) -> Result<Self, LockError> {
        let lock_path = lock_file_path(db_path);
        let io_err = |source| LockError::Io {
            lock_path: lock_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err)?;

        // std::fs::File has an inherent try_lock_exclusive on newer toolchains.
        if let Err(err) = FileExt::try_lock_exclusive(&file) {
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(io_err(err));
            }
            return Err(LockError::Held {
                db_path: db_path.to_path_buf(),
                holder: read_holder(db_path),
            });
        }

        let holder_path = holder_file_path(db_path);
        record_holder(&holder_path, &LockHolder::current());
        debug!(lock = %lock_path.display(), "Writer lock acquired");

        Ok(Self {
            _file: file,
            lock_path,
            holder_path,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.holder_path) {
            if err.kind() != io::ErrorKind::NotFound {
                debug!(path = %self.holder_path.display(), %err, "Holder record not removed");
            }
        }
        debug!(lock = %self.lock_path.display(), "Writer lock released");
    }
}

impl fmt::Debug for WriterLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLock")
            .field("lock_path", &self.lock_path)
            .finish_non_exhaustive()
    }
}

fn record_holder(path: &Path, holder: &LockHolder) {
    let written = serde_json::to_vec_pretty(holder)
        .map_err(io::Error::from)
        .and_then(|json| fs::write(path, json));
    if let Err(err) = written {
        // The lock itself is held; only the diagnostics are missing.
        warn!(path = %path.display(), %err, "Could not record lock holder");
    }
}

/// Holder record for `db_path`, if one exists and parses.
pub fn read_holder(db_path: &Path) -> Option<LockHolder> {
    let raw = fs::read(holder_file_path(db_path)).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Whether some handle currently holds the writer lock.
///
/// Probes on a separate handle; neither the lock file nor the holder record
/// is created or removed.
pub fn is_held(db_path: &Path) -> bool {
    let Ok(file) = File::open(lock_file_path(db_path)) else {
        return false;
    };
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(err) => err.kind() == io::ErrorKind::WouldBlock,
    }
}

/// `<db>.lock`, keeping the database's own extension:
/// `parcels.duckdb` → `parcels.duckdb.lock`, `parcels` → `parcels.lock`.
pub fn lock_file_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    db_path.with_file_name(name)
}

fn holder_file_path(db_path: &Path) -> PathBuf {
    let mut path = lock_file_path(db_path).into_os_string();
    path.push(".json");
    PathBuf::from(path)
}
