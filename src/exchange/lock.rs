// ==========================================
// SAP Meter Exchange - Lock manager
// ==========================================
// Filesystem-based mutual exclusion, one marker file per job key.
// No queueing: a held lock means the caller skips this run. The
// marker carries its acquisition timestamp so a lock abandoned by a
// crashed run can be detected and forcibly released after the
// configured staleness threshold.
// ==========================================

use crate::exchange::error::{ExchangeError, ExchangeResult};
use chrono::{DateTime, Duration, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ==========================================
// LockManager
// ==========================================
pub struct LockManager {
    lock_dir: PathBuf,
    stale_after: Duration,
}

impl LockManager {
    pub fn new(lock_dir: &Path, stale_after_minutes: i64) -> Self {
        Self {
            lock_dir: lock_dir.to_path_buf(),
            stale_after: Duration::minutes(stale_after_minutes.max(1)),
        }
    }

    fn lock_path(&self, job_key: &str) -> PathBuf {
        self.lock_dir.join(format!("{job_key}.lock"))
    }

    /// Acquire the lock for a job key.
    ///
    /// Fails with `AlreadyRunning` when a fresh lock exists. A stale
    /// lock (older than the staleness threshold) is forcibly released
    /// first. The final create is create_new, so the check-then-create
    /// race collapses to a second `AlreadyRunning`.
    pub fn acquire(&self, job_key: &str) -> ExchangeResult<LockGuard> {
        fs::create_dir_all(&self.lock_dir)
            .map_err(|e| ExchangeError::LockInfra(format!("cannot create lock dir: {e}")))?;

        let path = self.lock_path(job_key);
        if path.exists() {
            if self.is_stale(&path) {
                warn!(job_key, path = %path.display(), "releasing stale lock");
                fs::remove_file(&path)
                    .map_err(|e| ExchangeError::LockInfra(format!("cannot remove stale lock: {e}")))?;
            } else {
                info!(job_key, "lock held, skipping run");
                return Err(ExchangeError::AlreadyRunning {
                    job_key: job_key.to_string(),
                });
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(job_key, "lock held, skipping run");
                return Err(ExchangeError::AlreadyRunning {
                    job_key: job_key.to_string(),
                });
            }
            Err(e) => return Err(ExchangeError::LockInfra(format!("cannot create lock: {e}"))),
        };

        file.write_all(Utc::now().to_rfc3339().as_bytes())
            .map_err(|e| ExchangeError::LockInfra(format!("cannot write lock: {e}")))?;

        Ok(LockGuard {
            path,
            job_key: job_key.to_string(),
        })
    }

    /// A lock is stale when its recorded acquisition timestamp is
    /// older than the threshold. An unreadable timestamp counts as
    /// stale: it cannot belong to a healthy run.
    fn is_stale(&self, path: &Path) -> bool {
        let acquired_at = fs::read_to_string(path)
            .ok()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        match acquired_at {
            Some(ts) => Utc::now() - ts > self.stale_after,
            None => true,
        }
    }
}

// ==========================================
// LockGuard - RAII release
// ==========================================
// The marker is removed on drop, so every exit path (including
// processing errors and panics unwinding through the job) releases
// the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    job_key: String,
}

impl LockGuard {
    pub fn job_key(&self) -> &str {
        &self.job_key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(job_key = %self.job_key, "failed to release lock: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new(dir.path(), 60);

        let guard = manager.acquire("importmetermaster").unwrap();
        assert!(dir.path().join("importmetermaster.lock").exists());
        drop(guard);
        assert!(!dir.path().join("importmetermaster.lock").exists());
    }

    #[test]
    fn test_second_acquire_fails_and_leaves_lock() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new(dir.path(), 60);

        let _guard = manager.acquire("importmetermaster").unwrap();
        let err = manager.acquire("importmetermaster").unwrap_err();
        assert!(matches!(err, ExchangeError::AlreadyRunning { .. }));
        // The failed acquire must not touch the existing lock
        assert!(dir.path().join("importmetermaster.lock").exists());
    }

    #[test]
    fn test_different_job_keys_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new(dir.path(), 60);

        let _a = manager.acquire("importmetermaster").unwrap();
        let _b = manager.acquire("exportmeterreading").unwrap();
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new(dir.path(), 30);

        let path = dir.path().join("importmetermaster.lock");
        let old = (Utc::now() - Duration::hours(2)).to_rfc3339();
        fs::write(&path, old).unwrap();

        let guard = manager.acquire("importmetermaster").unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_garbage_lock_counts_as_stale() {
        let dir = TempDir::new().unwrap();
        let manager = LockManager::new(dir.path(), 30);

        let path = dir.path().join("importmetermaster.lock");
        fs::write(&path, "not a timestamp").unwrap();

        assert!(manager.acquire("importmetermaster").is_ok());
    }
}
