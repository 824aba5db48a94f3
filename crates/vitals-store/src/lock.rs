//! Advisory file locking for cross-process mutual exclusion.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::{StoreError, StoreResult};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(250);
const CONTENTION_LOG_THRESHOLD: Duration = Duration::from_secs(2);

/// RAII guard for the store-wide exclusive lock. The advisory lock is
/// released when the underlying descriptor closes on drop, panics and early
/// returns included.
#[derive(Debug)]
pub struct FileLockGuard {
    _file: File,
}

/// Acquires an exclusive lock on `lock_path`, retrying with exponential
/// backoff until `timeout` elapses.
pub(crate) fn acquire_exclusive(lock_path: &Path, timeout: Duration) -> StoreResult<FileLockGuard> {
    let start = Instant::now();
    let mut retry_delay = INITIAL_RETRY_DELAY;
    let mut contention_logged = false;

    loop {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|source| StoreError::Io {
                path: lock_path.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => return Ok(FileLockGuard { _file: file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Err(StoreError::LockTimeout {
                        path: lock_path.to_path_buf(),
                    });
                }
                if !contention_logged && elapsed >= CONTENTION_LOG_THRESHOLD {
                    tracing::warn!(
                        lock = %lock_path.display(),
                        "waiting for contended store lock"
                    );
                    contention_logged = true;
                }
                thread::sleep(retry_delay);
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: lock_path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_guard_drops() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("store.lock");

        let guard = acquire_exclusive(&lock_path, Duration::from_secs(1)).unwrap();

        // A second descriptor on the same file conflicts while the guard lives.
        let contended = acquire_exclusive(&lock_path, Duration::from_millis(50));
        assert!(matches!(contended, Err(StoreError::LockTimeout { .. })));

        drop(guard);
        acquire_exclusive(&lock_path, Duration::from_secs(1)).unwrap();
    }
}
