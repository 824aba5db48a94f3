//! Shared store backed by a tmpfs-resident JSON document.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::lock::acquire_exclusive;
use crate::{FileLockGuard, Store, StoreError, StoreResult};

const DATA_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// One JSON document per store under `<dir>/<name>/`, with a sibling lock
/// file for cross-process mutual exclusion. Every process that opens the
/// same name under the same directory sees the same table.
pub struct SharedStore {
    data_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl SharedStore {
    /// Opens (creating if needed) the shared store `name`. Fails fast when
    /// the backing directory cannot be created or the lock cannot be taken;
    /// there is no private in-process fallback.
    pub fn open(name: &str, dir: Option<&Path>) -> StoreResult<Self> {
        let base = dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_base_dir);
        let root = base.join(name);
        fs::create_dir_all(&root).map_err(|source| StoreError::Unavailable {
            path: root.clone(),
            source,
        })?;

        let store = Self {
            data_path: root.join(DATA_FILE),
            lock_path: root.join(LOCK_FILE),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };

        // Prove the mechanism works before anything depends on it: take the
        // lock once and make sure the document exists.
        let _guard = store.acquire()?;
        if !store.data_path.exists() {
            fs::write(&store.data_path, b"{}").map_err(|source| StoreError::Unavailable {
                path: store.data_path.clone(),
                source,
            })?;
        }
        tracing::debug!(store = %root.display(), "opened shared store");
        Ok(store)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn read_document(&self) -> StoreResult<Map<String, Value>> {
        let bytes = match fs::read(&self.data_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.data_path.clone(),
                    source,
                })
            }
        };
        if bytes.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(
                    path = %self.data_path.display(),
                    "shared store document is corrupt, starting from an empty table"
                );
                Ok(Map::new())
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> StoreResult<()> {
        let bytes = serde_json::to_vec(document)?;
        // Write-then-rename so lock-free readers never see a torn document.
        let tmp_path = self.data_path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.data_path).map_err(|source| StoreError::Io {
            path: self.data_path.clone(),
            source,
        })
    }
}

/// `/dev/shm` where available: shared across processes, cleared with the
/// host. Anywhere else the regular temp dir gives the same lifecycle.
fn default_base_dir() -> PathBuf {
    let shm = PathBuf::from("/dev/shm");
    if shm.is_dir() {
        shm
    } else {
        std::env::temp_dir()
    }
}

impl Store for SharedStore {
    type Guard<'a>
        = FileLockGuard
    where
        Self: 'a;

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut document = self.read_document()?;
        document.insert(key.to_owned(), value);
        self.write_document(&document)
    }

    fn acquire(&self) -> StoreResult<FileLockGuard> {
        acquire_exclusive(&self.lock_path, self.lock_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SharedStore::open("registry", Some(dir.path())).unwrap();

        assert_eq!(store.get("services").unwrap(), None);
        store.set("services", json!({"db": {"name": "db"}})).unwrap();
        assert_eq!(
            store.get("services").unwrap(),
            Some(json!({"db": {"name": "db"}}))
        );
    }

    #[test]
    fn two_handles_on_the_same_name_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SharedStore::open("registry", Some(dir.path())).unwrap();
        let reader = SharedStore::open("registry", Some(dir.path())).unwrap();

        writer.set("server_start", json!(1700000000.0)).unwrap();
        assert_eq!(
            reader.get("server_start").unwrap(),
            Some(json!(1700000000.0))
        );
    }

    #[test]
    fn distinct_names_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = SharedStore::open("a", Some(dir.path())).unwrap();
        let b = SharedStore::open("b", Some(dir.path())).unwrap();

        a.set("k", json!(1)).unwrap();
        assert_eq!(b.get("k").unwrap(), None);
    }

    #[test]
    fn corrupt_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SharedStore::open("registry", Some(dir.path())).unwrap();
        store.set("k", json!(1)).unwrap();

        fs::write(dir.path().join("registry").join(DATA_FILE), b"not json").unwrap();
        assert_eq!(store.get("k").unwrap(), None);

        // Still writable after self-healing.
        store.set("k", json!(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn acquire_conflicts_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let holder = SharedStore::open("registry", Some(dir.path())).unwrap();
        let waiter = SharedStore::open("registry", Some(dir.path()))
            .unwrap()
            .with_lock_timeout(Duration::from_millis(50));

        let guard = holder.acquire().unwrap();
        assert!(matches!(
            waiter.acquire(),
            Err(StoreError::LockTimeout { .. })
        ));
        drop(guard);
        waiter.acquire().unwrap();
    }
}
