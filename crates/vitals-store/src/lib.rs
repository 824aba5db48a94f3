//! The process-shared key/value table backing all persisted registry state.
//!
//! [`SharedStore`] is the production implementation: one JSON document on a
//! tmpfs-backed directory, guarded by an advisory file lock, so cooperating
//! processes on the same host see one table that survives process restarts
//! (but not host restarts). [`MemoryStore`] is the in-memory fake used by
//! tests of everything layered on top.

mod error;
mod lock;
mod memory;
mod shared;

pub use error::StoreError;
pub use lock::FileLockGuard;
pub use memory::MemoryStore;
pub use shared::SharedStore;

use serde_json::Value;

pub type StoreResult<T> = Result<T, StoreError>;

/// A shared mapping from string keys to JSON documents.
///
/// `get` and `set` are individually best-effort: `get` may read without the
/// cross-process lock (an accepted staleness trade-off on the cached read
/// path) and must not be assumed atomic across multiple keys. Every
/// read-modify-write sequence, and every mutation that must stay consistent
/// across keys, runs while holding the guard returned by [`Store::acquire`].
pub trait Store: Send + Sync {
    /// Scoped exclusive lock. Dropping the guard releases the lock on every
    /// exit path.
    type Guard<'a>: 'a
    where
        Self: 'a;

    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Blocks until the store-wide exclusive lock is held.
    fn acquire(&self) -> StoreResult<Self::Guard<'_>>;
}
