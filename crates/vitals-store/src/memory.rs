//! In-memory store fake with the same locking contract as [`SharedStore`].
//!
//! [`SharedStore`]: crate::SharedStore

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;

use crate::{Store, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    excl: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Guard<'a>
        = MutexGuard<'a, ()>
    where
        Self: 'a;

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.data.lock().insert(key.to_owned(), value);
        Ok(())
    }

    fn acquire(&self) -> StoreResult<MutexGuard<'_, ()>> {
        Ok(self.excl.lock())
    }
}
