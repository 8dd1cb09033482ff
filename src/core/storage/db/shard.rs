// src/core/storage/db/shard.rs

//! Defines the `DbShard` and `ShardCache` structs, which form the fundamental
//! storage units within a `Db`.

use crate::core::storage::data_types::StoredValue;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A `DbShard` is a single, concurrent slice of the database: a mutex-guarded
/// `ShardCache`. The type check of a command and its mutation both happen
/// under the same guard.
#[derive(Debug, Default)]
pub struct DbShard {
    pub entries: Mutex<ShardCache>,
}

impl DbShard {
    pub(super) fn new() -> Self {
        Self::default()
    }
}

/// The key-value store of one shard, with expiry-aware accessors.
#[derive(Debug, Default)]
pub struct ShardCache {
    store: HashMap<Bytes, StoredValue>,
}

impl ShardCache {
    /// Returns a mutable reference to a live value. An expired value is
    /// removed here (lazy expiry) and reported as absent.
    pub fn get_mut(&mut self, key: &Bytes) -> Option<&mut StoredValue> {
        if self.store.get(key).is_some_and(|v| v.is_expired()) {
            self.store.remove(key);
            return None;
        }
        self.store.get_mut(key)
    }

    /// Returns the live value for the key, inserting a fresh one when the key
    /// is absent or expired.
    pub fn get_or_insert_with(
        &mut self,
        key: &Bytes,
        default: impl FnOnce() -> StoredValue,
    ) -> &mut StoredValue {
        if self.store.get(key).is_some_and(|v| v.is_expired()) {
            self.store.remove(key);
        }
        self.store.entry(key.clone()).or_insert_with(default)
    }

    /// Raw lookup without expiry handling. Callers must check `is_expired`.
    pub fn peek(&self, key: &Bytes) -> Option<&StoredValue> {
        self.store.get(key)
    }

    pub fn put(&mut self, key: Bytes, value: StoredValue) {
        self.store.insert(key, value);
    }

    pub fn pop(&mut self, key: &Bytes) -> Option<StoredValue> {
        self.store.remove(key)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &StoredValue)> {
        self.store.iter()
    }
}
