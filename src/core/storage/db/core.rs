// src/core/storage/db/core.rs

use super::shard::DbShard;
use super::transaction::TransactionState;
use crate::core::storage::data_types::StoredValue;
use bytes::Bytes;
use dashmap::DashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

/// The number of shards per database.
pub const NUM_SHARDS: usize = 16;

/// Which end of a list an operation works on.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PushDirection {
    Left,
    Right,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum PopDirection {
    Left,
    Right,
}

/// `Db` represents the keyspace, composed of multiple `DbShard`s.
#[derive(Debug)]
pub struct Db {
    /// The collection of shards that make up this database.
    pub shards: Vec<Arc<DbShard>>,
    /// The state of ongoing transactions, keyed by session ID.
    pub tx_states: Arc<DashMap<u64, TransactionState>>,
}

impl Db {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Arc::new(DbShard::new())).collect();
        Self {
            shards,
            tx_states: Arc::new(DashMap::new()),
        }
    }

    /// Calculates the shard index for a given key using hashing.
    pub fn get_shard_index(&self, key: &Bytes) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets a reference to a shard by its index.
    pub fn get_shard(&self, index: usize) -> &Arc<DbShard> {
        &self.shards[index]
    }

    /// Clears all data from all shards.
    pub async fn clear_all_shards(&self) {
        for shard in &self.shards {
            let mut guard = shard.entries.lock().await;
            guard.clear();
        }
    }

    /// Inserts a value during a data loading process (snapshot/AOF).
    pub async fn insert_value_from_load(&self, key: Bytes, value: StoredValue) {
        let shard_index = self.get_shard_index(&key);
        let mut guard = self.shards[shard_index].entries.lock().await;
        guard.put(key, value);
    }

    /// Returns the total number of keys, expired entries included.
    pub async fn key_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.entries.lock().await.len();
        }
        count
    }
}

impl Default for Db {
    fn default() -> Self {
        Self::new()
    }
}
