// src/core/storage/db/context.rs

use super::core::Db;
use super::locking::ExecutionLocks;
use super::shard::ShardCache;
use crate::core::Command;
use crate::core::PeridotError;
use crate::core::state::ServerState;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::MutexGuard;

/// `ExecutionContext` provides all the state and locks required to execute a `Command`.
pub struct ExecutionContext<'a> {
    pub state: Arc<ServerState>,
    pub locks: ExecutionLocks<'a>,
    pub db: &'a Db,
    /// The command being executed, so lock helpers can resolve shards without
    /// the caller re-threading keys.
    pub command: Option<Command>,
    pub session_id: u64,
    /// Marks execution on behalf of replica ingest, AOF replay, or `EXEC`.
    /// Replay execution never re-propagates, re-queues, or blocks.
    pub replay: bool,
}

impl<'a> ExecutionContext<'a> {
    /// Resolves the shard cache for a specific key out of whatever lock set
    /// the context holds.
    pub fn cache_for_key_mut(&mut self, key: &Bytes) -> Result<&mut ShardCache, PeridotError> {
        let index = self.db.get_shard_index(key);
        match &mut self.locks {
            ExecutionLocks::Single { shard_index, guard } if *shard_index == index => {
                Ok(&mut **guard)
            }
            ExecutionLocks::Single { .. } => Err(PeridotError::LockingError(
                "held shard lock does not cover key".into(),
            )),
            ExecutionLocks::Multi { guards } => guards
                .get_mut(&index)
                .map(|g| &mut **g)
                .ok_or_else(|| PeridotError::LockingError("required shard lock missing".into())),
            ExecutionLocks::All { guards } => Ok(&mut *guards[index]),
            ExecutionLocks::None => Err(PeridotError::LockingError(
                "command executed without locks".into(),
            )),
        }
    }

    /// Resolves the shard cache for the command's first key.
    pub fn single_cache_mut(&mut self) -> Result<&mut ShardCache, PeridotError> {
        let key = self
            .command
            .as_ref()
            .and_then(|c| c.get_keys().into_iter().next())
            .ok_or_else(|| {
                PeridotError::Internal("command in context has no keys for shard lookup".into())
            })?;
        self.cache_for_key_mut(&key)
    }

    /// All shard guards, in shard order. Only valid for sweep commands.
    pub fn all_caches_mut(
        &mut self,
    ) -> Result<&mut Vec<MutexGuard<'a, ShardCache>>, PeridotError> {
        match &mut self.locks {
            ExecutionLocks::All { guards } => Ok(guards),
            _ => Err(PeridotError::LockingError(
                "command expected whole-keyspace locks".into(),
            )),
        }
    }

    /// Releases all locks held by the context. Blocking commands do this
    /// before parking so writers can reach the watched keys.
    pub fn release_locks(&mut self) {
        self.locks = ExecutionLocks::None;
    }

    /// Re-acquires the locks for the command currently in the context, used
    /// by blocking commands after they are woken.
    pub async fn reacquire_locks_for_command(&mut self) -> Result<(), PeridotError> {
        let command = self.command.as_ref().ok_or_else(|| {
            PeridotError::Internal("cannot reacquire locks without a command in context".into())
        })?;
        self.locks = self.db.determine_locks_for_command(command).await;
        Ok(())
    }
}
