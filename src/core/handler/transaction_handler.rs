// src/core/handler/transaction_handler.rs

//! Manages MULTI/EXEC transactions: command queueing and atomic execution.

use super::command_router::propagate;
use crate::core::commands::command_trait::{CommandFlags, WriteOutcome};
use crate::core::protocol::encode_command;
use crate::core::state::ServerState;
use crate::core::storage::db::{ExecutionContext, ExecutionLocks, ShardCache, TransactionState};
use crate::core::{Command, PeridotError, RespValue};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::MutexGuard;

/// Handles the transaction logic for a single client session.
pub struct TransactionHandler {
    state: Arc<ServerState>,
    session_id: u64,
}

impl TransactionHandler {
    pub fn new(state: Arc<ServerState>, session_id: u64) -> Self {
        Self { state, session_id }
    }

    /// Handles `MULTI`, arming the queue for the session.
    pub fn handle_multi(&self) -> Result<RespValue, PeridotError> {
        let db = &self.state.db;
        if db
            .tx_states
            .get(&self.session_id)
            .is_some_and(|tx| tx.in_transaction)
        {
            return Err(PeridotError::NestedMulti);
        }
        db.start_transaction(self.session_id);
        Ok(RespValue::SimpleString("OK".into()))
    }

    /// Queues a command after `MULTI`. The command is not executed, not
    /// propagated, and observes nothing until `EXEC`.
    pub fn handle_queueing(&self, command: Command) -> Result<RespValue, PeridotError> {
        let db = &self.state.db;
        let mut tx_state = db
            .tx_states
            .get_mut(&self.session_id)
            .ok_or_else(|| PeridotError::Internal("command queued without MULTI".into()))?;

        if tx_state.has_error {
            return Ok(RespValue::Error(
                "EXECABORT Transaction discarded because of previous errors.".to_string(),
            ));
        }

        // Commands that rewire the connection cannot be deferred into EXEC.
        if matches!(
            command,
            Command::Subscribe(_) | Command::Unsubscribe(_) | Command::Replconf(_) | Command::Psync(_)
        ) {
            tx_state.has_error = true;
            return Ok(RespValue::Error(format!(
                "ERR {} is not allowed in transactions",
                command.name().to_ascii_uppercase()
            )));
        }

        tx_state.commands.push(command);
        Ok(RespValue::SimpleString("QUEUED".into()))
    }

    /// Handles `DISCARD`, dropping the queue.
    pub fn handle_discard(&self) -> Result<RespValue, PeridotError> {
        self.state.db.discard_transaction(self.session_id)?;
        Ok(RespValue::SimpleString("OK".into()))
    }

    /// Handles `EXEC`: runs the queued commands in order as one atomic batch
    /// and returns the array of their replies.
    pub async fn handle_exec(&self) -> Result<RespValue, PeridotError> {
        let tx_state = self
            .state
            .db
            .take_transaction_state(self.session_id)
            .ok_or(PeridotError::ExecWithoutMulti)?;

        if tx_state.has_error {
            return Ok(RespValue::Error(
                "EXECABORT Transaction discarded because of previous errors.".to_string(),
            ));
        }
        if tx_state.commands.is_empty() {
            return Ok(RespValue::Array(vec![]));
        }

        self.execute_transaction_atomically(tx_state).await
    }

    /// The critical section: every shard the batch touches stays locked from
    /// the first command through propagation, so no other connection observes
    /// a half-applied transaction.
    async fn execute_transaction_atomically(
        &self,
        tx_state: TransactionState,
    ) -> Result<RespValue, PeridotError> {
        let db = self.state.db.clone();

        let needs_all_shards = tx_state
            .commands
            .iter()
            .any(|c| c.get_flags().contains(CommandFlags::SWEEP));
        let mut lock_set = if needs_all_shards {
            HeldLocks::All(db.lock_all_shards().await)
        } else {
            let all_keys: Vec<Bytes> = tx_state
                .commands
                .iter()
                .flat_map(|c| c.get_keys())
                .collect();
            HeldLocks::Multi(db.lock_shards_for_keys(&all_keys).await)
        };

        let mut responses = Vec::with_capacity(tx_state.commands.len());
        let mut write_frames: Vec<Bytes> = Vec::new();

        for command in &tx_state.commands {
            let locks = match lock_set {
                HeldLocks::Multi(guards) => ExecutionLocks::Multi { guards },
                HeldLocks::All(guards) => ExecutionLocks::All { guards },
            };
            let mut ctx = ExecutionContext {
                state: self.state.clone(),
                locks,
                db: &db,
                command: Some(command.clone()),
                session_id: self.session_id,
                replay: true,
            };

            match command.execute(&mut ctx).await {
                Ok((reply, outcome)) => {
                    let flags = command.get_flags();
                    if flags.contains(CommandFlags::WRITE)
                        && !flags.contains(CommandFlags::NO_PROPAGATE)
                        && outcome != WriteOutcome::DidNotWrite
                    {
                        write_frames.push(encode_command(&command.propagation_parts(&reply)));
                    }
                    responses.push(reply);
                }
                Err(e) => responses.push(RespValue::Error(e.to_string())),
            }

            // Take the guards back out of the context for the next command.
            lock_set = match ctx.locks {
                ExecutionLocks::Multi { guards } => HeldLocks::Multi(guards),
                ExecutionLocks::All { guards } => HeldLocks::All(guards),
                _ => {
                    return Err(PeridotError::Internal(
                        "transaction context lost its locks".into(),
                    ));
                }
            };
        }

        // Propagate the batch wrapped in MULTI/EXEC while still holding the
        // locks, so replicas apply it as one contiguous unit.
        if !write_frames.is_empty() {
            let mut frames = Vec::with_capacity(write_frames.len() + 2);
            frames.push(encode_command(&Command::Multi.to_wire_parts()));
            frames.extend(write_frames);
            frames.push(encode_command(&Command::Exec.to_wire_parts()));
            propagate(&self.state, frames).await;
        }
        drop(lock_set);

        Ok(RespValue::Array(responses))
    }
}

/// The lock set threaded through the queued commands of one EXEC.
enum HeldLocks<'a> {
    Multi(BTreeMap<usize, MutexGuard<'a, ShardCache>>),
    All(Vec<MutexGuard<'a, ShardCache>>),
}
