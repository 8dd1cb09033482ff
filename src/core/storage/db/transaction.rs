// src/core/storage/db/transaction.rs

//! Per-session transaction state, owned by the `Db` so it can be cleaned up
//! both by `DISCARD`/`EXEC` and by the connection guard on disconnect.

use super::core::Db;
use crate::core::Command;
use crate::core::PeridotError;

/// The queue of a `MULTI`/`EXEC` block for one session.
#[derive(Debug, Default)]
pub struct TransactionState {
    pub in_transaction: bool,
    pub commands: Vec<Command>,
    /// Set when a queued command failed to parse; `EXEC` then aborts.
    pub has_error: bool,
}

impl Db {
    /// Starts a transaction for the session, clearing any stale queue.
    pub fn start_transaction(&self, session_id: u64) {
        let mut state = self.tx_states.entry(session_id).or_default();
        state.in_transaction = true;
        state.commands.clear();
        state.has_error = false;
    }

    /// Drops the transaction state for the session.
    pub fn discard_transaction(&self, session_id: u64) -> Result<(), PeridotError> {
        self.tx_states
            .remove(&session_id)
            .map(|_| ())
            .ok_or(PeridotError::DiscardWithoutMulti)
    }

    /// Takes ownership of the transaction state for `EXEC`.
    pub fn take_transaction_state(&self, session_id: u64) -> Option<TransactionState> {
        self.tx_states.remove(&session_id).map(|(_, state)| state)
    }
}
