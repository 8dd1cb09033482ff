// src/core/handler/command_router.rs

//! The central component for routing parsed commands to their handlers.
//!
//! The `Router` receives a parsed `Command` from the connection handler and
//! applies the dispatch rules: subscription-mode gating happens before it (in
//! the Pub/Sub loop), transaction queueing happens here, and successful
//! writes are propagated to the AOF and every replica link afterwards.

use super::transaction_handler::TransactionHandler;
use crate::config::AppendFsync;
use crate::connection::SessionState;
use crate::core::commands::command_trait::{CommandFlags, WriteOutcome};
use crate::core::events::AofWork;
use crate::core::protocol::encode_command;
use crate::core::pubsub::handler::{handle_subscribe, handle_unsubscribe};
use crate::core::state::ServerState;
use crate::core::storage::db::ExecutionContext;
use crate::core::{Command, PeridotError, RespValue};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::oneshot;
use tracing::debug;

/// Represents the various types of responses a command can produce.
pub enum RouteResponse {
    /// A single RESP value. This is the most common response type.
    Single(RespValue),
    /// Multiple RESP values, sent sequentially. Used for `SUBSCRIBE`.
    Multiple(Vec<RespValue>),
    /// No response should be sent to the client.
    NoOp,
}

/// The `Router` directs a parsed `Command` through the processing pipeline.
pub struct Router<'a> {
    state: Arc<ServerState>,
    session_id: u64,
    addr: SocketAddr,
    session: &'a mut SessionState,
}

impl<'a> Router<'a> {
    pub fn new(
        state: Arc<ServerState>,
        session_id: u64,
        addr: SocketAddr,
        session: &'a mut SessionState,
    ) -> Self {
        Self {
            state,
            session_id,
            addr,
            session,
        }
    }

    /// The main entry point for routing a command.
    pub async fn route(&mut self, command: Command) -> Result<RouteResponse, PeridotError> {
        debug!(
            "session {} ({}): routing command '{}'",
            self.session_id,
            self.addr,
            command.name()
        );

        // Inside MULTI everything except the transaction-control commands is
        // queued, not executed.
        if self.session.is_in_transaction
            && !command.get_flags().contains(CommandFlags::TRANSACTION)
        {
            let handler = TransactionHandler::new(self.state.clone(), self.session_id);
            return handler.handle_queueing(command).map(RouteResponse::Single);
        }

        match command {
            Command::Multi => {
                let handler = TransactionHandler::new(self.state.clone(), self.session_id);
                let reply = handler.handle_multi()?;
                self.session.is_in_transaction = true;
                Ok(RouteResponse::Single(reply))
            }
            Command::Exec => {
                let handler = TransactionHandler::new(self.state.clone(), self.session_id);
                self.session.is_in_transaction = false;
                handler.handle_exec().await.map(RouteResponse::Single)
            }
            Command::Discard => {
                let handler = TransactionHandler::new(self.state.clone(), self.session_id);
                self.session.is_in_transaction = false;
                handler.handle_discard().map(RouteResponse::Single)
            }

            // Pub/Sub subscription changes rewire the session; the connection
            // handler switches into the subscription-mode loop afterwards.
            Command::Subscribe(cmd) => Ok(RouteResponse::Multiple(handle_subscribe(
                self.session,
                &self.state,
                &cmd.channels,
            ))),
            Command::Unsubscribe(cmd) => Ok(RouteResponse::Multiple(handle_unsubscribe(
                self.session,
                &self.state,
                &cmd.channels,
            ))),

            // Handshake options from a connecting replica; recorded when the
            // link is promoted by PSYNC.
            Command::Replconf(_) => Ok(RouteResponse::Single(RespValue::SimpleString(
                "OK".into(),
            ))),
            Command::Psync(_) => Err(PeridotError::Internal(
                "PSYNC must be handled by the connection handler".into(),
            )),

            Command::Quit => Ok(RouteResponse::Single(RespValue::SimpleString("OK".into()))),

            command => self
                .execute_command(command)
                .await
                .map(RouteResponse::Single),
        }
    }

    /// Executes a standard command under its locks and propagates the write.
    async fn execute_command(&mut self, command: Command) -> Result<RespValue, PeridotError> {
        let flags = command.get_flags();
        if flags.contains(CommandFlags::WRITE) && self.state.is_replica() {
            return Err(PeridotError::ReadOnly(
                "You can't write against a read only replica.".into(),
            ));
        }

        let db = self.state.db.clone();
        let locks = db.determine_locks_for_command(&command).await;
        let mut ctx = ExecutionContext {
            state: self.state.clone(),
            locks,
            db: &db,
            command: Some(command.clone()),
            session_id: self.session_id,
            replay: false,
        };
        let (reply, outcome) = command.execute(&mut ctx).await?;

        // Propagation happens while the shard locks are still held, so the
        // propagation order matches the keyspace mutation order.
        if flags.contains(CommandFlags::WRITE)
            && !flags.contains(CommandFlags::NO_PROPAGATE)
            && outcome != WriteOutcome::DidNotWrite
        {
            let frame = encode_command(&command.propagation_parts(&reply));
            propagate(&self.state, vec![frame]).await;
        }
        Ok(reply)
    }
}

/// Publishes encoded write frames to the replica links and the AOF, advancing
/// the global offset atomically with publication. With the `always` fsync
/// policy this waits for the AOF writer to sync before returning, so the
/// client's reply orders after durability.
pub(crate) async fn propagate(state: &Arc<ServerState>, frames: Vec<Bytes>) {
    {
        let _order = state.replication.propagation_order.lock().unwrap();
        for frame in &frames {
            state
                .replication
                .master_repl_offset
                .fetch_add(frame.len() as u64, Ordering::SeqCst);
            state.event_bus.publish_to_replicas(frame.clone());
        }
    }

    if state.event_bus.aof_enabled() {
        let (ack_tx, ack_rx) = if state.config.appendfsync == AppendFsync::Always {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        state.event_bus.publish_to_aof(AofWork {
            frames,
            ack: ack_tx,
        });
        if let Some(rx) = ack_rx {
            // A dropped sender means the writer is gone; durability already
            // degraded, the command still succeeds.
            let _ = rx.await;
        }
    }
}
