// src/core/commands/generic/wait.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use tokio::time::Instant;

/// Represents the `WAIT` command: blocks until at least `num_replicas`
/// replicas have acknowledged every write propagated so far, or until the
/// timeout expires, and returns the count actually observed.
#[derive(Debug, Clone, Default)]
pub struct Wait {
    pub num_replicas: i64,
    pub timeout_ms: u64,
}

impl ParseCommand for Wait {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 2, "wait")?;
        Ok(Wait {
            num_replicas: extract_string(&args[0])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
            timeout_ms: extract_string(&args[1])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Wait {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let state = ctx.state.clone();
        let replication = &state.replication;

        let connected = replication.replica_states.len() as i64;
        if self.num_replicas <= 0 || connected == 0 {
            return Ok((RespValue::Integer(0), WriteOutcome::DidNotWrite));
        }

        // The barrier is the offset of everything propagated up to now,
        // recorded BEFORE the GETACK probe adds its own bytes.
        let required_offset = replication.master_repl_offset.load(Ordering::SeqCst);
        if required_offset == 0 {
            // Nothing was ever propagated: every connected replica trivially
            // satisfies the barrier.
            return Ok((
                RespValue::Integer(self.num_replicas.min(connected)),
                WriteOutcome::DidNotWrite,
            ));
        }

        // Ask every replica where it stands. The probe travels the normal
        // propagation path (and is offset-counted), but never reaches the AOF.
        let getack = crate::core::replication::handler::getack_frame();
        {
            let _order = replication.propagation_order.lock().unwrap();
            replication
                .master_repl_offset
                .fetch_add(getack.len() as u64, Ordering::SeqCst);
            state.event_bus.publish_to_replicas(getack);
        }

        let deadline = if self.timeout_ms == 0 {
            None
        } else {
            Some(Instant::now() + std::time::Duration::from_millis(self.timeout_ms))
        };

        loop {
            // Arm the notifier before counting so an ACK landing between the
            // count and the await is not lost.
            let notified = replication.ack_notify.notified();
            tokio::pin!(notified);

            let count = replication.count_acked(required_offset) as i64;
            if count >= self.num_replicas {
                return Ok((RespValue::Integer(count), WriteOutcome::DidNotWrite));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        // Timed out: report the partial count. Late ACKs still
                        // update the replica map but nobody is waiting on them.
                        let count = replication.count_acked(required_offset) as i64;
                        return Ok((RespValue::Integer(count), WriteOutcome::DidNotWrite));
                    }
                }
                None => notified.await,
            }
        }
    }
}

impl CommandSpec for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            self.num_replicas.to_string().into(),
            self.timeout_ms.to_string().into(),
        ]
    }
}
