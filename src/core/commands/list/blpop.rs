// src/core/commands/list/blpop.rs

use super::logic::list_pop_logic;
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Represents the `BLPOP` command. The timeout is in seconds, fractional
/// values allowed; zero waits indefinitely.
#[derive(Debug, Clone, Default)]
pub struct BLPop {
    pub keys: Vec<Bytes>,
    pub timeout: Option<Duration>,
}

impl ParseCommand for BLPop {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 2 {
            return Err(PeridotError::WrongArgumentCount("blpop".to_string()));
        }
        let keys = args[..args.len() - 1]
            .iter()
            .map(extract_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let timeout_secs: f64 = extract_string(&args[args.len() - 1])?
            .parse()
            .map_err(|_| PeridotError::NotAFloat)?;
        if !timeout_secs.is_finite() || timeout_secs < 0.0 {
            return Err(PeridotError::InvalidState("timeout is negative".into()));
        }
        let timeout = if timeout_secs == 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(timeout_secs))
        };
        Ok(BLPop { keys, timeout })
    }
}

#[async_trait]
impl ExecutableCommand for BLPop {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        // Inside EXEC or any replay context blocking is not allowed; a single
        // non-blocking pass decides the reply.
        if ctx.replay {
            for key in &self.keys {
                let (resp, outcome) = list_pop_logic(ctx, key, PopDirection::Left)?;
                if resp != RespValue::Null {
                    return Ok((
                        RespValue::Array(vec![RespValue::BulkString(key.clone()), resp]),
                        outcome,
                    ));
                }
            }
            return Ok((RespValue::NullArray, WriteOutcome::DidNotWrite));
        }

        let manager = ctx.state.blocker_manager.clone();
        manager
            .orchestrate_blocking_pop(ctx, &self.keys, self.timeout)
            .await
    }
}

impl CommandSpec for BLPop {
    fn name(&self) -> &'static str {
        "blpop"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE | CommandFlags::BLOCKING
    }

    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = self.keys.clone();
        let secs = self
            .timeout
            .map(|d| d.as_secs_f64().to_string())
            .unwrap_or_else(|| "0".to_string());
        args.push(secs.into());
        args
    }
}
