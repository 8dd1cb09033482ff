// src/core/commands/generic/keys.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, glob_match, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `KEYS` command. It takes every shard lock so the reply is a
/// consistent snapshot of the keyspace.
#[derive(Debug, Clone, Default)]
pub struct Keys {
    pub pattern: Bytes,
}

impl ParseCommand for Keys {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 1, "keys")?;
        Ok(Keys {
            pattern: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Keys {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let guards = ctx.all_caches_mut()?;
        let mut matched = Vec::new();
        for guard in guards.iter() {
            for (key, value) in guard.iter() {
                if !value.is_expired() && glob_match(&self.pattern, key) {
                    matched.push(RespValue::BulkString(key.clone()));
                }
            }
        }
        Ok((RespValue::Array(matched), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for Keys {
    fn name(&self) -> &'static str {
        "keys"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::SWEEP
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.pattern.clone()]
    }
}
