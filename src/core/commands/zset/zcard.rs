// src/core/commands/zset/zcard.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `ZCARD` command.
#[derive(Debug, Clone, Default)]
pub struct ZCard {
    pub key: Bytes,
}

impl ParseCommand for ZCard {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 1, "zcard")?;
        Ok(ZCard {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZCard {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let len = match cache.get_mut(&self.key) {
            Some(entry) => match &entry.data {
                DataValue::SortedSet(zset) => zset.len(),
                _ => return Err(PeridotError::WrongType),
            },
            None => 0,
        };
        Ok((RespValue::Integer(len as i64), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for ZCard {
    fn name(&self) -> &'static str {
        "zcard"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
}
