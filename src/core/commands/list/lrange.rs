// src/core/commands/list/lrange.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `LRANGE` command. Indices are inclusive; negative indices
/// count from the tail; out-of-range bounds clamp instead of erroring.
#[derive(Debug, Clone, Default)]
pub struct LRange {
    pub key: Bytes,
    pub start: i64,
    pub stop: i64,
}

impl ParseCommand for LRange {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 3, "lrange")?;
        Ok(LRange {
            key: extract_bytes(&args[0])?,
            start: extract_string(&args[1])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
            stop: extract_string(&args[2])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for LRange {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };
        let DataValue::List(list) = &entry.data else {
            return Err(PeridotError::WrongType);
        };

        let len = list.len() as i64;
        let start = if self.start < 0 {
            len + self.start
        } else {
            self.start
        }
        .max(0);
        let stop = if self.stop < 0 {
            len + self.stop
        } else {
            self.stop
        }
        .min(len - 1);

        if len == 0 || start > stop || start >= len {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        }

        let values = list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|v| RespValue::BulkString(v.clone()))
            .collect();
        Ok((RespValue::Array(values), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for LRange {
    fn name(&self) -> &'static str {
        "lrange"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            self.key.clone(),
            self.start.to_string().into(),
            self.stop.to_string().into(),
        ]
    }
}
