// src/core/commands/zset/zrange.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, format_score};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `ZRANGE` command (by rank, `WITHSCORES` optional).
#[derive(Debug, Clone, Default)]
pub struct ZRange {
    pub key: Bytes,
    pub start: i64,
    pub stop: i64,
    pub with_scores: bool,
}

impl ParseCommand for ZRange {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 3 || args.len() > 4 {
            return Err(PeridotError::WrongArgumentCount("zrange".to_string()));
        }
        let with_scores = match args.get(3) {
            Some(frame) => {
                if extract_string(frame)?.eq_ignore_ascii_case("withscores") {
                    true
                } else {
                    return Err(PeridotError::SyntaxError);
                }
            }
            None => false,
        };
        Ok(ZRange {
            key: extract_bytes(&args[0])?,
            start: extract_string(&args[1])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
            stop: extract_string(&args[2])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
            with_scores,
        })
    }
}

#[async_trait]
impl ExecutableCommand for ZRange {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };
        let DataValue::SortedSet(zset) = &entry.data else {
            return Err(PeridotError::WrongType);
        };

        let entries = zset.get_range(self.start, self.stop);
        let mut values = Vec::with_capacity(entries.len() * if self.with_scores { 2 } else { 1 });
        for e in entries {
            values.push(RespValue::BulkString(e.member.clone()));
            if self.with_scores {
                values.push(RespValue::BulkString(format_score(e.score).into()));
            }
        }
        Ok((RespValue::Array(values), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for ZRange {
    fn name(&self) -> &'static str {
        "zrange"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![
            self.key.clone(),
            self.start.to_string().into(),
            self.stop.to_string().into(),
        ];
        if self.with_scores {
            args.push(Bytes::from_static(b"WITHSCORES"));
        }
        args
    }
}
