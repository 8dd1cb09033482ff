// src/core/commands/zset/zrem.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::parse_key_and_values;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `ZREM` command. Removing the last member destroys the key.
#[derive(Debug, Clone, Default)]
pub struct ZRem {
    pub key: Bytes,
    pub members: Vec<Bytes>,
}

impl ParseCommand for ZRem {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        let (key, members) = parse_key_and_values(args, 2, "zrem")?;
        Ok(ZRem { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for ZRem {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Integer(0), WriteOutcome::DidNotWrite));
        };
        let DataValue::SortedSet(zset) = &mut entry.data else {
            return Err(PeridotError::WrongType);
        };

        let mut removed = 0;
        for member in &self.members {
            if zset.remove(member) {
                removed += 1;
            }
        }
        let now_empty = zset.is_empty();
        if now_empty {
            cache.pop(&self.key);
        }

        let outcome = if removed > 0 {
            WriteOutcome::Write
        } else {
            WriteOutcome::DidNotWrite
        };
        Ok((RespValue::Integer(removed), outcome))
    }
}

impl CommandSpec for ZRem {
    fn name(&self) -> &'static str {
        "zrem"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        args.extend(self.members.iter().cloned());
        args
    }
}
