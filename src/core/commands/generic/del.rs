// src/core/commands/generic/del.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `DEL` command.
#[derive(Debug, Clone, Default)]
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl ParseCommand for Del {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.is_empty() {
            return Err(PeridotError::WrongArgumentCount("del".to_string()));
        }
        let keys = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(Del { keys })
    }
}

#[async_trait]
impl ExecutableCommand for Del {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let mut deleted = 0;
        for key in &self.keys {
            let cache = ctx.cache_for_key_mut(key)?;
            // An already-expired entry counts as absent.
            let live = cache.peek(key).is_some_and(|v| !v.is_expired());
            if cache.pop(key).is_some() && live {
                deleted += 1;
            }
        }
        let outcome = if deleted > 0 {
            WriteOutcome::Delete
        } else {
            WriteOutcome::DidNotWrite
        };
        Ok((RespValue::Integer(deleted), outcome))
    }
}

impl CommandSpec for Del {
    fn name(&self) -> &'static str {
        "del"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        self.keys.clone()
    }
}
