// src/core/commands/generic/flushall.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;

/// Represents the `FLUSHALL` command.
#[derive(Debug, Clone, Default)]
pub struct FlushAll;

impl ParseCommand for FlushAll {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if !args.is_empty() {
            return Err(PeridotError::WrongArgumentCount("flushall".to_string()));
        }
        Ok(FlushAll)
    }
}

#[async_trait]
impl ExecutableCommand for FlushAll {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let guards = ctx.all_caches_mut()?;
        for guard in guards.iter_mut() {
            guard.clear();
        }
        Ok((RespValue::SimpleString("OK".into()), WriteOutcome::Flush))
    }
}

impl CommandSpec for FlushAll {
    fn name(&self) -> &'static str {
        "flushall"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE | CommandFlags::SWEEP
    }
}
