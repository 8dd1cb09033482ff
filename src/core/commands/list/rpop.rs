// src/core/commands/list/rpop.rs

use super::logic::{list_pop_count_logic, list_pop_logic};
use super::lpop::parse_pop_args;
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `RPOP` command.
#[derive(Debug, Clone, Default)]
pub struct RPop {
    pub key: Bytes,
    pub count: Option<usize>,
}

impl ParseCommand for RPop {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        let (key, count) = parse_pop_args(args, "rpop")?;
        Ok(RPop { key, count })
    }
}

#[async_trait]
impl ExecutableCommand for RPop {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        match self.count {
            None => list_pop_logic(ctx, &self.key, PopDirection::Right),
            Some(count) => list_pop_count_logic(ctx, &self.key, PopDirection::Right, count),
        }
    }
}

impl CommandSpec for RPop {
    fn name(&self) -> &'static str {
        "rpop"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        if let Some(count) = self.count {
            args.push(count.to_string().into());
        }
        args
    }
}
