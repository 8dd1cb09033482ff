// src/core/commands/generic/type_cmd.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `TYPE` command.
#[derive(Debug, Clone, Default)]
pub struct TypeCmd {
    pub key: Bytes,
}

impl ParseCommand for TypeCmd {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 1, "type")?;
        Ok(TypeCmd {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for TypeCmd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let name = match cache.get_mut(&self.key) {
            Some(entry) => entry.data.type_name(),
            None => "none",
        };
        Ok((
            RespValue::SimpleString(name.into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for TypeCmd {
    fn name(&self) -> &'static str {
        "type"
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
