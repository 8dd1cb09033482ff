// src/core/commands/list/lpop.rs

use super::logic::{list_pop_count_logic, list_pop_logic};
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `LPOP` command. Without a count the reply is a single bulk
/// string (or null); with a count it is an array.
#[derive(Debug, Clone, Default)]
pub struct LPop {
    pub key: Bytes,
    pub count: Option<usize>,
}

pub(super) fn parse_pop_args(
    args: &[RespFrame],
    cmd: &str,
) -> Result<(Bytes, Option<usize>), PeridotError> {
    if args.is_empty() || args.len() > 2 {
        return Err(PeridotError::WrongArgumentCount(cmd.to_string()));
    }
    let key = extract_bytes(&args[0])?;
    let count = match args.get(1) {
        Some(frame) => Some(
            extract_string(frame)?
                .parse::<usize>()
                .map_err(|_| PeridotError::NotAnInteger)?,
        ),
        None => None,
    };
    Ok((key, count))
}

impl ParseCommand for LPop {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        let (key, count) = parse_pop_args(args, "lpop")?;
        Ok(LPop { key, count })
    }
}

#[async_trait]
impl ExecutableCommand for LPop {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        match self.count {
            None => list_pop_logic(ctx, &self.key, PopDirection::Left),
            Some(count) => list_pop_count_logic(ctx, &self.key, PopDirection::Left, count),
        }
    }
}

impl CommandSpec for LPop {
    fn name(&self) -> &'static str {
        "lpop"
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
