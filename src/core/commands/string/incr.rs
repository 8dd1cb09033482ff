// src/core/commands/string/incr.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Shared logic for INCR, DECR, INCRBY, and DECRBY.
pub async fn do_incr_decr_by(
    key: &Bytes,
    by: i64,
    ctx: &mut ExecutionContext<'_>,
) -> Result<(RespValue, WriteOutcome), PeridotError> {
    let cache = ctx.cache_for_key_mut(key)?;

    if let Some(entry) = cache.get_mut(key) {
        let DataValue::String(s) = &mut entry.data else {
            return Err(PeridotError::WrongType);
        };
        let current: i64 = std::str::from_utf8(s)?
            .parse()
            .map_err(|_| PeridotError::NotAnInteger)?;
        let new_val = current
            .checked_add(by)
            .ok_or(PeridotError::NotAnInteger)?;
        *s = Bytes::from(new_val.to_string());
        return Ok((RespValue::Integer(new_val), WriteOutcome::Write));
    }

    // Key does not exist: create it holding the delta.
    cache.put(
        key.clone(),
        StoredValue::new(DataValue::String(Bytes::from(by.to_string()))),
    );
    Ok((RespValue::Integer(by), WriteOutcome::Write))
}

/// Represents the `INCR` command.
#[derive(Debug, Clone, Default)]
pub struct Incr {
    pub key: Bytes,
}

impl ParseCommand for Incr {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 1, "incr")?;
        Ok(Incr {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Incr {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        do_incr_decr_by(&self.key, 1, ctx).await
    }
}

impl CommandSpec for Incr {
    fn name(&self) -> &'static str {
        "incr"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
}

/// Represents the `DECR` command.
#[derive(Debug, Clone, Default)]
pub struct Decr {
    pub key: Bytes,
}

impl ParseCommand for Decr {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 1, "decr")?;
        Ok(Decr {
            key: extract_bytes(&args[0])?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for Decr {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        do_incr_decr_by(&self.key, -1, ctx).await
    }
}

impl CommandSpec for Decr {
    fn name(&self) -> &'static str {
        "decr"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
}

/// Represents the `INCRBY` command.
#[derive(Debug, Clone, Default)]
pub struct IncrBy {
    pub key: Bytes,
    pub increment: i64,
}

impl ParseCommand for IncrBy {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 2, "incrby")?;
        Ok(IncrBy {
            key: extract_bytes(&args[0])?,
            increment: extract_string(&args[1])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for IncrBy {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        do_incr_decr_by(&self.key, self.increment, ctx).await
    }
}

impl CommandSpec for IncrBy {
    fn name(&self) -> &'static str {
        "incrby"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone(), self.increment.to_string().into()]
    }
}

/// Represents the `DECRBY` command.
#[derive(Debug, Clone, Default)]
pub struct DecrBy {
    pub key: Bytes,
    pub decrement: i64,
}

impl ParseCommand for DecrBy {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 2, "decrby")?;
        Ok(DecrBy {
            key: extract_bytes(&args[0])?,
            decrement: extract_string(&args[1])?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?,
        })
    }
}

#[async_trait]
impl ExecutableCommand for DecrBy {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let by = self
            .decrement
            .checked_neg()
            .ok_or(PeridotError::NotAnInteger)?;
        do_incr_decr_by(&self.key, by, ctx).await
    }
}

impl CommandSpec for DecrBy {
    fn name(&self) -> &'static str {
        "decrby"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone(), self.decrement.to_string().into()]
    }
}
