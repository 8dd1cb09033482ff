// src/core/commands/streams/xrange.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, validate_arg_count};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::{StreamEntry, StreamId};
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Formats one stream entry as the nested `[id, [f1, v1, ...]]` array reply.
pub fn entry_to_resp(entry: &StreamEntry) -> RespValue {
    let mut fields = Vec::with_capacity(entry.fields.len() * 2);
    for (field, value) in &entry.fields {
        fields.push(RespValue::BulkString(field.clone()));
        fields.push(RespValue::BulkString(value.clone()));
    }
    RespValue::Array(vec![
        RespValue::BulkString(entry.id.to_string().into()),
        RespValue::Array(fields),
    ])
}

/// Represents the `XRANGE` command with its `-`/`+` sentinels and partial ids.
#[derive(Debug, Clone, Default)]
pub struct XRange {
    pub key: Bytes,
    pub start: StreamId,
    pub end: StreamId,
}

impl ParseCommand for XRange {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        validate_arg_count(args, 3, "xrange")?;
        let key = extract_bytes(&args[0])?;
        let start_token = extract_string(&args[1])?;
        let end_token = extract_string(&args[2])?;
        let start = match start_token.as_str() {
            "-" => StreamId::default(),
            s => StreamId::parse_start(s)?,
        };
        let end = match end_token.as_str() {
            "+" => StreamId::MAX,
            s => StreamId::parse_end(s)?,
        };
        Ok(XRange { key, start, end })
    }
}

#[async_trait]
impl ExecutableCommand for XRange {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };
        let DataValue::Stream(stream) = &entry.data else {
            return Err(PeridotError::WrongType);
        };
        let entries = stream
            .range(self.start, self.end)
            .into_iter()
            .map(entry_to_resp)
            .collect();
        Ok((RespValue::Array(entries), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for XRange {
    fn name(&self) -> &'static str {
        "xrange"
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
            self.end.to_string().into(),
        ]
    }
}
