// src/core/commands/streams/xread.rs

use super::xrange::entry_to_resp;
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::stream::StreamId;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

/// A start position in the `XREAD` id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFrom {
    /// `$`: whatever the stream's tail is when the command starts. Frozen at
    /// registration, never re-evaluated on wake.
    Latest,
    /// An explicit id; entries strictly after it are returned.
    After(StreamId),
}

/// Represents the `XREAD` command. `BLOCK 0` waits indefinitely.
#[derive(Debug, Clone)]
pub struct XRead {
    pub block: Option<Option<Duration>>,
    pub keys: Vec<Bytes>,
    pub ids: Vec<ReadFrom>,
}

impl ParseCommand for XRead {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        let mut idx = 0;
        let mut block = None;

        if let Some(frame) = args.first()
            && extract_string(frame)?.eq_ignore_ascii_case("block")
        {
            let ms_frame = args.get(1).ok_or(PeridotError::SyntaxError)?;
            let ms: u64 = extract_string(ms_frame)?
                .parse()
                .map_err(|_| PeridotError::NotAnInteger)?;
            block = Some(if ms == 0 {
                None
            } else {
                Some(Duration::from_millis(ms))
            });
            idx = 2;
        }

        let Some(streams_token) = args.get(idx) else {
            return Err(PeridotError::SyntaxError);
        };
        if !extract_string(streams_token)?.eq_ignore_ascii_case("streams") {
            return Err(PeridotError::SyntaxError);
        }
        idx += 1;

        let rest = &args[idx..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(PeridotError::SyntaxError);
        }
        let half = rest.len() / 2;
        let keys = rest[..half]
            .iter()
            .map(extract_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let ids = rest[half..]
            .iter()
            .map(|frame| -> Result<ReadFrom, PeridotError> {
                let token = extract_string(frame)?;
                if token == "$" {
                    Ok(ReadFrom::Latest)
                } else {
                    Ok(ReadFrom::After(StreamId::parse_start(&token)?))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(XRead { block, keys, ids })
    }
}

/// One read pass: per-key entries strictly after the resolved id. Keys with
/// nothing new are omitted from the reply.
fn read_streams(
    ctx: &mut ExecutionContext<'_>,
    keys: &[Bytes],
    ids: &[StreamId],
) -> Result<Vec<RespValue>, PeridotError> {
    let mut results = Vec::new();
    for (key, id) in keys.iter().zip(ids) {
        let cache = ctx.cache_for_key_mut(key)?;
        let Some(entry) = cache.get_mut(key) else {
            continue;
        };
        let DataValue::Stream(stream) = &entry.data else {
            return Err(PeridotError::WrongType);
        };
        let entries = stream.entries_after(*id);
        if !entries.is_empty() {
            results.push(RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                RespValue::Array(entries.into_iter().map(entry_to_resp).collect()),
            ]));
        }
    }
    Ok(results)
}

#[async_trait]
impl ExecutableCommand for XRead {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        // Resolve `$` to the current tail of each stream, frozen for the whole
        // (possibly blocking) lifetime of this command.
        let mut ids = Vec::with_capacity(self.ids.len());
        for (key, read_from) in self.keys.iter().zip(&self.ids) {
            let id = match read_from {
                ReadFrom::After(id) => *id,
                ReadFrom::Latest => {
                    let cache = ctx.cache_for_key_mut(key)?;
                    match cache.get_mut(key) {
                        Some(entry) => match &entry.data {
                            DataValue::Stream(stream) => stream.last_id,
                            _ => return Err(PeridotError::WrongType),
                        },
                        None => StreamId::default(),
                    }
                }
            };
            ids.push(id);
        }

        let deadline = match self.block {
            Some(Some(duration)) => Some(Instant::now() + duration),
            _ => None,
        };
        let manager = ctx.state.stream_blockers.clone();

        loop {
            let results = read_streams(ctx, &self.keys, &ids)?;
            if !results.is_empty() {
                return Ok((RespValue::Array(results), WriteOutcome::DidNotWrite));
            }
            // A non-blocking read, or a blocking one inside replay, gives up
            // immediately.
            if self.block.is_none() || ctx.replay {
                return Ok((RespValue::NullArray, WriteOutcome::DidNotWrite));
            }

            let mut waiter = manager.register(&self.keys, ctx.session_id);
            ctx.release_locks();
            let woken = waiter.wait(deadline).await;
            manager.unregister(&self.keys, &waiter);
            if !woken {
                return Ok((RespValue::NullArray, WriteOutcome::DidNotWrite));
            }
            ctx.reacquire_locks_for_command().await?;
        }
    }
}

impl CommandSpec for XRead {
    fn name(&self) -> &'static str {
        "xread"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::BLOCKING
    }

    fn get_keys(&self) -> Vec<Bytes> {
        self.keys.clone()
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = Vec::new();
        if let Some(block) = self.block {
            args.push(Bytes::from_static(b"BLOCK"));
            let ms = block.map(|d| d.as_millis() as u64).unwrap_or(0);
            args.push(ms.to_string().into());
        }
        args.push(Bytes::from_static(b"STREAMS"));
        args.extend(self.keys.iter().cloned());
        for read_from in &self.ids {
            match read_from {
                ReadFrom::Latest => args.push(Bytes::from_static(b"$")),
                ReadFrom::After(id) => args.push(id.to_string().into()),
            }
        }
        args
    }
}
