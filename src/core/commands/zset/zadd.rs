// src/core/commands/zset/zadd.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::zset::SortedSet;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `ZADD` command. Returns the number of members newly added;
/// existing members have their scores updated silently.
#[derive(Debug, Clone, Default)]
pub struct Zadd {
    pub key: Bytes,
    pub members: Vec<(f64, Bytes)>,
}

impl ParseCommand for Zadd {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 3 || args.len() % 2 != 1 {
            return Err(PeridotError::WrongArgumentCount("zadd".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let members = args[1..]
            .chunks_exact(2)
            .map(|chunk| -> Result<(f64, Bytes), PeridotError> {
                let score = extract_string(&chunk[0])?
                    .parse::<f64>()
                    .map_err(|_| PeridotError::NotAFloat)?;
                if score.is_nan() {
                    return Err(PeridotError::NotAFloat);
                }
                Ok((score, extract_bytes(&chunk[1])?))
            })
            .collect::<Result<_, _>>()?;
        Ok(Zadd { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for Zadd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let entry = cache.get_or_insert_with(&self.key, || {
            StoredValue::new(DataValue::SortedSet(SortedSet::new()))
        });
        let DataValue::SortedSet(zset) = &mut entry.data else {
            return Err(PeridotError::WrongType);
        };

        let mut added = 0;
        for (score, member) in &self.members {
            if zset.add(*score, member.clone()) {
                added += 1;
            }
        }
        Ok((RespValue::Integer(added), WriteOutcome::Write))
    }
}

impl CommandSpec for Zadd {
    fn name(&self) -> &'static str {
        "zadd"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        for (score, member) in &self.members {
            args.push(crate::core::commands::helpers::format_score(*score).into());
            args.push(member.clone());
        }
        args
    }
}
