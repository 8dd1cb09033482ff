// src/core/commands/geospatial/geoadd.rs

use super::helpers::encode_coordinates;
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, format_score};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::{DataValue, StoredValue};
use crate::core::storage::db::ExecutionContext;
use crate::core::storage::zset::SortedSet;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `GEOADD` command. Members land in a sorted set whose scores
/// are the 52-bit interleaved cell ids.
#[derive(Debug, Clone, Default)]
pub struct GeoAdd {
    pub key: Bytes,
    pub members: Vec<(f64, f64, Bytes)>,
}

impl ParseCommand for GeoAdd {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 4 || (args.len() - 1) % 3 != 0 {
            return Err(PeridotError::WrongArgumentCount("geoadd".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let members = args[1..]
            .chunks_exact(3)
            .map(|chunk| -> Result<(f64, f64, Bytes), PeridotError> {
                let longitude = extract_string(&chunk[0])?
                    .parse::<f64>()
                    .map_err(|_| PeridotError::NotAFloat)?;
                let latitude = extract_string(&chunk[1])?
                    .parse::<f64>()
                    .map_err(|_| PeridotError::NotAFloat)?;
                Ok((longitude, latitude, extract_bytes(&chunk[2])?))
            })
            .collect::<Result<_, _>>()?;
        Ok(GeoAdd { key, members })
    }
}

#[async_trait]
impl ExecutableCommand for GeoAdd {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        // Validate every pair before mutating anything.
        let mut scored = Vec::with_capacity(self.members.len());
        for (longitude, latitude, member) in &self.members {
            let bits = encode_coordinates(*longitude, *latitude)?;
            scored.push((bits as f64, member.clone()));
        }

        let cache = ctx.cache_for_key_mut(&self.key)?;
        let entry = cache.get_or_insert_with(&self.key, || {
            StoredValue::new(DataValue::SortedSet(SortedSet::new()))
        });
        let DataValue::SortedSet(zset) = &mut entry.data else {
            return Err(PeridotError::WrongType);
        };

        let mut added = 0;
        for (score, member) in scored {
            if zset.add(score, member) {
                added += 1;
            }
        }
        Ok((RespValue::Integer(added), WriteOutcome::Write))
    }
}

impl CommandSpec for GeoAdd {
    fn name(&self) -> &'static str {
        "geoadd"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        for (longitude, latitude, member) in &self.members {
            args.push(format_score(*longitude).into());
            args.push(format_score(*latitude).into());
            args.push(member.clone());
        }
        args
    }
}
