// src/core/commands/geospatial/geopos.rs

use super::helpers::{decode_cell, score_to_cell};
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `GEOPOS` command. Missing members yield a null array slot.
#[derive(Debug, Clone, Default)]
pub struct GeoPos {
    pub key: Bytes,
    pub members: Vec<Bytes>,
}

impl ParseCommand for GeoPos {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.is_empty() {
            return Err(PeridotError::WrongArgumentCount("geopos".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let members = args[1..]
            .iter()
            .map(extract_bytes)
            .collect::<Result<_, _>>()?;
        Ok(GeoPos { key, members })
    }
}

/// The wire format of a coordinate: 17 decimal places, like the reference
/// implementation prints them.
fn coordinate_reply(longitude: f64, latitude: f64) -> RespValue {
    RespValue::Array(vec![
        RespValue::BulkString(format!("{longitude:.17}").into()),
        RespValue::BulkString(format!("{latitude:.17}").into()),
    ])
}

#[async_trait]
impl ExecutableCommand for GeoPos {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let zset = match cache.get_mut(&self.key) {
            Some(entry) => match &entry.data {
                DataValue::SortedSet(zset) => Some(zset),
                _ => return Err(PeridotError::WrongType),
            },
            None => None,
        };

        let positions = self
            .members
            .iter()
            .map(|member| {
                match zset.as_ref().and_then(|z| z.get_score(member)) {
                    Some(score) => {
                        let (longitude, latitude) = decode_cell(score_to_cell(score));
                        coordinate_reply(longitude, latitude)
                    }
                    None => RespValue::NullArray,
                }
            })
            .collect();
        Ok((RespValue::Array(positions), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for GeoPos {
    fn name(&self) -> &'static str {
        "geopos"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        args.extend(self.members.iter().cloned());
        args
    }
}
