// src/core/commands/geospatial/geodist.rs

use super::helpers::{GeoUnit, decode_cell, haversine_distance, score_to_cell};
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `GEODIST` command. The default unit is meters.
#[derive(Debug, Clone)]
pub struct GeoDist {
    pub key: Bytes,
    pub member1: Bytes,
    pub member2: Bytes,
    pub unit: GeoUnit,
}

impl ParseCommand for GeoDist {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() < 3 || args.len() > 4 {
            return Err(PeridotError::WrongArgumentCount("geodist".to_string()));
        }
        let unit = match args.get(3) {
            Some(frame) => GeoUnit::parse(&extract_string(frame)?)?,
            None => GeoUnit::Meters,
        };
        Ok(GeoDist {
            key: extract_bytes(&args[0])?,
            member1: extract_bytes(&args[1])?,
            member2: extract_bytes(&args[2])?,
            unit,
        })
    }
}

#[async_trait]
impl ExecutableCommand for GeoDist {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
        };
        let DataValue::SortedSet(zset) = &entry.data else {
            return Err(PeridotError::WrongType);
        };

        let (Some(score1), Some(score2)) = (
            zset.get_score(&self.member1),
            zset.get_score(&self.member2),
        ) else {
            return Ok((RespValue::Null, WriteOutcome::DidNotWrite));
        };

        let (lon1, lat1) = decode_cell(score_to_cell(score1));
        let (lon2, lat2) = decode_cell(score_to_cell(score2));
        let meters = haversine_distance(lon1, lat1, lon2, lat2);
        let distance = meters / self.unit.meters_per_unit();
        Ok((
            RespValue::BulkString(format!("{distance:.4}").into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for GeoDist {
    fn name(&self) -> &'static str {
        "geodist"
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![self.key.clone(), self.member1.clone(), self.member2.clone()]
    }
}
