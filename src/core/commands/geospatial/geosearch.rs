// src/core/commands/geospatial/geosearch.rs

use super::helpers::{
    GeoUnit, decode_cell, haversine_distance, score_to_cell, validate_coordinates,
};
use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string, format_score};
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::storage::db::ExecutionContext;
use crate::core::{PeridotError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// Represents the `GEOSEARCH` command, restricted to the
/// `FROMLONLAT ... BYRADIUS ...` form. Results come back in sorted-set score
/// order.
#[derive(Debug, Clone)]
pub struct GeoSearch {
    pub key: Bytes,
    pub longitude: f64,
    pub latitude: f64,
    pub radius: f64,
    pub unit: GeoUnit,
}

impl ParseCommand for GeoSearch {
    fn parse(args: &[RespFrame]) -> Result<Self, PeridotError> {
        if args.len() != 7 {
            return Err(PeridotError::WrongArgumentCount("geosearch".to_string()));
        }
        if !extract_string(&args[1])?.eq_ignore_ascii_case("fromlonlat") {
            return Err(PeridotError::SyntaxError);
        }
        if !extract_string(&args[4])?.eq_ignore_ascii_case("byradius") {
            return Err(PeridotError::SyntaxError);
        }
        let longitude = extract_string(&args[2])?
            .parse::<f64>()
            .map_err(|_| PeridotError::NotAFloat)?;
        let latitude = extract_string(&args[3])?
            .parse::<f64>()
            .map_err(|_| PeridotError::NotAFloat)?;
        let radius = extract_string(&args[5])?
            .parse::<f64>()
            .map_err(|_| PeridotError::NotAFloat)?;
        let unit = GeoUnit::parse(&extract_string(&args[6])?)?;
        Ok(GeoSearch {
            key: extract_bytes(&args[0])?,
            longitude,
            latitude,
            radius,
            unit,
        })
    }
}

#[async_trait]
impl ExecutableCommand for GeoSearch {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), PeridotError> {
        validate_coordinates(self.longitude, self.latitude)?;
        let radius_meters = self.radius * self.unit.meters_per_unit();

        let cache = ctx.cache_for_key_mut(&self.key)?;
        let Some(entry) = cache.get_mut(&self.key) else {
            return Ok((RespValue::Array(vec![]), WriteOutcome::DidNotWrite));
        };
        let DataValue::SortedSet(zset) = &entry.data else {
            return Err(PeridotError::WrongType);
        };

        let members = zset
            .iter()
            .filter(|e| {
                let (lon, lat) = decode_cell(score_to_cell(e.score));
                haversine_distance(self.longitude, self.latitude, lon, lat) <= radius_meters
            })
            .map(|e| RespValue::BulkString(e.member.clone()))
            .collect();
        Ok((RespValue::Array(members), WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for GeoSearch {
    fn name(&self) -> &'static str {
        "geosearch"
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
            Bytes::from_static(b"FROMLONLAT"),
            format_score(self.longitude).into(),
            format_score(self.latitude).into(),
            Bytes::from_static(b"BYRADIUS"),
            format_score(self.radius).into(),
            match self.unit {
                GeoUnit::Meters => Bytes::from_static(b"m"),
                GeoUnit::Kilometers => Bytes::from_static(b"km"),
                GeoUnit::Miles => Bytes::from_static(b"mi"),
                GeoUnit::Feet => Bytes::from_static(b"ft"),
            },
        ]
    }
}
