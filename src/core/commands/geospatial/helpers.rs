// src/core/commands/geospatial/helpers.rs

use crate::core::PeridotError;

/// Earth radius used by the distance math, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6372797.560856;

/// The coordinate limits of the 52-bit cell encoding.
pub const GEO_LAT_MIN: f64 = -85.05112878;
pub const GEO_LAT_MAX: f64 = 85.05112878;
pub const GEO_LON_MIN: f64 = -180.0;
pub const GEO_LON_MAX: f64 = 180.0;

/// Bits of precision per axis. Two interleaved 26-bit indices form the
/// 52-bit cell id, which is exactly representable as an f64 score.
const GEO_STEP: u32 = 26;

/// Units for distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl GeoUnit {
    pub fn parse(s: &str) -> Result<Self, PeridotError> {
        match s.to_lowercase().as_str() {
            "m" => Ok(GeoUnit::Meters),
            "km" => Ok(GeoUnit::Kilometers),
            "mi" => Ok(GeoUnit::Miles),
            "ft" => Ok(GeoUnit::Feet),
            _ => Err(PeridotError::UnsupportedUnit),
        }
    }

    /// How many meters one unit represents.
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            GeoUnit::Meters => 1.0,
            GeoUnit::Kilometers => 1000.0,
            GeoUnit::Miles => 1609.34,
            GeoUnit::Feet => 0.3048,
        }
    }
}

/// Validates a coordinate pair. Longitude is checked first; NaN never passes
/// a range check.
pub fn validate_coordinates(longitude: f64, latitude: f64) -> Result<(), PeridotError> {
    if !(GEO_LON_MIN..=GEO_LON_MAX).contains(&longitude) {
        return Err(PeridotError::InvalidLongitude);
    }
    if !(GEO_LAT_MIN..=GEO_LAT_MAX).contains(&latitude) {
        return Err(PeridotError::InvalidLatitude);
    }
    Ok(())
}

/// Spreads the low 26 bits of `v` so bit i lands at position 2i.
fn spread_bits(v: u64) -> u64 {
    let mut v = v & ((1u64 << GEO_STEP) - 1);
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

/// Collapses every second bit of `v` (positions 2i) back to position i.
fn squash_bits(v: u64) -> u64 {
    let mut v = v & 0x5555_5555_5555_5555;
    v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v >> 16)) & 0x0000_0000_FFFF_FFFF;
    v
}

/// Encodes a coordinate pair into the 52-bit interleaved cell id: each axis is
/// normalized to a 26-bit grid index, then the bits are interleaved with
/// latitude in the odd positions and longitude in the even positions.
pub fn encode_coordinates(longitude: f64, latitude: f64) -> Result<u64, PeridotError> {
    validate_coordinates(longitude, latitude)?;

    let lat_span = GEO_LAT_MAX - GEO_LAT_MIN;
    let lon_span = GEO_LON_MAX - GEO_LON_MIN;
    let cells = (1u64 << GEO_STEP) as f64;

    let lat_index = (((latitude - GEO_LAT_MIN) / lat_span) * cells) as u64;
    let lon_index = (((longitude - GEO_LON_MIN) / lon_span) * cells) as u64;
    let lat_index = lat_index.min((1 << GEO_STEP) - 1);
    let lon_index = lon_index.min((1 << GEO_STEP) - 1);

    Ok(spread_bits(lon_index) | (spread_bits(lat_index) << 1))
}

/// Decodes a 52-bit cell id back to the (longitude, latitude) of the cell
/// centre.
pub fn decode_cell(bits: u64) -> (f64, f64) {
    let lon_index = squash_bits(bits);
    let lat_index = squash_bits(bits >> 1);

    let lat_span = GEO_LAT_MAX - GEO_LAT_MIN;
    let lon_span = GEO_LON_MAX - GEO_LON_MIN;
    let cells = (1u64 << GEO_STEP) as f64;

    let longitude = GEO_LON_MIN + ((lon_index as f64 + 0.5) / cells) * lon_span;
    let latitude = GEO_LAT_MIN + ((lat_index as f64 + 0.5) / cells) * lat_span;
    (longitude, latitude)
}

/// The cell id travels inside a sorted set as an f64 score; values up to 2^52
/// convert exactly in both directions.
pub fn score_to_cell(score: f64) -> u64 {
    score as u64
}

/// Calculates the distance between two coordinate points in meters using the
/// Haversine formula.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_within_one_cell() {
        // One grid cell is roughly 0.6m at the equator.
        let cases = [
            (13.361389, 38.115556),
            (2.349014, 48.864716),
            (-122.27652, 37.80574),
            (0.0, 0.0),
        ];
        for (lon, lat) in cases {
            let bits = encode_coordinates(lon, lat).unwrap();
            assert!(bits < (1 << 52));
            let (dlon, dlat) = decode_cell(bits);
            assert!(haversine_distance(lon, lat, dlon, dlat) < 1.0);
        }
    }

    #[test]
    fn score_conversion_is_exact() {
        let bits = encode_coordinates(13.361389, 38.115556).unwrap();
        let score = bits as f64;
        assert_eq!(score_to_cell(score), bits);
    }

    #[test]
    fn range_validation() {
        assert!(matches!(
            encode_coordinates(-200.0, 0.0),
            Err(PeridotError::InvalidLongitude)
        ));
        assert!(matches!(
            encode_coordinates(0.0, 86.0),
            Err(PeridotError::InvalidLatitude)
        ));
        assert!(matches!(
            encode_coordinates(f64::NAN, 0.0),
            Err(PeridotError::InvalidLongitude)
        ));
    }

    #[test]
    fn haversine_is_symmetric() {
        let d1 = haversine_distance(13.361389, 38.115556, 15.087269, 37.502669);
        let d2 = haversine_distance(15.087269, 37.502669, 13.361389, 38.115556);
        assert!((d1 - d2).abs() < 1e-9);
        assert!(d1 > 0.0);
        // Palermo <-> Catania is about 166km.
        assert!((d1 / 1000.0 - 166.0).abs() < 1.0);
    }
}
