//! Geohash encoding and decoding.
//!
//! Only what the geohash grid aggregation needs: turning bucket keys back
//! into points. Bits alternate longitude/latitude, starting with longitude.

use crate::types::page::GeoPoint;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest geohash the engine's `geohash_grid` aggregation produces.
pub const MAX_PRECISION: usize = 12;

fn char_value(c: u8) -> Option<u8> {
    BASE32.iter().position(|&b| b == c).map(|p| p as u8)
}

/// Decode a geohash into the latitude/longitude bounds of its cell.
///
/// Returns `((min_lat, max_lat), (min_lon, max_lon))`, or `None` if the hash
/// is empty or contains characters outside the geohash alphabet.
pub fn decode_bounds(hash: &str) -> Option<((f64, f64), (f64, f64))> {
    if hash.is_empty() {
        return None;
    }

    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for c in hash.bytes() {
        let value = char_value(c.to_ascii_lowercase())?;
        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1 == 1;
            let range = if even { &mut lon } else { &mut lat };
            let mid = (range.0 + range.1) / 2.0;
            if bit {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Some((lat, lon))
}

/// Decode a geohash to the centre point of its cell.
pub fn decode(hash: &str) -> Option<GeoPoint> {
    decode_bounds(hash).map(|(lat, lon)| GeoPoint {
        lat: (lat.0 + lat.1) / 2.0,
        lon: (lon.0 + lon.1) / 2.0,
    })
}

/// Encode a point as a geohash of `precision` characters (clamped to 1..=12).
pub fn encode(point: GeoPoint, precision: usize) -> String {
    let precision = precision.clamp(1, MAX_PRECISION);
    let mut lat = (-90.0_f64, 90.0_f64);
    let mut lon = (-180.0_f64, 180.0_f64);
    let mut even = true;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        let mut value = 0u8;
        for _ in 0..5 {
            let (range, coord) = if even {
                (&mut lon, point.lon)
            } else {
                (&mut lat, point.lat)
            };
            let mid = (range.0 + range.1) / 2.0;
            value <<= 1;
            if coord >= mid {
                value |= 1;
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
        out.push(BASE32[value as usize] as char);
    }

    out
}
