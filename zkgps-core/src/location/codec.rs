//! Geohash codec and spatial covering.
//!
//! This module provides functions for:
//! - Geohash encoding/decoding (bisection delegated to the `geohash` crate)
//! - Neighbor lookup with longitude wrap and latitude clamp
//! - Covering a circle or polygon with cells of a given precision
//! - Prefix helpers and precision selection for a radius
//!
//! All functions are pure. Malformed input is reported as
//! [`LocationError::InvalidArgument`].

use std::collections::{BTreeSet, HashSet, VecDeque};

use geohash::Coord;

use super::error::{LocationError, Result};
use super::types::{Bounds, Coordinate, GeohashPrecision};

/// The 32-symbol geohash alphabet (no `a`, `i`, `l`, `o`).
pub const BASE32: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Upper bound on the number of cells a single covering may produce.
pub const MAX_COVER_CELLS: usize = 50_000;

/// Upper bound on grid samples evaluated by [`cells_in_polygon`].
const MAX_POLYGON_SAMPLES: f64 = 1_000_000.0;

/// Converts latitude/longitude to a geohash string.
///
/// # Arguments
///
/// * `lat` - Latitude, -90..=90
/// * `lng` - Longitude, -180..=180
/// * `precision` - Geohash length, 1..=12
///
/// # Examples
///
/// ```
/// use zkgps_core::location::codec::encode;
///
/// assert_eq!(encode(0.0, 0.0, 1).unwrap(), "s");
/// assert_eq!(encode(37.7749, -122.4194, 8).unwrap().len(), 8);
/// ```
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for an out-of-range precision
/// or coordinate.
pub fn encode(lat: f64, lng: f64, precision: u8) -> Result<String> {
    let coordinate = Coordinate::new(lat, lng)?;
    let precision = GeohashPrecision::new(precision)?;
    encode_coordinate(&coordinate, precision)
}

/// Encodes an already validated coordinate.
///
/// The north pole and the antimeridian at +180 are valid coordinates but
/// fall on the open upper edge of the bisection, so they are pulled one
/// ulp inside and land in the northernmost row and easternmost column.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] if the underlying encoder
/// rejects the input.
pub fn encode_coordinate(coordinate: &Coordinate, precision: GeohashPrecision) -> Result<String> {
    Ok(geohash::encode(
        Coord {
            x: inside_upper_edge(coordinate.lng(), 180.0),
            y: inside_upper_edge(coordinate.lat(), 90.0),
        },
        precision.len(),
    )?)
}

fn inside_upper_edge(value: f64, edge: f64) -> f64 {
    if value >= edge {
        f64::from_bits(edge.to_bits() - 1)
    } else {
        value
    }
}

/// Decodes a geohash to the center of its cell.
///
/// # Examples
///
/// ```
/// use zkgps_core::location::codec::decode;
///
/// let center = decode("s").unwrap();
/// assert_eq!((center.lat(), center.lng()), (22.5, 22.5));
/// ```
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for an empty, overlong or
/// non-base32 hash.
pub fn decode(hash: &str) -> Result<Coordinate> {
    let (lat, lng) = decode_bounds(hash)?.center();
    Coordinate::new(lat, lng)
}

/// Decodes a geohash to its bounding box.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for an empty, overlong or
/// non-base32 hash.
pub fn decode_bounds(hash: &str) -> Result<Bounds> {
    validate_hash(hash)?;
    let rect = geohash::decode_bbox(hash)?;
    Ok(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

/// Returns the precision implied by a hash's length.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for a malformed hash.
pub fn precision_of(hash: &str) -> Result<GeohashPrecision> {
    validate_hash(hash)?;
    u8::try_from(hash.len())
        .map_err(|_| LocationError::invalid("geohash too long"))
        .and_then(GeohashPrecision::new)
}

fn validate_hash(hash: &str) -> Result<()> {
    if hash.is_empty() || hash.len() > 12 {
        return Err(LocationError::invalid(format!(
            "geohash length {} outside [1, 12]",
            hash.len()
        )));
    }
    if let Some(c) = hash.chars().find(|c| !BASE32.contains(*c)) {
        return Err(LocationError::invalid(format!(
            "invalid geohash character '{c}'"
        )));
    }
    Ok(())
}

/// Returns the eight neighbors of a cell at the same precision.
///
/// Order is N, NE, E, SE, S, SW, W, NW. Longitude wraps around the
/// antimeridian. Latitude stays inside the polar rows, so a cell in the
/// northernmost row lists its own row (itself, then its east and west
/// siblings) as N, NE and NW; the southern row mirrors this.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for a malformed hash.
pub fn neighbors(hash: &str) -> Result<[String; 8]> {
    let precision = precision_of(hash)?;
    let bounds = decode_bounds(hash)?;
    let (lat, lng) = bounds.center();
    let (dlat, dlng) = (bounds.lat_span(), bounds.lng_span());

    let step = |north: f64, east: f64| -> Result<String> {
        let lat = north
            .mul_add(dlat, lat)
            .clamp(-90.0 + dlat / 2.0, 90.0 - dlat / 2.0);
        let lng = wrap_lng(east.mul_add(dlng, lng));
        encode_coordinate(&Coordinate::new(lat, lng)?, precision)
    };

    Ok([
        step(1.0, 0.0)?,
        step(1.0, 1.0)?,
        step(0.0, 1.0)?,
        step(-1.0, 1.0)?,
        step(-1.0, 0.0)?,
        step(-1.0, -1.0)?,
        step(0.0, -1.0)?,
        step(1.0, -1.0)?,
    ])
}

fn wrap_lng(lng: f64) -> f64 {
    if lng > 180.0 {
        lng - 360.0
    } else if lng < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}

/// Great-circle distance between two coordinates in meters.
#[must_use]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_m(a.lat(), a.lng(), b.lat(), b.lng())
}

fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Covers a circle with geohash cells.
///
/// Flood-fills outward from the center cell, keeping each neighbor whose
/// bounding box comes within `radius_m` of the center. The center cell is
/// always included; no included cell lies entirely outside the circle.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] if the radius is negative or
/// not finite, or the covering would exceed [`MAX_COVER_CELLS`].
pub fn cells_in_radius(
    center: &Coordinate,
    radius_m: f64,
    precision: GeohashPrecision,
) -> Result<BTreeSet<String>> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(LocationError::invalid(format!(
            "radius {radius_m} must be a non-negative finite number of meters"
        )));
    }

    let start = encode_coordinate(center, precision)?;
    let mut cells = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    cells.insert(start.clone());
    visited.insert(start.clone());
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        for neighbor in neighbors(&cell)? {
            if !visited.insert(neighbor.clone()) {
                continue;
            }
            let bounds = decode_bounds(&neighbor)?;
            let (lat, lng) = bounds.clamp(center.lat(), center.lng());
            if haversine_m(center.lat(), center.lng(), lat, lng) > radius_m {
                continue;
            }
            if cells.len() >= MAX_COVER_CELLS {
                return Err(LocationError::invalid(format!(
                    "radius {radius_m} m at precision {precision} exceeds {MAX_COVER_CELLS} cells"
                )));
            }
            cells.insert(neighbor.clone());
            queue.push_back(neighbor);
        }
    }

    Ok(cells)
}

/// Covers a circle at the finest precision whose covering fits.
///
/// Starts at [`precision_for_radius`] and steps one level coarser each time
/// the covering would exceed [`MAX_COVER_CELLS`]. Near the poles cells
/// narrow in longitude, so small radii there settle on a coarser precision
/// than the same radius at the equator. The result is deterministic for a
/// given center and radius.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] if the radius is negative or
/// not finite, or no precision yields a small enough covering.
pub fn cover_radius(
    center: &Coordinate,
    radius_m: f64,
) -> Result<(GeohashPrecision, BTreeSet<String>)> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(LocationError::invalid(format!(
            "radius {radius_m} must be a non-negative finite number of meters"
        )));
    }

    let wanted = precision_for_radius(radius_m);
    let mut precision = wanted;
    loop {
        match cells_in_radius(center, radius_m, precision) {
            Ok(cells) => {
                if precision < wanted {
                    log::debug!(
                        "radius {radius_m} m at ({:.3}, {:.3}) covered at precision {precision} instead of {wanted}",
                        center.lat(),
                        center.lng()
                    );
                }
                return Ok((precision, cells));
            }
            Err(e) if precision.get() == 1 => return Err(e),
            Err(_) => precision = GeohashPrecision::new(precision.get() - 1)?,
        }
    }
}

/// Bounding box of a polygon's vertices.
#[must_use]
pub fn polygon_bounds(polygon: &[Coordinate]) -> Bounds {
    polygon.iter().fold(
        Bounds {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lng: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
        },
        |b, c| Bounds {
            min_lat: b.min_lat.min(c.lat()),
            max_lat: b.max_lat.max(c.lat()),
            min_lng: b.min_lng.min(c.lng()),
            max_lng: b.max_lng.max(c.lng()),
        },
    )
}

/// Ray-casting point-in-polygon test. Vertices are treated as a closed ring.
#[must_use]
pub fn point_in_polygon(lat: f64, lng: f64, polygon: &[Coordinate]) -> bool {
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for (i, vi) in polygon.iter().enumerate() {
        let vj = &polygon[j];
        let (yi, xi) = (vi.lat(), vi.lng());
        let (yj, xj) = (vj.lat(), vj.lng());
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Approximates the set of cells covering a polygon.
///
/// Samples a grid over the polygon's bounding box at half the target cell
/// size and keeps the cell of every sample point that falls inside the
/// polygon. Cells only clipped by a thin sliver of the polygon may be
/// missed; this is adequate for privacy region checks, not for exact area
/// computation.
///
/// # Errors
///
/// Returns [`LocationError::InvalidArgument`] for fewer than three vertices
/// or a grid that would be unreasonably large.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn cells_in_polygon(
    polygon: &[Coordinate],
    precision: GeohashPrecision,
) -> Result<BTreeSet<String>> {
    if polygon.len() < 3 {
        return Err(LocationError::invalid(format!(
            "polygon needs at least 3 vertices, got {}",
            polygon.len()
        )));
    }

    let bbox = polygon_bounds(polygon);
    let sample_cell = decode_bounds(&encode_coordinate(
        &Coordinate::new(bbox.min_lat, bbox.min_lng)?,
        precision,
    )?)?;
    let lat_step = sample_cell.lat_span() / 2.0;
    let lng_step = sample_cell.lng_span() / 2.0;

    let lat_steps = (bbox.lat_span() / lat_step).ceil();
    let lng_steps = (bbox.lng_span() / lng_step).ceil();
    if (lat_steps + 1.0) * (lng_steps + 1.0) > MAX_POLYGON_SAMPLES {
        return Err(LocationError::invalid(format!(
            "polygon too large to sample at precision {precision}"
        )));
    }

    let mut cells = BTreeSet::new();
    for i in 0..=lat_steps as usize {
        let lat = (i as f64).mul_add(lat_step, bbox.min_lat).min(bbox.max_lat);
        for j in 0..=lng_steps as usize {
            let lng = (j as f64).mul_add(lng_step, bbox.min_lng).min(bbox.max_lng);
            if point_in_polygon(lat, lng, polygon) {
                cells.insert(encode_coordinate(&Coordinate::new(lat, lng)?, precision)?);
            }
        }
    }
    Ok(cells)
}

/// Truncates a hash to at most `precision` characters.
#[must_use]
pub fn truncate(hash: &str, precision: GeohashPrecision) -> &str {
    hash.get(..precision.len()).unwrap_or(hash)
}

/// Whether both hashes are at least `min_len` long and agree on their first
/// `min_len` characters.
#[must_use]
pub fn shares_prefix(h1: &str, h2: &str, min_len: usize) -> bool {
    h1.len() >= min_len && h2.len() >= min_len && h1.as_bytes()[..min_len] == h2.as_bytes()[..min_len]
}

/// Picks the coarsest precision whose cell fits within the circle's
/// diameter (`cell size <= 2 * radius`). Falls back to the finest precision
/// when even that cell is larger than the diameter.
///
/// # Examples
///
/// ```
/// use zkgps_core::location::codec::precision_for_radius;
///
/// assert_eq!(precision_for_radius(1_000.0).get(), 6);
/// assert_eq!(precision_for_radius(100.0).get(), 7);
/// ```
#[must_use]
pub fn precision_for_radius(radius_m: f64) -> GeohashPrecision {
    GeohashPrecision::all()
        .find(|p| p.cell_size().max_extent() <= 2.0 * radius_m)
        .unwrap_or(GeohashPrecision::MAX)
}
