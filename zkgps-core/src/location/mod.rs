//! Location module for zkGPS.
//!
//! Provides the geospatial layer of the protocol:
//! - Validated [`Coordinate`] and [`GeohashPrecision`] value types
//! - Geohash encoding/decoding at a chosen precision
//! - Neighbor lookup and circle/polygon covering
//! - Prefix helpers used to compare coarse locations
//!
//! # Privacy Model
//!
//! A geohash prefix reveals only the cell it names. Precision 2 narrows a
//! location to a region hundreds of kilometers wide; precision 10 narrows it
//! to about a meter. Everything upstream chooses how much to reveal by
//! choosing a precision.
//!
//! # Example Usage
//!
//! ```
//! use zkgps_core::location::{codec, Coordinate, GeohashPrecision};
//!
//! let here = Coordinate::new(37.7749, -122.4194).unwrap();
//! let precision = GeohashPrecision::new(6).unwrap();
//! let hash = codec::encode_coordinate(&here, precision).unwrap();
//! assert_eq!(hash.len(), 6);
//!
//! let nearby = codec::cells_in_radius(&here, 1_000.0, precision).unwrap();
//! assert!(nearby.contains(&hash));
//! ```

pub mod codec;
mod error;
pub mod types;

pub use error::{LocationError, Result};
pub use types::{Bounds, CellSize, Coordinate, GeohashPrecision};
