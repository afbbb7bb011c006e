//! Location data types.

use serde::{Deserialize, Serialize};

use super::error::{LocationError, Result};

/// A validated WGS84 coordinate.
///
/// Coordinates are immutable values: construction rejects NaN, infinite
/// and out-of-range components, so every `Coordinate` in the system can be
/// geohash-encoded without further checks.
///
/// # Example
///
/// ```
/// use zkgps_core::location::Coordinate;
///
/// let sf = Coordinate::new(37.7749, -122.4194).unwrap();
/// assert_eq!(sf.lat(), 37.7749);
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

/// Unvalidated wire shape of a [`Coordinate`].
#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = LocationError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Self::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    /// Creates a coordinate, validating both components.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidArgument`] if latitude is not within
    /// -90..=90, longitude is not within -180..=180, or either is not finite.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(LocationError::invalid(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(LocationError::invalid(format!(
                "longitude {lng} outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Formats the coordinate as `lat,lng` for signed messages.
    #[must_use]
    pub fn to_message_string(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Geohash precision (string length), 1 through 12.
///
/// Larger values mean smaller cells and therefore reveal more about a
/// location.
///
/// # Cell Size Table
///
/// | Precision | Cell Width   | Cell Height  |
/// |-----------|--------------|--------------|
/// | 1         | 5,000 km     | 5,000 km     |
/// | 2         | 1,250 km     | 625 km       |
/// | 3         | 156 km       | 156 km       |
/// | 4         | 39.1 km      | 19.5 km      |
/// | 5         | 4.89 km      | 4.89 km      |
/// | 6         | 1.22 km      | 0.61 km      |
/// | 7         | 153 m        | 153 m        |
/// | 8         | 38.2 m       | 19.1 m       |
/// | 9         | 4.77 m       | 4.77 m       |
/// | 10        | 1.19 m       | 0.596 m      |
/// | 11        | 149 mm       | 149 mm       |
/// | 12        | 37.2 mm      | 18.6 mm      |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GeohashPrecision(u8);

/// Width and height of a geohash cell in meters, indexed by `precision - 1`.
const CELL_SIZES: [CellSize; 12] = [
    CellSize::new(5_000_000.0, 5_000_000.0),
    CellSize::new(1_250_000.0, 625_000.0),
    CellSize::new(156_000.0, 156_000.0),
    CellSize::new(39_100.0, 19_500.0),
    CellSize::new(4_890.0, 4_890.0),
    CellSize::new(1_220.0, 610.0),
    CellSize::new(153.0, 153.0),
    CellSize::new(38.2, 19.1),
    CellSize::new(4.77, 4.77),
    CellSize::new(1.19, 0.596),
    CellSize::new(0.149, 0.149),
    CellSize::new(0.0372, 0.0186),
];

impl GeohashPrecision {
    /// Coarsest precision (one character).
    pub const MIN: Self = Self(1);
    /// Finest precision (twelve characters), used for commitments.
    pub const MAX: Self = Self(12);

    /// Creates a precision value.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::InvalidArgument`] if `value` is not in 1..=12.
    pub fn new(value: u8) -> Result<Self> {
        if (1..=12).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LocationError::invalid(format!(
                "geohash precision {value} outside [1, 12]"
            )))
        }
    }

    /// Builds a precision in const context, clamping into 1..=12.
    #[must_use]
    pub(crate) const fn from_const(value: u8) -> Self {
        if value < 1 {
            Self::MIN
        } else if value > 12 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    /// Returns the raw precision value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the precision as a string length.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0 as usize
    }

    /// Approximate cell dimensions at this precision.
    #[must_use]
    pub const fn cell_size(self) -> CellSize {
        CELL_SIZES[(self.0 - 1) as usize]
    }

    /// Iterates every precision from coarsest to finest.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=12).map(Self)
    }
}

impl TryFrom<u8> for GeohashPrecision {
    type Error = LocationError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<GeohashPrecision> for u8 {
    fn from(precision: GeohashPrecision) -> Self {
        precision.0
    }
}

impl std::fmt::Display for GeohashPrecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Approximate dimensions of a geohash cell in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSize {
    /// East-west extent in meters.
    pub width_m: f64,
    /// North-south extent in meters.
    pub height_m: f64,
}

impl CellSize {
    const fn new(width_m: f64, height_m: f64) -> Self {
        Self { width_m, height_m }
    }

    /// The larger of the two dimensions.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.width_m.max(self.height_m)
    }
}

/// Bounding box of a geohash cell (or any lat/lng rectangle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lng: f64,
    /// Eastern edge.
    pub max_lng: f64,
}

impl Bounds {
    /// Whether the point lies inside or on the edge of this box.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }

    /// The point of this box closest to `(lat, lng)`.
    #[must_use]
    pub fn clamp(&self, lat: f64, lng: f64) -> (f64, f64) {
        (
            lat.clamp(self.min_lat, self.max_lat),
            lng.clamp(self.min_lng, self.max_lng),
        )
    }

    /// Cell center.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Height in degrees of latitude.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Width in degrees of longitude.
    #[must_use]
    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}
