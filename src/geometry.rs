use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Axis-aligned longitude/latitude box as supplied by callers.
///
/// No ordering is enforced between the minimum and maximum fields. An
/// inverted box describes an empty region and therefore matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Corners ordered (minLon,maxLat), (maxLon,maxLat), (maxLon,minLat), (minLon,minLat).
    pub fn to_rectangle(&self) -> Rectangle {
        Rectangle {
            corners: [
                (self.min_lon, self.max_lat),
                (self.max_lon, self.max_lat),
                (self.max_lon, self.min_lat),
                (self.min_lon, self.min_lat),
            ],
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(value: [f64; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.min_lon, value.min_lat, value.max_lon, value.max_lat]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl FromStr for BoundingBox {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| FetchError::InvalidBoundingBox(value.to_string()))?;
        match parts.as_slice() {
            [min_lon, min_lat, max_lon, max_lat] => {
                Ok(Self::new(*min_lon, *min_lat, *max_lon, *max_lat))
            }
            _ => Err(FetchError::InvalidBoundingBox(value.to_string())),
        }
    }
}

/// Closed four-cornered region in longitude/latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    corners: [(f64, f64); 4],
}

impl Rectangle {
    /// Builds the region spanned by a metadata bounding rectangle. The extents
    /// are normalized, so swapped west/east or north/south values still
    /// describe the same area. Corners are ordered (west,north), (east,north),
    /// (east,south), (west,south).
    pub fn from_bounds(west: f64, north: f64, east: f64, south: f64) -> Self {
        let (west, east) = (west.min(east), west.max(east));
        let (south, north) = (south.min(north), south.max(north));
        Self {
            corners: [(west, north), (east, north), (east, south), (west, south)],
        }
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        self.corners
    }

    fn west(&self) -> f64 {
        self.corners[0].0
    }

    fn east(&self) -> f64 {
        self.corners[1].0
    }

    fn north(&self) -> f64 {
        self.corners[0].1
    }

    fn south(&self) -> f64 {
        self.corners[2].1
    }

    /// Only a caller box can be inverted; it covers no points.
    pub fn is_empty(&self) -> bool {
        self.west() > self.east() || self.south() > self.north()
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        intersects(self, other)
    }
}

/// Reports whether two closed rectangles share at least one point. Shared
/// edges and corners count, zero-area rectangles are valid.
pub fn intersects(a: &Rectangle, b: &Rectangle) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.west() <= b.east() && b.west() <= a.east() && a.south() <= b.north() && b.south() <= a.north()
}
