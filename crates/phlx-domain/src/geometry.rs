//! # Geometry Kernel
//!
//! Coordinate validation and the ray-casting containment test used by every
//! geofence query. Latitude/longitude are treated as planar Cartesian
//! coordinates (longitude = x, latitude = y); there is no projection.
//!
//! Containment follows a half-open convention: for an axis-aligned square,
//! points on the southern and western edges are inside, points on the
//! northern and eastern edges are outside.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = DomainError;

    fn try_from(raw: RawCoordinate) -> Result<Self> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Build a coordinate, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidCoordinate`] when latitude is outside
    /// `[-90, 90]` or longitude is outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        validate_coordinate(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }

    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `(0, 0)` is the "no known position" sentinel.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Great-circle distance to another point (Haversine formula).
    #[must_use]
    pub fn distance_to_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

/// Check a raw latitude/longitude pair.
///
/// # Errors
///
/// Returns [`DomainError::InvalidCoordinate`] when either value is out of
/// range or not finite.
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<()> {
    let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
    let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(DomainError::InvalidCoordinate {
            lat: latitude,
            lon: longitude,
        })
    }
}

/// Check that a boundary can form a polygon.
///
/// Self-intersection is not checked.
///
/// # Errors
///
/// Returns [`DomainError::InvalidBoundary`] when fewer than 3 points are
/// given or a point is out of range.
pub fn validate_boundary(points: &[Coordinate]) -> Result<()> {
    if points.len() < 3 {
        return Err(DomainError::InvalidBoundary(format!(
            "boundary must have at least 3 points to form a polygon, got {}",
            points.len()
        )));
    }

    for (i, point) in points.iter().enumerate() {
        validate_coordinate(point.latitude, point.longitude).map_err(|e| {
            DomainError::InvalidBoundary(format!("invalid coordinate at point {i}: {e}"))
        })?;
    }

    Ok(())
}

/// Even-odd ray-casting containment test.
///
/// Each edge, including the closing edge from the last vertex back to the
/// first, counts as a crossing when it straddles the point's latitude and its
/// longitude at that latitude lies east of the point. Edges are evaluated in
/// a canonical (south-to-north) orientation so the result does not depend on
/// vertex order or starting offset.
#[must_use]
pub fn point_in_polygon(point: &Coordinate, boundary: &[Coordinate]) -> bool {
    if boundary.len() < 3 {
        return false;
    }

    let (px, py) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = boundary.len() - 1;

    for i in 0..boundary.len() {
        let (a, b) = if boundary[i].latitude <= boundary[j].latitude {
            (&boundary[i], &boundary[j])
        } else {
            (&boundary[j], &boundary[i])
        };

        // a is the southern end; the edge straddles iff a.lat <= py < b.lat
        if a.latitude <= py && py < b.latitude {
            let x_intercept = (b.longitude - a.longitude) * (py - a.latitude)
                / (b.latitude - a.latitude)
                + a.longitude;
            if px < x_intercept {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}

/// Axis-aligned bounding box of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// `None` for an empty boundary.
    #[must_use]
    pub fn of(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            west: first.longitude,
            south: first.latitude,
            east: first.longitude,
            north: first.latitude,
        };
        Some(points.iter().fold(init, |bb, p| Self {
            west: bb.west.min(p.longitude),
            south: bb.south.min(p.latitude),
            east: bb.east.max(p.longitude),
            north: bb.north.max(p.latitude),
        }))
    }

    /// Inclusive on all sides.
    #[must_use]
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.west..=self.east).contains(&point.longitude)
            && (self.south..=self.north).contains(&point.latitude)
    }
}
