//! Local planar projection of geodetic coordinates.
//!
//! Distances between GPS samples are only needed over the extent of a single
//! ride, so an equirectangular projection around a reference point is enough
//! to make meter thresholds meaningful. Longitude is scaled by the cosine of
//! the reference latitude; elevation passes through unscaled.

use serde::{Deserialize, Serialize};

use crate::error::{require_points, OptionExt, PatchError, Result};
use crate::{Track, TrackPoint};

/// Length of one degree of arc on the WGS84 equator, in meters.
pub const METERS_PER_DEGREE: f64 = 111_319.490_793_273_57;

/// A point in the local plane, in meters from the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    /// East
    pub x: f64,
    /// North
    pub y: f64,
    /// Elevation, unscaled
    pub z: Option<f64>,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Horizontal Euclidean distance. Elevation is ignored.
    pub fn distance(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The origin of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoReference {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Coordinate-wise mean of the given points, or `None` if empty.
    pub fn mean_of(points: &[TrackPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (lat_sum, lng_sum) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lng), p| (lat + p.latitude, lng + p.longitude));
        Some(Self::new(lat_sum / n, lng_sum / n))
    }

    fn x_scale(&self) -> f64 {
        self.latitude.to_radians().cos() * METERS_PER_DEGREE
    }

    pub fn project_point(&self, latitude: f64, longitude: f64, elevation: Option<f64>) -> PlanarPoint {
        PlanarPoint {
            x: (longitude - self.longitude) * self.x_scale(),
            y: (latitude - self.latitude) * METERS_PER_DEGREE,
            z: elevation,
        }
    }

    /// Inverse of [`project_point`](Self::project_point): `(latitude, longitude, elevation)`.
    pub fn unproject_point(&self, point: &PlanarPoint) -> (f64, f64, Option<f64>) {
        (
            point.y / METERS_PER_DEGREE + self.latitude,
            point.x / self.x_scale() + self.longitude,
            point.z,
        )
    }
}

/// Planar points plus the reference they were projected around.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub points: Vec<PlanarPoint>,
    pub reference: GeoReference,
}

/// Project a track onto the local plane.
///
/// Without a `reference`, the mean of the track's points is used. Pass the
/// reference returned for one track when projecting a second one so both share
/// a frame.
///
/// Fails with [`PatchError::Shape`] when the track mixes points with and
/// without elevation.
pub fn project_track(track: &Track, reference: Option<GeoReference>) -> Result<Projection> {
    let reference = match reference {
        Some(r) => r,
        None => GeoReference::mean_of(&track.points).ok_or_empty_input(&track.name, 0, 1)?,
    };

    if let Some(first) = track.points.first() {
        let has_elevation = first.elevation.is_some();
        if let Some(index) = track
            .points
            .iter()
            .position(|p| p.elevation.is_some() != has_elevation)
        {
            return Err(PatchError::Shape {
                message: format!(
                    "track '{}' point {} has {} coordinates, expected {}",
                    track.name,
                    index,
                    arity(!has_elevation),
                    arity(has_elevation)
                ),
            });
        }
    }

    let points = track
        .points
        .iter()
        .map(|p| reference.project_point(p.latitude, p.longitude, p.elevation))
        .collect();

    Ok(Projection { points, reference })
}

/// Project raw `[lat, lon]` or `[lat, lon, elevation]` rows.
///
/// All rows must have the same arity, either 2 or 3.
pub fn project_rows(rows: &[Vec<f64>], reference: Option<GeoReference>) -> Result<Projection> {
    let expected = match rows.first() {
        Some(row) => row.len(),
        None => 2,
    };
    if expected != 2 && expected != 3 {
        return Err(PatchError::Shape {
            message: format!("coordinate rows must have 2 or 3 values, got {}", expected),
        });
    }
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
        return Err(PatchError::Shape {
            message: format!(
                "row {} has {} values, expected {}",
                index,
                row.len(),
                expected
            ),
        });
    }

    let reference = match reference {
        Some(r) => r,
        None => {
            require_points("rows", rows.len(), 1)?;
            let n = rows.len() as f64;
            let (lat, lng) = rows
                .iter()
                .fold((0.0, 0.0), |(lat, lng), r| (lat + r[0], lng + r[1]));
            GeoReference::new(lat / n, lng / n)
        }
    };

    let points = rows
        .iter()
        .map(|r| reference.project_point(r[0], r[1], r.get(2).copied()))
        .collect();

    Ok(Projection { points, reference })
}

/// Convert planar points back to `[lat, lon]` / `[lat, lon, elevation]` rows.
pub fn unproject(points: &[PlanarPoint], reference: &GeoReference) -> Vec<Vec<f64>> {
    points
        .iter()
        .map(|p| {
            let (lat, lng, elevation) = reference.unproject_point(p);
            match elevation {
                Some(e) => vec![lat, lng, e],
                None => vec![lat, lng],
            }
        })
        .collect()
}

fn arity(has_elevation: bool) -> usize {
    if has_elevation {
        3
    } else {
        2
    }
}
