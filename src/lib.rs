//! # Track Patcher
//!
//! Repair a recorded GPS track ("query") that has gaps, dropouts or noisy
//! excursions by substituting data from a second track ("template") recorded
//! over the same path.
//!
//! Two independent strategies share one contract (two time-ordered tracks in,
//! one merged time-ordered track out):
//!
//! - **Spatial**: project both tracks onto a local plane, align them with
//!   dynamic time warping, classify misaligned regions and splice template
//!   points into the query where the template is denser.
//! - **Temporal**: walk both tracks by timestamp and fill every query time gap
//!   above a threshold with the template points recorded during that gap.
//!
//! ## Features
//!
//! - **`parallel`** - Fill the DTW distance matrix with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::DateTime;
//! use track_patcher::{patch_tracks, PatchStrategy, TemporalConfig, Track, TrackPoint};
//!
//! let at = |secs: i64| DateTime::from_timestamp(secs, 0).unwrap();
//!
//! let query = Track::new(
//!     "morning ride",
//!     vec![
//!         TrackPoint::new(51.5000, -0.1200).with_time(at(0)),
//!         TrackPoint::new(51.5090, -0.1200).with_time(at(100)),
//!     ],
//! );
//! let template = Track::new(
//!     "watch",
//!     (0..=10)
//!         .map(|i| TrackPoint::new(51.5 + i as f64 * 0.0009, -0.12).with_time(at(i * 10)))
//!         .collect(),
//! );
//!
//! let strategy = PatchStrategy::Temporal(TemporalConfig::default());
//! let patched = patch_tracks(&query, &template, &strategy).unwrap();
//! assert_eq!(patched.points.len(), 12);
//! assert_eq!(patched.name, "morning ride patched (simple time algo)");
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, PatchError, Result};

// Geodetic <-> local planar projection
pub mod projection;
pub use projection::{project_rows, project_track, unproject, GeoReference, PlanarPoint, Projection};

// Median / scaled MAD of point spacing
pub mod statistics;
pub use statistics::{gap_statistics, GapStatistics};

// Dynamic time warping
pub mod alignment;
pub use alignment::{align, Alignment};

// Distance-alignment patching (regions + merge)
pub mod spatial;
pub use spatial::{
    patch_spatial, Diagnostics, Region, RegionDecision, RegionKind, RegionSignal, SpatialConfig,
    SpatialPatch,
};

// Timestamp-driven patching
pub mod temporal;
pub use temporal::{patch_temporal, seconds_between, GapFill, TemporalConfig, TemporalPatch};

// Algorithm toolbox - standalone access to each stage
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// A recorded track point.
///
/// `extensions` holds device or source specific fields (heart rate,
/// temperature, ...) that a parser attached to the point. Points taken from a
/// template are [sanitized](TrackPoint::sanitized) before they are emitted.
///
/// # Example
/// ```
/// use track_patcher::TrackPoint;
/// let point = TrackPoint::new(51.5074, -0.1278).with_elevation(35.0);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extensions: HashMap<String, String>,
}

impl TrackPoint {
    /// Create a new point with no elevation, time or extensions.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            time: None,
            extensions: HashMap::new(),
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Copy of this point with only position, elevation and time.
    pub fn sanitized(&self) -> Self {
        Self {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.elevation,
            time: self.time,
            extensions: HashMap::new(),
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
            && self.elevation.map_or(true, f64::is_finite)
    }
}

/// One continuous recorded path (a single track segment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Display name, used for output labels and error messages
    pub name: String,
    pub points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(name: impl Into<String>, points: Vec<TrackPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the first point failing [`TrackPoint::is_valid`].
    pub fn first_invalid(&self) -> Option<usize> {
        self.points.iter().position(|p| !p.is_valid())
    }
}

/// The merged output of a patch operation.
///
/// Ready to be written back as a single track segment by a serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchedTrack {
    /// Query name plus a suffix naming the algorithm that produced it
    pub name: String,
    pub points: Vec<TrackPoint>,
}

impl PatchedTrack {
    pub(crate) fn labelled(query: &Track, suffix: &str, points: Vec<TrackPoint>) -> Self {
        Self {
            name: format!("{}{}", query.name, suffix),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Which patching algorithm to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchStrategy {
    Spatial(SpatialConfig),
    Temporal(TemporalConfig),
}

impl Default for PatchStrategy {
    fn default() -> Self {
        PatchStrategy::Temporal(TemporalConfig::default())
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Patch `query` with `template` using the chosen strategy.
///
/// This is the single entry point for callers that only need the merged
/// track. Use [`patch_spatial`] or [`patch_temporal`] directly for the
/// per-strategy reports (regions, diagnostics, gap coverage).
pub fn patch_tracks(
    query: &Track,
    template: &Track,
    strategy: &PatchStrategy,
) -> Result<PatchedTrack> {
    match strategy {
        PatchStrategy::Spatial(config) => patch_spatial(query, template, config).map(|p| p.track),
        PatchStrategy::Temporal(config) => {
            patch_temporal(query, template, config).map(|p| p.track)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
