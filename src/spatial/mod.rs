//! # Spatial Patching
//!
//! Patches a query track with a template track using geometry only.
//!
//! ## Algorithm
//! 1. Project both tracks onto a local plane around the query's mean point
//! 2. Align the planar sequences with dynamic time warping
//! 3. Split the alignment into regions where one side stalls (or where the
//!    matched points diverge beyond a distance threshold)
//! 4. Patch regions where the template advanced further than the query
//! 5. Emit the query along the warping path, template points inside patched
//!    regions, and drop zero-length steps
//!
//! ## Thresholds
//! The distance signal needs a threshold in meters. When none is configured it
//! is derived from the query's own spacing as `median + k * scaled_mad`.

mod merge;
mod regions;

use std::time::Instant;

use geo::LineString;
use log::info;
use serde::{Deserialize, Serialize};

use crate::alignment::align;
use crate::error::{require_points, require_valid_coordinates, PatchError, Result};
use crate::projection::{project_track, GeoReference, PlanarPoint};
use crate::statistics::{gap_statistics, GapStatistics};
use crate::{PatchedTrack, Track};

pub use merge::{compact, merge_regions, MergedPoints};
pub use regions::{
    classify_by_distance, classify_by_repetition, label_runs, Region, RegionDecision, RegionKind,
};

/// Label suffix for tracks produced by this strategy
pub const SPATIAL_SUFFIX: &str = " patched (spatial DTW algo)";

/// Which misalignment signal defines candidate regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionSignal {
    /// Runs where one alignment index repeats
    IndexRepetition,
    /// Runs where matched points are further apart than the threshold
    AlignedDistance,
}

/// Configuration for spatial patching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// How candidate regions are found.
    /// Default: IndexRepetition
    pub signal: RegionSignal,

    /// Distance threshold in meters for the AlignedDistance signal.
    /// None derives it from the query's spacing. Default: None
    pub distance_threshold: Option<f64>,

    /// Multiplier `k` on the scaled MAD when deriving the threshold.
    /// Default: 3.0
    pub mad_multiplier: f64,

    /// Regions covering less than this fraction of the template's total path
    /// length are kept as query, suppressing jitter. 0.0 disables.
    /// Default: 0.02
    pub min_region_fraction: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            signal: RegionSignal::IndexRepetition,
            distance_threshold: None,
            mad_multiplier: 3.0,
            min_region_fraction: 0.02,
        }
    }
}

impl SpatialConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| PatchError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.distance_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(config_error(format!(
                    "distance_threshold must be a non-negative number, got {}",
                    threshold
                )));
            }
        }
        if !self.mad_multiplier.is_finite() || self.mad_multiplier < 0.0 {
            return Err(config_error(format!(
                "mad_multiplier must be a non-negative number, got {}",
                self.mad_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.min_region_fraction) {
            return Err(config_error(format!(
                "min_region_fraction must be within [0, 1], got {}",
                self.min_region_fraction
            )));
        }
        Ok(())
    }
}

fn config_error(message: String) -> PatchError {
    PatchError::Config { message }
}

/// A track together with its planar projection.
#[derive(Debug, Clone)]
pub struct ProjectedTrack<'a> {
    pub track: &'a Track,
    pub planar: Vec<PlanarPoint>,
}

/// The three trajectories in one planar frame, for an external map renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// Origin of the planar frame
    pub reference: GeoReference,
    pub query: LineString<f64>,
    pub template: LineString<f64>,
    pub merged: LineString<f64>,
    /// Mean position of the merged track (suggested map center)
    pub map_center: GeoReference,
}

fn line_string(points: &[PlanarPoint]) -> LineString<f64> {
    points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into()
}

/// Result of spatial patching
#[derive(Debug, Clone)]
pub struct SpatialPatch {
    pub track: PatchedTrack,
    /// Every candidate region with its decision, in alignment order
    pub regions: Vec<Region>,
    /// Spacing statistics of the projected query
    pub statistics: GapStatistics,
    /// Distance threshold in effect (meters)
    pub threshold: f64,
    pub diagnostics: Diagnostics,
}

impl SpatialPatch {
    pub fn patched_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(|r| r.is_patch())
    }
}

/// Patch `query` with `template` by spatial alignment.
///
/// Both tracks need at least 2 points, all with valid coordinates. Output points carry only position,
/// elevation and time; points inside patched regions carry the template's
/// timestamps.
pub fn patch_spatial(query: &Track, template: &Track, config: &SpatialConfig) -> Result<SpatialPatch> {
    config.validate()?;
    require_points(&query.name, query.len(), 2)?;
    require_points(&template.name, template.len(), 2)?;
    require_valid_coordinates(query)?;
    require_valid_coordinates(template)?;
    let start = Instant::now();

    let query_projection = project_track(query, None)?;
    let reference = query_projection.reference;
    let query_projected = ProjectedTrack {
        track: query,
        planar: query_projection.points,
    };
    let template_projected = ProjectedTrack {
        track: template,
        planar: project_track(template, Some(reference))?.points,
    };

    let statistics = gap_statistics(&query_projected.planar)?;
    let threshold = config
        .distance_threshold
        .unwrap_or_else(|| statistics.threshold(config.mad_multiplier));

    let alignment = align(&query_projected.planar, &template_projected.planar)?;
    let regions = match config.signal {
        RegionSignal::IndexRepetition => classify_by_repetition(
            &alignment,
            &template_projected.planar,
            config.min_region_fraction,
        ),
        RegionSignal::AlignedDistance => classify_by_distance(
            &alignment,
            &query_projected.planar,
            &template_projected.planar,
            threshold,
            config.min_region_fraction,
        ),
    };

    let merged = compact(merge_regions(
        &alignment,
        &regions,
        &query_projected,
        &template_projected,
    ));

    info!(
        "[Spatial] '{}' ({} pts) + '{}' ({} pts): {} steps, {}/{} regions patched, {} output pts in {}ms",
        query.name,
        query.len(),
        template.name,
        template.len(),
        alignment.len(),
        regions.iter().filter(|r| r.is_patch()).count(),
        regions.len(),
        merged.len(),
        start.elapsed().as_millis()
    );

    let diagnostics = Diagnostics {
        reference,
        query: line_string(&query_projected.planar),
        template: line_string(&template_projected.planar),
        merged: line_string(&merged.planar),
        map_center: GeoReference::mean_of(&merged.points).unwrap_or(reference),
    };

    Ok(SpatialPatch {
        track: PatchedTrack::labelled(query, SPATIAL_SUFFIX, merged.points),
        regions,
        statistics,
        threshold,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackPoint;

    /// Points heading north every `step` degrees of latitude.
    fn northward(name: &str, start: f64, step: f64, count: usize) -> Track {
        Track::new(
            name,
            (0..count)
                .map(|i| TrackPoint::new(start + i as f64 * step, 8.5))
                .collect(),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SpatialConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = SpatialConfig {
            min_region_fraction: 1.5,
            ..SpatialConfig::default()
        };
        assert!(matches!(config.validate(), Err(PatchError::Config { .. })));

        let config = SpatialConfig {
            distance_threshold: Some(-1.0),
            ..SpatialConfig::default()
        };
        assert!(config.validate().is_err());

        let query = northward("q", 47.0, 0.0001, 5);
        assert!(patch_spatial(&query, &query, &config).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = SpatialConfig::from_json(
            r#"{"signal":"AlignedDistance","distance_threshold":50.0,"mad_multiplier":4.0,"min_region_fraction":0.05}"#,
        )
        .unwrap();
        assert_eq!(config.signal, RegionSignal::AlignedDistance);
        assert_eq!(config.distance_threshold, Some(50.0));

        assert!(matches!(
            SpatialConfig::from_json("{"),
            Err(PatchError::Config { .. })
        ));
        assert!(SpatialConfig::from_json(
            r#"{"signal":"IndexRepetition","distance_threshold":null,"mad_multiplier":3.0,"min_region_fraction":-0.1}"#
        )
        .is_err());
    }

    #[test]
    fn test_template_fills_missing_start() {
        // Query is missing the first 20 samples the template recorded
        let template = northward("watch", 47.0, 0.0001, 60);
        let query = northward("phone", 47.0020, 0.0001, 40);

        let patch = patch_spatial(&query, &template, &SpatialConfig::default()).unwrap();
        assert_eq!(patch.track.name, "phone patched (spatial DTW algo)");
        assert_eq!(patch.track.len(), 60);
        assert_eq!(patch.patched_regions().count(), 1);
        assert_eq!(patch.track.points[0].latitude, 47.0);
        assert_eq!(patch.diagnostics.merged.0.len(), 60);
        assert_eq!(patch.diagnostics.query.0.len(), 40);
    }

    #[test]
    fn test_identical_tracks_are_unchanged() {
        let query = northward("q", 47.0, 0.0001, 30);
        let patch = patch_spatial(&query, &query, &SpatialConfig::default()).unwrap();
        assert!(patch.regions.is_empty());
        assert_eq!(patch.track.points, query.points);
    }

    #[test]
    fn test_derived_threshold() {
        let query = northward("q", 47.0, 0.0001, 30);
        let config = SpatialConfig {
            signal: RegionSignal::AlignedDistance,
            ..SpatialConfig::default()
        };
        let patch = patch_spatial(&query, &query, &config).unwrap();
        // Uniform spacing: threshold is the step length (~11m)
        assert!((patch.threshold - patch.statistics.median).abs() < 1e-6);
        assert!(patch.threshold > 10.0 && patch.threshold < 12.0);

        let config = SpatialConfig {
            distance_threshold: Some(50.0),
            ..config
        };
        let patch = patch_spatial(&query, &query, &config).unwrap();
        assert_eq!(patch.threshold, 50.0);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let template = northward("template", 47.0, 0.0001, 10);
        let mut query = template.clone();
        query.name = "query".to_string();
        query.points[3].latitude = f64::NAN;
        assert_eq!(
            patch_spatial(&query, &template, &SpatialConfig::default()).unwrap_err(),
            PatchError::InvalidCoordinates {
                track: "query".to_string(),
                index: 3
            }
        );

        let mut template = template;
        template.points[7].longitude = f64::INFINITY;
        assert!(matches!(
            patch_spatial(&template.clone(), &template, &SpatialConfig::default()),
            Err(PatchError::InvalidCoordinates { index: 7, .. })
        ));
    }

    #[test]
    fn test_too_few_points() {
        let one = northward("single", 47.0, 0.0001, 1);
        let many = northward("many", 47.0, 0.0001, 10);
        assert!(matches!(
            patch_spatial(&one, &many, &SpatialConfig::default()),
            Err(PatchError::EmptyInput { ref track, .. }) if track == "single"
        ));
    }
}
