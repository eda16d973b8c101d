//! # Algorithm Toolbox
//!
//! Direct access to each stage of the patching pipeline, for callers that
//! want to drive the stages themselves (custom region rules, plotting the
//! alignment, reusing the projection for other distance work).
//!
//! ## Stages
//!
//! - **Projection**: geodetic <-> local planar coordinates
//! - **Spacing statistics**: median and scaled MAD of step distances
//! - **Alignment**: dynamic time warping with a deterministic tie-break
//! - **Region classification**: index-repetition or distance signal
//! - **Merge**: splice template points into the query, drop zero-length steps
//! - **Temporal merge**: timestamp-driven gap filling
//!
//! # Example
//!
//! ```rust
//! use track_patcher::algorithms::{
//!     align, classify_by_repetition, gap_statistics, project_rows,
//! };
//!
//! let query = project_rows(
//!     &[vec![47.0000, 8.5], vec![47.0010, 8.5], vec![47.0020, 8.5]],
//!     None,
//! )
//! .unwrap();
//! let template = project_rows(
//!     &[vec![47.0000, 8.5], vec![47.0005, 8.5], vec![47.0010, 8.5], vec![47.0015, 8.5], vec![47.0020, 8.5]],
//!     Some(query.reference),
//! )
//! .unwrap();
//!
//! let stats = gap_statistics(&query.points).unwrap();
//! println!("typical spacing: {:.1}m", stats.median);
//!
//! let alignment = align(&query.points, &template.points).unwrap();
//! assert_eq!(alignment.index1[0], 0);
//! let regions = classify_by_repetition(&alignment, &template.points, 0.0);
//! assert!(regions.iter().any(|r| r.is_patch()));
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{PatchedTrack, Track, TrackPoint};

// =============================================================================
// Projection
// =============================================================================

pub use crate::projection::{
    project_rows, project_track, unproject, GeoReference, PlanarPoint, Projection,
    METERS_PER_DEGREE,
};

// =============================================================================
// Spacing Statistics
// =============================================================================

pub use crate::statistics::{
    gap_statistics, median, path_length, step_distances, GapStatistics, MAD_SCALE,
};

// =============================================================================
// Alignment
// =============================================================================

/// Dynamic time warping alignment.
///
/// O(N·M) time and memory; ties prefer the diagonal step.
pub use crate::alignment::{align, Alignment};

// =============================================================================
// Spatial Regions and Merge
// =============================================================================

pub use crate::spatial::{
    classify_by_distance, classify_by_repetition, compact, label_runs, merge_regions,
    MergedPoints, ProjectedTrack, Region, RegionDecision, RegionKind,
};

// =============================================================================
// Temporal Merge
// =============================================================================

pub use crate::temporal::{patch_temporal, seconds_between, GapFill, TemporalPatch};
