//! Outlier-robust statistics of point spacing.
//!
//! GPS tracks contain occasional large jumps (dropouts, pauses), so the typical
//! spacing is summarized with the median and the median absolute deviation
//! rather than mean and standard deviation.

use serde::{Deserialize, Serialize};

use crate::error::{require_points, Result};
use crate::projection::PlanarPoint;

/// Consistency constant making the MAD estimate the standard deviation of a
/// normal distribution.
pub const MAD_SCALE: f64 = 1.482_602_218_505_602;

/// Median and scaled MAD of consecutive step distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapStatistics {
    /// Median step distance (meters)
    pub median: f64,
    /// `MAD_SCALE * median(|d - median|)` (meters)
    pub scaled_mad: f64,
    /// Number of steps the statistics were computed from
    pub count: usize,
}

impl GapStatistics {
    /// Distance threshold `median + multiplier * scaled_mad`.
    pub fn threshold(&self, multiplier: f64) -> f64 {
        self.median + multiplier * self.scaled_mad
    }
}

/// Compute spacing statistics for a planar point sequence.
///
/// Fails with `EmptyInput` if there are fewer than 2 points.
pub fn gap_statistics(points: &[PlanarPoint]) -> Result<GapStatistics> {
    require_points("planar points", points.len(), 2)?;

    let steps = step_distances(points);
    let median = median(&steps);
    let deviations: Vec<f64> = steps.iter().map(|d| (d - median).abs()).collect();

    Ok(GapStatistics {
        median,
        scaled_mad: MAD_SCALE * self::median(&deviations),
        count: steps.len(),
    })
}

/// Distances between consecutive points.
pub fn step_distances(points: &[PlanarPoint]) -> Vec<f64> {
    points.windows(2).map(|w| w[0].distance(&w[1])).collect()
}

/// Total length of the polyline through `points`.
pub fn path_length(points: &[PlanarPoint]) -> f64 {
    points.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// Median of `values`, averaging the two middle values for even counts.
///
/// Returns NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
