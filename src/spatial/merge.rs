//! Build the merged point sequence from classified regions.

use crate::alignment::Alignment;
use crate::projection::PlanarPoint;
use crate::TrackPoint;

use super::regions::Region;
use super::ProjectedTrack;

/// Merged output, planar and geodetic side by side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedPoints {
    pub planar: Vec<PlanarPoint>,
    pub points: Vec<TrackPoint>,
}

impl MergedPoints {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            planar: Vec::with_capacity(capacity),
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn push(&mut self, planar: PlanarPoint, point: &TrackPoint) {
        self.planar.push(planar);
        self.points.push(point.sanitized());
    }
}

/// One output point per warped step: the query point, or the template point
/// inside `Patch` regions.
pub fn merge_regions(
    alignment: &Alignment,
    regions: &[Region],
    query: &ProjectedTrack,
    template: &ProjectedTrack,
) -> MergedPoints {
    let mut from_template = vec![false; alignment.len()];
    for region in regions.iter().filter(|r| r.is_patch()) {
        from_template[region.start..=region.end].fill(true);
    }

    let mut merged = MergedPoints::with_capacity(alignment.len());
    for ((i, j), use_template) in alignment.steps().zip(from_template) {
        let (source, index) = if use_template { (template, j) } else { (query, i) };
        merged.push(source.planar[index], &source.track.points[index]);
    }
    merged
}

/// Drop every point at zero planar distance from its predecessor.
///
/// The first point is always kept.
pub fn compact(merged: MergedPoints) -> MergedPoints {
    let mut out = MergedPoints::with_capacity(merged.len());
    let mut previous: Option<PlanarPoint> = None;
    for (planar, point) in merged.planar.into_iter().zip(merged.points) {
        if previous.is_some_and(|p| p.distance(&planar) == 0.0) {
            continue;
        }
        previous = Some(planar);
        out.planar.push(planar);
        out.points.push(point);
    }
    out
}
