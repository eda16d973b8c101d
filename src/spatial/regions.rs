//! Region classification over a DTW alignment.
//!
//! A region is a maximal run of warped steps that share a misalignment
//! signal. Each region is then decided by comparing how far each sequence
//! advanced across it: if the template covered more samples than the query,
//! the query is missing detail there and the template is spliced in.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::projection::PlanarPoint;
use crate::statistics::path_length;

/// What produced a candidate region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// Query index stalls while the template advances
    Deletion,
    /// Template index stalls while the query advances
    Insertion,
    /// Matched points are further apart than the distance threshold
    Divergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionDecision {
    /// Replace the query with template points
    Patch,
    /// Keep the query points
    Keep,
}

/// A classified run of alignment steps, bounds inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub kind: RegionKind,
    pub decision: RegionDecision,
    /// Template path length covered by the region (meters)
    pub template_distance: f64,
}

impl Region {
    pub fn is_patch(&self) -> bool {
        self.decision == RegionDecision::Patch
    }

    /// Number of warped steps in the region.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Maximal runs of `true` in `mask`, as inclusive `(start, end)` pairs.
pub fn label_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start = None;
    for (k, &set) in mask.iter().enumerate() {
        match (set, run_start) {
            (true, None) => run_start = Some(k),
            (false, Some(start)) => {
                runs.push((start, k - 1));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start, mask.len() - 1));
    }
    runs
}

/// Classify regions where one side of the alignment stops advancing.
///
/// A run of stalled steps `a..=b` becomes the region `a-1..=b`, anchored on
/// the step where the stalled index was last reached.
pub fn classify_by_repetition(
    alignment: &Alignment,
    template: &[PlanarPoint],
    min_region_fraction: f64,
) -> Vec<Region> {
    let classifier = Classifier::new(alignment, template, min_region_fraction);

    let mut regions: Vec<Region> = [
        (RegionKind::Deletion, stalled(&alignment.index1)),
        (RegionKind::Insertion, stalled(&alignment.index2)),
    ]
    .into_iter()
    .flat_map(|(kind, mask)| {
        label_runs(&mask)
            .into_iter()
            .map(move |(start, end)| (kind, start - 1, end))
    })
    .map(|(kind, start, end)| classifier.decide(kind, start, end))
    .collect();

    regions.sort_by_key(|r| r.start);
    regions
}

/// Classify regions where matched points are more than `threshold` apart.
pub fn classify_by_distance(
    alignment: &Alignment,
    query: &[PlanarPoint],
    template: &[PlanarPoint],
    threshold: f64,
    min_region_fraction: f64,
) -> Vec<Region> {
    let classifier = Classifier::new(alignment, template, min_region_fraction);
    let mask: Vec<bool> = alignment
        .step_distances(query, template)
        .into_iter()
        .map(|d| d > threshold)
        .collect();

    label_runs(&mask)
        .into_iter()
        .map(|(start, end)| classifier.decide(RegionKind::Divergence, start, end))
        .collect()
}

/// `mask[k]` is true when `index[k]` did not advance from step `k - 1`.
fn stalled(index: &[usize]) -> Vec<bool> {
    std::iter::once(false)
        .chain(index.windows(2).map(|w| w[1] == w[0]))
        .collect()
}

struct Classifier<'a> {
    alignment: &'a Alignment,
    template: &'a [PlanarPoint],
    min_distance: f64,
}

impl<'a> Classifier<'a> {
    fn new(alignment: &'a Alignment, template: &'a [PlanarPoint], min_region_fraction: f64) -> Self {
        Self {
            alignment,
            template,
            min_distance: min_region_fraction * path_length(template),
        }
    }

    fn decide(&self, kind: RegionKind, start: usize, end: usize) -> Region {
        let index1 = &self.alignment.index1;
        let index2 = &self.alignment.index2;
        let span_query = index1[end] - index1[start];
        let span_template = index2[end] - index2[start];
        let template_distance = path_length(&self.template[index2[start]..=index2[end]]);

        let decision = if span_template > span_query && template_distance >= self.min_distance {
            RegionDecision::Patch
        } else {
            RegionDecision::Keep
        };

        debug!(
            "[Regions] {:?} {}..={} spans q={} t={} ({:.1}m) -> {:?}",
            kind, start, end, span_query, span_template, template_distance, decision
        );

        Region {
            start,
            end,
            kind,
            decision,
            template_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn along_x(xs: &[f64]) -> Vec<PlanarPoint> {
        xs.iter().map(|&x| PlanarPoint::new(x, 0.0)).collect()
    }

    fn alignment(index1: Vec<usize>, index2: Vec<usize>) -> Alignment {
        Alignment {
            index1,
            index2,
            distance: 0.0,
        }
    }

    #[test]
    fn test_label_runs() {
        assert!(label_runs(&[]).is_empty());
        assert!(label_runs(&[false, false]).is_empty());
        assert_eq!(label_runs(&[true]), vec![(0, 0)]);
        assert_eq!(
            label_runs(&[true, true, false, true, false, false, true, true]),
            vec![(0, 1), (3, 3), (6, 7)]
        );
    }

    #[test]
    fn test_deletion_is_patched_and_insertion_kept() {
        // Steps: (0,0) (0,1) (0,2) (1,3) (2,3) (3,3) (4,4)
        let a = alignment(vec![0, 0, 0, 1, 2, 3, 4], vec![0, 1, 2, 3, 3, 3, 4]);
        let template = along_x(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let regions = classify_by_repetition(&a, &template, 0.0);

        assert_eq!(regions.len(), 2);
        let deletion = &regions[0];
        assert_eq!(deletion.kind, RegionKind::Deletion);
        assert_eq!((deletion.start, deletion.end), (0, 2));
        assert!(deletion.is_patch());
        assert_eq!(deletion.template_distance, 2.0);
        assert_eq!(deletion.len(), 3);

        let insertion = &regions[1];
        assert_eq!(insertion.kind, RegionKind::Insertion);
        assert_eq!((insertion.start, insertion.end), (3, 5));
        assert_eq!(insertion.decision, RegionDecision::Keep);
        assert_eq!(insertion.template_distance, 0.0);
    }

    #[test]
    fn test_short_regions_are_suppressed() {
        let a = alignment(vec![0, 0, 1, 2, 3], vec![0, 1, 2, 3, 4]);
        // Template length 100, the deletion covers 1
        let template = along_x(&[0.0, 1.0, 50.0, 75.0, 100.0]);

        let regions = classify_by_repetition(&a, &template, 0.02);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].decision, RegionDecision::Keep);

        let regions = classify_by_repetition(&a, &template, 0.0);
        assert!(regions[0].is_patch());
    }

    #[test]
    fn test_divergence_regions() {
        let query = along_x(&[0.0, 1.0, 2.0, 3.0]);
        let template = vec![
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(1.0, 20.0),
            PlanarPoint::new(1.5, 25.0),
            PlanarPoint::new(2.0, 20.0),
            PlanarPoint::new(3.0, 0.0),
        ];
        // Steps: (0,0) (1,1) (1,2) (2,3) (3,4)
        let a = alignment(vec![0, 1, 1, 2, 3], vec![0, 1, 2, 3, 4]);
        let regions = classify_by_distance(&a, &query, &template, 10.0, 0.0);

        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.kind, RegionKind::Divergence);
        assert_eq!((region.start, region.end), (1, 3));
        // Template advanced 1 -> 3, query 1 -> 2
        assert!(region.is_patch());
    }

    #[test]
    fn test_divergence_with_equal_spans_is_kept() {
        let query = along_x(&[0.0, 1.0, 2.0]);
        let template = vec![
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(1.0, 30.0),
            PlanarPoint::new(2.0, 30.0),
        ];
        let a = alignment(vec![0, 1, 2], vec![0, 1, 2]);
        let regions = classify_by_distance(&a, &query, &template, 10.0, 0.0);
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].start, regions[0].end), (1, 2));
        assert_eq!(regions[0].decision, RegionDecision::Keep);
    }
}
