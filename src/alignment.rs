//! Dynamic time warping between two planar point sequences.
//!
//! Classic DTW with unit step costs and both endpoints fixed:
//!
//! ```text
//! D[i][j] = d(i, j) + min(D[i-1][j-1], D[i-1][j], D[i][j-1])
//! ```
//!
//! The cost lattice is a single dense row-major buffer of `N * M` cells. Local
//! distances are written first, then accumulated in place. This matrix is the
//! dominant time and memory cost of spatial patching.

use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{require_points, Result};
use crate::projection::PlanarPoint;

/// Monotone correspondence between query and template indices.
///
/// `index1[k]` and `index2[k]` are the query and template positions matched
/// at warped step `k`. Both start at 0, end at the last index of their
/// sequence, and advance by 0 or 1 per step (never both 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub index1: Vec<usize>,
    pub index2: Vec<usize>,
    /// Accumulated distance along the warping path
    pub distance: f64,
}

impl Alignment {
    /// Number of warped steps.
    pub fn len(&self) -> usize {
        self.index1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index1.is_empty()
    }

    /// `(query index, template index)` pairs in path order.
    pub fn steps(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.index1.iter().copied().zip(self.index2.iter().copied())
    }

    /// Distance between the matched query and template point at each step.
    pub fn step_distances(&self, query: &[PlanarPoint], template: &[PlanarPoint]) -> Vec<f64> {
        self.steps()
            .map(|(i, j)| query[i].distance(&template[j]))
            .collect()
    }
}

/// Align `query` (N points) against `template` (M points).
///
/// Runs in O(N·M) time and memory. Ties in the backtrack prefer advancing
/// both indices, then the query only, then the template only, so identical
/// inputs always produce identical alignments.
///
/// Fails with `EmptyInput` if either sequence has fewer than 2 points.
pub fn align(query: &[PlanarPoint], template: &[PlanarPoint]) -> Result<Alignment> {
    require_points("query", query.len(), 2)?;
    require_points("template", template.len(), 2)?;

    let n = query.len();
    let m = template.len();
    let start = Instant::now();
    debug!(
        "[Alignment] Allocating {}x{} cost matrix ({} cells)",
        n,
        m,
        n * m
    );

    let mut cost = local_distances(query, template);
    accumulate(&mut cost, n, m);
    let (index1, index2) = backtrack(&cost, n, m);

    debug!(
        "[Alignment] {} warped steps in {}ms",
        index1.len(),
        start.elapsed().as_millis()
    );

    Ok(Alignment {
        index1,
        index2,
        distance: cost[n * m - 1],
    })
}

#[cfg(not(feature = "parallel"))]
fn local_distances(query: &[PlanarPoint], template: &[PlanarPoint]) -> Vec<f64> {
    let mut cost = Vec::with_capacity(query.len() * template.len());
    for q in query {
        cost.extend(template.iter().map(|t| q.distance(t)));
    }
    cost
}

#[cfg(feature = "parallel")]
fn local_distances(query: &[PlanarPoint], template: &[PlanarPoint]) -> Vec<f64> {
    let mut cost = vec![0.0; query.len() * template.len()];
    cost.par_chunks_mut(template.len())
        .zip(query.par_iter())
        .for_each(|(row, q)| {
            for (cell, t) in row.iter_mut().zip(template) {
                *cell = q.distance(t);
            }
        });
    cost
}

/// Turn local distances into accumulated costs, in place.
fn accumulate(cost: &mut [f64], n: usize, m: usize) {
    for j in 1..m {
        cost[j] += cost[j - 1];
    }
    for i in 1..n {
        let row = i * m;
        cost[row] += cost[row - m];
        for j in 1..m {
            let diag = cost[row - m + j - 1];
            let up = cost[row - m + j];
            let left = cost[row + j - 1];
            cost[row + j] += diag.min(up).min(left);
        }
    }
}

/// Walk back from `(n-1, m-1)` to `(0, 0)` along minimal predecessors.
fn backtrack(cost: &[f64], n: usize, m: usize) -> (Vec<usize>, Vec<usize>) {
    let (mut i, mut j) = (n - 1, m - 1);
    let mut index1 = Vec::with_capacity(n + m - 1);
    let mut index2 = Vec::with_capacity(n + m - 1);
    index1.push(i);
    index2.push(j);

    while i > 0 || j > 0 {
        (i, j) = if i == 0 {
            (0, j - 1)
        } else if j == 0 {
            (i - 1, 0)
        } else {
            let diag = cost[(i - 1) * m + j - 1];
            let up = cost[(i - 1) * m + j];
            let left = cost[i * m + j - 1];
            if diag <= up && diag <= left {
                (i - 1, j - 1)
            } else if up <= left {
                (i - 1, j)
            } else {
                (i, j - 1)
            }
        };
        index1.push(i);
        index2.push(j);
    }

    index1.reverse();
    index2.reverse();
    (index1, index2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatchError;

    fn along_x(xs: &[f64]) -> Vec<PlanarPoint> {
        xs.iter().map(|&x| PlanarPoint::new(x, 0.0)).collect()
    }

    fn assert_monotone(alignment: &Alignment, n: usize, m: usize) {
        assert_eq!(alignment.index1.len(), alignment.index2.len());
        assert_eq!(alignment.index1[0], 0);
        assert_eq!(alignment.index2[0], 0);
        assert_eq!(*alignment.index1.last().unwrap(), n - 1);
        assert_eq!(*alignment.index2.last().unwrap(), m - 1);
        for k in 1..alignment.len() {
            let d1 = alignment.index1[k] - alignment.index1[k - 1];
            let d2 = alignment.index2[k] - alignment.index2[k - 1];
            assert!(d1 <= 1 && d2 <= 1 && d1 + d2 >= 1, "bad step at {}", k);
        }
    }

    #[test]
    fn test_identical_sequences_align_diagonally() {
        let points = along_x(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let alignment = align(&points, &points).unwrap();
        assert_eq!(alignment.index1, vec![0, 1, 2, 3, 4]);
        assert_eq!(alignment.index2, vec![0, 1, 2, 3, 4]);
        assert_eq!(alignment.distance, 0.0);
    }

    #[test]
    fn test_denser_template_repeats_query_index() {
        let query = along_x(&[0.0, 2.0, 4.0]);
        let template = along_x(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let alignment = align(&query, &template).unwrap();
        assert_monotone(&alignment, 3, 5);
        assert_eq!(alignment.len(), 5);
        assert_eq!(alignment.index2, vec![0, 1, 2, 3, 4]);
        // Each odd template point is equally close to both neighbours; the
        // diagonal preference attaches it to the preceding query point.
        assert_eq!(alignment.index1, vec![0, 0, 1, 1, 2]);
        assert_eq!(alignment.distance, 2.0);
    }

    #[test]
    fn test_leading_template_extension() {
        // Template starts 3 units before the query
        let query = along_x(&[3.0, 4.0, 5.0, 6.0]);
        let template = along_x(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let alignment = align(&query, &template).unwrap();
        assert_monotone(&alignment, 4, 7);
        assert_eq!(&alignment.index1[..4], &[0, 0, 0, 0]);
        assert_eq!(&alignment.index2[..4], &[0, 1, 2, 3]);
        assert_eq!(alignment.distance, 6.0);
    }

    #[test]
    fn test_deterministic() {
        let query: Vec<PlanarPoint> = (0..40)
            .map(|i| {
                let a = i as f64 * 0.15;
                PlanarPoint::new(a.cos() * 10.0, a.sin() * 10.0)
            })
            .collect();
        let template: Vec<PlanarPoint> = (0..65)
            .map(|i| {
                let a = i as f64 * 0.1 - 0.5;
                PlanarPoint::new(a.cos() * 10.5, a.sin() * 10.5)
            })
            .collect();
        let first = align(&query, &template).unwrap();
        let second = align(&query, &template).unwrap();
        assert_eq!(first, second);
        assert_monotone(&first, 40, 65);
    }

    #[test]
    fn test_step_distances() {
        let query = along_x(&[0.0, 10.0]);
        let template = along_x(&[1.0, 11.0]);
        let alignment = align(&query, &template).unwrap();
        assert_eq!(alignment.step_distances(&query, &template), vec![1.0, 1.0]);
    }

    #[test]
    fn test_too_few_points() {
        let one = along_x(&[0.0]);
        let two = along_x(&[0.0, 1.0]);
        assert!(matches!(
            align(&one, &two),
            Err(PatchError::EmptyInput { ref track, .. }) if track == "query"
        ));
        assert!(matches!(
            align(&two, &one),
            Err(PatchError::EmptyInput { ref track, .. }) if track == "template"
        ));
    }
}
