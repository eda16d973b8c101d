//! # Temporal Patching
//!
//! Fills time gaps in a query track with template points recorded during the
//! gap. Geometry is never consulted.
//!
//! The merge is a walk with two cursors (query index, template index) through
//! three phases:
//!
//! - **Leading**: template points recorded before the query started, if the
//!   template starts at least `max_time_gap_seconds` earlier
//! - **Sync**: every query point exactly once, with template points inserted
//!   after each query point whose successor is `max_time_gap_seconds` or more
//!   later
//! - **Trailing**: template points recorded from the query end onwards, if the
//!   template ends at least `max_time_gap_seconds` later
//!
//! Query points are emitted unchanged. Template points are sanitized.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{require_points, require_valid_coordinates, OptionExt, PatchError, Result};
use crate::{PatchedTrack, Track, TrackPoint};

/// Label suffix for tracks produced by this strategy
pub const TEMPORAL_SUFFIX: &str = " patched (simple time algo)";

/// Configuration for temporal patching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Query gaps of at least this many seconds are filled from the template.
    /// Default: 30.0
    pub max_time_gap_seconds: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            max_time_gap_seconds: 30.0,
        }
    }
}

impl TemporalConfig {
    pub fn new(max_time_gap_seconds: f64) -> Self {
        Self {
            max_time_gap_seconds,
        }
    }

    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| PatchError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_time_gap_seconds.is_finite() || self.max_time_gap_seconds <= 0.0 {
            return Err(PatchError::Config {
                message: format!(
                    "max_time_gap_seconds must be a positive number, got {}",
                    self.max_time_gap_seconds
                ),
            });
        }
        Ok(())
    }
}

/// One query gap and how it was filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFill {
    /// Index of the query point before the gap
    pub query_index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Template points inserted into the gap
    pub filled_points: usize,
}

impl GapFill {
    pub fn is_filled(&self) -> bool {
        self.filled_points > 0
    }
}

/// Result of temporal patching
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalPatch {
    pub track: PatchedTrack,
    /// False if some query gap had no template coverage and was left as is
    pub fully_covered: bool,
    /// Every query gap at or above the threshold, in time order
    pub gaps: Vec<GapFill>,
    /// Template points emitted before the query start
    pub leading_points: usize,
    /// Template points emitted after the query end
    pub trailing_points: usize,
}

/// Signed number of seconds from `earlier` to `later`.
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9
}

/// Patch time gaps in `query` with points from `template`.
///
/// Every point of both tracks must have valid coordinates and carry a
/// timestamp, and each track must be in non-decreasing time order.
pub fn patch_temporal(
    query: &Track,
    template: &Track,
    config: &TemporalConfig,
) -> Result<TemporalPatch> {
    config.validate()?;
    let query_times = timestamps(query)?;
    let template_times = timestamps(template)?;

    let mut walk = TimeWalk {
        query: &query.points,
        query_times: &query_times,
        template: &template.points,
        template_times: &template_times,
        max_gap: config.max_time_gap_seconds,
        cursor: 0,
        output: Vec::with_capacity(query.len() + template.len()),
        gaps: Vec::new(),
        leading_points: 0,
        trailing_points: 0,
    };
    walk.run();

    let fully_covered = walk.gaps.iter().all(GapFill::is_filled);
    info!(
        "[Temporal] '{}' ({} pts) + '{}' ({} pts): {} gaps, {} leading, {} trailing, {} output pts",
        query.name,
        query.len(),
        template.name,
        template.len(),
        walk.gaps.len(),
        walk.leading_points,
        walk.trailing_points,
        walk.output.len()
    );

    Ok(TemporalPatch {
        track: PatchedTrack::labelled(query, TEMPORAL_SUFFIX, walk.output),
        fully_covered,
        gaps: walk.gaps,
        leading_points: walk.leading_points,
        trailing_points: walk.trailing_points,
    })
}

/// Extract timestamps, checking coordinates, presence and order.
fn timestamps(track: &Track) -> Result<Vec<DateTime<Utc>>> {
    require_points(&track.name, track.len(), 1)?;
    require_valid_coordinates(track)?;
    let mut times = Vec::with_capacity(track.len());
    for (index, point) in track.points.iter().enumerate() {
        let time = point.time.ok_or_missing_timestamp(&track.name, index)?;
        if times.last().is_some_and(|&previous| time < previous) {
            return Err(PatchError::UnsortedInput {
                track: track.name.clone(),
                index,
            });
        }
        times.push(time);
    }
    Ok(times)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Leading,
    Sync(usize),
    Trailing,
    Done,
}

struct TimeWalk<'a> {
    query: &'a [TrackPoint],
    query_times: &'a [DateTime<Utc>],
    template: &'a [TrackPoint],
    template_times: &'a [DateTime<Utc>],
    max_gap: f64,
    /// Next template point not yet emitted or skipped
    cursor: usize,
    output: Vec<TrackPoint>,
    gaps: Vec<GapFill>,
    leading_points: usize,
    trailing_points: usize,
}

impl TimeWalk<'_> {
    fn run(&mut self) {
        let mut phase = Phase::Leading;
        while phase != Phase::Done {
            phase = self.step(phase);
        }
    }

    fn step(&mut self, phase: Phase) -> Phase {
        match phase {
            Phase::Leading => {
                let query_start = self.query_times[0];
                if seconds_between(query_start, self.template_times[0]) >= self.max_gap {
                    self.leading_points = self.emit_template_before(query_start);
                }
                Phase::Sync(0)
            }
            Phase::Sync(i) => {
                self.output.push(self.query[i].clone());
                if i + 1 == self.query.len() {
                    return Phase::Trailing;
                }
                let (start, end) = (self.query_times[i], self.query_times[i + 1]);
                let gap = seconds_between(end, start);
                if gap >= self.max_gap {
                    self.skip_template_before(start);
                    let filled_points = self.emit_template_before(end);
                    if filled_points == 0 {
                        warn!(
                            "[Temporal] No template coverage for {:.0}s gap after query point {}",
                            gap, i
                        );
                    }
                    self.gaps.push(GapFill {
                        query_index: i,
                        start,
                        end,
                        duration_seconds: gap,
                        filled_points,
                    });
                }
                Phase::Sync(i + 1)
            }
            Phase::Trailing => {
                let query_end = self.query_times[self.query_times.len() - 1];
                let template_end = self.template_times[self.template_times.len() - 1];
                if seconds_between(template_end, query_end) >= self.max_gap {
                    self.skip_template_before(query_end);
                    let template = self.template;
                    let remaining = &template[self.cursor..];
                    self.output.extend(remaining.iter().map(TrackPoint::sanitized));
                    self.trailing_points = remaining.len();
                    self.cursor = self.template.len();
                }
                Phase::Done
            }
            Phase::Done => Phase::Done,
        }
    }

    /// Advance the cursor past template points strictly before `time`.
    fn skip_template_before(&mut self, time: DateTime<Utc>) {
        while self.cursor < self.template.len() && self.template_times[self.cursor] < time {
            self.cursor += 1;
        }
    }

    /// Emit template points strictly before `time`, returning how many.
    fn emit_template_before(&mut self, time: DateTime<Utc>) -> usize {
        let first = self.cursor;
        while self.cursor < self.template.len() && self.template_times[self.cursor] < time {
            self.output.push(self.template[self.cursor].sanitized());
            self.cursor += 1;
        }
        self.cursor - first
    }
}
