//! Unified error handling for the track-patcher library.
//!
//! Every patching operation returns [`Result`]. Errors are raised at the point
//! of detection and never retried; no partial output is produced on failure.

use thiserror::Error;

use crate::Track;

/// Unified error type for patching operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// A track has fewer points than the operation needs
    #[error("Track '{track}' has {point_count} points, minimum {minimum_required} required")]
    EmptyInput {
        track: String,
        point_count: usize,
        minimum_required: usize,
    },
    /// A point has non-finite or out-of-range coordinates
    #[error("Track '{track}' has invalid coordinates at point {index}")]
    InvalidCoordinates { track: String, index: usize },
    /// Coordinate arity mismatch during projection
    #[error("Shape error: {message}")]
    Shape { message: String },
    /// Timestamps go backwards
    #[error("Track '{track}' is not time-ordered at point {index}")]
    UnsortedInput { track: String, index: usize },
    /// The temporal strategy needs a timestamp on every point
    #[error("Track '{track}' has no timestamp at point {index}")]
    MissingTimestamp { track: String, index: usize },
    /// Invalid parameters
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for patching operations.
pub type Result<T> = std::result::Result<T, PatchError>;

/// Extension trait for converting Option to PatchError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an empty input error.
    fn ok_or_empty_input(self, track: &str, point_count: usize, minimum: usize) -> Result<T>;

    /// Convert Option to Result with a missing timestamp error.
    fn ok_or_missing_timestamp(self, track: &str, index: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_empty_input(self, track: &str, point_count: usize, minimum: usize) -> Result<T> {
        self.ok_or_else(|| PatchError::EmptyInput {
            track: track.to_string(),
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_missing_timestamp(self, track: &str, index: usize) -> Result<T> {
        self.ok_or_else(|| PatchError::MissingTimestamp {
            track: track.to_string(),
            index,
        })
    }
}

/// Fail with [`PatchError::EmptyInput`] if `len < minimum`.
pub(crate) fn require_points(track: &str, len: usize, minimum: usize) -> Result<()> {
    if len < minimum {
        return Err(PatchError::EmptyInput {
            track: track.to_string(),
            point_count: len,
            minimum_required: minimum,
        });
    }
    Ok(())
}

/// Fail with [`PatchError::InvalidCoordinates`] at the first invalid point.
pub(crate) fn require_valid_coordinates(track: &Track) -> Result<()> {
    match track.first_invalid() {
        Some(index) => Err(PatchError::InvalidCoordinates {
            track: track.name.clone(),
            index,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PatchError::EmptyInput {
            track: "ride".to_string(),
            point_count: 1,
            minimum_required: 2,
        };
        assert!(err.to_string().contains("ride"));
        assert!(err.to_string().contains("1 points"));

        let err = PatchError::UnsortedInput {
            track: "run".to_string(),
            index: 7,
        };
        assert_eq!(err.to_string(), "Track 'run' is not time-ordered at point 7");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_empty_input("query", 0, 1);
        assert!(matches!(result, Err(PatchError::EmptyInput { .. })));

        let none: Option<i32> = None;
        assert_eq!(
            none.ok_or_missing_timestamp("template", 3),
            Err(PatchError::MissingTimestamp {
                track: "template".to_string(),
                index: 3
            })
        );
        assert_eq!(Some(5).ok_or_missing_timestamp("template", 0), Ok(5));
    }

    #[test]
    fn test_require_valid_coordinates() {
        use crate::TrackPoint;

        let mut track = Track::new(
            "ride",
            vec![TrackPoint::new(45.0, 7.0), TrackPoint::new(45.1, 7.0)],
        );
        assert!(require_valid_coordinates(&track).is_ok());

        track.points[1].longitude = 200.0;
        let err = require_valid_coordinates(&track).unwrap_err();
        assert_eq!(
            err,
            PatchError::InvalidCoordinates {
                track: "ride".to_string(),
                index: 1
            }
        );
        assert_eq!(err.to_string(), "Track 'ride' has invalid coordinates at point 1");
    }

    #[test]
    fn test_require_points() {
        assert!(require_points("q", 2, 2).is_ok());
        assert!(matches!(
            require_points("q", 1, 2),
            Err(PatchError::EmptyInput {
                point_count: 1,
                minimum_required: 2,
                ..
            })
        ));
    }
}
