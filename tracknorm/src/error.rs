//! Unified error handling for the tracknorm pipeline.
//!
//! Most anomalies in raw device data are not errors: filters that cannot run
//! pass their input through and log a notice. The variants here cover the
//! conditions a caller has to decide about.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unified error type for pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum TrackNormError {
    /// A segment lacks what an operation needs (points, timestamps).
    #[error("Malformed segment: {reason}")]
    MalformedSegment { reason: String },

    /// A segment could not be correlated with any interval of a required
    /// external reference (e.g. the engine timelog).
    #[error("Segment {segment_start} - {segment_stop} has no overlap with the {reference}")]
    NoOverlap {
        reference: String,
        segment_start: DateTime<Utc>,
        segment_stop: DateTime<Utc>,
    },

    /// A track whose identity key is already known.
    #[error("Track {timestamp} is already in the driving log")]
    DuplicateTrack { timestamp: DateTime<Utc> },

    /// A track was reduced below the minimum number of coordinates.
    #[error("Track {timestamp} has {point_count} points, minimum {minimum_required} required")]
    GeometryConstruction {
        timestamp: DateTime<Utc>,
        point_count: usize,
        minimum_required: usize,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for tracknorm operations.
pub type Result<T> = std::result::Result<T, TrackNormError>;

/// Extension trait for converting Option to TrackNormError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a malformed segment error.
    fn ok_or_malformed(self, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed(self, reason: &str) -> Result<T> {
        self.ok_or_else(|| TrackNormError::MalformedSegment {
            reason: reason.to_string(),
        })
    }
}
