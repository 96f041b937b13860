//! # Tracknorm
//!
//! Device-aware normalization of raw GPS track logs and idempotent merging
//! into an append-only driving log.
//!
//! This library provides:
//! - Device profile resolution and speed extraction from vendor extensions
//! - Outlier removal (time travel and teleportation)
//! - Rolling-median speed filtering and edge trimming
//! - Segment splitting and merging on time gaps
//! - Spherical Ramer-Douglas-Peucker simplification
//! - Antimeridian-aware geometry construction
//! - Dedup by source track timestamp against a [`TrackStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use tracknorm::{Pipeline, PipelineConfig, RawPoint, SourceFile, SourceTrack};
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
//! let points: Vec<RawPoint> = (0..20)
//!     .map(|i| RawPoint::new(start + Duration::seconds(i * 5), 42.0 + i as f64 * 0.0005, -71.0))
//!     .collect();
//!
//! let file = SourceFile {
//!     file_name: "drive.gpx".to_string(),
//!     creator: "Unknown Logger".to_string(),
//!     tracks: vec![SourceTrack { name: None, segments: vec![points] }],
//! };
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let outcome = pipeline.process_file(&file).unwrap();
//! assert_eq!(outcome.tracks.len(), 1);
//! assert_eq!(outcome.tracks[0].source_track_timestamp, start);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackNormError};

// Geographic utilities (haversine, spherical trigonometry)
pub mod geo_utils;

// Device profiles and the profile resolver
pub mod profile;
pub use profile::{
    resolve_profile, Profile, ProfileId, ProfileOverride, ProfileTable, RollingMethod, SpeedField,
    Stage,
};

// Speed extraction from auxiliary fields
pub mod speed;
pub use speed::{extract_speed, speed_series};

// Time travel and teleportation removal
pub mod outliers;
pub use outliers::{remove_outliers, OutlierConfig, OutlierKind, OutlierRecord};

// Rolling-median speed filter and edge trim
pub mod speed_filter;
pub use speed_filter::{filter_speed, trim_segment};

// Segment splitting and merging on time gaps
pub mod segments;
pub use segments::{merge_segments, split_segments};

// Engine-running intervals used as an external reference filter
pub mod timelog;
pub use timelog::{Timelog, TimelogEntry, TimelogInterval, TimelogStatus};

// Spherical Ramer-Douglas-Peucker
pub mod simplify;
pub use simplify::{simplify_coords, simplify_indices};

// Antimeridian-aware geometry construction
pub mod antimeridian;
pub use antimeridian::{split_antimeridian, CrossingDetection};

// Canonical output unit
pub mod track;
pub use track::{DrivingTrack, TrackMetadata};

// Identity-key dedup and the storage seam
pub mod dedup;
pub use dedup::{
    merge_into_store, Admission, DedupEngine, InMemoryTrackStore, MergeReport, TrackStore,
};

// Stage orchestration per input file
pub mod pipeline;
pub use pipeline::{FileOutcome, Pipeline, PipelineConfig, TrackDecision};

// ============================================================================
// Core Types
// ============================================================================

/// Device-specific auxiliary fields of a point, keyed by qualified element
/// name (`{namespace}local`). Opaque to everything except the speed
/// extractor.
pub type AuxFields = BTreeMap<String, String>;

/// A single recorded GPS sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    /// Instantaneous speed in m/s, filled in by the speed extractor.
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: AuxFields,
}

impl RawPoint {
    /// Create a point with no elevation, speed or auxiliary fields.
    pub fn new(time: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            elevation: None,
            speed: None,
            aux: AuxFields::new(),
        }
    }

    /// Attach an auxiliary field.
    pub fn with_aux(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aux.insert(key.into(), value.into());
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Coordinate in geo's x = longitude, y = latitude convention.
    pub fn coord(&self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// A contiguous run of points as grouped by the recording device.
///
/// Never empty. Points are expected in ascending time order; the outlier
/// filter repairs devices that violate this.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    points: Vec<RawPoint>,
}

impl Segment {
    /// Returns `None` for an empty point list.
    pub fn new(points: Vec<RawPoint>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    pub fn points(&self) -> &[RawPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<RawPoint> {
        self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> &RawPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &RawPoint {
        &self.points[self.points.len() - 1]
    }

    /// Time of the first point.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.first().time
    }

    /// Time of the last point.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.last().time
    }

    /// Earliest point time; the identity key of tracks built from this segment.
    pub fn earliest_time(&self) -> DateTime<Utc> {
        self.points
            .iter()
            .map(|p| p.time)
            .min()
            .unwrap_or_else(|| self.start_time())
    }

    /// Mutable access to the points; the length cannot change.
    pub(crate) fn points_mut(&mut self) -> &mut [RawPoint] {
        &mut self.points
    }
}

/// One track of a parsed input file.
#[derive(Debug, Clone, Default)]
pub struct SourceTrack {
    /// Opaque descriptive label from the file.
    pub name: Option<String>,
    /// Raw segments; empty ones are skipped by the pipeline.
    pub segments: Vec<Vec<RawPoint>>,
}

/// Generic in-memory form of one input file as produced by a parser.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub file_name: String,
    /// Free-text device/creator string from the file header.
    pub creator: String,
    pub tracks: Vec<SourceTrack>,
}

impl SourceFile {
    /// Earliest first-point time across all segments.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .filter_map(|s| s.first().map(|p| p.time))
            .min()
    }

    pub fn point_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .map(|s| s.len())
            .sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
