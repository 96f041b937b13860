//! The canonical output unit of the pipeline.

use chrono::{DateTime, Utc};
use geo::{Coord, MultiLineString};
use serde::{Deserialize, Serialize};

use crate::antimeridian::{split_antimeridian, CrossingDetection};
use crate::error::{Result, TrackNormError};
use crate::geo_utils::polyline_length;
use crate::simplify::simplify_coords;
use crate::Segment;

/// Descriptive attributes stored with a track. All optional; unset values
/// are stored as nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackMetadata {
    pub creator: Option<String>,
    pub role: Option<String>,
    pub vehicle_owner: Option<String>,
    /// Stored in the `comments` column.
    pub description: Option<String>,
}

impl TrackMetadata {
    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: &TrackMetadata) -> Self {
        Self {
            creator: self.creator.or_else(|| defaults.creator.clone()),
            role: self.role.or_else(|| defaults.role.clone()),
            vehicle_owner: self.vehicle_owner.or_else(|| defaults.vehicle_owner.clone()),
            description: self.description.or_else(|| defaults.description.clone()),
        }
    }
}

/// A normalized drive, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DrivingTrack {
    /// Earliest point time of the originating segment; the identity key.
    pub source_track_timestamp: DateTime<Utc>,
    /// Simplified path, `x` = longitude, `y` = latitude.
    pub coords: Vec<Coord<f64>>,
    /// Line parts split at the antimeridian. `None` with fewer than two
    /// coordinates.
    pub geometry: Option<MultiLineString<f64>>,
    pub utc_start: DateTime<Utc>,
    pub utc_stop: DateTime<Utc>,
    pub metadata: TrackMetadata,
}

impl DrivingTrack {
    /// Build a track from a processed segment.
    ///
    /// Geometry construction uses positions only: the path is simplified
    /// with `epsilon` and then split at antimeridian crossings.
    pub fn from_segment(
        segment: &Segment,
        metadata: TrackMetadata,
        epsilon: f64,
        detection: CrossingDetection,
    ) -> Self {
        let raw: Vec<Coord<f64>> = segment.points().iter().map(|p| p.coord()).collect();
        let coords = simplify_coords(&raw, epsilon);

        let geometry = if coords.len() >= 2 {
            let lines = split_antimeridian(&coords, detection);
            (!lines.0.is_empty()).then_some(lines)
        } else {
            None
        };

        Self {
            source_track_timestamp: segment.earliest_time(),
            coords,
            geometry,
            utc_start: segment.start_time(),
            utc_stop: segment.end_time(),
            metadata,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    /// Check that the track can be stored.
    pub fn validate(&self, min_points: usize) -> Result<()> {
        let minimum_required = min_points.max(2);
        if self.geometry.is_none() || self.coords.len() < minimum_required {
            return Err(TrackNormError::GeometryConstruction {
                timestamp: self.source_track_timestamp,
                point_count: self.coords.len(),
                minimum_required,
            });
        }
        Ok(())
    }

    /// Geometry as plain `(lon, lat)` line parts.
    pub fn line_parts(&self) -> Vec<Vec<(f64, f64)>> {
        self.geometry
            .iter()
            .flat_map(|lines| lines.0.iter())
            .map(|line| line.0.iter().map(|c| (c.x, c.y)).collect())
            .collect()
    }

    /// Length over all line parts in meters.
    pub fn length_m(&self) -> f64 {
        self.geometry
            .iter()
            .flat_map(|lines| lines.0.iter())
            .map(|line| polyline_length(&line.0))
            .sum()
    }
}
