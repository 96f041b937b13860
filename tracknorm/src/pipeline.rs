//! Stage orchestration per input file.
//!
//! For each track of a file, segments run through the stages the file's
//! profile lists, in order. Every resulting segment becomes a candidate
//! [`DrivingTrack`]; what happened along the way is reported as
//! [`TrackDecision`]s so callers can audit a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::antimeridian::CrossingDetection;
use crate::error::{OptionExt, Result};
use crate::outliers::{remove_outliers, OutlierConfig, OutlierRecord};
use crate::profile::{Profile, ProfileId, ProfileTable, Stage};
use crate::segments::{merge_segments, split_segments};
use crate::speed::annotate_speeds;
use crate::speed_filter::{filter_speed, trim_segment};
use crate::timelog::Timelog;
use crate::track::{DrivingTrack, TrackMetadata};
use crate::{Segment, SourceFile, SourceTrack};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-device overrides of the built-in profiles.
    pub profiles: ProfileTable,
    /// Minimum coordinates a track needs to be stored. Default: 2
    pub min_points: usize,
    /// Segment start times excluded from processing.
    pub ignore: Vec<DateTime<Utc>>,
    pub outliers: OutlierConfig,
    pub antimeridian: CrossingDetection,
    /// Fail the file when a segment has no timelog overlap, instead of
    /// skipping the segment. Default: true
    pub strict_reference: bool,
    /// Attribute values for tracks that do not carry their own.
    pub track_defaults: TrackMetadata,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profiles: ProfileTable::default(),
            min_points: 2,
            ignore: Vec::new(),
            outliers: OutlierConfig::default(),
            antimeridian: CrossingDetection::default(),
            strict_reference: true,
            track_defaults: TrackMetadata::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.profiles.validate()
    }
}

/// What happened to a segment on its way through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackDecision {
    /// Start time is on the ignore list.
    Ignored { start: DateTime<Utc> },
    /// Excluded without an error, e.g. no timelog overlap when the
    /// reference is not strict, or an empty raw segment.
    Skipped { start: Option<DateTime<Utc>>, reason: String },
    /// Filtered away or left without a valid geometry.
    Dropped { start: DateTime<Utc>, reason: String },
    /// Consecutive segments were joined.
    Merged { segments: usize, result: usize },
    /// One segment was cut into `parts`.
    Split { start: DateTime<Utc>, parts: usize },
    /// A track candidate was produced.
    Kept { key: DateTime<Utc>, coords: usize },
}

/// Result of processing one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_name: String,
    pub profile: ProfileId,
    /// Candidates in source order; not yet deduplicated.
    pub tracks: Vec<DrivingTrack>,
    pub outliers: Vec<OutlierRecord>,
    pub decisions: Vec<TrackDecision>,
}

impl FileOutcome {
    fn new(file_name: &str, profile: ProfileId) -> Self {
        Self {
            file_name: file_name.to_string(),
            profile,
            tracks: Vec::new(),
            outliers: Vec::new(),
            decisions: Vec::new(),
        }
    }
}

/// Track normalization pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    timelog: Timelog,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            timelog: Timelog::default(),
        }
    }

    /// Attach the engine timelog used by [`Stage::Timelog`].
    pub fn with_timelog(mut self, timelog: Timelog) -> Self {
        self.timelog = timelog;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every track of a file through its profile's stages.
    ///
    /// Fails only when a strict external reference cannot be satisfied;
    /// every other anomaly is logged and reported as a decision.
    pub fn process_file(&self, file: &SourceFile) -> Result<FileOutcome> {
        let profile = self.config.profiles.resolve(&file.creator);
        log::info!(
            "[Pipeline] {}: creator {:?} uses profile {} ({} points)",
            file.file_name,
            file.creator,
            profile.id,
            file.point_count()
        );

        let mut outcome = FileOutcome::new(&file.file_name, profile.id);
        for track in &file.tracks {
            self.process_track(file, track, &profile, &mut outcome)?;
        }

        log::info!(
            "[Pipeline] {}: {} track candidates, {} outliers removed",
            file.file_name,
            outcome.tracks.len(),
            outcome.outliers.len()
        );
        Ok(outcome)
    }

    fn process_track(
        &self,
        file: &SourceFile,
        track: &SourceTrack,
        profile: &Profile,
        outcome: &mut FileOutcome,
    ) -> Result<()> {
        let mut segments = Vec::with_capacity(track.segments.len());
        for raw in &track.segments {
            let parsed = Segment::new(raw.clone()).ok_or_malformed("segment has no points");
            let segment = match parsed {
                Ok(segment) => segment,
                Err(e) => {
                    log::warn!("[Pipeline] {}: {}", file.file_name, e);
                    outcome.decisions.push(TrackDecision::Skipped {
                        start: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if self.is_ignored(&segment) {
                log::info!("[Pipeline] Ignoring segment at {}", segment.start_time());
                outcome.decisions.push(TrackDecision::Ignored {
                    start: segment.start_time(),
                });
                continue;
            }
            segments.push(segment);
        }

        for segment in &mut segments {
            annotate_speeds(segment.points_mut(), profile);
        }

        for stage in &profile.stages {
            segments = self.apply_stage(*stage, segments, file, profile, outcome)?;
        }

        let metadata = TrackMetadata {
            creator: (!file.creator.is_empty()).then(|| file.creator.clone()),
            description: track.name.clone(),
            ..Default::default()
        }
        .or(&self.config.track_defaults);

        for segment in segments {
            if self.is_ignored(&segment) {
                log::info!("[Pipeline] Ignoring processed segment at {}", segment.start_time());
                outcome.decisions.push(TrackDecision::Ignored {
                    start: segment.start_time(),
                });
                continue;
            }

            let driving_track = DrivingTrack::from_segment(
                &segment,
                metadata.clone(),
                profile.simplify_epsilon,
                self.config.antimeridian,
            );
            match driving_track.validate(self.config.min_points) {
                Ok(()) => {
                    log::info!(
                        "[Pipeline] Track {}: {} -> {} coordinates, {:.1} km",
                        driving_track.source_track_timestamp,
                        segment.point_count(),
                        driving_track.coords.len(),
                        driving_track.length_m() / 1000.0
                    );
                    outcome.decisions.push(TrackDecision::Kept {
                        key: driving_track.source_track_timestamp,
                        coords: driving_track.coords.len(),
                    });
                    outcome.tracks.push(driving_track);
                }
                Err(e) => {
                    log::warn!("[Pipeline] {}", e);
                    outcome.decisions.push(TrackDecision::Dropped {
                        start: segment.start_time(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_stage(
        &self,
        stage: Stage,
        segments: Vec<Segment>,
        file: &SourceFile,
        profile: &Profile,
        outcome: &mut FileOutcome,
    ) -> Result<Vec<Segment>> {
        let result = match stage {
            Stage::RemoveOutliers => segments
                .into_iter()
                .map(|segment| {
                    let (cleaned, records) =
                        remove_outliers(segment, &file.file_name, &self.config.outliers);
                    outcome.outliers.extend(records);
                    cleaned
                })
                .collect(),
            Stage::FilterSpeed => filter_each(segments, outcome, "no points above minimum speed", |s| {
                filter_speed(s, profile)
            }),
            Stage::Trim => filter_each(segments, outcome, "no points left after trim", |s| {
                trim_segment(s, profile)
            }),
            Stage::SplitSegments => {
                let mut result = Vec::with_capacity(segments.len());
                for segment in segments {
                    let start = segment.start_time();
                    let parts = split_segments(vec![segment], profile.split_gap_threshold_seconds);
                    if parts.len() > 1 {
                        outcome.decisions.push(TrackDecision::Split {
                            start,
                            parts: parts.len(),
                        });
                    }
                    result.extend(parts);
                }
                result
            }
            Stage::MergeSegments => {
                let count = segments.len();
                let merged = merge_segments(segments, profile.merge_max_gap_seconds);
                if merged.len() < count {
                    outcome.decisions.push(TrackDecision::Merged {
                        segments: count,
                        result: merged.len(),
                    });
                }
                merged
            }
            Stage::Timelog => {
                let mut result = Vec::with_capacity(segments.len());
                for segment in segments {
                    match self.timelog.filter_segment(&segment) {
                        Ok(parts) => result.extend(parts),
                        Err(e) if !self.config.strict_reference => {
                            log::warn!("[Pipeline] {}: skipping segment: {}", file.file_name, e);
                            outcome.decisions.push(TrackDecision::Skipped {
                                start: Some(segment.start_time()),
                                reason: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
                result
            }
        };
        Ok(result)
    }

    fn is_ignored(&self, segment: &Segment) -> bool {
        self.config.ignore.contains(&segment.start_time())
            || self.config.ignore.contains(&segment.earliest_time())
    }
}

/// Apply a filter that may consume a whole segment.
fn filter_each<F>(
    segments: Vec<Segment>,
    outcome: &mut FileOutcome,
    reason: &str,
    mut filter: F,
) -> Vec<Segment>
where
    F: FnMut(Segment) -> Option<Segment>,
{
    segments
        .into_iter()
        .filter_map(|segment| {
            let start = segment.start_time();
            let kept = filter(segment);
            if kept.is_none() {
                log::warn!("[Pipeline] Dropping segment at {}: {}", start, reason);
                outcome.decisions.push(TrackDecision::Dropped {
                    start,
                    reason: reason.to_string(),
                });
            }
            kept
        })
        .collect()
}
