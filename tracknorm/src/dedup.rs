//! Identity-key dedup and the storage seam.
//!
//! A track's identity is its `source_track_timestamp`. The dedup engine
//! admits each key at most once: never when the store already holds it,
//! and never twice within one batch (overlapping input files contain the
//! same source track).

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackNormError};
use crate::DrivingTrack;

/// Append-only collection of tracks keyed by source track timestamp.
pub trait TrackStore {
    type Error;

    /// All identity keys currently stored.
    fn existing_timestamps(&self) -> std::result::Result<HashSet<DateTime<Utc>>, Self::Error>;

    /// Append tracks in one write; returns the number stored.
    fn append(&mut self, tracks: &[DrivingTrack]) -> std::result::Result<usize, Self::Error>;
}

/// Outcome of offering a track to the dedup engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Key already present in the store.
    InStore,
    /// Key already admitted earlier in this batch.
    InBatch,
    /// Too few coordinates to form a geometry.
    NoGeometry,
}

/// Admits tracks against the store's keys and the keys of the batch so far.
#[derive(Debug, Clone)]
pub struct DedupEngine {
    existing: HashSet<DateTime<Utc>>,
    admitted: HashSet<DateTime<Utc>>,
    min_points: usize,
}

impl DedupEngine {
    pub fn new(existing: HashSet<DateTime<Utc>>) -> Self {
        Self {
            existing,
            admitted: HashSet::new(),
            min_points: 2,
        }
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Decide whether a track may be appended, recording its key if so.
    pub fn admit(&mut self, track: &DrivingTrack) -> Admission {
        let key = track.source_track_timestamp;

        if let Err(e) = track.validate(self.min_points) {
            log::warn!("[Dedup] Skipping track: {}", e);
            return Admission::NoGeometry;
        }
        if self.existing.contains(&key) {
            log::warn!("[Dedup] Skipping track {}: already in the driving log", key);
            return Admission::InStore;
        }
        if !self.admitted.insert(key) {
            log::warn!("[Dedup] Skipping track {}: already imported in this batch", key);
            return Admission::InBatch;
        }

        log::info!("[Dedup] Accepted track {}", key);
        Admission::Accepted
    }

    /// Number of tracks accepted so far.
    pub fn accepted_count(&self) -> usize {
        self.admitted.len()
    }
}

/// Summary of one merge into a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub appended: usize,
    pub skipped_in_store: Vec<DateTime<Utc>>,
    pub skipped_in_batch: Vec<DateTime<Utc>>,
    pub skipped_no_geometry: Vec<DateTime<Utc>>,
}

impl MergeReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped_in_store.len() + self.skipped_in_batch.len() + self.skipped_no_geometry.len()
    }
}

/// Merge a batch of tracks into a store.
///
/// Fetches the store's keys once, admits tracks in order, and appends the
/// accepted ones in a single write. Nothing is written when nothing is
/// accepted.
pub fn merge_into_store<S: TrackStore>(
    store: &mut S,
    tracks: &[DrivingTrack],
    min_points: usize,
) -> std::result::Result<MergeReport, S::Error> {
    let existing = store.existing_timestamps()?;
    let mut engine = DedupEngine::new(existing).with_min_points(min_points);
    let mut report = MergeReport::default();
    let mut accepted = Vec::new();

    for track in tracks {
        let key = track.source_track_timestamp;
        match engine.admit(track) {
            Admission::Accepted => accepted.push(track.clone()),
            Admission::InStore => report.skipped_in_store.push(key),
            Admission::InBatch => report.skipped_in_batch.push(key),
            Admission::NoGeometry => report.skipped_no_geometry.push(key),
        }
    }

    log::debug!(
        "[Dedup] Accepted {} of {} tracks",
        engine.accepted_count(),
        tracks.len()
    );
    if !accepted.is_empty() {
        report.appended = store.append(&accepted)?;
    }
    log::info!(
        "[Dedup] Appended {} tracks, skipped {}",
        report.appended,
        report.skipped_count()
    );
    Ok(report)
}

/// Store kept in memory, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackStore {
    tracks: BTreeMap<DateTime<Utc>, DrivingTrack>,
}

impl InMemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, key: &DateTime<Utc>) -> Option<&DrivingTrack> {
        self.tracks.get(key)
    }

    /// Stored tracks ordered by start time.
    pub fn tracks_by_start(&self) -> Vec<&DrivingTrack> {
        let mut tracks: Vec<&DrivingTrack> = self.tracks.values().collect();
        tracks.sort_by_key(|t| t.utc_start);
        tracks
    }
}

impl TrackStore for InMemoryTrackStore {
    type Error = TrackNormError;

    fn existing_timestamps(&self) -> Result<HashSet<DateTime<Utc>>> {
        Ok(self.tracks.keys().copied().collect())
    }

    /// All-or-nothing: a key that is already stored (or repeated in the
    /// batch) rejects the whole append.
    fn append(&mut self, tracks: &[DrivingTrack]) -> Result<usize> {
        let mut keys = HashSet::new();
        for track in tracks {
            let key = track.source_track_timestamp;
            if self.tracks.contains_key(&key) || !keys.insert(key) {
                return Err(TrackNormError::DuplicateTrack { timestamp: key });
            }
        }
        for track in tracks {
            self.tracks.insert(track.source_track_timestamp, track.clone());
        }
        Ok(tracks.len())
    }
}
