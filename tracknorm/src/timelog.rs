//! Engine-running intervals used as an external reference filter.
//!
//! A timelog is a list of `+` (engine started) and `-` (engine stopped)
//! entries. Repeated starts or stops collapse into one interval that runs
//! from the earliest start to the latest stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackNormError};
use crate::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelogStatus {
    #[serde(rename = "+")]
    Start,
    #[serde(rename = "-")]
    Stop,
}

impl TimelogStatus {
    /// Parse the status column; anything but `+` or `-` is rejected.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "+" => Some(TimelogStatus::Start),
            "-" => Some(TimelogStatus::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelogEntry {
    pub time: DateTime<Utc>,
    pub status: TimelogStatus,
}

/// One engine-running interval. `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelogInterval {
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
}

impl TimelogInterval {
    /// Inclusive containment.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| time >= s) && self.stop.map_or(true, |s| time <= s)
    }

    /// Whether the interval overlaps the open span `(first, last)`.
    pub fn overlaps(&self, first: DateTime<Utc>, last: DateTime<Utc>) -> bool {
        self.stop.map_or(true, |s| s > first) && self.start.map_or(true, |s| s < last)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timelog {
    intervals: Vec<TimelogInterval>,
}

impl Timelog {
    /// Group entries into intervals.
    ///
    /// A new interval begins at every start that follows a stop. A leading
    /// group with no start has an open start; a trailing group with no stop
    /// has an open stop.
    pub fn from_entries(mut entries: Vec<TimelogEntry>) -> Self {
        entries.sort_by_key(|e| e.time);

        let mut groups: Vec<Vec<TimelogEntry>> = Vec::new();
        let mut previous: Option<TimelogStatus> = None;
        for entry in entries {
            let begins_group = entry.status == TimelogStatus::Start
                && previous != Some(TimelogStatus::Start);
            previous = Some(entry.status);
            match groups.last_mut() {
                Some(group) if !begins_group => group.push(entry),
                _ => groups.push(vec![entry]),
            }
        }

        let last_index = groups.len().saturating_sub(1);
        let intervals = groups
            .iter()
            .enumerate()
            .filter_map(|(i, group)| {
                let (first, last) = (group.first()?, group.last()?);
                let has_start = group.iter().any(|e| e.status == TimelogStatus::Start);
                let has_stop = group.iter().any(|e| e.status == TimelogStatus::Stop);
                Some(TimelogInterval {
                    start: (i != 0 || has_start).then_some(first.time),
                    stop: (i != last_index || has_stop).then_some(last.time),
                })
            })
            .collect();

        Self { intervals }
    }

    pub fn intervals(&self) -> &[TimelogInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Cut a segment to the engine-running intervals.
    ///
    /// Produces one segment per interval that contains at least one point.
    /// Fails with [`TrackNormError::NoOverlap`] when no interval overlaps
    /// the segment's time span.
    pub fn filter_segment(&self, segment: &Segment) -> Result<Vec<Segment>> {
        let (first, last) = (segment.start_time(), segment.end_time());
        let overlapping: Vec<&TimelogInterval> = self
            .intervals
            .iter()
            .filter(|iv| iv.overlaps(first, last))
            .collect();

        if overlapping.is_empty() {
            return Err(TrackNormError::NoOverlap {
                reference: "timelog".to_string(),
                segment_start: first,
                segment_stop: last,
            });
        }

        let parts: Vec<Segment> = overlapping
            .into_iter()
            .filter_map(|iv| {
                Segment::new(
                    segment
                        .points()
                        .iter()
                        .filter(|p| iv.contains(p.time))
                        .cloned()
                        .collect(),
                )
            })
            .collect();

        log::info!(
            "[Timelog] Segment at {} cut into {} engine-running parts",
            first,
            parts.len()
        );
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{segment, straight_points, t0};
    use chrono::Duration;

    fn entry(minutes: i64, status: TimelogStatus) -> TimelogEntry {
        TimelogEntry {
            time: t0() + Duration::minutes(minutes),
            status,
        }
    }

    #[test]
    fn test_from_symbol() {
        assert_eq!(TimelogStatus::from_symbol(" + "), Some(TimelogStatus::Start));
        assert_eq!(TimelogStatus::from_symbol("-"), Some(TimelogStatus::Stop));
        assert_eq!(TimelogStatus::from_symbol("x"), None);
    }

    #[test]
    fn test_duplicate_starts_and_stops_collapse() {
        use TimelogStatus::*;
        let log = Timelog::from_entries(vec![
            entry(0, Start),
            entry(1, Start),
            entry(10, Stop),
            entry(12, Stop),
            entry(30, Start),
            entry(40, Stop),
        ]);
        assert_eq!(
            log.intervals(),
            &[
                TimelogInterval {
                    start: Some(t0()),
                    stop: Some(t0() + Duration::minutes(12)),
                },
                TimelogInterval {
                    start: Some(t0() + Duration::minutes(30)),
                    stop: Some(t0() + Duration::minutes(40)),
                },
            ]
        );
    }

    #[test]
    fn test_open_ends() {
        use TimelogStatus::*;
        // Unsorted on purpose.
        let log = Timelog::from_entries(vec![entry(20, Start), entry(5, Stop)]);
        assert_eq!(log.intervals().len(), 2);
        assert_eq!(log.intervals()[0].start, None);
        assert_eq!(log.intervals()[1].stop, None);
        assert!(log.intervals()[1].contains(t0() + Duration::days(3)));
    }

    #[test]
    fn test_filter_cuts_to_intervals() {
        use TimelogStatus::*;
        // 60 points, one per minute.
        let seg = segment(straight_points(60, 60));
        let log = Timelog::from_entries(vec![
            entry(5, Start),
            entry(14, Stop),
            entry(30, Start),
            entry(39, Stop),
        ]);

        let parts = log.filter_segment(&seg).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].point_count(), 10);
        assert_eq!(parts[0].start_time(), t0() + Duration::minutes(5));
        assert_eq!(parts[1].end_time(), t0() + Duration::minutes(39));
    }

    #[test]
    fn test_no_overlap_is_an_error() {
        use TimelogStatus::*;
        let seg = segment(straight_points(10, 60));
        let log = Timelog::from_entries(vec![
            entry(-120, Start),
            entry(-60, Stop),
        ]);
        assert!(matches!(
            log.filter_segment(&seg),
            Err(TrackNormError::NoOverlap { .. })
        ));
        assert!(Timelog::default().filter_segment(&seg).is_err());
    }
}
