//! Outlier removal: time travel and teleportation.
//!
//! Both filters only ever delete points. Every deleted point is reported
//! as an [`OutlierRecord`] so it can be audited later.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{elapsed_seconds, haversine_distance};
use crate::{RawPoint, Segment};

/// Outlier filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Maximum consecutive points searched forward or back around a
    /// backwards clock step. Default: 60
    pub time_travel_window: usize,
    /// Implied speed from the last good point above which a point is a
    /// position jump (m/s). Default: 250.0
    pub teleport_speed_m_s: f64,
    /// Maximum points searched for the end of a position jump. Default: 60
    pub teleport_window: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            time_travel_window: 60,
            teleport_speed_m_s: 250.0,
            teleport_window: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierKind {
    TimeTravel,
    Teleportation,
}

impl OutlierKind {
    /// Reason string used in audit logs.
    pub fn reason(&self) -> &'static str {
        match self {
            OutlierKind::TimeTravel => "time travel",
            OutlierKind::Teleportation => "teleportation",
        }
    }
}

impl fmt::Display for OutlierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A removed point, captured before deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub file_name: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: OutlierKind,
}

impl OutlierRecord {
    fn new(file_name: &str, point: &RawPoint, kind: OutlierKind) -> Self {
        Self {
            file_name: file_name.to_string(),
            time: point.time,
            latitude: point.latitude,
            longitude: point.longitude,
            kind,
        }
    }
}

/// Remove time travel, then teleportation outliers from a segment.
///
/// Returns the cleaned segment together with a record for each point
/// removed. The first point of a segment is never removed, so the result
/// is never empty.
pub fn remove_outliers(
    segment: Segment,
    file_name: &str,
    config: &OutlierConfig,
) -> (Segment, Vec<OutlierRecord>) {
    let original_count = segment.point_count();
    let points = segment.into_points();
    let mut records = Vec::new();

    let time_travel = find_time_travel(&points, config.time_travel_window);
    let points = drop_indices(points, &time_travel, |p| {
        log::warn!(
            "[Outliers] Time travel in {} at {} ({:.6}, {:.6})",
            file_name,
            p.time,
            p.latitude,
            p.longitude
        );
        records.push(OutlierRecord::new(file_name, p, OutlierKind::TimeTravel));
    });

    let teleports = find_teleportation(
        &points,
        config.teleport_speed_m_s,
        config.teleport_window,
    );
    let points = drop_indices(points, &teleports, |p| {
        log::warn!(
            "[Outliers] Teleportation in {} at {} ({:.6}, {:.6})",
            file_name,
            p.time,
            p.latitude,
            p.longitude
        );
        records.push(OutlierRecord::new(file_name, p, OutlierKind::Teleportation));
    });

    if !records.is_empty() {
        log::info!(
            "[Outliers] {}: removed {} of {} points",
            file_name,
            records.len(),
            original_count
        );
    }

    // Index 0 survives both filters.
    let cleaned = Segment { points };
    (cleaned, records)
}

/// Indices of points involved in backwards clock steps.
///
/// For each break `time[b-1] > time[b]` the points from `b` up to the first
/// one later than `time[b-1]` are the outliers (the clock jumped back). If
/// no such point exists within the window, the points before the break that
/// are later than `time[b]` are the outliers instead (the clock had jumped
/// forward). If neither reading applies nothing is removed.
fn find_time_travel(points: &[RawPoint], window: usize) -> BTreeSet<usize> {
    let mut outliers = BTreeSet::new();
    let breaks = points
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].time > w[1].time)
        .map(|(i, _)| i + 1);

    for b in breaks {
        let prior_good = points[b - 1].time;
        let search_end = (b + window).min(points.len());
        let resume = (b..search_end).find(|&j| points[j].time > prior_good);

        if let Some(j) = resume {
            log::debug!("[Outliers] Backward clock step at index {}: {} points", b, j - b);
            outliers.extend(b..j);
            continue;
        }

        let current_good = points[b].time;
        let search_start = b.saturating_sub(window);
        let anchor = (search_start..b)
            .rev()
            .find(|&k| points[k].time < current_good);

        match anchor {
            Some(k) => {
                log::debug!(
                    "[Outliers] Forward clock step before index {}: {} points",
                    b,
                    b - k - 1
                );
                outliers.extend(k + 1..b);
            }
            None => log::debug!(
                "[Outliers] Unresolved clock step at index {}, keeping points",
                b
            ),
        }
    }
    outliers
}

/// Indices of points whose implied speed from the last good point exceeds
/// the threshold, when the track returns below it within the window.
fn find_teleportation(points: &[RawPoint], max_speed_m_s: f64, window: usize) -> BTreeSet<usize> {
    let mut outliers = BTreeSet::new();
    if points.len() < 2 {
        return outliers;
    }

    let mut anchor = 0;
    let mut i = 1;
    while i < points.len() {
        if anchor_speed(&points[anchor], &points[i]) <= max_speed_m_s {
            anchor = i;
            i += 1;
            continue;
        }

        let search_end = (i + 1 + window).min(points.len());
        let landing = (i + 1..search_end)
            .find(|&k| anchor_speed(&points[anchor], &points[k]) <= max_speed_m_s);

        match landing {
            Some(k) => {
                outliers.extend(i..k);
                anchor = k;
                i = k + 1;
            }
            None => {
                log::debug!(
                    "[Outliers] Speed jump at index {} never returns, keeping points",
                    i
                );
                anchor = i;
                i += 1;
            }
        }
    }
    outliers
}

/// Speed from the anchor; no elapsed time counts as standing still.
fn anchor_speed(anchor: &RawPoint, point: &RawPoint) -> f64 {
    let elapsed = elapsed_seconds(anchor, point);
    if elapsed <= 0.0 {
        log::debug!(
            "[Outliers] No time elapsed between {} and {}, treating speed as 0",
            anchor.time,
            point.time
        );
        return 0.0;
    }
    haversine_distance(anchor, point) / elapsed
}

fn drop_indices<F>(points: Vec<RawPoint>, indices: &BTreeSet<usize>, mut on_drop: F) -> Vec<RawPoint>
where
    F: FnMut(&RawPoint),
{
    if indices.is_empty() {
        return points;
    }
    points
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            if indices.contains(&i) {
                on_drop(&p);
                None
            } else {
                Some(p)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{segment, straight_points, t0};
    use chrono::Duration;

    #[test]
    fn test_clean_segment_unchanged() {
        let points = straight_points(50, 5);
        let (cleaned, records) =
            remove_outliers(segment(points.clone()), "clean.gpx", &OutlierConfig::default());
        assert_eq!(cleaned.points(), points.as_slice());
        assert!(records.is_empty());
    }

    #[test]
    fn test_backward_clock_step_removes_three_points() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut points = straight_points(100, 1);
        let early = points[39].time - Duration::seconds(10);
        for p in &mut points[40..=42] {
            p.time = early;
        }
        let expected: Vec<RawPoint> = points[..40]
            .iter()
            .chain(points[43..].iter())
            .cloned()
            .collect();

        let (cleaned, records) =
            remove_outliers(segment(points), "travel.gpx", &OutlierConfig::default());

        assert_eq!(cleaned.point_count(), 97);
        assert_eq!(cleaned.points(), expected.as_slice());
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.kind == OutlierKind::TimeTravel));
        assert!(records.iter().all(|r| r.file_name == "travel.gpx"));
    }

    #[test]
    fn test_forward_clock_step_removes_points_before_break() {
        // Clock jumps an hour ahead for points 10..=12 then comes back; the
        // points after the break never exceed the jumped time.
        let mut points = straight_points(30, 1);
        for p in &mut points[10..=12] {
            p.time += Duration::hours(1);
        }
        let (cleaned, records) =
            remove_outliers(segment(points), "jump.gpx", &OutlierConfig::default());

        assert_eq!(cleaned.point_count(), 27);
        assert!(cleaned
            .points()
            .windows(2)
            .all(|w| w[0].time <= w[1].time));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_unresolved_clock_step_keeps_every_point() {
        // Second half is an hour behind the first and never catches up, and
        // no point before the break is earlier than it either.
        let mut points = straight_points(100, 1);
        for p in &mut points[50..] {
            p.time -= Duration::hours(1);
        }
        let (cleaned, records) =
            remove_outliers(segment(points.clone()), "offset.gpx", &OutlierConfig::default());

        assert_eq!(cleaned.point_count(), 100);
        assert_eq!(cleaned.points(), points.as_slice());
        assert!(records.is_empty());
    }

    #[test]
    fn test_teleport_removed() {
        let mut points = straight_points(20, 5);
        // ~5.5 km away in 5 s is well over 250 m/s.
        points[8].latitude += 0.05;
        points[9].latitude += 0.05;
        let bad_times = [points[8].time, points[9].time];

        let (cleaned, records) =
            remove_outliers(segment(points), "jump.gpx", &OutlierConfig::default());

        assert_eq!(cleaned.point_count(), 18);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == OutlierKind::Teleportation));
        assert_eq!(records[0].time, bad_times[0]);
        assert_eq!(records[1].time, bad_times[1]);
        assert_eq!(OutlierKind::Teleportation.reason(), "teleportation");
    }

    #[test]
    fn test_permanent_jump_kept() {
        // Relocation without a return: nothing comes back below threshold.
        let mut points = straight_points(10, 5);
        for p in &mut points[5..] {
            p.latitude += 1.0;
        }
        let (cleaned, records) =
            remove_outliers(segment(points), "move.gpx", &OutlierConfig::default());
        assert_eq!(cleaned.point_count(), 10);
        assert!(records.is_empty());
    }

    #[test]
    fn test_record_serializes_kind() {
        let record = OutlierRecord::new(
            "a.gpx",
            &RawPoint::new(t0(), 42.0, -71.0),
            OutlierKind::TimeTravel,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "time_travel");
        assert_eq!(json["file_name"], "a.gpx");
    }

    #[test]
    fn test_zero_elapsed_counts_as_stationary() {
        let a = RawPoint::new(t0(), 42.0, -71.0);
        let b = RawPoint::new(t0(), 43.0, -71.0);
        assert_eq!(anchor_speed(&a, &b), 0.0);
    }
}
