//! Rolling-median speed filter and edge trim.
//!
//! Both work on the speed series of a segment. Missing samples stay
//! missing: a window's median is taken over the samples it actually has,
//! and a window with none has no median at all.

use crate::speed::speed_series;
use crate::{Profile, RollingMethod, RawPoint, Segment};

/// Drop points whose rolling median speed is below the profile threshold.
///
/// The segment is returned unchanged when it is shorter than the rolling
/// window or when no point carries a speed. Returns `None` if every point
/// was below the threshold.
pub fn filter_speed(segment: Segment, profile: &Profile) -> Option<Segment> {
    let window = profile.rolling_window.max(1);
    let speeds = speed_series(segment.points(), profile);

    if segment.point_count() < window {
        log::info!(
            "[SpeedFilter] Segment at {} has {} points, fewer than the {}-point window; not filtering",
            segment.start_time(),
            segment.point_count(),
            window
        );
        return Some(segment);
    }
    if speeds.iter().all(Option::is_none) {
        log::info!(
            "[SpeedFilter] Segment at {} has no speed data; not filtering",
            segment.start_time()
        );
        return Some(segment);
    }

    let keep: Vec<bool> = (0..speeds.len())
        .map(|i| qualifies(&speeds, i, window, profile))
        .collect();

    let original_count = segment.point_count();
    let start = segment.start_time();
    let points: Vec<RawPoint> = segment
        .into_points()
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect();

    log::info!(
        "[SpeedFilter] Segment at {}: removed {} points below {} m/s",
        start,
        original_count - points.len(),
        profile.min_speed_m_s
    );
    Segment::new(points)
}

/// Trim no-motion runs from the ends of a segment only.
///
/// Finds the first and last points whose trailing rolling median reaches
/// the threshold, moves both back by half a window, and keeps the points
/// between them. Interior slow points are kept. Returns the segment
/// unchanged when it is too short, has no speed data or never reaches the
/// threshold, and `None` if the trimmed range is empty.
pub fn trim_segment(segment: Segment, profile: &Profile) -> Option<Segment> {
    let window = profile.rolling_window.max(1);
    if segment.point_count() < window {
        log::info!("[SpeedFilter] Not enough points to trim segment at {}", segment.start_time());
        return Some(segment);
    }

    let speeds = speed_series(segment.points(), profile);
    let moving: Vec<usize> = (0..speeds.len())
        .filter(|&i| {
            let lo = (i + 1).saturating_sub(window);
            median(&speeds[lo..=i]).is_some_and(|m| m >= profile.min_speed_m_s)
        })
        .collect();

    let (Some(&first), Some(&last)) = (moving.first(), moving.last()) else {
        log::info!(
            "[SpeedFilter] Segment at {} never reaches {} m/s; not trimming",
            segment.start_time(),
            profile.min_speed_m_s
        );
        return Some(segment);
    };

    let half = window / 2;
    let start = first.saturating_sub(half);
    let end = last.saturating_sub(half);
    let original_count = segment.point_count();

    let points: Vec<RawPoint> = segment
        .into_points()
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    log::info!(
        "[SpeedFilter] Trimmed {} points from segment ends",
        original_count - points.len()
    );
    Segment::new(points)
}

fn qualifies(speeds: &[Option<f64>], i: usize, window: usize, profile: &Profile) -> bool {
    let last = speeds.len() - 1;
    let above = |lo: usize, hi: usize| {
        median(&speeds[lo..=hi.min(last)]).is_some_and(|m| m >= profile.min_speed_m_s)
    };

    match profile.rolling_method {
        RollingMethod::Center => {
            let lo = i.saturating_sub(window / 2);
            let hi = (i + window).saturating_sub(window / 2 + 1);
            above(lo, hi)
        }
        RollingMethod::Extended => {
            let backward = above((i + 1).saturating_sub(window), i);
            backward || above(i, i + window - 1)
        }
    }
}

/// Median of the present samples.
fn median(samples: &[Option<f64>]) -> Option<f64> {
    let mut values: Vec<f64> = samples.iter().flatten().copied().collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{segment, straight_points};
    use crate::speed::extract_speed;
    use crate::{ProfileId, SpeedField};

    fn with_speeds(speeds: &[Option<f64>]) -> Segment {
        let points = straight_points(speeds.len(), 5)
            .into_iter()
            .zip(speeds)
            .map(|(p, s)| match s {
                Some(v) => p.with_aux(SpeedField::GarminTrackPointV2.qualified_name(), v.to_string()),
                None => p,
            })
            .collect();
        segment(points)
    }

    fn garmin() -> Profile {
        Profile::builtin(ProfileId::Garmin)
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(1.0), Some(4.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_stationary_edges_removed() {
        let mut speeds = vec![Some(0.0); 10];
        speeds.extend(vec![Some(10.0); 20]);
        speeds.extend(vec![Some(0.0); 10]);
        let filtered = filter_speed(with_speeds(&speeds), &garmin()).unwrap();

        assert_eq!(filtered.point_count(), 20);
        assert!(filtered
            .points()
            .iter()
            .all(|p| extract_speed(p, &garmin()) == Some(10.0)));
    }

    #[test]
    fn test_short_segment_untouched() {
        let seg = with_speeds(&[Some(0.0), Some(0.0), Some(0.0)]);
        let filtered = filter_speed(seg.clone(), &garmin()).unwrap();
        assert_eq!(filtered, seg);
    }

    #[test]
    fn test_no_speed_data_untouched() {
        let seg = segment(straight_points(20, 5));
        let filtered = filter_speed(seg.clone(), &garmin()).unwrap();
        assert_eq!(filtered, seg);
    }

    #[test]
    fn test_all_stationary_drops_segment() {
        let seg = with_speeds(&[Some(0.1); 12]);
        assert!(filter_speed(seg, &garmin()).is_none());
    }

    #[test]
    fn test_missing_samples_are_not_zero() {
        // Every other sample missing; the present ones are all moving.
        let speeds: Vec<Option<f64>> = (0..20)
            .map(|i| if i % 2 == 0 { Some(8.0) } else { None })
            .collect();
        let filtered = filter_speed(with_speeds(&speeds), &garmin()).unwrap();
        assert_eq!(filtered.point_count(), 20);
    }

    #[test]
    fn test_raising_threshold_never_keeps_more() {
        let speeds: Vec<Option<f64>> = (0..60)
            .map(|i| Some(((i * 7) % 13) as f64 * 0.5))
            .collect();
        let seg = with_speeds(&speeds);

        for method in [RollingMethod::Center, RollingMethod::Extended] {
            let mut previous = usize::MAX;
            for threshold in [0.0, 0.5, 1.0, 2.0, 3.0, 4.5, 7.0] {
                let profile = Profile {
                    min_speed_m_s: threshold,
                    rolling_method: method,
                    ..garmin()
                };
                let kept = filter_speed(seg.clone(), &profile)
                    .map(|s| s.point_count())
                    .unwrap_or(0);
                assert!(kept <= previous, "{:?} at {} kept {}", method, threshold, kept);
                previous = kept;
            }
        }
    }

    #[test]
    fn test_extended_keeps_points_at_motion_boundaries() {
        // Stop, then start moving. The center window loses the first moving
        // points; the forward window of the extended method keeps them.
        let mut speeds = vec![Some(0.0); 10];
        speeds.extend(vec![Some(10.0); 10]);
        let seg = with_speeds(&speeds);

        let center = filter_speed(seg.clone(), &garmin()).unwrap();
        let extended_profile = Profile {
            rolling_method: RollingMethod::Extended,
            ..garmin()
        };
        let extended = filter_speed(seg, &extended_profile).unwrap();
        assert!(extended.point_count() > center.point_count());
    }

    #[test]
    fn test_trim_keeps_interior_stop() {
        let mut speeds = vec![Some(0.0); 8];
        speeds.extend(vec![Some(10.0); 10]);
        speeds.extend(vec![Some(0.0); 8]);
        speeds.extend(vec![Some(10.0); 10]);
        speeds.extend(vec![Some(0.0); 8]);
        let seg = with_speeds(&speeds);

        let trimmed = trim_segment(seg.clone(), &garmin()).unwrap();
        let filtered = filter_speed(seg, &garmin()).unwrap();

        assert!(trimmed.point_count() < speeds.len());
        // The interior stop survives the trim but not the filter.
        assert!(trimmed.point_count() > filtered.point_count());
    }
}
