//! Segment splitting and merging on time gaps.

use crate::geo_utils::elapsed_seconds;
use crate::Segment;

/// Split segments wherever consecutive points are at least `threshold_s`
/// seconds apart.
///
/// No points are dropped: the point after a gap starts the next segment.
/// Segments without a qualifying gap pass through unchanged.
pub fn split_segments(segments: Vec<Segment>, threshold_s: f64) -> Vec<Segment> {
    let mut result = Vec::with_capacity(segments.len());

    for segment in segments {
        let cuts: Vec<usize> = segment
            .points()
            .windows(2)
            .enumerate()
            .filter(|(_, w)| elapsed_seconds(&w[0], &w[1]) >= threshold_s)
            .map(|(i, _)| i + 1)
            .collect();

        if cuts.is_empty() {
            result.push(segment);
            continue;
        }

        log::info!(
            "[Segments] Splitting segment at {} into {} parts",
            segment.start_time(),
            cuts.len() + 1
        );

        let mut points = segment.into_points();
        // Cut from the back so earlier indices stay valid.
        let mut parts = Vec::with_capacity(cuts.len() + 1);
        for &cut in cuts.iter().rev() {
            parts.push(points.split_off(cut));
        }
        parts.push(points);
        result.extend(parts.into_iter().rev().filter_map(Segment::new));
    }

    result
}

/// Merge consecutive segments separated by at most `max_gap_s` seconds.
///
/// One left-to-right pass: each segment is compared against the segment
/// accumulated so far and appended to it if the gap is small enough,
/// otherwise the accumulated segment is emitted and the new one becomes the
/// accumulator. Single-point segments are emitted as they are and never
/// merged.
pub fn merge_segments(segments: Vec<Segment>, max_gap_s: f64) -> Vec<Segment> {
    let input_count = segments.len();
    let mut result: Vec<Segment> = Vec::with_capacity(input_count);
    let mut current: Option<Segment> = None;

    for segment in segments {
        if segment.point_count() < 2 {
            if let Some(acc) = current.take() {
                result.push(acc);
            }
            result.push(segment);
            continue;
        }

        current = Some(match current.take() {
            Some(acc) if elapsed_seconds(acc.last(), segment.first()) <= max_gap_s => {
                log::debug!(
                    "[Segments] Merging segment at {} into segment at {}",
                    segment.start_time(),
                    acc.start_time()
                );
                let mut points = acc.into_points();
                points.extend(segment.into_points());
                Segment { points }
            }
            Some(acc) => {
                result.push(acc);
                segment
            }
            None => segment,
        });
    }
    result.extend(current);

    if result.len() < input_count {
        log::info!(
            "[Segments] Merged {} segments into {}",
            input_count,
            result.len()
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{segment, straight_points};
    use chrono::Duration;

    /// 30 points every 5 s with 15-minute gaps before points 10 and 20.
    fn gapped_points() -> Vec<crate::RawPoint> {
        let mut points = straight_points(30, 5);
        for (i, p) in points.iter_mut().enumerate() {
            let gaps = (i / 10) as i64;
            p.time += Duration::minutes(15 * gaps);
        }
        points
    }

    #[test]
    fn test_split_on_gaps() {
        let parts = split_segments(vec![segment(gapped_points())], 600.0);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|s| s.point_count() == 10));
        assert_eq!(parts[1].first(), &gapped_points()[10]);
    }

    #[test]
    fn test_split_without_gaps_is_identity() {
        let seg = segment(straight_points(30, 5));
        let parts = split_segments(vec![seg.clone()], 600.0);
        assert_eq!(parts, vec![seg]);
    }

    #[test]
    fn test_split_threshold_is_inclusive() {
        let mut points = straight_points(4, 5);
        points[2].time = points[1].time + Duration::seconds(600);
        points[3].time = points[2].time + Duration::seconds(5);
        let parts = split_segments(vec![segment(points)], 600.0);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_merge_close_segments() {
        let points = straight_points(30, 5);
        let parts: Vec<Segment> = points.chunks(10).map(|c| segment(c.to_vec())).collect();
        let merged = merge_segments(parts, 60.0);
        assert_eq!(merged, vec![segment(points)]);
    }

    #[test]
    fn test_merge_keeps_distant_segments() {
        let parts = split_segments(vec![segment(gapped_points())], 600.0);
        let merged = merge_segments(parts.clone(), 60.0);
        assert_eq!(merged, parts);
    }

    #[test]
    fn test_merge_passes_single_points_through() {
        let points = straight_points(21, 5);
        let parts = vec![
            segment(points[..10].to_vec()),
            segment(points[10..11].to_vec()),
            segment(points[11..].to_vec()),
        ];
        let merged = merge_segments(parts.clone(), 60.0);
        assert_eq!(merged, parts);
    }

    #[test]
    fn test_split_then_merge_reconstructs() {
        let original = segment(gapped_points());
        let parts = split_segments(vec![original.clone()], 600.0);
        assert_eq!(parts.len(), 3);

        // Every split gap is 15 minutes plus one step.
        let merged = merge_segments(parts, 1000.0);
        assert_eq!(merged, vec![original]);
    }
}
