//! Antimeridian-aware geometry construction.
//!
//! A path that wraps from +180° to -180° longitude is split into separate
//! line parts that meet at an interpolated crossing point, so renderers and
//! length calculations never draw a line the long way around the globe.

use geo::{Coord, LineString, MultiLineString};
use serde::{Deserialize, Serialize};

/// How a longitude wraparound between consecutive points is recognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingDetection {
    /// Any change of longitude sign class (`< 0` vs `>= 0`) is a crossing.
    /// Sign changes with a jump under 180° look like prime meridian
    /// crossings and are logged.
    #[default]
    SignFlip,
    /// Only sign changes with a longitude jump over 180° are crossings.
    JumpMagnitude,
}

impl CrossingDetection {
    fn is_crossing(&self, a: Coord<f64>, b: Coord<f64>) -> bool {
        if (a.x < 0.0) == (b.x < 0.0) {
            return false;
        }
        let jump = (b.x - a.x).abs();
        match self {
            CrossingDetection::SignFlip => {
                if jump < 180.0 {
                    log::warn!(
                        "[Antimeridian] Sign flip between {:.6} and {:.6} looks like a prime meridian crossing",
                        a.x,
                        b.x
                    );
                }
                true
            }
            CrossingDetection::JumpMagnitude => jump > 180.0,
        }
    }
}

/// Split a coordinate path into line parts at antimeridian crossings.
///
/// At each crossing the current part ends on the boundary on the first
/// point's side (+180° when coming from non-negative longitudes) and the
/// next part starts at the same latitude on the opposite boundary. The
/// latitude is interpolated linearly after shifting the second point by
/// 360°. A crossing point equal to an adjacent point is not repeated, and
/// parts left with fewer than two points are dropped.
///
/// Vertex count: each crossing adds two vertices, one closing the part on
/// its own side and one opening the next, so the parts hold
/// `original + 2 × crossings` vertices. Those two vertices are the same
/// physical location (+180° and -180° at one latitude), so the number of
/// distinct physical points is `original + crossings`.
pub fn split_antimeridian(coords: &[Coord<f64>], detection: CrossingDetection) -> MultiLineString<f64> {
    let Some((&first, rest)) = coords.split_first() else {
        return MultiLineString::new(Vec::new());
    };

    let mut parts: Vec<Vec<Coord<f64>>> = Vec::new();
    let mut current = vec![first];
    let mut previous = first;

    for &next in rest {
        if detection.is_crossing(previous, next) {
            let (end, start) = crossing_points(previous, next);
            if end != previous {
                current.push(end);
            }
            parts.push(std::mem::take(&mut current));
            if start != next {
                current.push(start);
            }
        }
        current.push(next);
        previous = next;
    }
    parts.push(current);

    let crossings = parts.len() - 1;
    let lines: Vec<LineString<f64>> = parts
        .into_iter()
        .filter(|part| part.len() >= 2)
        .map(LineString::new)
        .collect();

    if crossings > 0 {
        log::info!(
            "[Antimeridian] {} crossings, {} line parts",
            crossings,
            lines.len()
        );
    }
    MultiLineString::new(lines)
}

/// Boundary points on either side of the crossing between `a` and `b`.
fn crossing_points(a: Coord<f64>, b: Coord<f64>) -> (Coord<f64>, Coord<f64>) {
    let (boundary, shifted_lon) = if a.x >= 0.0 {
        (180.0, b.x + 360.0)
    } else {
        (-180.0, b.x - 360.0)
    };

    let span = shifted_lon - a.x;
    let t = if span == 0.0 { 0.0 } else { (boundary - a.x) / span };
    let lat = a.y + t * (b.y - a.y);

    (
        Coord { x: boundary, y: lat },
        Coord {
            x: -boundary,
            y: lat,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coord<f64> {
        Coord { x: lon, y: lat }
    }

    fn part(lines: &MultiLineString<f64>, i: usize) -> Vec<Coord<f64>> {
        lines.0[i].0.clone()
    }

    #[test]
    fn test_no_sign_flip_single_part() {
        let lines = split_antimeridian(&[c(0.0, 0.0), c(170.0, 0.1)], CrossingDetection::SignFlip);
        assert_eq!(lines.0.len(), 1);
        assert_eq!(part(&lines, 0), vec![c(0.0, 0.0), c(170.0, 0.1)]);
    }

    #[test]
    fn test_eastward_crossing_two_parts() {
        let lines = split_antimeridian(
            &[c(179.9, 10.0), c(-179.9, 10.2)],
            CrossingDetection::SignFlip,
        );
        assert_eq!(lines.0.len(), 2);

        let before = part(&lines, 0);
        let after = part(&lines, 1);
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 2);
        assert_eq!(before[1].x, 180.0);
        assert_eq!(after[0].x, -180.0);
        // Halfway in longitude, so halfway in latitude.
        assert!((before[1].y - 10.1).abs() < 1e-9);
        assert_eq!(before[1].y, after[0].y);
        assert_eq!(after[1], c(-179.9, 10.2));
    }

    #[test]
    fn test_westward_crossing() {
        let lines = split_antimeridian(
            &[c(-179.0, 0.0), c(-179.5, 0.0), c(179.5, 1.0), c(179.0, 1.0)],
            CrossingDetection::JumpMagnitude,
        );
        assert_eq!(lines.0.len(), 2);
        assert_eq!(part(&lines, 0).last().map(|p| p.x), Some(-180.0));
        assert_eq!(part(&lines, 1).first().map(|p| p.x), Some(180.0));
        // 4 original points plus the crossing vertex on each side.
        assert_eq!(part(&lines, 0).len() + part(&lines, 1).len(), 6);
    }

    #[test]
    fn test_each_crossing_adds_one_physical_point() {
        let coords = [c(179.8, 0.0), c(-179.8, 0.4), c(-179.6, 0.6), c(179.6, 1.0)];
        let lines = split_antimeridian(&coords, CrossingDetection::SignFlip);
        assert_eq!(lines.0.len(), 3);

        let vertices: Vec<Coord<f64>> = lines
            .0
            .iter()
            .flat_map(|l| l.0.iter().copied())
            .collect();
        assert_eq!(vertices.len(), coords.len() + 2 * 2);

        // -180° and +180° name the same meridian.
        let mut physical: Vec<Coord<f64>> = Vec::new();
        for v in vertices {
            let v = if v.x == -180.0 { c(180.0, v.y) } else { v };
            if !physical.contains(&v) {
                physical.push(v);
            }
        }
        assert_eq!(physical.len(), coords.len() + 2);
    }

    #[test]
    fn test_point_on_boundary_not_duplicated() {
        let lines = split_antimeridian(
            &[c(179.0, 5.0), c(180.0, 5.0), c(-179.0, 5.0)],
            CrossingDetection::SignFlip,
        );
        assert_eq!(lines.0.len(), 2);
        assert_eq!(part(&lines, 0), vec![c(179.0, 5.0), c(180.0, 5.0)]);
        assert_eq!(part(&lines, 1), vec![c(-180.0, 5.0), c(-179.0, 5.0)]);
    }

    #[test]
    fn test_jump_magnitude_ignores_prime_meridian() {
        let coords = [c(-0.5, 51.5), c(0.5, 51.6)];
        let strict = split_antimeridian(&coords, CrossingDetection::JumpMagnitude);
        assert_eq!(strict.0.len(), 1);

        // Sign flip treats it as a wraparound.
        let reference = split_antimeridian(&coords, CrossingDetection::SignFlip);
        assert_eq!(reference.0.len(), 2);
    }

    #[test]
    fn test_degenerate_inputs_yield_no_parts() {
        assert!(split_antimeridian(&[c(10.0, 0.0)], CrossingDetection::SignFlip)
            .0
            .is_empty());
        assert!(split_antimeridian(&[], CrossingDetection::SignFlip).0.is_empty());
    }
}
