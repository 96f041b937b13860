//! Spherical Ramer-Douglas-Peucker simplification.
//!
//! Distances are cross-track angles from the great circle through a
//! sub-range's endpoints, in degrees, so the tolerance is angular and does
//! not distort with latitude.

use geo::Coord;

use crate::geo_utils::point_line_distance_deg;

/// Indices of the coordinates kept by spherical RDP, ascending.
///
/// The first and last coordinates are always kept. Every dropped
/// coordinate lies within `epsilon` degrees of the great circle through
/// the two kept coordinates around it. An `epsilon` of zero or less keeps
/// everything.
pub fn simplify_indices(coords: &[Coord<f64>], epsilon: f64) -> Vec<usize> {
    if coords.len() <= 2 || epsilon <= 0.0 {
        return (0..coords.len()).collect();
    }

    let last = coords.len() - 1;
    let mut keep = vec![false; coords.len()];
    keep[0] = true;
    keep[last] = true;

    // Explicit stack; long drives overflow a recursive version.
    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let (max_index, max_distance) = (start + 1..end)
            .map(|i| (i, point_line_distance_deg(coords[i], coords[start], coords[end])))
            .fold((start, 0.0), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if max_distance > epsilon {
            keep[max_index] = true;
            stack.push((max_index, end));
            stack.push((start, max_index));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}

/// Simplify a coordinate path with spherical RDP.
pub fn simplify_coords(coords: &[Coord<f64>], epsilon: f64) -> Vec<Coord<f64>> {
    let indices = simplify_indices(coords, epsilon);
    if indices.len() < coords.len() {
        log::debug!(
            "[Simplify] {} -> {} coordinates at epsilon {}",
            coords.len(),
            indices.len(),
            epsilon
        );
    }
    indices.into_iter().map(|i| coords[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coord<f64> {
        Coord { x: lon, y: lat }
    }

    /// A wiggly path heading east.
    fn zigzag(n: usize) -> Vec<Coord<f64>> {
        (0..n)
            .map(|i| {
                let wiggle = ((i * 37) % 11) as f64 * 0.00001;
                c(-71.0 + i as f64 * 0.0002, 42.0 + wiggle)
            })
            .collect()
    }

    #[test]
    fn test_collinear_reduced_to_endpoints() {
        let coords: Vec<_> = (0..50).map(|i| c(i as f64 * 0.001, 0.0)).collect();
        assert_eq!(simplify_indices(&coords, 0.000002), vec![0, 49]);
    }

    #[test]
    fn test_endpoints_always_kept() {
        let coords = zigzag(200);
        for epsilon in [0.000001, 0.00001, 0.001, 10.0] {
            let kept = simplify_indices(&coords, epsilon);
            assert_eq!(kept.first(), Some(&0));
            assert_eq!(kept.last(), Some(&199));
            assert!(kept.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_dropped_points_within_epsilon() {
        let coords = zigzag(300);
        let epsilon = 0.000005;
        let kept = simplify_indices(&coords, epsilon);
        assert!(kept.len() < coords.len());

        for pair in kept.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            for i in a + 1..b {
                let d = point_line_distance_deg(coords[i], coords[a], coords[b]);
                assert!(d <= epsilon, "point {} is {} deg off", i, d);
            }
        }
    }

    #[test]
    fn test_non_positive_epsilon_is_identity() {
        let coords = zigzag(40);
        assert_eq!(simplify_coords(&coords, 0.0), coords);
        assert_eq!(simplify_coords(&coords, -1.0), coords);
    }

    #[test]
    fn test_closed_loop_keeps_far_point() {
        // Start and end coincide; distance falls back to the direct one.
        let coords = vec![c(0.0, 0.0), c(0.0, 0.01), c(0.01, 0.01), c(0.0, 0.0)];
        let kept = simplify_indices(&coords, 0.008);
        assert_eq!(kept, vec![0, 2, 3]);
    }

    #[test]
    fn test_short_inputs() {
        assert!(simplify_indices(&[], 0.1).is_empty());
        assert_eq!(simplify_indices(&[c(1.0, 1.0)], 0.1), vec![0]);
    }
}
