//! Geographic utilities: haversine distance, point-to-point speed and the
//! unit-sphere trigonometry used by the simplifier.
//!
//! Angles returned by the `*_deg` functions are central angles on the unit
//! sphere expressed in degrees, so they compare directly with an angular
//! simplification tolerance.

use geo::{Coord, Distance, Haversine, Point};

use crate::RawPoint;

/// Haversine distance between two points in meters.
pub fn haversine_distance(p1: &RawPoint, p2: &RawPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Seconds elapsed from `p1` to `p2` (negative when `p2` is earlier).
pub fn elapsed_seconds(p1: &RawPoint, p2: &RawPoint) -> f64 {
    (p2.time - p1.time).num_milliseconds() as f64 / 1000.0
}

/// Great-circle speed from `p1` to `p2` in m/s.
///
/// Returns `None` when no time elapses between the points.
pub fn point_speed(p1: &RawPoint, p2: &RawPoint) -> Option<f64> {
    let elapsed = elapsed_seconds(p1, p2);
    if elapsed <= 0.0 {
        return None;
    }
    Some(haversine_distance(p1, p2) / elapsed)
}

/// Central angle between two coordinates, in radians.
///
/// Vincenty form of the great-circle formula, well-conditioned for both tiny
/// and antipodal separations.
pub fn central_angle(p1: Coord<f64>, p2: Coord<f64>) -> f64 {
    let (lon1, lat1) = (p1.x.to_radians(), p1.y.to_radians());
    let (lon2, lat2) = (p2.x.to_radians(), p2.y.to_radians());
    let delta_lon = (lon1 - lon2).abs();

    let numerator = ((lat2.cos() * delta_lon.sin()).powi(2)
        + (lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos()).powi(2))
    .sqrt();
    let denominator = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lon.cos();

    numerator.atan2(denominator)
}

/// Initial bearing from `p1` towards `p2`, in radians.
pub fn initial_bearing(p1: Coord<f64>, p2: Coord<f64>) -> f64 {
    let (lon1, lat1) = (p1.x.to_radians(), p1.y.to_radians());
    let (lon2, lat2) = (p2.x.to_radians(), p2.y.to_radians());
    let delta_lon = lon2 - lon1;

    (delta_lon.sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos())
}

/// Absolute cross-track angle of `point` from the great circle through
/// `start` and `end`, in radians.
pub fn cross_track_angle(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> f64 {
    let delta13 = central_angle(start, point);
    let theta13 = initial_bearing(start, point);
    let theta12 = initial_bearing(start, end);

    (delta13.sin() * (theta13 - theta12).sin()).asin().abs()
}

/// Angular distance in degrees from `point` to the great circle through
/// `start` and `end`. Identical endpoints fall back to the direct
/// great-circle distance from `start`.
pub fn point_line_distance_deg(point: Coord<f64>, start: Coord<f64>, end: Coord<f64>) -> f64 {
    if start == end {
        central_angle(point, start).to_degrees()
    } else {
        cross_track_angle(point, start, end).to_degrees()
    }
}

/// Total haversine length of a coordinate path in meters.
pub fn polyline_length(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| Haversine::distance(Point::from(w[0]), Point::from(w[1])))
        .sum()
}
