//! Bearings, distances and angle/vector conversions on the Earth.
//!
//! Bearings are geographic: degrees clockwise from North in `[0, 360)`.

use geo::{Destination, Distance, Geodesic};

use crate::engine::models::Coordinate;

pub const KNOTS_PER_MS: f64 = 1.94384;

pub fn si_to_knots(speed_ms: f64) -> f64 {
    speed_ms * KNOTS_PER_MS
}

pub fn knots_to_si(knots: f64) -> f64 {
    knots / KNOTS_PER_MS
}

/// Wraps any angle into `[0, 360)`.
pub fn normalize_bearing(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Initial great-circle bearing from `from` towards `to`.
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let start_lat = from.lat.to_radians();
    let end_lat = to.lat.to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let y = d_lon.sin() * end_lat.cos();
    let x = start_lat.cos() * end_lat.sin() - start_lat.sin() * end_lat.cos() * d_lon.cos();
    normalize_bearing(y.atan2(x).to_degrees())
}

/// Geodesic (WGS84) distance in km.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    // Fixed argument order so that the result is bitwise symmetric.
    let (first, second) = if (a.lat, a.lon) <= (b.lat, b.lon) { (a, b) } else { (b, a) };
    Geodesic::distance(first.to_point(), second.to_point()) / 1000.0
}

/// Point reached by travelling `distance_km` along the geodesic leaving `origin` at `bearing_deg`.
pub fn destination(origin: &Coordinate, bearing_deg: f64, distance_km: f64) -> Coordinate {
    let point = Geodesic::destination(origin.to_point(), bearing_deg, distance_km * 1000.0);
    Coordinate::from_point(point)
}

/// Signed smallest rotation from `bearing` to `other`, in `(-180, 180]`.
/// Positive values mean `other` lies clockwise (to the right) of `bearing`.
pub fn angle_difference(bearing: f64, other: f64) -> f64 {
    let delta = normalize_bearing(other - bearing);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Unit displacement `(dx, dy)` (East, North) for a geographic angle.
pub fn angle_to_unit_vector(degrees: f64) -> (f64, f64) {
    let theta = degrees.to_radians();
    let dx = (std::f64::consts::PI - theta).sin();
    let dy = theta.cos();
    (dx, dy)
}

/// Geographic direction of an (East, North) displacement, built from `atan(dy/dx)`
/// with the quadrant recovered from the sign of `dx`. A purely meridional vector
/// (`dx == 0`) maps to North, or South when `dy < 0`.
pub fn direction_from_vector(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 {
        return if dy < 0.0 { 180.0 } else { 0.0 };
    }
    let math_angle = (dy / dx).atan().to_degrees();
    let geographic = if dx > 0.0 { 90.0 - math_angle } else { 270.0 - math_angle };
    normalize_bearing(geographic)
}

/// Mean direction of a set of angles, in [0, 360).
pub fn circular_mean_deg(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let (sin_sum, cos_sum) = values.iter().fold((0.0_f64, 0.0_f64), |(s, c), deg| {
        let rad = deg.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    Some(normalize_bearing(sin_sum.atan2(cos_sum).to_degrees()))
}
