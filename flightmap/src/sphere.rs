use std::f64::consts::PI;

use shared::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;
/// Below this central angle (radians, ~6 mm on Earth) two points are coincident.
const COINCIDENT_EPSILON: f64 = 1e-12;
/// `sin(d)` below this with `d` near π means the endpoints are antipodal.
const ANTIPODAL_EPSILON: f64 = 1e-9;

type Vec3 = [f64; 3];

/// Point at `fraction` (clamped to [0, 1]) of the great-circle path from
/// `start` to `end`.
///
/// # Degenerate input
/// - coincident endpoints return `start` for every fraction
/// - antipodal endpoints have infinitely many shortest paths; a fixed one is
///   chosen through an axis orthogonal to `start`, so fraction 0.5 is that
///   path's midpoint and the result is always finite
pub fn interpolate(start: GeoPoint, end: GeoPoint, fraction: f64) -> GeoPoint {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    if fraction == 0.0 {
        return start;
    }
    if fraction == 1.0 {
        return end;
    }

    let d = central_angle(start, end);
    if d < COINCIDENT_EPSILON {
        return start;
    }

    let sin_d = d.sin();
    if d > PI / 2.0 && sin_d < ANTIPODAL_EPSILON {
        return antipodal_interpolate(start, fraction);
    }

    let a = ((1.0 - fraction) * d).sin() / sin_d;
    let b = (fraction * d).sin() / sin_d;
    let s = to_unit_vector(start);
    let e = to_unit_vector(end);

    from_vector([
        a * s[0] + b * e[0],
        a * s[1] + b * e[1],
        a * s[2] + b * e[2],
    ])
}

/// `n + 1` vertices evenly spaced by fraction from `start` to `end`.
pub fn arc(start: GeoPoint, end: GeoPoint, n: usize) -> Vec<GeoPoint> {
    if n == 0 {
        return vec![start];
    }
    (0..=n)
        .map(|i| interpolate(start, end, i as f64 / n as f64))
        .collect()
}

/// Haversine central angle in radians.
pub fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    // rounding can push h a hair above 1 for antipodal points
    2.0 * h.clamp(0.0, 1.0).sqrt().asin()
}

pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_KM * central_angle(a, b)
}

pub fn path_length_km(path: &[GeoPoint]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

fn antipodal_interpolate(start: GeoPoint, fraction: f64) -> GeoPoint {
    let s = to_unit_vector(start);
    // any axis not parallel to s; the pole unless s is (near) a pole
    let reference = if s[2].abs() < 0.9 {
        [0.0, 0.0, 1.0]
    } else {
        [1.0, 0.0, 0.0]
    };
    let q = normalize(cross(cross(s, reference), s));
    let theta = fraction * PI;
    let (sin_t, cos_t) = theta.sin_cos();

    from_vector([
        cos_t * s[0] + sin_t * q[0],
        cos_t * s[1] + sin_t * q[1],
        cos_t * s[2] + sin_t * q[2],
    ])
}

fn to_unit_vector(p: GeoPoint) -> Vec3 {
    let lat = p.latitude.to_radians();
    let lon = p.longitude.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn from_vector(v: Vec3) -> GeoPoint {
    let [x, y, z] = v;
    let lat = z.atan2((x * x + y * y).sqrt());
    let lon = y.atan2(x);
    GeoPoint::new(lat.to_degrees(), lon.to_degrees())
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: Vec3) -> Vec3 {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt().max(f64::EPSILON);
    [v[0] / len, v[1] / len, v[2] / len]
}
