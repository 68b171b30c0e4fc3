//! Local tangent plane geometry shared by the estimators

use nalgebra::{Matrix2, Vector2};

use crate::core::{GeoPoint, METERS_PER_DEG_LAT, METERS_PER_DEG_LON_EQUATOR};

/// Condition-number ceiling beyond which a normal-equations matrix is
/// treated as singular
pub const MAX_CONDITION_NUMBER: f64 = 1e8;

/// Meters per degree of latitude and longitude at the given latitude
pub fn meters_per_degree(lat_deg: f64) -> (f64, f64) {
    let lon_scale = METERS_PER_DEG_LON_EQUATOR * lat_deg.to_radians().cos();
    (METERS_PER_DEG_LAT, lon_scale)
}

/// Project a geodetic point onto the local tangent plane anchored at
/// `reference`, in meters east/north. Valid for the small areas covered by
/// one emitter's observation set.
pub fn to_local(point: GeoPoint, reference: GeoPoint) -> Vector2<f64> {
    let (lat_scale, lon_scale) = meters_per_degree(reference.lat);
    let east = (point.lon - reference.lon) * lon_scale;
    let north = (point.lat - reference.lat) * lat_scale;
    Vector2::new(east, north)
}

/// Inverse of [`to_local`] for the same reference point
pub fn to_geodetic(local: Vector2<f64>, reference: GeoPoint) -> GeoPoint {
    let (lat_scale, lon_scale) = meters_per_degree(reference.lat);
    GeoPoint::new(
        reference.lat + local.y / lat_scale,
        reference.lon + local.x / lon_scale,
    )
}

/// Ground distance between two geodetic points in meters
/// (equirectangular approximation about the midpoint latitude)
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat_scale, lon_scale) = meters_per_degree((a.lat + b.lat) / 2.0);
    let dn = (a.lat - b.lat) * lat_scale;
    let de = (a.lon - b.lon) * lon_scale;
    (dn * dn + de * de).sqrt()
}

/// Eigenvalue ratio of a symmetric 2x2 matrix; infinite when the matrix is
/// rank-deficient
pub fn condition_number(m: &Matrix2<f64>) -> f64 {
    let a = m[(0, 0)];
    let b = m[(0, 1)];
    let c = m[(1, 1)];
    let mean = (a + c) / 2.0;
    let radius = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let lambda_max = mean + radius;
    let lambda_min = mean - radius;
    if lambda_min <= f64::EPSILON * lambda_max.abs().max(1.0) {
        f64::INFINITY
    } else {
        lambda_max / lambda_min
    }
}

/// Solve a symmetric positive-definite 2x2 system, refusing ill-conditioned
/// inputs rather than amplifying noise
pub fn solve_normal_equations(m: &Matrix2<f64>, rhs: &Vector2<f64>) -> Option<Vector2<f64>> {
    if condition_number(m) > MAX_CONDITION_NUMBER {
        return None;
    }
    let solution = m.try_inverse()? * rhs;
    if solution.x.is_finite() && solution.y.is_finite() {
        Some(solution)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_round_trip() {
        let reference = GeoPoint::new(47.6, -122.3);
        let point = GeoPoint::new(47.6021, -122.2987);
        let round_tripped = to_geodetic(to_local(point, reference), reference);
        assert!((round_tripped.lat - point.lat).abs() < 1e-12);
        assert!((round_tripped.lon - point.lon).abs() < 1e-12);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = GeoPoint::new(47.0, -122.0);
        let b = GeoPoint::new(48.0, -122.0);
        let d = distance_m(a, b);
        assert!((d - METERS_PER_DEG_LAT).abs() < 1.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(47.6, -122.3);
        let b = GeoPoint::new(47.7, -122.1);
        assert_eq!(distance_m(a, b), distance_m(b, a));
    }

    #[test]
    fn test_condition_number_identity() {
        assert!((condition_number(&Matrix2::identity()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_refused() {
        // Rank-one matrix from parallel unit vectors
        let m = Matrix2::new(1.0, 1.0, 1.0, 1.0);
        assert!(condition_number(&m).is_infinite());
        assert!(solve_normal_equations(&m, &Vector2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_well_conditioned_solve() {
        let m = Matrix2::new(4.0, 1.0, 1.0, 3.0);
        let rhs = Vector2::new(1.0, 2.0);
        let x = solve_normal_equations(&m, &rhs).unwrap();
        let back = m * x;
        assert!((back - rhs).norm() < 1e-12);
    }
}
