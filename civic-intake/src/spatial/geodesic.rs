//! Geodesic distance on the WGS84 ellipsoid
//!
//! Vincenty's inverse formula. Nearly antipodal points can fail to converge;
//! those fall back to a haversine distance on the mean Earth radius, which is
//! within 0.5% and only matters far outside any duplicate radius.

use crate::types::Coordinate;

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters)
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// IUGG mean Earth radius (meters)
const MEAN_RADIUS: f64 = 6_371_008.8;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Ellipsoidal distance in meters between two coordinates
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    vincenty_inverse(a, b).unwrap_or_else(|| haversine_meters(a, b))
}

/// Vincenty inverse; `None` if the iteration does not converge
fn vincenty_inverse(a: &Coordinate, b: &Coordinate) -> Option<f64> {
    let l = (b.longitude - a.longitude).to_radians();
    let u1 = ((1.0 - WGS84_F) * a.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // Coincident points
            return Some(0.0);
        }

        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial line: cos²α = 0
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));

        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < CONVERGENCE {
            let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

            return Some(WGS84_B * big_a * (sigma - delta_sigma));
        }
    }

    None
}

/// Great-circle distance on a sphere of the mean Earth radius
pub fn haversine_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * MEAN_RADIUS * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude box guaranteed to contain every point within
/// `radius_meters` of `center`
///
/// Returns `(min_lat, max_lat, min_lon, max_lon)`. `min_lon > max_lon` when the
/// box crosses the antimeridian.
pub fn bounding_box(center: &Coordinate, radius_meters: f64) -> (f64, f64, f64, f64) {
    // Shortest degree of latitude on WGS84 is ~110.574 km; 10% margin on top
    let lat_delta = radius_meters / 110_574.0 * 1.1;
    let min_lat = (center.latitude - lat_delta).max(-90.0);
    let max_lat = (center.latitude + lat_delta).min(90.0);

    // Widest parallel inside the box bounds the longitude span
    let widest = min_lat.abs().max(max_lat.abs());
    let cos_lat = widest.to_radians().cos();
    if widest >= 90.0 || cos_lat <= 1e-9 {
        return (min_lat, max_lat, -180.0, 180.0);
    }

    let lon_delta = radius_meters / (111_320.0 * cos_lat) * 1.1;
    if lon_delta >= 180.0 {
        return (min_lat, max_lat, -180.0, 180.0);
    }

    let mut min_lon = center.longitude - lon_delta;
    let mut max_lon = center.longitude + lon_delta;
    if min_lon < -180.0 {
        min_lon += 360.0;
    }
    if max_lon > 180.0 {
        max_lon -= 360.0;
    }
    (min_lat, max_lat, min_lon, max_lon)
}
