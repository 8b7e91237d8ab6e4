//! Great-circle distance and azimuth on a spherical Earth.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance, azimuth, and back azimuth between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceAzimuth {
    /// Distance along the great circle in meters.
    pub distance_in_m: f64,
    /// Azimuth from the first point to the second, degrees clockwise from north in `[0, 360)`.
    pub azimuth: f64,
    /// Azimuth from the second point back to the first, in `[0, 360)`.
    pub back_azimuth: f64,
}

/// Compute the great-circle distance and azimuths from `(lat1, lon1)` to `(lat2, lon2)`.
///
/// Coordinates are in degrees. Uses the haversine formula for distance and
/// the initial great-circle bearing for azimuth.
#[must_use]
pub fn distance_azimuth(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> DistanceAzimuth {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    DistanceAzimuth {
        distance_in_m: EARTH_RADIUS_M * c,
        azimuth: bearing(phi1, phi2, dlon),
        back_azimuth: bearing(phi2, phi1, -dlon),
    }
}

fn bearing(phi1: f64, phi2: f64, dlon: f64) -> f64 {
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    wrap_degrees(y.atan2(x).to_degrees())
}

/// Map an angle in degrees into `[0, 360)`.
fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_along_equator() {
        let da = distance_azimuth(0.0, 0.0, 0.0, 1.0);
        assert!((da.distance_in_m - 111_195.0).abs() < 1.0, "{}", da.distance_in_m);
        assert!((da.azimuth - 90.0).abs() < 1e-9);
        assert!((da.back_azimuth - 270.0).abs() < 1e-9);
    }

    #[test]
    fn due_north() {
        let da = distance_azimuth(10.0, 20.0, 12.0, 20.0);
        assert!(da.azimuth.abs() < 1e-9);
        assert!((da.back_azimuth - 180.0).abs() < 1e-9);
    }

    #[test]
    fn coincident_points() {
        let da = distance_azimuth(61.0, -150.0, 61.0, -150.0);
        assert_eq!(da.distance_in_m, 0.0);
        assert!((0.0..360.0).contains(&da.azimuth));
    }

    #[test]
    fn wrap_degrees_stays_below_360() {
        assert_eq!((-1e-15_f64).rem_euclid(360.0), 360.0);
        assert_eq!(wrap_degrees(-1e-15), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }

    #[test]
    fn azimuth_in_range_for_westward_target() {
        let da = distance_azimuth(0.0, 0.0, -1.0, -1.0);
        assert!(da.azimuth > 180.0 && da.azimuth < 270.0, "{}", da.azimuth);
    }
}
