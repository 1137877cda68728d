//! Spherical geometry used by the point and yaw loops.
//!
//! Angles handed to [`angular_gap`] and [`rotation_sign`] are degrees in
//! (-180, 180]. [`bearing`] returns radians so it can be compared directly
//! against the attitude yaw reported by the autopilot.

use thiserror::Error;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeoError {
    /// x component of the bearing formula is zero (same point, or a
    /// meridian/antipodal edge case); the quotient y/x has no value.
    #[error("bearing undefined: zero x component")]
    DegenerateBearing,
}

/// Initial great-circle bearing from point 1 to point 2, in signed radians.
///
/// Uses `atan(y / x)` with an explicit quadrant correction instead of
/// `atan2`, normalizes to (-180°, 180°] and flips the sign to match the
/// vehicle yaw convention.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<f64, GeoError> {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    let y = dlon.sin() * phi2.cos();
    if x == 0.0 {
        return Err(GeoError::DegenerateBearing);
    }

    let mut deg = (y / x).atan().to_degrees();
    if x < 0.0 {
        deg += 180.0;
    }
    if deg > 180.0 {
        deg -= 360.0;
    } else if deg <= -180.0 {
        deg += 360.0;
    }

    Ok((-deg).to_radians())
}

/// Unsigned shortest rotation between two headings, in degrees.
pub fn angular_gap(a1: f64, a2: f64) -> f64 {
    // zero counts as sharing the sign of anything
    if a1 * a2 >= 0.0 {
        (a1.abs() - a2.abs()).abs()
    } else {
        let sum = a1.abs() + a2.abs();
        sum.min(360.0 - sum)
    }
}

/// Direction to turn from `a1` towards `a2`: -1 when `a1` is the larger raw
/// value (ties included), +1 otherwise.
///
/// Compares raw values, not angular distance, so the chosen direction is not
/// always the short way round (10° -> -10° turns negative, and so does
/// 170° -> -170°).
pub fn rotation_sign(a1: f64, a2: f64) -> i32 {
    if a1 >= a2 {
        -1
    } else {
        1
    }
}

/// Geodesic distance in meters between two `(lon, lat)` pairs (degrees),
/// haversine on a sphere of mean Earth radius.
pub fn planar_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lon1, lat1) = a;
    let (lon2, lat2) = b;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [f64; 11] = [-180.0, -179.5, -135.0, -90.0, -10.0, 0.0, 0.9, 10.0, 90.0, 170.0, 180.0];

    #[test]
    fn test_angular_gap_same_angle_is_zero() {
        for a in SAMPLES {
            assert_eq!(angular_gap(a, a), 0.0, "a={a}");
        }
    }

    #[test]
    fn test_angular_gap_symmetric_and_bounded() {
        for a in SAMPLES {
            for b in SAMPLES {
                let ab = angular_gap(a, b);
                assert_eq!(ab, angular_gap(b, a), "a={a} b={b}");
                assert!((0.0..=180.0).contains(&ab), "a={a} b={b} gap={ab}");
            }
        }
    }

    #[test]
    fn test_angular_gap_wraps_through_180() {
        assert!((angular_gap(170.0, -170.0) - 20.0).abs() < 1e-9);
        assert!((angular_gap(-10.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angular_gap(30.0, 10.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_sign_compares_raw_values() {
        assert_eq!(rotation_sign(10.0, -10.0), -1);
        assert_eq!(rotation_sign(-10.0, 10.0), 1);
        // short way is positive here, the heuristic still says -1
        assert_eq!(rotation_sign(170.0, -170.0), -1);
        assert_eq!(rotation_sign(5.0, 5.0), -1);
    }

    #[test]
    fn test_bearing_same_point_is_degenerate() {
        assert_eq!(
            bearing(50.443326, 30.448078, 50.443326, 30.448078),
            Err(GeoError::DegenerateBearing)
        );
        assert_eq!(bearing(0.0, 0.0, 0.0, 0.0), Err(GeoError::DegenerateBearing));
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let north = bearing(50.0, 30.0, 50.1, 30.0).unwrap();
        assert!(north.abs() < 1e-9);

        let south = bearing(50.1, 30.0, 50.0, 30.0).unwrap();
        assert!((south.to_degrees() + 180.0).abs() < 1e-9);

        // east comes out negative, west positive
        let east = bearing(50.0, 30.0, 50.0, 30.1).unwrap();
        assert!((east.to_degrees() + 90.0).abs() < 1.0, "east={}", east.to_degrees());

        let west = bearing(50.0, 30.1, 50.0, 30.0).unwrap();
        assert!((west.to_degrees() - 90.0).abs() < 1.0, "west={}", west.to_degrees());
    }

    #[test]
    fn test_bearing_quadrant_correction() {
        // south-east target: x < 0 branch, lands in (-180, -90)
        let se = bearing(50.0, 30.0, 49.9, 30.1).unwrap().to_degrees();
        assert!(se < -90.0 && se > -180.0, "se={se}");
        // south-west target: wraps back into (90, 180)
        let sw = bearing(50.0, 30.1, 49.9, 30.0).unwrap().to_degrees();
        assert!(sw > 90.0 && sw < 180.0, "sw={sw}");
    }

    #[test]
    fn test_planar_distance_one_degree_latitude() {
        let d = planar_distance((30.0, 50.0), (30.0, 51.0));
        assert!((d - 111_195.0).abs() < 1.0, "d={d}");
    }

    #[test]
    fn test_planar_distance_zero_and_symmetric() {
        let a = (30.448078, 50.443326);
        let b = (30.449, 50.444);
        assert_eq!(planar_distance(a, a), 0.0);
        assert!((planar_distance(a, b) - planar_distance(b, a)).abs() < 1e-9);
    }
}
