//! Geodesic helpers for bounding-box sizing.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Wraps any longitude into the `[-180, 180)` window.
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Planar approximation of the area covered by a lat/lng rectangle, in m².
///
/// Height and width are both great-circle arc lengths of the respective
/// deltas. The width is not foreshortened by cos(latitude), so boxes far
/// from the equator are overestimated.
pub fn estimate_area(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    let height = arc_length(lat2 - lat1);
    let width = arc_length(lng2 - lng1);
    (width * height).abs()
}

fn arc_length(delta_deg: f64) -> f64 {
    let half = (delta_deg.to_radians() / 2.0).sin();
    let a = half * half;
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_large_values() {
        assert_eq!(normalize_longitude(450.0), 90.0);
        assert_eq!(normalize_longitude(90.0), 90.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        assert_eq!(normalize_longitude(-540.0), -180.0);
        assert_eq!(normalize_longitude(0.0), 0.0);
    }

    #[test]
    fn normalize_is_idempotent_and_periodic() {
        for lon in [-1234.5, -361.0, -180.0, -45.25, 0.5, 179.9, 720.0, 9999.0] {
            let once = normalize_longitude(lon);
            assert!((-180.0..180.0).contains(&once), "{lon} -> {once}");
            assert!((normalize_longitude(once) - once).abs() < 1e-9);
            assert!((normalize_longitude(lon + 360.0) - once).abs() < 1e-9);
            assert!((normalize_longitude(lon - 720.0) - once).abs() < 1e-9);
        }
    }

    #[test]
    fn area_is_non_negative_and_corner_symmetric() {
        let boxes = [
            (13.38, 52.51, 13.40, 52.52),
            (-0.2, 51.6, 0.1, 51.4),
            (10.0, -5.0, -10.0, 5.0),
        ];
        for (lng1, lat1, lng2, lat2) in boxes {
            let forward = estimate_area(lng1, lat1, lng2, lat2);
            let swapped = estimate_area(lng2, lat2, lng1, lat1);
            assert!(forward >= 0.0);
            assert!((forward - swapped).abs() < 1e-6);
        }
    }

    #[test]
    fn degenerate_box_has_zero_area() {
        assert_eq!(estimate_area(5.0, 5.0, 5.0, 10.0), 0.0);
    }

    #[test]
    fn one_hundredth_degree_square() {
        // 0.01° of arc is ~1111.95 m on this sphere.
        let area = estimate_area(0.0, 0.0, 0.01, 0.01);
        let side = EARTH_RADIUS_M * 0.01_f64.to_radians();
        assert!((area - side * side).abs() < 1.0);
    }
}
