//! Great-circle distance on a spherical-Earth approximation.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per nautical mile.
const METERS_PER_NM: f64 = 1_852.0;

/// Haversine distance between two points, in nautical miles.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c / METERS_PER_NM
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_distance_for_identical_points() {
        assert_eq!(haversine_nm(35.25, -97.47, 35.25, -97.47), 0.0);
    }

    #[test]
    fn test_one_degree_latitude_is_sixty_nm() {
        // One degree of latitude is 60 NM by definition of the nautical
        // mile; the spherical approximation lands within half a mile.
        let d = haversine_nm(35.0, -97.0, 36.0, -97.0);
        assert!((d - 60.0).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_known_leg_kokc_to_ktul() {
        // KOKC (35.3931, -97.6007) to KTUL (36.1984, -95.8881) is about
        // 95 NM great-circle.
        let d = haversine_nm(35.3931, -97.6007, 36.1984, -95.8881);
        assert!((d - 95.0).abs() < 2.0, "got {d}");
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -85.0f64..85.0,
            lon1 in -180.0f64..180.0,
            lat2 in -85.0f64..85.0,
            lon2 in -180.0f64..180.0,
        ) {
            let forward = haversine_nm(lat1, lon1, lat2, lon2);
            let reverse = haversine_nm(lat2, lon2, lat1, lon1);
            prop_assert!((forward - reverse).abs() < 1e-9);
        }

        #[test]
        fn prop_distance_is_non_negative(
            lat1 in -85.0f64..85.0,
            lon1 in -180.0f64..180.0,
            lat2 in -85.0f64..85.0,
            lon2 in -180.0f64..180.0,
        ) {
            prop_assert!(haversine_nm(lat1, lon1, lat2, lon2) >= 0.0);
        }

        #[test]
        fn prop_self_distance_is_zero(
            lat in -85.0f64..85.0,
            lon in -180.0f64..180.0,
        ) {
            prop_assert!(haversine_nm(lat, lon, lat, lon).abs() < 1e-9);
        }
    }
}
