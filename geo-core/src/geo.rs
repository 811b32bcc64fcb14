use geo_types::LatLng;

/// Mean Earth radius, spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Score awarded for a perfect guess.
pub const MAX_SCORE: u32 = 5000;

/// Distance at or beyond which a guess scores zero.
pub const SCORE_CUTOFF_KM: f64 = 15_000.0;

/// e-folding distance of the scoring curve.
const SCORE_DECAY_KM: f64 = 2_000.0;

/// Great-circle distance between two points via the haversine formula.
///
/// Symmetric, zero for identical points.
pub fn distance_km(a: LatLng, b: LatLng) -> f64 {
    let p1 = a.lat.to_radians();
    let p2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let x = (dlat / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * x.sqrt().min(1.0).asin()
}

/// Scoring curve: `round(MAX_SCORE * exp(-d / 2000))`, clamped to
/// `[0, MAX_SCORE]`, with a hard cutoff at [`SCORE_CUTOFF_KM`].
///
/// Monotonically non-increasing in distance so results are reproducible
/// from stored distances alone.
pub fn score_from_distance(distance_km: f64) -> u32 {
    if !distance_km.is_finite() || distance_km >= SCORE_CUTOFF_KM {
        return 0;
    }
    let s = f64::from(MAX_SCORE) * (-distance_km / SCORE_DECAY_KM).exp();
    (s.round() as u32).min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> LatLng {
        LatLng { lat, lng }
    }

    #[test]
    fn test_distance_is_zero_for_identical_points() {
        let paris = p(48.8566, 2.3522);
        assert_eq!(distance_km(paris, paris), 0.0);
        assert_eq!(distance_km(p(0.0, 0.0), p(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = p(48.8566, 2.3522);
        let b = p(-33.8688, 151.2093);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_known_distances() {
        // Paris to a nearby point, roughly 0.8 km
        let d = distance_km(p(48.8566, 2.3522), p(48.85, 2.35));
        assert!(d > 0.5 && d < 1.1, "got {d}");

        // Paris - New York, roughly 5837 km
        let d = distance_km(p(48.8566, 2.3522), p(40.7128, -74.0060));
        assert!((d - 5837.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn test_antipodal_points_do_not_exceed_half_circumference() {
        let d = distance_km(p(0.0, 0.0), p(0.0, 180.0));
        assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
    }

    #[test]
    fn test_score_at_zero_is_max() {
        assert_eq!(score_from_distance(0.0), MAX_SCORE);
    }

    #[test]
    fn test_score_is_monotonically_non_increasing() {
        let mut prev = score_from_distance(0.0);
        for step in 1..=200 {
            let d = f64::from(step) * 100.0;
            let s = score_from_distance(d);
            assert!(s <= prev, "score rose at {d} km: {s} > {prev}");
            prev = s;
        }
    }

    #[test]
    fn test_score_is_zero_at_and_beyond_cutoff() {
        assert_eq!(score_from_distance(SCORE_CUTOFF_KM), 0);
        assert_eq!(score_from_distance(SCORE_CUTOFF_KM + 1.0), 0);
        assert_eq!(score_from_distance(20_015.0), 0);
    }

    #[test]
    fn test_close_guess_scores_near_max() {
        // Scenario: ~0.8 km off should lose almost nothing
        let s = score_from_distance(0.8);
        assert!(s >= 4990, "got {s}");
    }
}
