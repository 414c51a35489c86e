// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Home presence detection from GPS fixes.

/// Mean Earth radius in meters, as used by the haversine formula here.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS-84 coordinates, in meters.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Classifies GPS fixes as at-home / away against a configured home point.
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    home: Option<(f64, f64)>,
    radius_m: f64,
}

impl PresenceDetector {
    /// `home` may be unknown; in that case every fix classifies as away
    /// rather than blocking the poll cycle.
    pub fn new(home: Option<(f64, f64)>, radius_m: f64) -> Self {
        Self { home, radius_m }
    }

    pub fn has_home(&self) -> bool {
        self.home.is_some()
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// True iff the fix is within the home radius (boundary inclusive).
    pub fn is_at_home(&self, lat: f64, lon: f64) -> bool {
        let Some((home_lat, home_lon)) = self.home else {
            return false;
        };
        let distance = haversine_distance_m(lat, lon, home_lat, home_lon);
        tracing::debug!(distance_m = distance, radius_m = self.radius_m, "Home distance");
        distance <= self.radius_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: (f64, f64) = (48.8566, 2.3522);

    #[test]
    fn test_zero_distance_is_home() {
        let detector = PresenceDetector::new(Some(PARIS), 25.0);
        assert!(detector.is_at_home(PARIS.0, PARIS.1));
    }

    #[test]
    fn test_445m_north_is_away() {
        // 0.004 degrees of latitude is roughly 445 m
        let detector = PresenceDetector::new(Some(PARIS), 25.0);
        let distance = haversine_distance_m(48.8606, 2.3522, PARIS.0, PARIS.1);
        assert!((distance - 445.0).abs() < 5.0);
        assert!(!detector.is_at_home(48.8606, 2.3522));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let detector = PresenceDetector::new(Some(PARIS), 0.0);
        assert!(detector.is_at_home(PARIS.0, PARIS.1));
    }

    #[test]
    fn test_distance_symmetric() {
        let d1 = haversine_distance_m(48.8606, 2.3522, PARIS.0, PARIS.1);
        let d2 = haversine_distance_m(PARIS.0, PARIS.1, 48.8606, 2.3522);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_home_is_never_home() {
        let detector = PresenceDetector::new(None, 25.0);
        assert!(!detector.is_at_home(PARIS.0, PARIS.1));
    }
}
