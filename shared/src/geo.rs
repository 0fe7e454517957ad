use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Degrees of padding added around a fitted pair of points.
const BOUNDS_PADDING_DEG: f64 = 0.005;

#[derive(Debug, Clone, Copy, Error, PartialEq)]
#[error("({lat}, {lng}) is not a position on Earth")]
pub struct InvalidCoordinate {
    pub lat: f64,
    pub lng: f64,
}

/// A latitude/longitude pair known to lie on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        // Range checks are false for NaN, so they reject it too.
        if lat.abs() <= 90.0 && lng.abs() <= 180.0 {
            Ok(Self { lat, lng })
        } else {
            Err(InvalidCoordinate { lat, lng })
        }
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }

    /// Rounds to 5 decimals (about 1 m), good enough to share an address.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn grid_key(self) -> (i64, i64) {
        (
            (self.lat * 100_000.0).round() as i64,
            (self.lng * 100_000.0).round() as i64,
        )
    }

    /// Great-circle distance in meters.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        let (from_lat, to_lat) = (self.lat.to_radians(), other.lat.to_radians());
        let half_dlat = (to_lat - from_lat) / 2.0;
        let half_dlng = (other.lng - self.lng).to_radians() / 2.0;

        let h = half_dlat.sin().powi(2) + from_lat.cos() * to_lat.cos() * half_dlng.sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
    }
}

/// Region the map should fit to show a ride's pickup and destination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl MapBounds {
    #[must_use]
    pub fn around(a: Coordinate, b: Coordinate) -> Self {
        Self {
            south: (a.lat.min(b.lat) - BOUNDS_PADDING_DEG).max(-90.0),
            west: (a.lng.min(b.lng) - BOUNDS_PADDING_DEG).max(-180.0),
            north: (a.lat.max(b.lat) + BOUNDS_PADDING_DEG).min(90.0),
            east: (a.lng.max(b.lng) + BOUNDS_PADDING_DEG).min(180.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_points_off_the_globe() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(InvalidCoordinate { lat: 91.0, lng: 0.0 })
        );
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn distance_between_cities() {
        let sf = Coordinate::new(37.7749, -122.4194).unwrap();
        let oakland = Coordinate::new(37.8044, -122.2712).unwrap();
        let meters = sf.distance_to(oakland);
        assert!((meters - 13_400.0).abs() < 300.0, "got {meters}");
        assert_eq!(sf.distance_to(sf), 0.0);
        assert!((sf.distance_to(oakland) - oakland.distance_to(sf)).abs() < 1e-6);
    }

    #[test]
    fn grid_key_merges_nearby_points() {
        let a = Coordinate::new(37.774_921, -122.419_41).unwrap();
        let b = Coordinate::new(37.774_919, -122.419_412).unwrap();
        assert_eq!(a.grid_key(), b.grid_key());
    }

    #[test]
    fn bounds_contain_both_points() {
        let a = Coordinate::new(37.78, -122.41).unwrap();
        let b = Coordinate::new(37.80, -122.27).unwrap();
        let bounds = MapBounds::around(a, b);
        assert!(bounds.south < a.lat && a.lat < b.lat && b.lat < bounds.north);
        assert!(bounds.west < a.lng && b.lng < bounds.east);
    }
}
