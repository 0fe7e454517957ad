//! Driver earnings estimate for a ride.

use serde::{Deserialize, Serialize};

use crate::ride::Ride;

/// Base fare in currency units.
pub const BASE_FARE: f64 = 50.0;

/// Per-kilometer rate in currency units.
pub const PER_KM_RATE: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareEstimate {
    pub distance_km: f64,
    pub distance_text: String,
    pub earnings: f64,
}

/// Formula: `earnings = BASE_FARE + (distance_km * PER_KM_RATE)`, with the
/// straight-line distance between pickup and destination.
///
/// Returns `None` when either endpoint has an invalid coordinate.
pub fn estimate_fare(ride: &Ride) -> Option<FareEstimate> {
    let pickup = ride.pickup.coordinate().ok()?;
    let destination = ride.destination.coordinate().ok()?;

    // Whole meters, like the map SDK reports.
    let meters = pickup.distance_to(destination).round();
    let distance_km = meters / 1000.0;

    Some(FareEstimate {
        distance_km,
        distance_text: distance_label(meters),
        earnings: BASE_FARE + distance_km * PER_KM_RATE,
    })
}

/// `"850 m"` under a kilometer, one decimal up to ten, whole km beyond.
fn distance_label(meters: f64) -> String {
    match meters {
        m if m < 1_000.0 => format!("{m:.0} m"),
        m if m < 10_000.0 => format!("{:.1} km", m / 1_000.0),
        m => format!("{:.0} km", m / 1_000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RideId, UserId};
    use crate::ride::{Location, RideStatus};
    use chrono::{TimeZone, Utc};

    fn ride(pickup: Location, destination: Location) -> Ride {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Ride {
            id: RideId::new("r1"),
            rider_id: UserId::new("c1"),
            driver_id: None,
            pickup,
            destination,
            status: RideStatus::Pending,
            requested_at: at,
            scheduled_pickup_at: at,
            rider: None,
        }
    }

    #[test]
    fn same_point_costs_base_fare() {
        let p = Location::new(37.78, -122.41);
        let estimate = estimate_fare(&ride(p.clone(), p)).unwrap();
        assert_eq!(estimate.distance_km, 0.0);
        assert_eq!(estimate.earnings, BASE_FARE);
        assert_eq!(estimate.distance_text, "0 m");
    }

    #[test]
    fn fare_includes_base_and_distance() {
        // One degree of latitude is ~111.2 km.
        let estimate = estimate_fare(&ride(
            Location::new(10.0, 20.0),
            Location::new(11.0, 20.0),
        ))
        .unwrap();
        assert!((estimate.distance_km - 111.2).abs() < 0.5);
        let expected = BASE_FARE + estimate.distance_km * PER_KM_RATE;
        assert!((estimate.earnings - expected).abs() < 1e-9);
    }

    #[test]
    fn invalid_coordinates_have_no_estimate() {
        assert!(estimate_fare(&ride(
            Location::new(f64::NAN, 0.0),
            Location::new(1.0, 1.0)
        ))
        .is_none());
    }

    #[test]
    fn distance_labels() {
        assert_eq!(distance_label(850.0), "850 m");
        assert_eq!(distance_label(4_200.0), "4.2 km");
        assert_eq!(distance_label(12_400.0), "12 km");
    }
}
