use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Latest known position of a courier while out on an order. Replaced
/// wholesale on every push, never patched field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierLocation {
    pub courier_id: Uuid,
    pub order_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl CourierLocation {
    pub fn new(
        courier_id: Uuid,
        order_id: Uuid,
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        speed: Option<f64>,
    ) -> Result<Self, AppError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::Validation(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::Validation(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        if let Some(h) = heading {
            if !(0.0..360.0).contains(&h) {
                return Err(AppError::Validation(format!(
                    "heading {h} out of range [0, 360)"
                )));
            }
        }
        if let Some(s) = speed {
            if !s.is_finite() || s < 0.0 {
                return Err(AppError::Validation(format!(
                    "speed {s} must be a finite non-negative number"
                )));
            }
        }

        Ok(Self {
            courier_id,
            order_id,
            latitude,
            longitude,
            heading,
            speed,
            recorded_at: Utc::now(),
        })
    }

    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(300));
        now - self.recorded_at > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn push(lat: f64, lng: f64, heading: Option<f64>, speed: Option<f64>) -> Result<CourierLocation, AppError> {
        CourierLocation::new(Uuid::new_v4(), Uuid::new_v4(), lat, lng, heading, speed)
    }

    #[test]
    fn accepts_coordinates_at_the_edges() {
        assert!(push(-90.0, 180.0, Some(0.0), Some(0.0)).is_ok());
        assert!(push(90.0, -180.0, Some(359.9), None).is_ok());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(push(-90.1, 0.0, None, None).is_err());
        assert!(push(0.0, 180.5, None, None).is_err());
        assert!(push(0.0, 0.0, Some(360.0), None).is_err());
        assert!(push(0.0, 0.0, None, Some(-1.0)).is_err());
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(push(f64::NAN, 0.0, None, None).is_err());
        assert!(push(0.0, f64::NAN, None, None).is_err());
        assert!(push(0.0, 0.0, Some(f64::NAN), None).is_err());
        assert!(push(0.0, 0.0, None, Some(f64::NAN)).is_err());
        assert!(push(0.0, 0.0, None, Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn expiry_respects_the_validity_window() {
        let location = push(-23.55, -46.63, None, None).unwrap();
        let ttl = StdDuration::from_secs(300);

        let just_inside = location.recorded_at + Duration::seconds(299);
        let just_outside = location.recorded_at + Duration::seconds(301);

        assert!(!location.is_expired(ttl, just_inside));
        assert!(location.is_expired(ttl, just_outside));
    }
}
