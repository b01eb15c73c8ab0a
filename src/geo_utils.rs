//! Geographic utilities.
//!
//! Great-circle distance on the standard spherical Earth model. Pure
//! functions, no state.

use crate::{Position, Result, TrackerError};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two positions in meters (haversine).
///
/// Exactly symmetric (`distance_meters(a, b) == distance_meters(b, a)`) and
/// exactly zero for identical inputs. Fails with `InvalidCoordinates` if
/// either latitude is outside [-90, 90] or longitude outside [-180, 180];
/// callers are expected to have already validated or clamped.
///
/// # Example
/// ```
/// use balloon_tracker::{distance_meters, Position};
///
/// let london = Position::new(51.5074, -0.1278);
/// let paris = Position::new(48.8566, 2.3522);
/// let d = distance_meters(&london, &paris).unwrap();
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn distance_meters(a: &Position, b: &Position) -> Result<f64> {
    if !a.is_valid() {
        return Err(TrackerError::InvalidCoordinates {
            lat: a.lat,
            lon: a.lon,
        });
    }
    if !b.is_valid() {
        return Err(TrackerError::InvalidCoordinates {
            lat: b.lat,
            lon: b.lon,
        });
    }
    Ok(haversine_meters(a, b))
}

/// Haversine distance without range validation.
///
/// For hot loops over already-validated positions.
pub(crate) fn haversine_meters(a: &Position, b: &Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
