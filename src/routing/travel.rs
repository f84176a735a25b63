use chrono::Duration;

use crate::models::Location;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates (km)
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Estimated travel time between two coordinates at an average speed
///
/// Whole seconds; zero-distance legs cost nothing.
pub fn travel_time(a: Location, b: Location, average_speed_kmh: f64) -> Duration {
    let km = haversine_km(a, b);
    if km <= f64::EPSILON || average_speed_kmh <= 0.0 {
        return Duration::zero();
    }
    Duration::seconds((km / average_speed_kmh * 3600.0).round() as i64)
}
