//! Coordinate Transforms
//!
//! Pure functions converting between the radar's polar frame, geographic
//! coordinates and a local metric plane centred on the sensor origin.
//!
//! All conversions use the equirectangular approximation that harbor radars
//! get away with at short range (< 50 nm): one degree of latitude is a fixed
//! number of meters and longitude is scaled by the cosine of the origin
//! latitude. Distances between two geographic points use the haversine
//! formula instead.
//!
//! None of these functions validate their inputs. NaN in, NaN out.

use serde::{Deserialize, Serialize};

/// Meters per nautical mile
pub const NAUTICAL_MILE: f64 = 1852.0;

/// Meters per degree of latitude used by the local approximation
pub const METERS_PER_DEGREE_LATITUDE: f64 = 111_000.0;

/// Mean earth radius in meters (haversine)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Knots to meters per second
pub const KN_TO_MS: f64 = NAUTICAL_MILE / 3600.0;

/// Meters per second to knots
pub const MS_TO_KN: f64 = 3600.0 / NAUTICAL_MILE;

/// Meters per degree of longitude at the given latitude
pub fn meters_per_degree_longitude(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * lat_deg.to_radians().cos()
}

/// A geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance_m(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Convert a range/bearing pair measured from `origin` into a geographic point.
///
/// # Arguments
/// * `distance_nm` - Range in nautical miles
/// * `bearing_deg` - True bearing in degrees, clockwise from north
/// * `origin_lat`, `origin_lon` - Sensor position in degrees
///
/// # Returns
/// `(lat, lon)` in degrees
pub fn polar_to_geographic(
    distance_nm: f64,
    bearing_deg: f64,
    origin_lat: f64,
    origin_lon: f64,
) -> (f64, f64) {
    let distance_deg = distance_nm * NAUTICAL_MILE / METERS_PER_DEGREE_LATITUDE;
    let bearing = bearing_deg.to_radians();

    let lat = origin_lat + distance_deg * bearing.cos();
    let lon = origin_lon + distance_deg * bearing.sin() / origin_lat.to_radians().cos();

    (lat, lon)
}

/// Great-circle distance between two points in meters.
///
/// Symmetric, never negative, zero when both points coincide.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `from` to `to`, in degrees [0, 360)
pub fn initial_bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Range (nautical miles) and bearing (degrees) of `point` as seen from `origin`.
///
/// Used to synthesize radar contacts for a known geographic position.
pub fn geographic_to_polar(point: &GeoPoint, origin: &GeoPoint) -> (f64, f64) {
    let distance_nm = origin.distance_to(point) / NAUTICAL_MILE;
    let bearing = initial_bearing_deg(origin, point);
    (distance_nm, bearing)
}

/// Project a geographic point onto the local plane around `origin`.
///
/// Returns `(east_m, north_m)`, with the same scaling as [`polar_to_geographic`].
pub fn to_local(point: &GeoPoint, origin: &GeoPoint) -> (f64, f64) {
    let east = (point.lon - origin.lon) * meters_per_degree_longitude(origin.lat);
    let north = (point.lat - origin.lat) * METERS_PER_DEGREE_LATITUDE;
    (east, north)
}

/// Inverse of [`to_local`]
pub fn from_local(east_m: f64, north_m: f64, origin: &GeoPoint) -> GeoPoint {
    GeoPoint {
        lat: origin.lat + north_m / METERS_PER_DEGREE_LATITUDE,
        lon: origin.lon + east_m / meters_per_degree_longitude(origin.lat),
    }
}
