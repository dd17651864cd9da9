//! Sensor Contacts
//!
//! Typed records produced by the ingestion side for one sensor cycle. The
//! fusion engine only reads them.

use serde::{Deserialize, Serialize};

use crate::geo::{polar_to_geographic, GeoPoint, KN_TO_MS, NAUTICAL_MILE};

/// A single radar plot from the station's tracker.
///
/// Station-local ids are not stable across targets; the radar may hand the
/// same id to a different vessel later on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarContact {
    /// Station-local target id
    pub id: String,
    /// Range from the sensor in nautical miles
    pub distance_nm: f64,
    /// True bearing from the sensor in degrees [0, 360)
    pub bearing_deg: f64,
    /// Speed over ground in knots
    pub speed_kn: f64,
    /// Course over ground in degrees
    pub course_deg: f64,
    /// Capture time (milliseconds since epoch)
    pub timestamp: u64,
}

impl RadarContact {
    pub fn new(
        id: impl Into<String>,
        distance_nm: f64,
        bearing_deg: f64,
        speed_kn: f64,
        course_deg: f64,
        timestamp: u64,
    ) -> Self {
        RadarContact {
            id: id.into(),
            distance_nm,
            bearing_deg,
            speed_kn,
            course_deg,
            timestamp,
        }
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_nm * NAUTICAL_MILE
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed_kn * KN_TO_MS
    }

    /// Geographic position of this contact for a sensor at `origin`
    pub fn position(&self, origin: &GeoPoint) -> GeoPoint {
        let (lat, lon) =
            polar_to_geographic(self.distance_nm, self.bearing_deg, origin.lat, origin.lon);
        GeoPoint { lat, lon }
    }
}

/// Optional static and voyage data carried by AIS type 5/24 messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoyageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// A position report from one AIS transponder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AisContact {
    /// Maritime Mobile Service Identity
    pub mmsi: String,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground in knots
    pub speed_kn: f64,
    /// Course over ground in degrees
    pub course_deg: f64,
    /// True heading in degrees, None when the transponder reports 511
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub voyage: VoyageData,
    /// Capture time (milliseconds since epoch)
    pub timestamp: u64,
}

impl AisContact {
    pub fn new(
        mmsi: impl Into<String>,
        lat: f64,
        lon: f64,
        speed_kn: f64,
        course_deg: f64,
        timestamp: u64,
    ) -> Self {
        AisContact {
            mmsi: mmsi.into(),
            lat,
            lon,
            speed_kn,
            course_deg,
            heading_deg: None,
            voyage: VoyageData::default(),
            timestamp,
        }
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn with_voyage(mut self, voyage: VoyageData) -> Self {
        self.voyage = voyage;
        self
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed_kn * KN_TO_MS
    }
}
