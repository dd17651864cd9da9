//! Simulated Fleet
//!
//! A handful of vessels sailing straight lines around the radar, used to
//! produce radar plots for all of them and AIS reports for the equipped
//! subset. Vessels turn around when they reach the edge of the radar's
//! coverage.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tidewatch_core::contact::VoyageData;
use tidewatch_core::geo::{from_local, polar_to_geographic, to_local, KN_TO_MS, NAUTICAL_MILE};
use tidewatch_core::{AisContact, GeoPoint, RadarContact};

/// Vessels turn back beyond this range
pub const MAX_RANGE_NM: f64 = 4.0;

const MIN_START_RANGE_NM: f64 = 0.3;

/// 1-sigma radar range error
const RANGE_NOISE_M: f64 = 10.0;
/// 1-sigma radar bearing error
const BEARING_NOISE_DEG: f64 = 0.2;
/// 1-sigma AIS (GNSS) position error
const AIS_NOISE_M: f64 = 5.0;

/// MID 200 plus a running number
const MMSI_BASE: u32 = 200_100_000;

const SHIP_TYPES: [&str; 4] = ["Fishing", "Cargo", "Passenger", "Tug"];

#[derive(Debug, Clone)]
pub struct Vessel {
    /// Id the radar tracker reports this vessel under
    pub radar_id: String,
    /// Present when the vessel carries AIS
    pub mmsi: Option<String>,
    pub name: String,
    pub ship_type: &'static str,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
}

#[derive(Debug)]
pub struct Fleet {
    origin: GeoPoint,
    vessels: Vec<Vessel>,
    rng: StdRng,
}

impl Fleet {
    /// Scatter `count` vessels around `origin`; the first
    /// `round(count * ais_ratio)` of them carry AIS.
    pub fn new(count: usize, ais_ratio: f64, origin: GeoPoint, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let with_ais = (count as f64 * ais_ratio.clamp(0.0, 1.0)).round() as usize;

        let vessels = (0..count)
            .map(|i| {
                let range_nm = rng.gen_range(MIN_START_RANGE_NM..MAX_RANGE_NM);
                let bearing = rng.gen_range(0.0..360.0);
                let (lat, lon) = polar_to_geographic(range_nm, bearing, origin.lat, origin.lon);
                Vessel {
                    radar_id: (i + 1).to_string(),
                    mmsi: (i < with_ais).then(|| (MMSI_BASE + i as u32 + 1).to_string()),
                    name: format!("TIDEWATCH {}", i + 1),
                    ship_type: SHIP_TYPES[i % SHIP_TYPES.len()],
                    position: GeoPoint::new(lat, lon),
                    speed_kn: rng.gen_range(2.0..14.0),
                    course_deg: rng.gen_range(0.0..360.0),
                }
            })
            .collect();

        Fleet {
            origin,
            vessels,
            rng,
        }
    }

    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Move every vessel `dt_s` seconds along its course
    pub fn advance(&mut self, dt_s: f64) {
        let max_range_m = MAX_RANGE_NM * NAUTICAL_MILE;
        for vessel in self.vessels.iter_mut() {
            let step = vessel.speed_kn * KN_TO_MS * dt_s;
            let course = vessel.course_deg.to_radians();
            let (east, north) = to_local(&vessel.position, &self.origin);
            let (east, north) = (east + step * course.sin(), north + step * course.cos());

            if east.hypot(north) > max_range_m {
                vessel.course_deg = (vessel.course_deg + 180.0) % 360.0;
                continue;
            }
            vessel.position = from_local(east, north, &self.origin);
        }
    }

    /// One radar sweep: a noisy plot for every vessel
    pub fn radar_contacts(&mut self, timestamp: u64) -> Vec<RadarContact> {
        let mut contacts = Vec::with_capacity(self.vessels.len());
        for vessel in self.vessels.iter() {
            // Same flat projection the engine uses to place radar plots
            let (east, north) = to_local(&vessel.position, &self.origin);
            let range_nm = east.hypot(north) / NAUTICAL_MILE;
            let bearing = east.atan2(north).to_degrees();
            let range_nm = range_nm + gaussian(&mut self.rng, RANGE_NOISE_M / NAUTICAL_MILE);
            let bearing = bearing + gaussian(&mut self.rng, BEARING_NOISE_DEG);
            contacts.push(RadarContact::new(
                vessel.radar_id.clone(),
                range_nm.max(0.0),
                bearing.rem_euclid(360.0),
                vessel.speed_kn,
                vessel.course_deg,
                timestamp,
            ));
        }
        contacts
    }

    /// One AIS round: a report from every equipped vessel
    pub fn ais_contacts(&mut self, timestamp: u64) -> Vec<AisContact> {
        let mut contacts = Vec::new();
        for vessel in self.vessels.iter() {
            let Some(mmsi) = &vessel.mmsi else {
                continue;
            };
            let (east, north) = to_local(&vessel.position, &self.origin);
            let position = from_local(
                east + gaussian(&mut self.rng, AIS_NOISE_M),
                north + gaussian(&mut self.rng, AIS_NOISE_M),
                &self.origin,
            );
            let voyage = VoyageData {
                name: Some(vessel.name.clone()),
                ship_type: Some(vessel.ship_type.to_string()),
                destination: None,
            };
            contacts.push(
                AisContact::new(
                    mmsi.clone(),
                    position.lat,
                    position.lon,
                    vessel.speed_kn,
                    vessel.course_deg,
                    timestamp,
                )
                .with_heading(vessel.course_deg)
                .with_voyage(voyage),
            );
        }
        contacts
    }
}

fn gaussian(rng: &mut StdRng, sd: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    sd * z
}
