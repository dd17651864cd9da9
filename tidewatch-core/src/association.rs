//! Contact Association
//!
//! Greedy nearest-neighbour gating between a newly arrived contact and the
//! pool of unpaired contacts from the other sensor. The first candidate at
//! the minimum distance wins; the search is not a global assignment, so
//! the outcome under ambiguity depends on pool order.

use std::collections::HashMap;

use crate::contact::{AisContact, RadarContact};
use crate::geo::GeoPoint;

/// Anything that can sit in an association pool
pub trait PoolEntry {
    /// Identity within the pool (radar id or MMSI)
    fn key(&self) -> &str;

    /// Geographic position used for gating
    fn position(&self) -> GeoPoint;
}

/// A radar contact together with its converted geographic position
#[derive(Debug, Clone, PartialEq)]
pub struct RadarEntry {
    pub contact: RadarContact,
    pub position: GeoPoint,
}

impl RadarEntry {
    pub fn new(contact: RadarContact, origin: &GeoPoint) -> Self {
        let position = contact.position(origin);
        RadarEntry { contact, position }
    }
}

impl PoolEntry for RadarEntry {
    fn key(&self) -> &str {
        &self.contact.id
    }

    fn position(&self) -> GeoPoint {
        self.position
    }
}

impl PoolEntry for AisContact {
    fn key(&self) -> &str {
        &self.mmsi
    }

    fn position(&self) -> GeoPoint {
        AisContact::position(self)
    }
}

/// Result of a successful search
#[derive(Debug, Clone, Copy)]
pub struct Association<'a, T> {
    pub entry: &'a T,
    pub distance_m: f64,
}

/// Nearest-within-gate search
#[derive(Debug, Clone, Copy)]
pub struct AssociationEngine {
    gate_m: f64,
}

impl AssociationEngine {
    pub fn new(gate_m: f64) -> Self {
        AssociationEngine { gate_m }
    }

    pub fn gate_m(&self) -> f64 {
        self.gate_m
    }

    /// Find the candidate nearest to `position`, skipping those for which
    /// `is_claimed` returns true.
    ///
    /// A candidate is accepted only when its distance is strictly below the
    /// gate. Among equally near candidates the one encountered first wins.
    /// Candidates whose distance is NaN never match.
    pub fn find_match<'a, T, I, F>(
        &self,
        position: &GeoPoint,
        candidates: I,
        is_claimed: F,
    ) -> Option<Association<'a, T>>
    where
        T: PoolEntry + 'a,
        I: IntoIterator<Item = &'a T>,
        F: Fn(&str) -> bool,
    {
        let mut best: Option<Association<'a, T>> = None;

        for candidate in candidates {
            if is_claimed(candidate.key()) {
                continue;
            }
            let distance_m = position.distance_to(&candidate.position());
            let closer = match &best {
                Some(b) => distance_m < b.distance_m,
                None => distance_m < f64::INFINITY,
            };
            if closer {
                best = Some(Association {
                    entry: candidate,
                    distance_m,
                });
            }
        }

        best.filter(|b| b.distance_m < self.gate_m)
    }
}

/// Exclusive radar id <-> MMSI pairs.
///
/// Each radar id and each MMSI appears in at most one pair. The MMSIs held
/// here form the matched set: they are not offered to association again
/// until the pair is dissolved.
#[derive(Debug, Default, Clone)]
pub struct Pairing {
    by_radar: HashMap<String, String>,
    by_mmsi: HashMap<String, String>,
}

impl Pairing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. Returns false, leaving the pairing untouched, when
    /// either side is already paired.
    pub fn pair(&mut self, radar_id: &str, mmsi: &str) -> bool {
        if self.by_radar.contains_key(radar_id) || self.by_mmsi.contains_key(mmsi) {
            return false;
        }
        self.by_radar.insert(radar_id.to_string(), mmsi.to_string());
        self.by_mmsi.insert(mmsi.to_string(), radar_id.to_string());
        true
    }

    pub fn mmsi_for(&self, radar_id: &str) -> Option<&str> {
        self.by_radar.get(radar_id).map(String::as_str)
    }

    pub fn radar_for(&self, mmsi: &str) -> Option<&str> {
        self.by_mmsi.get(mmsi).map(String::as_str)
    }

    pub fn is_radar_paired(&self, radar_id: &str) -> bool {
        self.by_radar.contains_key(radar_id)
    }

    pub fn is_mmsi_paired(&self, mmsi: &str) -> bool {
        self.by_mmsi.contains_key(mmsi)
    }

    /// Dissolve the pair holding `mmsi`, returning the radar id it held
    pub fn unpair_mmsi(&mut self, mmsi: &str) -> Option<String> {
        let radar_id = self.by_mmsi.remove(mmsi)?;
        self.by_radar.remove(&radar_id);
        Some(radar_id)
    }

    /// Dissolve the pair holding `radar_id`, returning the MMSI it held
    pub fn unpair_radar(&mut self, radar_id: &str) -> Option<String> {
        let mmsi = self.by_radar.remove(radar_id)?;
        self.by_mmsi.remove(&mmsi);
        Some(mmsi)
    }

    pub fn len(&self) -> usize {
        self.by_mmsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mmsi.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint {
        lat: 30.017,
        lon: 122.107,
    };

    fn ais_at(mmsi: &str, position: GeoPoint) -> AisContact {
        AisContact::new(mmsi, position.lat, position.lon, 0.0, 0.0, 0)
    }

    /// Point exactly `meters` north of `from` on the haversine sphere
    fn north_of(from: &GeoPoint, meters: f64) -> GeoPoint {
        let dlat = (meters / crate::geo::EARTH_RADIUS_M).to_degrees();
        GeoPoint::new(from.lat + dlat, from.lon)
    }

    #[test]
    fn test_nearest_within_gate() {
        let engine = AssociationEngine::new(100.0);
        let pool = vec![
            ais_at("1", north_of(&ORIGIN, 80.0)),
            ais_at("2", north_of(&ORIGIN, 30.0)),
            ais_at("3", north_of(&ORIGIN, 500.0)),
        ];

        let m = engine.find_match(&ORIGIN, &pool, |_| false).unwrap();
        assert_eq!(m.entry.mmsi, "2");
        assert!((m.distance_m - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_gate_is_strict() {
        let at_gate = north_of(&ORIGIN, 100.0);
        let d = ORIGIN.distance_to(&at_gate);
        assert!((d - 100.0).abs() < 1e-6);

        // Candidate sits exactly on the gate
        let engine = AssociationEngine::new(d);
        let pool = vec![ais_at("1", at_gate)];
        assert!(engine.find_match(&ORIGIN, &pool, |_| false).is_none());

        let engine = AssociationEngine::new(100.0);
        let inside = vec![ais_at("1", north_of(&ORIGIN, 99.9))];
        assert!(engine.find_match(&ORIGIN, &inside, |_| false).is_some());
    }

    #[test]
    fn test_tie_goes_to_first_encountered() {
        let engine = AssociationEngine::new(100.0);
        let spot = north_of(&ORIGIN, 40.0);

        let pool = vec![ais_at("west", spot), ais_at("east", spot)];
        let m = engine.find_match(&ORIGIN, &pool, |_| false).unwrap();
        assert_eq!(m.entry.mmsi, "west");

        let pool = vec![ais_at("east", spot), ais_at("west", spot)];
        let m = engine.find_match(&ORIGIN, &pool, |_| false).unwrap();
        assert_eq!(m.entry.mmsi, "east");
    }

    #[test]
    fn test_claimed_entries_are_skipped() {
        let engine = AssociationEngine::new(100.0);
        let pool = vec![
            ais_at("1", north_of(&ORIGIN, 10.0)),
            ais_at("2", north_of(&ORIGIN, 60.0)),
        ];

        let m = engine.find_match(&ORIGIN, &pool, |k| k == "1").unwrap();
        assert_eq!(m.entry.mmsi, "2");
        assert!(engine.find_match(&ORIGIN, &pool, |_| true).is_none());
    }

    #[test]
    fn test_nan_never_matches() {
        let engine = AssociationEngine::new(100.0);
        let pool = vec![ais_at("1", GeoPoint::new(f64::NAN, ORIGIN.lon))];
        assert!(engine.find_match(&ORIGIN, &pool, |_| false).is_none());
    }

    #[test]
    fn test_radar_entry_uses_converted_position() {
        let contact = RadarContact::new("1", 1.0, 90.0, 10.0, 0.0, 0);
        let entry = RadarEntry::new(contact.clone(), &ORIGIN);
        assert_eq!(entry.key(), "1");
        assert_eq!(PoolEntry::position(&entry), contact.position(&ORIGIN));
    }

    #[test]
    fn test_pairing_is_exclusive() {
        let mut pairing = Pairing::new();
        assert!(pairing.pair("1", "200100001"));
        assert!(!pairing.pair("1", "200100002"));
        assert!(!pairing.pair("2", "200100001"));

        assert_eq!(pairing.mmsi_for("1"), Some("200100001"));
        assert_eq!(pairing.radar_for("200100001"), Some("1"));
        assert_eq!(pairing.len(), 1);

        assert_eq!(pairing.unpair_mmsi("200100001"), Some("1".to_string()));
        assert!(!pairing.is_radar_paired("1"));
        assert!(pairing.is_empty());

        assert!(pairing.pair("2", "200100001"));
        assert_eq!(pairing.unpair_radar("2"), Some("200100001".to_string()));
        assert_eq!(pairing.unpair_radar("2"), None);
    }
}
