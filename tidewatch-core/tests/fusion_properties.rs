//! End-to-end behavior of the fusion engine through the public API

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tidewatch_core::geo::{from_local, haversine_distance_m, to_local, EARTH_RADIUS_M};
use tidewatch_core::{
    AisContact, AssociationEngine, Estimator, EstimatorConfig, EstimatorKind, FusionConfig,
    FusionEngine, GeoPoint, ManualClock, RadarContact, SourceType, StateEstimator,
};

const T0: u64 = 1_700_000_000_000;
const ORIGIN: GeoPoint = GeoPoint {
    lat: 30.017,
    lon: 122.107,
};

fn engine_with(config: FusionConfig) -> (FusionEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let engine = FusionEngine::with_clock(config, clock.clone()).unwrap();
    (engine, clock)
}

fn engine() -> (FusionEngine, Arc<ManualClock>) {
    engine_with(FusionConfig::default())
}

fn radar_one() -> RadarContact {
    RadarContact::new("1", 1.0, 90.0, 10.0, 0.0, T0)
}

/// AIS report for MMSI 200100001 placed `east_m` east of radar contact "1"
fn ais_near_radar_one(east_m: f64) -> AisContact {
    let (east, north) = to_local(&radar_one().position(&ORIGIN), &ORIGIN);
    let p = from_local(east + east_m, north, &ORIGIN);
    AisContact::new("200100001", p.lat, p.lon, 10.0, 0.0, T0)
}

fn ids(engine: &FusionEngine) -> Vec<String> {
    engine.fused_tracks().into_iter().map(|t| t.id).collect()
}

#[test]
fn nearby_ais_fuses_with_radar() {
    let (engine, _) = engine();
    let ais = ais_near_radar_one(20.0);
    assert!(ais.position().distance_to(&radar_one().position(&ORIGIN)) < 50.0);

    engine.add_radar_contact(radar_one());
    let track = engine.add_ais_contact(ais);

    assert_eq!(track.id, "F200100001");
    assert_eq!(track.source_type, SourceType::Fused);
    assert_eq!(ids(&engine), vec!["F200100001"]);
    assert_eq!(track.radar_id(), Some("1"));
    assert_eq!(track.mmsi(), Some("200100001"));
}

#[test]
fn distant_ais_stays_separate() {
    let (engine, _) = engine();

    engine.add_radar_contact(radar_one());
    engine.add_ais_contact(ais_near_radar_one(5000.0));

    assert_eq!(ids(&engine), vec!["R1", "A200100001"]);
    let stats = engine.statistics();
    assert_eq!(stats.radar_only_count, 1);
    assert_eq!(stats.ais_only_count, 1);
    assert_eq!(stats.fused_count, 0);
}

#[test]
fn fusion_identity_independent_of_order() {
    for kind in [EstimatorKind::Linear, EstimatorKind::Particle] {
        let mut config = FusionConfig::default();
        config.estimator.kind = kind;
        config.estimator.seed = Some(5);

        let (radar_first, _) = engine_with(config.clone());
        radar_first.add_radar_contact(radar_one());
        radar_first.add_ais_contact(ais_near_radar_one(20.0));

        let (ais_first, _) = engine_with(config);
        ais_first.add_ais_contact(ais_near_radar_one(20.0));
        ais_first.add_radar_contact(radar_one());

        assert_eq!(ids(&radar_first), vec!["F200100001"], "{}", kind);
        assert_eq!(ids(&ais_first), vec!["F200100001"], "{}", kind);
    }
}

#[test]
fn one_ais_identity_per_fused_track() {
    let (engine, clock) = engine();
    let ais = ais_near_radar_one(10.0);

    // Two radar plots inside the gate of the same AIS report
    engine.add_ais_contact(ais.clone());
    engine.add_radar_contact(radar_one());
    let second = engine.add_radar_contact(RadarContact::new("2", 1.0, 90.05, 10.0, 0.0, T0));

    assert_eq!(second.id, "R2");
    assert_eq!(second.source_type, SourceType::Radar);

    clock.advance(1000);
    engine.add_ais_contact(ais);
    engine.add_radar_contact(RadarContact::new("2", 1.0, 90.05, 10.0, 0.0, T0 + 1000));

    let fused: Vec<_> = engine
        .fused_tracks()
        .into_iter()
        .filter(|t| t.source_type == SourceType::Fused)
        .collect();
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].radar_id(), Some("1"));
}

#[test]
fn exclusivity_holds_under_random_traffic() {
    let (engine, clock) = engine();
    let mut rng = StdRng::seed_from_u64(17);

    // Vessels crowded into a few hundred meters so gates overlap
    for step in 0..200u64 {
        clock.set(T0 + step * 500);
        let east = rng.gen_range(-300.0..300.0);
        let north = rng.gen_range(-300.0..300.0);
        let p = from_local(east, north, &ORIGIN);
        if rng.gen_bool(0.5) {
            let id = format!("{}", rng.gen_range(1..12));
            let range_nm = east.hypot(north) / 1852.0;
            let bearing = east.atan2(north).to_degrees().rem_euclid(360.0);
            engine.add_radar_contact(RadarContact::new(id, range_nm, bearing, 5.0, 0.0, T0));
        } else {
            let mmsi = format!("2001000{:02}", rng.gen_range(1..12));
            engine.add_ais_contact(AisContact::new(mmsi, p.lat, p.lon, 5.0, 0.0, T0));
        }

        // Every MMSI is carried by at most one track, fused or not
        let mut owners: HashMap<String, usize> = HashMap::new();
        for track in engine.fused_tracks() {
            if let Some(mmsi) = track.mmsi() {
                *owners.entry(mmsi.to_string()).or_default() += 1;
            }
        }
        assert!(owners.values().all(|&n| n == 1), "step {}: {:?}", step, owners);
    }
}

#[test]
fn reused_radar_id_leaves_fused_track_in_place() {
    let (engine, clock) = engine();
    engine.add_radar_contact(radar_one());
    let fused = engine.add_ais_contact(ais_near_radar_one(20.0));

    clock.advance(1000);
    let moved = RadarContact::new("1", 3.0, 270.0, 10.0, 0.0, T0 + 1000);
    let track = engine.add_radar_contact(moved.clone());

    assert_eq!(track.id, "R1");
    assert_eq!(track.source_type, SourceType::Radar);
    assert_eq!(track.position, moved.position(&ORIGIN));
    assert_eq!(ids(&engine), vec!["F200100001", "R1"]);

    let kept = engine.track("F200100001").unwrap();
    assert_eq!(kept.source_type, SourceType::Fused);
    assert_eq!(kept.confidence, 0.9);
    assert_eq!(kept.smoothed, fused.smoothed);
}

#[test]
fn track_survives_exactly_max_age() {
    let (engine, clock) = engine();
    engine.add_radar_contact(radar_one());

    clock.set(T0 + 60_000);
    assert_eq!(ids(&engine), vec!["R1"]);
}

#[test]
fn track_evicted_just_past_max_age() {
    let (engine, clock) = engine();
    engine.add_radar_contact(radar_one());
    engine.add_ais_contact(ais_near_radar_one(20.0));

    clock.set(T0 + 60_001);
    assert!(engine.fused_tracks().is_empty());
    assert!(engine.estimator_states().is_empty());
    assert_eq!(engine.counters().tracks_evicted, 1);

    // The released pair lets the identities fuse again
    engine.add_radar_contact(RadarContact::new("1", 1.0, 90.0, 10.0, 0.0, T0 + 60_001));
    let track = engine.add_ais_contact(ais_near_radar_one(20.0));
    assert_eq!(track.id, "F200100001");
}

#[test]
fn confidence_ranks_fused_over_ais_over_radar() {
    let (engine, _) = engine();
    let radar = engine.add_radar_contact(RadarContact::new("9", 3.0, 270.0, 6.0, 90.0, T0));
    let ais = engine.add_ais_contact(ais_near_radar_one(5000.0));
    engine.add_radar_contact(radar_one());
    let fused = engine.add_ais_contact(ais_near_radar_one(5.0));

    assert_eq!(radar.source_type, SourceType::Radar);
    assert_eq!(ais.source_type, SourceType::Ais);
    assert_eq!(fused.source_type, SourceType::Fused);
    assert!(fused.confidence > ais.confidence);
    assert!(ais.confidence > radar.confidence);
    assert_eq!(
        (fused.confidence, ais.confidence, radar.confidence),
        (0.9, 0.8, 0.7)
    );
}

#[test]
fn haversine_identity_and_symmetry() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let a = (rng.gen_range(-89.0..89.0), rng.gen_range(-180.0..180.0));
        let b = (rng.gen_range(-89.0..89.0), rng.gen_range(-180.0..180.0));

        assert_eq!(haversine_distance_m(a.0, a.1, a.0, a.1), 0.0);
        assert_eq!(
            haversine_distance_m(a.0, a.1, b.0, b.1),
            haversine_distance_m(b.0, b.1, a.0, a.1)
        );
        assert!(haversine_distance_m(a.0, a.1, b.0, b.1) >= 0.0);
    }
}

#[test]
fn match_at_gate_distance_rejected() {
    // 100 m due north along the meridian
    let dlat = 100.0 / (EARTH_RADIUS_M * std::f64::consts::PI / 180.0);
    let here = ORIGIN;
    let there = AisContact::new("200100002", ORIGIN.lat + dlat, ORIGIN.lon, 0.0, 0.0, T0);
    let distance = here.distance_to(&there.position());
    assert!((distance - 100.0).abs() < 1e-6);

    let at_gate = AssociationEngine::new(distance);
    assert!(at_gate.find_match(&here, [&there], |_| false).is_none());

    let wider = AssociationEngine::new(distance + 1e-6);
    let found = wider.find_match(&here, [&there], |_| false).unwrap();
    assert_eq!(found.entry.mmsi, "200100002");
}

#[test]
fn engine_gate_is_strict() {
    let ais = ais_near_radar_one(60.0);
    let distance = radar_one().position(&ORIGIN).distance_to(&ais.position());

    let config = FusionConfig {
        association_distance_m: distance,
        ..FusionConfig::default()
    };
    let (engine, _) = engine_with(config.clone());
    engine.add_radar_contact(radar_one());
    engine.add_ais_contact(ais.clone());
    assert_eq!(ids(&engine), vec!["R1", "A200100001"]);

    let (engine, _) = engine_with(FusionConfig {
        association_distance_m: distance + 0.01,
        ..config
    });
    engine.add_radar_contact(radar_one());
    engine.add_ais_contact(ais);
    assert_eq!(ids(&engine), vec!["F200100001"]);
}

#[test]
fn linear_estimator_converges_on_straight_line() {
    let mut estimator = Estimator::from_config(&EstimatorConfig::default()).unwrap();
    let noise = Normal::new(0.0, 0.3).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);

    let mut total = 0.0;
    for step in 1..=50 {
        let (tx, ty) = (1.5 * step as f64, 0.5 * step as f64);
        let (ex, ey) = estimator.update(tx + noise.sample(&mut rng), ty + noise.sample(&mut rng));
        total += (ex - tx).hypot(ey - ty);
    }

    let mean = total / 50.0;
    assert!(mean < 1.0, "mean error {}", mean);
}

#[test]
fn scripted_straight_line_tracks_closely() {
    // Fixed noise pattern within about one sigma of 0.3
    const NOISE: [(f64, f64); 5] = [(0.2, -0.3), (-0.3, 0.1), (0.1, 0.3), (0.3, -0.2), (-0.2, -0.1)];
    let mut estimator = Estimator::from_config(&EstimatorConfig::default()).unwrap();

    let mut errors = Vec::new();
    for step in 1..=50usize {
        let (tx, ty) = (1.5 * step as f64, 0.5 * step as f64);
        let (nx, ny) = NOISE[step % NOISE.len()];
        let (ex, ey) = estimator.update(tx + nx, ty + ny);
        errors.push((ex - tx).hypot(ey - ty));
    }

    let mean = errors.iter().sum::<f64>() / errors.len() as f64;
    assert!(mean < 1.0, "mean error {}", mean);
    // Once settled the estimate sits well inside the noise
    let tail = errors[40..].iter().sum::<f64>() / 10.0;
    assert!(tail < 0.6, "settled error {}", tail);
}
