//! Radar/AIS Fusion Engine
//!
//! Turns the two contact streams into one list of [`FusedTrack`]s.
//!
//! # Pipeline
//!
//! For every contact:
//!
//! 1. radar range/bearing is converted to lat/lon around the configured origin
//! 2. a contact already paired goes straight to its `F<mmsi>` track, unless
//!    a paired radar id now reports at or beyond the gate from its AIS
//!    partner: the pair is then dissolved and the plot treated as new
//! 3. otherwise the nearest unpaired contact of the other sensor inside the
//!    association gate is looked up; a hit forms a pair and retires the
//!    single-source `R<id>`/`A<mmsi>` tracks into `F<mmsi>`
//! 4. without a hit the contact updates its own `R<id>` or `A<mmsi>` track;
//!    an AIS report whose `F<mmsi>` track outlived its pair updates that one
//! 5. the track's estimator is fed the measured position in local meters
//! 6. every registered listener sees the updated track
//!
//! Tracks leaving the list, whether merged into a pair, evicted or removed,
//! are announced to the removal listeners with a [`RemovalReason`].
//!
//! Stale tracks are evicted when the track list is read, never in the
//! background. A pair lives as long as its fused track.
//!
//! # Locking
//!
//! All state sits behind one mutex, so association always sees a consistent
//! matched set. Listeners run while the lock is held and must not call back
//! into the engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::association::{AssociationEngine, Pairing, RadarEntry};
use crate::config::{ConfigError, FusionConfig};
use crate::contact::{AisContact, RadarContact};
use crate::estimator::{EstimatorRegistry, EstimatorState};
use crate::geo::{from_local, to_local, GeoPoint};
use crate::track::{FusedTrack, SourceType, TrackHistory, TrackId, TrackPoint};

mod clock;
mod pool;

pub use clock::{Clock, ManualClock, SystemClock};

use pool::{OrderedPool, Received};

/// Observer of track upserts
pub type TrackListener = Box<dyn FnMut(&FusedTrack) + Send>;

/// Observer of tracks leaving the live list
pub type RemovalListener = Box<dyn FnMut(&str, RemovalReason) + Send>;

/// Why a track left the live list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// Folded into a new `F<mmsi>` track when its pair formed
    Merged,
    /// Not updated within max age
    Evicted,
    /// Dropped through [`FusionEngine::remove_track`]
    Removed,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalReason::Merged => write!(f, "merged"),
            RemovalReason::Evicted => write!(f, "evicted"),
            RemovalReason::Removed => write!(f, "removed"),
        }
    }
}

/// Counts over the live state, as polled by dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionStatistics {
    pub radar_contact_count: usize,
    pub ais_contact_count: usize,
    pub fused_track_count: usize,
    pub radar_only_count: usize,
    pub ais_only_count: usize,
    pub fused_count: usize,
}

/// Monotonic counters since the engine was built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingCounters {
    pub radar_contacts: u64,
    pub ais_contacts: u64,
    pub pairs_formed: u64,
    /// Pairs dissolved because the radar id moved to another target
    pub pairs_split: u64,
    pub tracks_evicted: u64,
    pub tracks_removed: u64,
}

/// Everything the engine holds, read in one go
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: u64,
    pub radar: Vec<RadarContact>,
    pub ais: Vec<AisContact>,
    pub tracks: Vec<FusedTrack>,
    pub statistics: FusionStatistics,
    pub counters: ProcessingCounters,
}

struct FusionState {
    radar: OrderedPool<Received<RadarEntry>>,
    ais: OrderedPool<Received<AisContact>>,
    tracks: OrderedPool<FusedTrack>,
    pairing: Pairing,
    estimators: EstimatorRegistry,
    counters: ProcessingCounters,
    listeners: Vec<TrackListener>,
    removal_listeners: Vec<RemovalListener>,
}

impl FusionState {
    fn notify_removed(&mut self, id: &str, reason: RemovalReason) {
        for listener in self.removal_listeners.iter_mut() {
            listener(id, reason);
        }
    }
}

/// The fusion core
pub struct FusionEngine {
    config: FusionConfig,
    association: AssociationEngine,
    clock: Arc<dyn Clock>,
    state: Mutex<FusionState>,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FusionEngine {
    /// Build an engine on the wall clock
    pub fn new(config: FusionConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: FusionConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let estimators = EstimatorRegistry::new(config.estimator.clone())?;

        log::info!(
            "Fusion engine at ({:.5}, {:.5}), gate {} m, max age {} s, {} estimator",
            config.origin.lat,
            config.origin.lon,
            config.association_distance_m,
            config.max_age_seconds,
            config.estimator.kind
        );

        Ok(FusionEngine {
            association: AssociationEngine::new(config.association_distance_m),
            config,
            clock,
            state: Mutex::new(FusionState {
                radar: OrderedPool::new(),
                ais: OrderedPool::new(),
                tracks: OrderedPool::new(),
                pairing: Pairing::new(),
                estimators,
                counters: ProcessingCounters::default(),
                listeners: Vec::new(),
                removal_listeners: Vec::new(),
            }),
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn origin(&self) -> GeoPoint {
        self.config.origin
    }

    /// Current time on the engine's clock
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Add a listener; listeners run in registration order
    pub fn register_listener<F>(&self, listener: F)
    where
        F: FnMut(&FusedTrack) + Send + 'static,
    {
        self.lock().listeners.push(Box::new(listener));
    }

    /// Add a listener told about every track that is merged, evicted or
    /// removed; runs in registration order like upsert listeners
    pub fn register_removal_listener<F>(&self, listener: F)
    where
        F: FnMut(&str, RemovalReason) + Send + 'static,
    {
        self.lock().removal_listeners.push(Box::new(listener));
    }

    /// Ingest one radar contact and return the track it updated
    pub fn add_radar_contact(&self, contact: RadarContact) -> FusedTrack {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.counters.radar_contacts += 1;

        let entry = RadarEntry::new(contact, &self.config.origin);
        let radar_id = entry.contact.id.clone();
        let position = entry.position;
        state.radar.upsert(
            &radar_id,
            Received {
                contact: entry.clone(),
                at_ms: now,
            },
        );

        if let Some(mmsi) = state.pairing.mmsi_for(&radar_id).map(str::to_string) {
            let id = TrackId::Fused(mmsi);
            if !self.split_reused_radar(state, &id, &radar_id, &position) {
                return self.upsert_track(state, &id, Some(entry.contact), None, position, now, Vec::new());
            }
        }

        let matched = self
            .association
            .find_match(&position, state.ais.values(), |mmsi| {
                state.pairing.is_mmsi_paired(mmsi)
            })
            .map(|m| (m.entry.contact.clone(), m.distance_m));

        match matched {
            Some((ais, distance_m)) => {
                let id = TrackId::Fused(ais.mmsi.clone());
                log::debug!("radar {} -> {} (fused, {:.1} m)", radar_id, id, distance_m);
                let inherited = self.form_pair(state, &radar_id, &ais.mmsi);
                self.upsert_track(state, &id, Some(entry.contact), Some(ais), position, now, inherited)
            }
            None => {
                let id = TrackId::Radar(radar_id.clone());
                log::debug!("radar {} -> {} (radar)", radar_id, id);
                self.upsert_track(state, &id, Some(entry.contact), None, position, now, Vec::new())
            }
        }
    }

    /// Ingest one AIS report and return the track it updated
    pub fn add_ais_contact(&self, contact: AisContact) -> FusedTrack {
        let now = self.clock.now_ms();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.counters.ais_contacts += 1;

        let mmsi = contact.mmsi.clone();
        let position = contact.position();
        state.ais.upsert(
            &mmsi,
            Received {
                contact: contact.clone(),
                at_ms: now,
            },
        );

        if state.pairing.is_mmsi_paired(&mmsi) {
            let id = TrackId::Fused(mmsi);
            return self.upsert_track(state, &id, None, Some(contact), position, now, Vec::new());
        }

        let matched = self
            .association
            .find_match(&position, state.radar.values(), |radar_id| {
                state.pairing.is_radar_paired(radar_id)
            })
            .map(|m| (m.entry.contact.clone(), m.distance_m));

        match matched {
            Some((radar, distance_m)) => {
                let id = TrackId::Fused(mmsi.clone());
                log::debug!("ais {} -> {} (fused, {:.1} m)", mmsi, id, distance_m);
                let inherited = self.form_pair(state, &radar.contact.id, &mmsi);
                // The radar fix positions the fused track
                let measured = radar.position;
                self.upsert_track(state, &id, Some(radar.contact), Some(contact), measured, now, inherited)
            }
            None => {
                // A fused track that lost its radar keeps the MMSI
                let fused = TrackId::Fused(mmsi.clone());
                let id = if state.tracks.get(&fused.to_string()).is_some() {
                    fused
                } else {
                    TrackId::Ais(mmsi.clone())
                };
                log::debug!("ais {} -> {}", mmsi, id);
                self.upsert_track(state, &id, None, Some(contact), position, now, Vec::new())
            }
        }
    }

    /// Live tracks in creation order, after evicting stale ones
    pub fn fused_tracks(&self) -> Vec<FusedTrack> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        self.evict_stale(&mut state, now);
        state.tracks.values().cloned().collect()
    }

    /// One live track by id
    pub fn track(&self, id: &str) -> Option<FusedTrack> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        self.evict_stale(&mut state, now);
        state.tracks.get(id).cloned()
    }

    /// Remove a track, its estimator and any pair it holds
    pub fn remove_track(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(track) = state.tracks.remove(id) else {
            return false;
        };
        Self::release(&mut state, id);
        state.counters.tracks_removed += 1;
        log::info!("Removed track {} ({})", id, track.source_type);
        state.notify_removed(id, RemovalReason::Removed);
        true
    }

    pub fn statistics(&self) -> FusionStatistics {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        self.evict_stale(&mut state, now);
        Self::statistics_of(&state)
    }

    pub fn counters(&self) -> ProcessingCounters {
        self.lock().counters
    }

    /// Contacts, tracks and statistics from a single critical section
    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        self.evict_stale(&mut state, now);
        Snapshot {
            timestamp: now,
            radar: state.radar.values().map(|r| r.contact.contact.clone()).collect(),
            ais: state.ais.values().map(|a| a.contact.clone()).collect(),
            tracks: state.tracks.values().cloned().collect(),
            statistics: Self::statistics_of(&state),
            counters: state.counters,
        }
    }

    /// Estimator state per track id, in local east/north meters
    pub fn estimator_states(&self) -> BTreeMap<String, EstimatorState> {
        self.lock().estimators.all_states()
    }

    /// Position the track's estimator predicts one step ahead, `None` for
    /// unknown tracks. The estimator itself is not advanced.
    pub fn predict_track(&self, id: &str) -> Option<GeoPoint> {
        let state = self.lock();
        let (east, north) = state.estimators.peek_track(id)?;
        Some(from_local(east, north, &self.config.origin))
    }

    fn lock(&self) -> MutexGuard<'_, FusionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pair `radar_id` with `mmsi` and retire their single-source tracks.
    /// Returns the histories of the retired tracks.
    fn form_pair(&self, state: &mut FusionState, radar_id: &str, mmsi: &str) -> Vec<TrackHistory> {
        state.pairing.pair(radar_id, mmsi);
        state.counters.pairs_formed += 1;

        let fused = TrackId::Fused(mmsi.to_string()).to_string();
        let mut inherited = Vec::new();
        for retired in [
            TrackId::Radar(radar_id.to_string()).to_string(),
            TrackId::Ais(mmsi.to_string()).to_string(),
        ] {
            if let Some(track) = state.tracks.remove(&retired) {
                log::debug!("Retiring {} into {}", retired, fused);
                inherited.push(track.history);
                state.notify_removed(&retired, RemovalReason::Merged);
            }
            // First retired estimator carries over, the other is dropped
            state.estimators.transfer_track(&retired, &fused);
        }

        log::info!("Paired radar {} with MMSI {}", radar_id, mmsi);
        inherited
    }

    #[allow(clippy::too_many_arguments)]
    fn upsert_track(
        &self,
        state: &mut FusionState,
        id: &TrackId,
        radar: Option<RadarContact>,
        ais: Option<AisContact>,
        measured: GeoPoint,
        now: u64,
        inherited: Vec<TrackHistory>,
    ) -> FusedTrack {
        let key = id.to_string();
        let origin = self.config.origin;

        let (east, north) = to_local(&measured, &origin);
        let estimate = state.estimators.update_track(&key, east, north);

        let capacity = self.config.history_capacity;
        let mut created = false;
        let track = state.tracks.get_or_insert_with(&key, || {
            created = true;
            let mut track = FusedTrack::new(id, measured, capacity);
            if !inherited.is_empty() {
                track.history = TrackHistory::merged(capacity, &inherited);
            }
            track
        });

        if !created && !inherited.is_empty() {
            let mut sources = vec![track.history.clone()];
            sources.extend(inherited);
            track.history = TrackHistory::merged(capacity, &sources);
        }
        if radar.is_some() {
            track.radar = radar;
        }
        if ais.is_some() {
            track.ais = ais;
        }
        track.position = measured;
        track.estimate = estimate;
        track.smoothed = from_local(estimate.x, estimate.y, &origin);
        track.last_update = now;
        track.history.push(TrackPoint::new(now, measured));
        track.derive_from_contacts(&self.config.confidence);

        let track = track.clone();
        if created {
            log::info!("New track {} ({})", track.id, track.source_type);
        }
        log::trace!(
            "{}: measured ({:.6}, {:.6}) smoothed ({:.6}, {:.6}) speed {:.2} m/s",
            track.id,
            measured.lat,
            measured.lon,
            track.smoothed.lat,
            track.smoothed.lon,
            estimate.speed
        );

        for listener in state.listeners.iter_mut() {
            listener(&track);
        }
        track
    }

    /// Dissolve the pair of `radar_id` when its new plot lies at or beyond
    /// the gate from the paired AIS report. The station has reused the id
    /// for another target; the fused track keeps its last-known data.
    fn split_reused_radar(
        &self,
        state: &mut FusionState,
        id: &TrackId,
        radar_id: &str,
        position: &GeoPoint,
    ) -> bool {
        let key = id.to_string();
        let Some(ais) = state.tracks.get(&key).and_then(|t| t.ais.as_ref()) else {
            return false;
        };
        let distance_m = position.distance_to(&ais.position());
        if distance_m < self.association.gate_m() {
            return false;
        }
        log::warn!(
            "radar {} reported {:.0} m from paired MMSI {}, dissolving pair",
            radar_id,
            distance_m,
            ais.mmsi
        );
        state.pairing.unpair_radar(radar_id);
        state.counters.pairs_split += 1;
        true
    }

    /// Drop the estimator and pair that belong to track `id`
    fn release(state: &mut FusionState, id: &str) {
        state.estimators.remove_track(id);
        if let Some(TrackId::Fused(mmsi)) = TrackId::parse(id) {
            if let Some(radar_id) = state.pairing.unpair_mmsi(&mmsi) {
                log::debug!("Dissolved pair radar {} / MMSI {}", radar_id, mmsi);
            }
        }
    }

    fn evict_stale(&self, state: &mut FusionState, now: u64) {
        let max_age_ms = self.config.max_age_ms();
        let is_stale = |at_ms: u64| now.saturating_sub(at_ms) as f64 > max_age_ms;

        let evicted = state.tracks.drain_where(|t| is_stale(t.last_update));
        for (id, track) in evicted.iter() {
            Self::release(state, id);
            state.counters.tracks_evicted += 1;
            log::info!(
                "Evicted track {} ({}), idle {} ms",
                id,
                track.source_type,
                track.age_ms(now)
            );
            state.notify_removed(id, RemovalReason::Evicted);
        }

        let radar = state.radar.drain_where(|r| is_stale(r.at_ms)).len();
        let ais = state.ais.drain_where(|a| is_stale(a.at_ms)).len();
        if radar + ais > 0 {
            log::debug!("Pruned {} radar and {} AIS contacts", radar, ais);
        }
    }

    fn statistics_of(state: &FusionState) -> FusionStatistics {
        let mut stats = FusionStatistics {
            radar_contact_count: state.radar.len(),
            ais_contact_count: state.ais.len(),
            fused_track_count: state.tracks.len(),
            ..Default::default()
        };
        for track in state.tracks.values() {
            match track.source_type {
                SourceType::Radar => stats.radar_only_count += 1,
                SourceType::Ais => stats.ais_only_count += 1,
                SourceType::Fused => stats.fused_count += 1,
            }
        }
        stats
    }
}
