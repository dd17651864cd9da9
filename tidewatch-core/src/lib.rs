//! Tidewatch Core - Radar/AIS Track Fusion
//!
//! Platform-independent fusion logic for a harbor surveillance display: it
//! takes radar plots (range/bearing) and AIS position reports (lat/lon plus
//! vessel identity) and keeps one smoothed, identity-aware track per vessel.
//!
//! No I/O, no async and no logger initialization happen here; hosts feed
//! contacts in, read tracks out and decide how to log.
//!
//! # Modules
//!
//! - [`geo`]: polar/geographic/local-plane conversions and haversine distance
//! - [`contact`]: radar and AIS contact records
//! - [`estimator`]: Kalman and particle filters behind one trait, and the
//!   per-track registry
//! - [`association`]: greedy nearest-within-gate matching and radar/AIS pairs
//! - [`track`]: the fused track record and its bounded history
//! - [`fusion`]: the engine tying it together
//! - [`config`]: parameters and their validation
//!
//! # Example
//!
//! ```rust,ignore
//! use tidewatch_core::{AisContact, FusionConfig, FusionEngine, RadarContact};
//!
//! let engine = FusionEngine::new(FusionConfig::default())?;
//! engine.register_listener(|track| println!("{} {}", track.id, track.source_type));
//!
//! engine.add_radar_contact(RadarContact::new("1", 1.0, 90.0, 10.0, 0.0, now));
//! engine.add_ais_contact(AisContact::new("200100001", 30.017, 122.1262, 10.0, 0.0, now));
//!
//! for track in engine.fused_tracks() {
//!     // F200100001 (fused)
//! }
//! ```

pub mod association;
pub mod config;
pub mod contact;
pub mod estimator;
pub mod fusion;
pub mod geo;
pub mod track;

pub use association::{AssociationEngine, Pairing};
pub use config::{ConfidenceWeights, ConfigError, FusionConfig};
pub use contact::{AisContact, RadarContact, VoyageData};
pub use estimator::{Estimator, EstimatorConfig, EstimatorKind, EstimatorState, StateEstimator};
pub use fusion::{
    Clock, FusionEngine, FusionStatistics, ManualClock, ProcessingCounters, RemovalReason,
    Snapshot, SystemClock,
};
pub use geo::GeoPoint;
pub use track::{FusedTrack, SourceType, TrackId};
