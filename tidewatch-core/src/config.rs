//! Fusion Configuration
//!
//! Read-only parameters consumed by the core at construction. Loading them
//! from disk or the command line is the host's business; the core only
//! checks that they make sense.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimator::EstimatorConfig;
use crate::geo::GeoPoint;

/// Default sensor origin: Dinghai fishing harbour, Zhoushan
pub const DEFAULT_ORIGIN: GeoPoint = GeoPoint {
    lat: 30.017,
    lon: 122.107,
};

pub const DEFAULT_ASSOCIATION_DISTANCE_M: f64 = 100.0;
pub const DEFAULT_MAX_AGE_SECONDS: f64 = 60.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Rejected configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("measurement noise must be positive and finite, got {0}")]
    MeasurementNoise(f64),

    #[error("process noise must be non-negative and finite, got {0}")]
    ProcessNoise(f64),

    #[error("estimator time step must be positive and finite, got {0}")]
    TimeStep(f64),

    #[error("particle ensemble needs at least one particle")]
    EnsembleSize,

    #[error("association distance must be non-negative and finite, got {0} m")]
    AssociationDistance(f64),

    #[error("maximum track age must be positive and finite, got {0} s")]
    MaxAge(f64),

    #[error("track history capacity must be at least 1")]
    HistoryCapacity,

    #[error("{kind} confidence must lie in [0, 1], got {value}")]
    ConfidenceRange { kind: &'static str, value: f64 },

    #[error("confidence weights must satisfy fused > ais > radar, got {fused} / {ais} / {radar}")]
    ConfidenceOrder { fused: f64, ais: f64, radar: f64 },

    #[error("sensor origin ({lat}, {lon}) is not a valid position")]
    Origin { lat: f64, lon: f64 },
}

/// Confidence assigned to a track by source classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfidenceWeights {
    pub fused: f64,
    pub ais: f64,
    pub radar: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        ConfidenceWeights {
            fused: 0.9,
            ais: 0.8,
            radar: 0.7,
        }
    }
}

impl ConfidenceWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, value) in [("fused", self.fused), ("ais", self.ais), ("radar", self.radar)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ConfidenceRange { kind, value });
            }
        }
        if !(self.fused > self.ais && self.ais > self.radar) {
            return Err(ConfigError::ConfidenceOrder {
                fused: self.fused,
                ais: self.ais,
                radar: self.radar,
            });
        }
        Ok(())
    }
}

/// Complete configuration of the fusion core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FusionConfig {
    /// Radar antenna position
    pub origin: GeoPoint,
    /// Association gate in meters; a match must be strictly closer
    pub association_distance_m: f64,
    /// Tracks older than this are evicted on the next read
    pub max_age_seconds: f64,
    /// Number of positions kept per track
    pub history_capacity: usize,
    pub confidence: ConfidenceWeights,
    pub estimator: EstimatorConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            origin: DEFAULT_ORIGIN,
            association_distance_m: DEFAULT_ASSOCIATION_DISTANCE_M,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            confidence: ConfidenceWeights::default(),
            estimator: EstimatorConfig::default(),
        }
    }
}

impl FusionConfig {
    /// Check every parameter, reporting the first offending one
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin_ok = self.origin.lat.is_finite()
            && self.origin.lon.is_finite()
            && (-90.0..=90.0).contains(&self.origin.lat);
        if !origin_ok {
            return Err(ConfigError::Origin {
                lat: self.origin.lat,
                lon: self.origin.lon,
            });
        }
        if !self.association_distance_m.is_finite() || self.association_distance_m < 0.0 {
            return Err(ConfigError::AssociationDistance(self.association_distance_m));
        }
        if !self.max_age_seconds.is_finite() || self.max_age_seconds <= 0.0 {
            return Err(ConfigError::MaxAge(self.max_age_seconds));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::HistoryCapacity);
        }
        self.confidence.validate()?;
        self.estimator.validate()
    }

    pub(crate) fn max_age_ms(&self) -> f64 {
        self.max_age_seconds * 1000.0
    }
}
