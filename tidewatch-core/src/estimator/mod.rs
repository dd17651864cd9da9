//! Single-Target State Estimation
//!
//! Recursive position/velocity filters over the state `[x, y, vx, vy]`,
//! one instance per tracked identity.
//!
//! # Variants
//!
//! | Kind | Type | Model |
//! |------|------|-------|
//! | `linear` | [`KalmanFilter`] | Constant-velocity linear Kalman filter |
//! | `particle` | [`ParticleFilter`] | Weighted ensemble with systematic resampling |
//!
//! Both implement [`StateEstimator`]. The concrete variant is chosen from
//! [`EstimatorConfig::kind`] through [`Estimator::from_config`]:
//!
//! ```rust,ignore
//! use tidewatch_core::estimator::{Estimator, EstimatorConfig, StateEstimator};
//!
//! let mut estimator = Estimator::from_config(&EstimatorConfig::default())?;
//! estimator.update(10.0, 20.0); // first observation is taken as-is
//! let (x, y) = estimator.update(11.4, 20.6);
//! let state = estimator.state();
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

mod kalman;
mod particle;
mod registry;

pub use kalman::{KalmanFilter, INITIAL_VARIANCE};
pub use particle::{systematic_resample, ParticleFilter, INITIAL_VELOCITY_SD};
pub use registry::EstimatorRegistry;

/// Read-only snapshot of an estimator.
///
/// Every `update` is one motion-model step of [`EstimatorConfig::dt`]
/// regardless of the wall time between measurements, so velocity is in
/// plane units per `dt` of model time, not per second. A fused track
/// stepped by both sensors takes more steps per second than a single-source
/// one; vessel speed in knots comes from the contacts instead.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EstimatorState {
    pub x: f64,
    pub y: f64,
    /// Plane units per unit of `dt`
    pub vx: f64,
    pub vy: f64,
    /// Magnitude of (vx, vy)
    pub speed: f64,
}

impl EstimatorState {
    pub fn new(x: f64, y: f64, vx: f64, vy: f64) -> Self {
        EstimatorState {
            x,
            y,
            vx,
            vy,
            speed: (vx * vx + vy * vy).sqrt(),
        }
    }
}

/// Common contract of all filter variants
pub trait StateEstimator {
    /// Set position to (x, y), velocity to zero and reset the uncertainty
    fn initialize(&mut self, x: f64, y: f64);

    /// Advance one constant-velocity step and return the predicted position
    fn predict(&mut self) -> (f64, f64);

    /// Fold in a position measurement and return the corrected position.
    ///
    /// The first call on an uninitialized estimator initializes it and returns
    /// the measurement unchanged.
    fn update(&mut self, x: f64, y: f64) -> (f64, f64);

    fn state(&self) -> EstimatorState;

    fn is_initialized(&self) -> bool;

    /// Single-call form used by the tracking pipeline
    fn process(&mut self, x: f64, y: f64) -> (f64, f64) {
        self.update(x, y)
    }
}

/// Filter variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    #[default]
    Linear,
    Particle,
}

impl std::fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorKind::Linear => write!(f, "linear"),
            EstimatorKind::Particle => write!(f, "particle"),
        }
    }
}

impl std::str::FromStr for EstimatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "kf" => Ok(EstimatorKind::Linear),
            "particle" | "pf" => Ok(EstimatorKind::Particle),
            other => Err(format!("unknown estimator '{}', expected linear or particle", other)),
        }
    }
}

/// Estimator parameters.
///
/// Noise values are variances in the squared units of the local plane
/// (meters when driven by the fusion engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatorConfig {
    pub kind: EstimatorKind,
    /// Time step of the motion model, taken once per update
    pub dt: f64,
    pub process_noise: f64,
    /// Must be > 0; keeps the innovation covariance invertible
    pub measurement_noise: f64,
    /// Particle count (particle filter only)
    pub ensemble_size: usize,
    /// Fixed RNG seed for reproducible ensembles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            kind: EstimatorKind::Linear,
            dt: 1.0,
            process_noise: 0.1,
            measurement_noise: 1.0,
            ensemble_size: 300,
            seed: None,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::TimeStep(self.dt));
        }
        if !self.process_noise.is_finite() || self.process_noise < 0.0 {
            return Err(ConfigError::ProcessNoise(self.process_noise));
        }
        if !self.measurement_noise.is_finite() || self.measurement_noise <= 0.0 {
            return Err(ConfigError::MeasurementNoise(self.measurement_noise));
        }
        if self.kind == EstimatorKind::Particle && self.ensemble_size == 0 {
            return Err(ConfigError::EnsembleSize);
        }
        Ok(())
    }
}

/// A filter of any supported variant
#[derive(Debug, Clone)]
pub enum Estimator {
    Linear(KalmanFilter),
    Particle(ParticleFilter),
}

impl Estimator {
    /// Validate `config` and build the variant it selects
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, config.seed))
    }

    /// Build from an already validated configuration
    pub(crate) fn build(config: &EstimatorConfig, seed: Option<u64>) -> Self {
        match config.kind {
            EstimatorKind::Linear => Estimator::Linear(KalmanFilter::new(
                config.dt,
                config.process_noise,
                config.measurement_noise,
            )),
            EstimatorKind::Particle => Estimator::Particle(ParticleFilter::new(
                config.ensemble_size,
                config.dt,
                config.process_noise,
                config.measurement_noise,
                seed,
            )),
        }
    }

    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::Linear(_) => EstimatorKind::Linear,
            Estimator::Particle(_) => EstimatorKind::Particle,
        }
    }
}

impl StateEstimator for Estimator {
    fn initialize(&mut self, x: f64, y: f64) {
        match self {
            Estimator::Linear(f) => f.initialize(x, y),
            Estimator::Particle(f) => f.initialize(x, y),
        }
    }

    fn predict(&mut self) -> (f64, f64) {
        match self {
            Estimator::Linear(f) => f.predict(),
            Estimator::Particle(f) => f.predict(),
        }
    }

    fn update(&mut self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Estimator::Linear(f) => f.update(x, y),
            Estimator::Particle(f) => f.update(x, y),
        }
    }

    fn state(&self) -> EstimatorState {
        match self {
            Estimator::Linear(f) => f.state(),
            Estimator::Particle(f) => f.state(),
        }
    }

    fn is_initialized(&self) -> bool {
        match self {
            Estimator::Linear(f) => f.is_initialized(),
            Estimator::Particle(f) => f.is_initialized(),
        }
    }
}
