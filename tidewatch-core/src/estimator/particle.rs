//! Particle Filter
//!
//! Sequential Monte Carlo estimate of `[x, y, vx, vy]`. Each cycle
//! propagates the ensemble with a noisy constant-velocity model, reweights
//! it by a Gaussian measurement likelihood and resamples systematically
//! when the effective sample size collapses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::{EstimatorState, StateEstimator};

/// Standard deviation of the initial particle velocities
pub const INITIAL_VELOCITY_SD: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
struct Particle {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

/// Weighted-ensemble estimator
#[derive(Debug, Clone)]
pub struct ParticleFilter {
    particles: Vec<Particle>,
    weights: Vec<f64>,
    /// Number of particles (>= 1)
    size: usize,
    dt: f64,
    process_noise: f64,
    measurement_noise: f64,
    /// Weighted mean of the ensemble, (x, y, 0, 0) right after initialization
    estimate: EstimatorState,
    rng: StdRng,
    initialized: bool,
}

/// Zero-mean Gaussian draw with standard deviation `sd`
fn gaussian(rng: &mut StdRng, sd: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    sd * z
}

/// Systematic resampling.
///
/// `weights` must be normalized. `offset` is the draw in `[0, 1)` that
/// positions the first of the `n` evenly spaced pointers. Returns the index
/// of the particle each pointer lands on.
pub fn systematic_resample(weights: &[f64], offset: f64) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let mut indices = Vec::with_capacity(n);
    let mut cumulative = weights[0];
    let mut j = 0;
    for i in 0..n {
        let pointer = (i as f64 + offset) / n as f64;
        while pointer > cumulative && j < n - 1 {
            j += 1;
            cumulative += weights[j];
        }
        indices.push(j);
    }
    indices
}

impl ParticleFilter {
    /// Create a filter
    ///
    /// # Arguments
    /// * `size` - Number of particles, at least one
    /// * `dt` - Time step of one predict cycle
    /// * `process_noise` - Variance of the per-step position and velocity jitter
    /// * `measurement_noise` - Variance of the Gaussian likelihood, must be > 0
    /// * `seed` - Fixed RNG seed; `None` seeds from the OS
    pub fn new(
        size: usize,
        dt: f64,
        process_noise: f64,
        measurement_noise: f64,
        seed: Option<u64>,
    ) -> Self {
        let size = size.max(1);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        ParticleFilter {
            particles: vec![Particle::default(); size],
            weights: vec![1.0 / size as f64; size],
            size,
            dt,
            process_noise,
            measurement_noise,
            estimate: EstimatorState::default(),
            rng,
            initialized: false,
        }
    }

    /// Effective sample size, 1 / sum(w^2)
    pub fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            0.0
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn uniform_weights(&mut self) {
        let w = 1.0 / self.size as f64;
        self.weights.iter_mut().for_each(|x| *x = w);
    }

    /// Recompute the estimate as the weighted ensemble mean
    fn weighted_mean(&mut self) {
        let (mut x, mut y, mut vx, mut vy) = (0.0, 0.0, 0.0, 0.0);
        for (p, w) in self.particles.iter().zip(&self.weights) {
            x += w * p.x;
            y += w * p.y;
            vx += w * p.vx;
            vy += w * p.vy;
        }
        self.estimate = EstimatorState::new(x, y, vx, vy);
    }

    /// Gaussian likelihood reweighting, computed in the log domain
    fn reweight(&mut self, zx: f64, zy: f64) {
        let r = self.measurement_noise;
        let log_likelihood: Vec<f64> = self
            .particles
            .iter()
            .map(|p| -((p.x - zx).powi(2) + (p.y - zy).powi(2)) / (2.0 * r))
            .collect();

        let max = log_likelihood
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        for (w, l) in self.weights.iter_mut().zip(&log_likelihood) {
            *w *= (l - max).exp();
        }

        let total: f64 = self.weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            log::debug!("particle weights degenerate, resetting to uniform");
            self.uniform_weights();
        } else {
            self.weights.iter_mut().for_each(|w| *w /= total);
        }
    }

    fn resample(&mut self) {
        let offset: f64 = self.rng.gen::<f64>();
        let indices = systematic_resample(&self.weights, offset);
        self.particles = indices.iter().map(|&i| self.particles[i]).collect();
        self.uniform_weights();
    }
}

impl StateEstimator for ParticleFilter {
    fn initialize(&mut self, x: f64, y: f64) {
        let position_sd = self.measurement_noise.sqrt();
        let rng = &mut self.rng;

        for p in self.particles.iter_mut() {
            p.x = x + gaussian(rng, position_sd);
            p.y = y + gaussian(rng, position_sd);
            p.vx = gaussian(rng, INITIAL_VELOCITY_SD);
            p.vy = gaussian(rng, INITIAL_VELOCITY_SD);
        }
        self.uniform_weights();
        self.estimate = EstimatorState::new(x, y, 0.0, 0.0);
        self.initialized = true;
    }

    fn predict(&mut self) -> (f64, f64) {
        let sd = self.process_noise.sqrt();
        let dt = self.dt;
        let rng = &mut self.rng;

        for p in self.particles.iter_mut() {
            p.x += p.vx * dt + gaussian(rng, sd);
            p.y += p.vy * dt + gaussian(rng, sd);
            p.vx += gaussian(rng, sd);
            p.vy += gaussian(rng, sd);
        }

        self.weighted_mean();
        (self.estimate.x, self.estimate.y)
    }

    fn update(&mut self, x: f64, y: f64) -> (f64, f64) {
        if !self.initialized {
            self.initialize(x, y);
            return (x, y);
        }

        self.predict();
        self.reweight(x, y);
        self.weighted_mean();

        let ess = self.effective_sample_size();
        if ess < self.size as f64 / 2.0 {
            log::trace!("particle filter: ess {:.1} < {}, resampling", ess, self.size / 2);
            self.resample();
        }

        (self.estimate.x, self.estimate.y)
    }

    fn state(&self) -> EstimatorState {
        self.estimate
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
