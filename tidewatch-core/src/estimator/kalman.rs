//! Linear Kalman Filter
//!
//! Constant-velocity filter over the state `[x, y, vx, vy]` with direct
//! position measurements. One configurable type covers every tuning; the
//! time step and both noise levels are constructor parameters.

use nalgebra::{SMatrix, SVector};

use super::{EstimatorState, StateEstimator};

/// Diagonal of the error covariance after initialization
pub const INITIAL_VARIANCE: f64 = 1.0;

/// Diagonal of the error covariance before the first measurement
const UNINITIALIZED_VARIANCE: f64 = 100.0;

// Matrix type aliases
type Vector4 = SVector<f64, 4>;
type Vector2 = SVector<f64, 2>;
type Matrix2x2 = SMatrix<f64, 2, 2>;
type Matrix4x4 = SMatrix<f64, 4, 4>;
type Matrix4x2 = SMatrix<f64, 4, 2>;
type Matrix2x4 = SMatrix<f64, 2, 4>;

/// Constant-velocity Kalman filter
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// State estimate [x, y, vx, vy]
    x: Vector4,
    /// State transition matrix
    f: Matrix4x4,
    /// Observation matrix (position only)
    h: Matrix2x4,
    /// Estimate error covariance
    p: Matrix4x4,
    /// Process noise covariance
    q: Matrix4x4,
    /// Measurement noise covariance
    r: Matrix2x2,
    initialized: bool,
}

impl KalmanFilter {
    /// Create a filter
    ///
    /// # Arguments
    /// * `dt` - Time step of one predict cycle
    /// * `process_noise` - Diagonal of Q
    /// * `measurement_noise` - Diagonal of R, must be > 0
    pub fn new(dt: f64, process_noise: f64, measurement_noise: f64) -> Self {
        let mut f = Matrix4x4::identity();
        // x_new = x + v * dt
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;

        let mut h = Matrix2x4::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        KalmanFilter {
            x: Vector4::zeros(),
            f,
            h,
            p: Matrix4x4::identity() * UNINITIALIZED_VARIANCE,
            q: Matrix4x4::identity() * process_noise,
            r: Matrix2x2::identity() * measurement_noise,
            initialized: false,
        }
    }

    /// Average position variance (for confidence estimation)
    pub fn position_variance(&self) -> f64 {
        (self.p[(0, 0)] + self.p[(1, 1)]) / 2.0
    }

    /// Average velocity variance (for confidence estimation)
    pub fn velocity_variance(&self) -> f64 {
        (self.p[(2, 2)] + self.p[(3, 3)]) / 2.0
    }

    pub fn covariance(&self) -> &SMatrix<f64, 4, 4> {
        &self.p
    }

    fn symmetrize(&mut self) {
        self.p = (self.p + self.p.transpose()) * 0.5;
    }

    fn position(&self) -> (f64, f64) {
        (self.x[0], self.x[1])
    }
}

impl StateEstimator for KalmanFilter {
    fn initialize(&mut self, x: f64, y: f64) {
        self.x = Vector4::new(x, y, 0.0, 0.0);
        self.p = Matrix4x4::identity() * INITIAL_VARIANCE;
        self.initialized = true;
    }

    fn predict(&mut self) -> (f64, f64) {
        // x = F * x
        self.x = self.f * self.x;
        // P = F * P * F^T + Q
        self.p = self.f * self.p * self.f.transpose() + self.q;
        self.symmetrize();

        self.position()
    }

    fn update(&mut self, x: f64, y: f64) -> (f64, f64) {
        if !self.initialized {
            self.initialize(x, y);
            return (x, y);
        }

        self.predict();

        // Innovation: z - H * x
        let z = Vector2::new(x, y);
        let innovation = z - self.h * self.x;

        // S = H * P * H^T + R, invertible as long as R > 0
        let ht = self.h.transpose();
        let s = self.h * self.p * ht + self.r;
        let Some(s_inv) = s.try_inverse() else {
            log::warn!("Singular innovation covariance, keeping prediction");
            return self.position();
        };

        // K = P * H^T * S^-1
        let k: Matrix4x2 = self.p * ht * s_inv;
        self.x += k * innovation;

        // Joseph form: P = (I - K H) P (I - K H)^T + K R K^T
        let i_kh = Matrix4x4::identity() - k * self.h;
        self.p = i_kh * self.p * i_kh.transpose() + k * self.r * k.transpose();
        self.symmetrize();

        log::trace!(
            "kalman: z=({:.2}, {:.2}) innovation=({:.3}, {:.3}) x=({:.2}, {:.2}) v=({:.3}, {:.3})",
            x,
            y,
            innovation[0],
            innovation[1],
            self.x[0],
            self.x[1],
            self.x[2],
            self.x[3]
        );

        self.position()
    }

    fn state(&self) -> EstimatorState {
        EstimatorState::new(self.x[0], self.x[1], self.x[2], self.x[3])
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
