//! Constant-velocity Kalman filter on fixed-size matrices.
//!
//! The state is `(x, y, vx, vy)` and the measurement `(x, y)`. The filter
//! keeps the classic pre/post split:
//!
//! - [`KalmanFilter::predict`] propagates one time step and then coasts the
//!   posterior forward, so repeated predictions model consecutive frames
//!   without measurements;
//! - [`KalmanFilter::correct`] folds a measurement into the predicted state.
//!
//! Gating quantities (innovation covariance, Mahalanobis distance, Gaussian
//! measurement log-likelihood) are exposed separately so callers can reject
//! a measurement before committing to the update.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};

use crate::mht::errors::TrackerError;

/// Dimension of the state vector `(x, y, vx, vy)`.
pub const STATE_DIMENSION: usize = 4;
/// Dimension of the measurement vector `(x, y)`.
pub const MEASUREMENT_DIMENSION: usize = 2;

/// Linear Kalman filter with a 4-dim state and 2-dim position measurement.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// State transition matrix F
    pub transition: Matrix4<f64>,
    /// Measurement matrix H (projects position)
    pub measurement: Matrix2x4<f64>,
    /// Process noise covariance Q
    pub process_noise: Matrix4<f64>,
    /// Measurement noise covariance R
    pub measurement_noise: Matrix2<f64>,
    /// Predicted state x⁻
    pub state_pre: Vector4<f64>,
    /// Posterior state x
    pub state_post: Vector4<f64>,
    /// Predicted covariance P⁻
    pub covariance_pre: Matrix4<f64>,
    /// Posterior covariance P
    pub covariance_post: Matrix4<f64>,
}

impl KalmanFilter {
    /// Create a filter with zeroed state and the given initial covariance.
    pub fn new(
        transition: Matrix4<f64>,
        measurement: Matrix2x4<f64>,
        measurement_noise: Matrix2<f64>,
        initial_state_covariance: Matrix4<f64>,
        process_noise: Matrix4<f64>,
    ) -> Self {
        Self {
            transition,
            measurement,
            process_noise,
            measurement_noise,
            state_pre: Vector4::zeros(),
            state_post: Vector4::zeros(),
            covariance_pre: initial_state_covariance,
            covariance_post: initial_state_covariance,
        }
    }

    /// Overwrite both pre and post states, used when seeding a new track
    /// from its first measurement.
    pub fn set_state(&mut self, state: Vector4<f64>) {
        self.state_pre = state;
        self.state_post = state;
    }

    /// Propagate one time step: `x⁻ = F x`, `P⁻ = F P Fᵀ + Q`, then coast
    /// the posterior forward so a further predict keeps advancing.
    pub fn predict(&mut self) -> Vector4<f64> {
        self.state_pre = self.transition * self.state_post;
        self.covariance_pre =
            self.transition * self.covariance_post * self.transition.transpose()
                + self.process_noise;
        self.state_post = self.state_pre;
        self.covariance_post = self.covariance_pre;
        self.state_pre
    }

    /// Innovation covariance `S = H P⁻ Hᵀ + R` for the current prediction.
    #[inline]
    pub fn innovation_covariance(&self) -> Matrix2<f64> {
        self.measurement * self.covariance_pre * self.measurement.transpose()
            + self.measurement_noise
    }

    /// Mahalanobis distance of `z` from the predicted measurement.
    ///
    /// Fails with [`TrackerError::NumericalDegeneracy`] when the innovation
    /// covariance is singular.
    pub fn mahalanobis_distance(&self, z: &Vector2<f64>) -> Result<f64, TrackerError> {
        let innovation_cov = self.innovation_covariance();
        let inverse = innovation_cov
            .try_inverse()
            .ok_or_else(|| TrackerError::NumericalDegeneracy {
                context: "innovation covariance".to_string(),
            })?;
        let innovation = z - self.measurement * self.state_pre;
        Ok(innovation.dot(&(inverse * innovation)).sqrt())
    }

    /// Gaussian measurement log-likelihood `−0.5 (d² + ln det(2π S))`.
    pub fn measurement_log_likelihood(&self, z: &Vector2<f64>) -> Result<f64, TrackerError> {
        let innovation_cov = self.innovation_covariance();
        let determinant = (innovation_cov * 2.0 * PI).determinant();
        if determinant <= 0.0 {
            return Err(TrackerError::NumericalDegeneracy {
                context: "innovation covariance determinant".to_string(),
            });
        }
        let distance = self.mahalanobis_distance(z)?;
        Ok(-0.5 * (distance * distance + determinant.ln()))
    }

    /// Fold measurement `z` into the predicted state:
    /// `K = P⁻ Hᵀ S⁻¹`, `x = x⁻ + K ν`, `P = (I − K H) P⁻`.
    pub fn correct(&mut self, z: &Vector2<f64>) -> Result<(), TrackerError> {
        let innovation_cov = self.innovation_covariance();
        let inverse = innovation_cov
            .try_inverse()
            .ok_or_else(|| TrackerError::NumericalDegeneracy {
                context: "innovation covariance".to_string(),
            })?;
        let gain = self.covariance_pre * self.measurement.transpose() * inverse;
        let innovation = z - self.measurement * self.state_pre;
        self.state_post = self.state_pre + gain * innovation;
        self.covariance_post =
            (Matrix4::identity() - gain * self.measurement) * self.covariance_pre;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_velocity_filter(dt: f64) -> KalmanFilter {
        let transition = Matrix4::new(
            1.0, 0.0, dt, 0.0, //
            0.0, 1.0, 0.0, dt, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let measurement = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        );
        KalmanFilter::new(
            transition,
            measurement,
            Matrix2::identity() * 0.01,
            Matrix4::identity(),
            Matrix4::identity() * 1e-3,
        )
    }

    #[test]
    fn test_predict_advances_position_by_velocity() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(1.0, 2.0, 1.0, -1.0));

        filter.predict();

        assert!((filter.state_pre[0] - 1.1).abs() < 1e-12);
        assert!((filter.state_pre[1] - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_predict_coasts() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(0.0, 0.0, 1.0, 0.0));

        filter.predict();
        filter.predict();

        assert!((filter.state_post[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_correct_pulls_state_toward_measurement() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(0.0, 0.0, 0.0, 0.0));
        filter.predict();

        filter.correct(&Vector2::new(1.0, 0.0)).unwrap();

        assert!(filter.state_post[0] > 0.5);
        assert!(filter.state_post[0] <= 1.0 + 1e-12);
        // Covariance must shrink along the measured directions.
        assert!(filter.covariance_post[(0, 0)] < filter.covariance_pre[(0, 0)]);
    }

    #[test]
    fn test_exact_measurement_keeps_state() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(1.0, 0.0, 0.0, 0.0));
        filter.predict();

        filter.correct(&Vector2::new(1.0, 0.0)).unwrap();

        assert!((filter.state_post[0] - 1.0).abs() < 1e-9);
        assert!(filter.state_post[2].abs() < 1e-9);
    }

    #[test]
    fn test_mahalanobis_distance_grows_with_offset() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(0.0, 0.0, 0.0, 0.0));
        filter.predict();

        let near = filter.mahalanobis_distance(&Vector2::new(0.1, 0.0)).unwrap();
        let far = filter.mahalanobis_distance(&Vector2::new(5.0, 0.0)).unwrap();
        assert!(near < far);
    }

    #[test]
    fn test_singular_innovation_covariance_is_degenerate() {
        let mut filter = constant_velocity_filter(0.1);
        filter.measurement_noise = Matrix2::zeros();
        filter.covariance_pre = Matrix4::zeros();
        filter.covariance_post = Matrix4::zeros();

        let result = filter.mahalanobis_distance(&Vector2::new(0.0, 0.0));
        assert!(matches!(
            result,
            Err(TrackerError::NumericalDegeneracy { .. })
        ));
    }

    #[test]
    fn test_measurement_log_likelihood_peaks_at_prediction() {
        let mut filter = constant_velocity_filter(0.1);
        filter.set_state(Vector4::new(0.0, 0.0, 0.0, 0.0));
        filter.predict();

        let at_prediction = filter
            .measurement_log_likelihood(&Vector2::new(0.0, 0.0))
            .unwrap();
        let offset = filter
            .measurement_log_likelihood(&Vector2::new(1.0, 1.0))
            .unwrap();
        assert!(at_prediction > offset);
    }
}
