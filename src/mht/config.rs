//! Tracker configuration and validation.
//!
//! All parameters are validated once, at tracker construction. A rejected
//! configuration is fatal to that tracker instance; nothing is validated in
//! the per-frame hot path.

use nalgebra::{DMatrix, Matrix2, Matrix4};

use crate::common::matrices::{has_positive_rank, is_valid_covariance};
use crate::mht::errors::ConfigError;

/// Complete tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Δt between frames, seconds
    pub time_step: f64,
    /// Mahalanobis gate radius
    pub max_mahalanobis_distance: f64,
    /// Shape parameter of the end probability; higher means slower decay
    pub skip_decay_rate: f64,
    /// P(new track present), in (0, 1)
    pub start_likelihood: f64,
    /// P(detect | present), in (0, 1)
    pub detect_likelihood: f64,
    /// P(report is clutter), in (0, 1)
    pub false_alarm_likelihood: f64,
    /// N-scan window, frames
    pub max_depth: u32,
    /// Pruning floor on the score ratio to the best global, in (0, 1]
    pub min_g_hypo_ratio: f64,
    /// Number of retained global hypotheses
    pub max_g_hypos: usize,
    /// Measurement noise covariance R, 2×2 PSD
    pub measurement_noise_covariance: Matrix2<f64>,
    /// Initial state covariance P₀, 4×4 PSD
    pub initial_state_covariance: Matrix4<f64>,
    /// Process noise covariance Q, 4×4 PSD with rank ≥ 1
    pub process_noise_covariance: Matrix4<f64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            time_step: 0.1,
            max_mahalanobis_distance: 5.0,
            skip_decay_rate: 2.0,
            start_likelihood: 0.1,
            detect_likelihood: 0.9,
            false_alarm_likelihood: 0.05,
            max_depth: 3,
            min_g_hypo_ratio: 1e-3,
            max_g_hypos: 100,
            measurement_noise_covariance: Matrix2::identity() * 0.01,
            initial_state_covariance: Matrix4::from_diagonal(
                &nalgebra::Vector4::new(0.1, 0.1, 1.0, 1.0),
            ),
            process_noise_covariance: Matrix4::from_diagonal(
                &nalgebra::Vector4::new(1e-3, 1e-3, 1e-2, 1e-2),
            ),
        }
    }
}

impl TrackerConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Check every constraint; the first violation is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_scalar("time_step", self.time_step)?;
        positive_scalar("max_mahalanobis_distance", self.max_mahalanobis_distance)?;
        positive_scalar("skip_decay_rate", self.skip_decay_rate)?;

        open_unit("start_likelihood", self.start_likelihood)?;
        open_unit("detect_likelihood", self.detect_likelihood)?;
        open_unit("false_alarm_likelihood", self.false_alarm_likelihood)?;

        if self.max_depth == 0 {
            return Err(ConfigError::InvalidBound { name: "max_depth" });
        }
        if !(self.min_g_hypo_ratio > 0.0 && self.min_g_hypo_ratio <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "min_g_hypo_ratio",
                value: self.min_g_hypo_ratio,
            });
        }
        if self.max_g_hypos == 0 {
            return Err(ConfigError::InvalidBound {
                name: "max_g_hypos",
            });
        }

        covariance(
            "measurement_noise_covariance",
            &to_dynamic2(&self.measurement_noise_covariance),
        )?;
        covariance(
            "initial_state_covariance",
            &to_dynamic4(&self.initial_state_covariance),
        )?;
        let process_noise = to_dynamic4(&self.process_noise_covariance);
        covariance("process_noise_covariance", &process_noise)?;
        if !has_positive_rank(&process_noise) {
            return Err(ConfigError::InvalidCovariance {
                name: "process_noise_covariance",
            });
        }

        Ok(())
    }
}

fn positive_scalar(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidBound { name })
    }
}

fn open_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

fn covariance(name: &'static str, matrix: &DMatrix<f64>) -> Result<(), ConfigError> {
    if is_valid_covariance(matrix) {
        Ok(())
    } else {
        Err(ConfigError::InvalidCovariance { name })
    }
}

fn to_dynamic2(matrix: &Matrix2<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(2, 2, matrix.as_slice())
}

fn to_dynamic4(matrix: &Matrix4<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(4, 4, matrix.as_slice())
}

/// Builder over [`TrackerConfig`], starting from the defaults.
#[derive(Debug, Default)]
pub struct TrackerConfigBuilder {
    config: Option<TrackerConfig>,
}

impl TrackerConfigBuilder {
    fn config(&mut self) -> &mut TrackerConfig {
        self.config.get_or_insert_with(TrackerConfig::default)
    }

    /// Set Δt between frames
    pub fn time_step(mut self, value: f64) -> Self {
        self.config().time_step = value;
        self
    }

    /// Set the Mahalanobis gate radius
    pub fn max_mahalanobis_distance(mut self, value: f64) -> Self {
        self.config().max_mahalanobis_distance = value;
        self
    }

    /// Set the end-probability decay rate
    pub fn skip_decay_rate(mut self, value: f64) -> Self {
        self.config().skip_decay_rate = value;
        self
    }

    /// Set P(new track present)
    pub fn start_likelihood(mut self, value: f64) -> Self {
        self.config().start_likelihood = value;
        self
    }

    /// Set P(detect | present)
    pub fn detect_likelihood(mut self, value: f64) -> Self {
        self.config().detect_likelihood = value;
        self
    }

    /// Set P(report is clutter)
    pub fn false_alarm_likelihood(mut self, value: f64) -> Self {
        self.config().false_alarm_likelihood = value;
        self
    }

    /// Set the N-scan window
    pub fn max_depth(mut self, value: u32) -> Self {
        self.config().max_depth = value;
        self
    }

    /// Set the ratio pruning floor
    pub fn min_g_hypo_ratio(mut self, value: f64) -> Self {
        self.config().min_g_hypo_ratio = value;
        self
    }

    /// Set the number of retained global hypotheses
    pub fn max_g_hypos(mut self, value: usize) -> Self {
        self.config().max_g_hypos = value;
        self
    }

    /// Set the measurement noise covariance R
    pub fn measurement_noise_covariance(mut self, value: Matrix2<f64>) -> Self {
        self.config().measurement_noise_covariance = value;
        self
    }

    /// Set the initial state covariance P₀
    pub fn initial_state_covariance(mut self, value: Matrix4<f64>) -> Self {
        self.config().initial_state_covariance = value;
        self
    }

    /// Set the process noise covariance Q
    pub fn process_noise_covariance(mut self, value: Matrix4<f64>) -> Self {
        self.config().process_noise_covariance = value;
        self
    }

    /// Validate and return the configuration.
    pub fn build(mut self) -> Result<TrackerConfig, ConfigError> {
        let config = self.config().clone();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_process_noise_rejected() {
        let config = TrackerConfig {
            process_noise_covariance: Matrix4::zeros(),
            ..TrackerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCovariance {
                name: "process_noise_covariance"
            })
        );
    }

    #[test]
    fn test_likelihood_bounds() {
        let config = TrackerConfig {
            detect_likelihood: 1.0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                name: "detect_likelihood",
                ..
            })
        ));

        let config = TrackerConfig {
            start_likelihood: 0.0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_integer_bounds() {
        let config = TrackerConfig {
            max_depth: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBound { name: "max_depth" })
        );

        let config = TrackerConfig {
            max_g_hypos: 0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_asymmetric_covariance_rejected() {
        let mut noise = Matrix2::identity() * 0.01;
        noise[(0, 1)] = 0.5;
        let config = TrackerConfig {
            measurement_noise_covariance: noise,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCovariance {
                name: "measurement_noise_covariance"
            })
        ));
    }

    #[test]
    fn test_builder_round_trip() {
        let config = TrackerConfig::builder()
            .time_step(0.05)
            .detect_likelihood(0.8)
            .max_depth(5)
            .build()
            .unwrap();

        assert!((config.time_step - 0.05).abs() < 1e-12);
        assert!((config.detect_likelihood - 0.8).abs() < 1e-12);
        assert_eq!(config.max_depth, 5);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(TrackerConfig::builder().time_step(-1.0).build().is_err());
    }
}
