//! Transition likelihoods and successor-state generation.
//!
//! The model owns the motion parameters shared by every hypothesis of one
//! object class: the constant-velocity dynamics, the Mahalanobis gate, and
//! the transition probabilities in log space. Branch extension goes through
//! [`ObjectModel::new_state`], which deep-copies the parent state and either
//! folds a gated report in or coasts the branch forward as a skip.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector4};

use crate::components::kalman::KalmanFilter;
use crate::mht::config::TrackerConfig;
use crate::mht::object::ObjectReport;
use crate::mht::state::ObjectState;

/// Immutable motion and likelihood configuration.
#[derive(Debug, Clone)]
pub struct ObjectModel {
    time_step: f64,
    max_mahalanobis_distance: f64,
    // The higher the rate, the slower the decay
    skip_decay_rate: f64,
    start_log_likelihood: f64,
    skip_log_likelihood: f64,
    detect_log_likelihood: f64,
    measurement_noise_covariance: Matrix2<f64>,
    initial_state_covariance: Matrix4<f64>,
    process_noise_covariance: Matrix4<f64>,
    state_transition: Matrix4<f64>,
    measurement_matrix: Matrix2x4<f64>,
}

impl ObjectModel {
    /// Build the model from a validated configuration.
    pub fn new(config: &TrackerConfig) -> Self {
        let dt = config.time_step;
        let state_transition = Matrix4::new(
            1.0, 0.0, dt, 0.0, //
            0.0, 1.0, 0.0, dt, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let measurement_matrix = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        );

        Self {
            time_step: dt,
            max_mahalanobis_distance: config.max_mahalanobis_distance,
            skip_decay_rate: config.skip_decay_rate,
            start_log_likelihood: config.start_likelihood.ln(),
            skip_log_likelihood: (1.0 - config.detect_likelihood).ln(),
            detect_log_likelihood: config.detect_likelihood.ln(),
            measurement_noise_covariance: config.measurement_noise_covariance,
            initial_state_covariance: config.initial_state_covariance,
            process_noise_covariance: config.process_noise_covariance,
            state_transition,
            measurement_matrix,
        }
    }

    /// Time step between frames, seconds
    #[inline]
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// `ln P(new track present)`
    #[inline]
    pub fn start_log_likelihood(&self) -> f64 {
        self.start_log_likelihood
    }

    /// `ln P(detect | present)`
    #[inline]
    pub fn detect_log_likelihood(&self) -> f64 {
        self.detect_log_likelihood
    }

    /// `ln (1 − P(detect | present))`
    #[inline]
    pub fn skip_log_likelihood(&self) -> f64 {
        self.skip_log_likelihood
    }

    /// Probability that a branch with this skip streak has ended:
    /// `1 − exp(−times_skipped / skip_decay_rate)`.
    pub fn end_probability(&self, state: &ObjectState) -> f64 {
        1.0 - (-(state.times_skipped() as f64) / self.skip_decay_rate).exp()
    }

    /// `ln (1 − end_probability)`, computed analytically so long skip
    /// streaks stay finite.
    pub fn continue_log_likelihood(&self, state: &ObjectState) -> f64 {
        -(state.times_skipped() as f64) / self.skip_decay_rate
    }

    /// `ln end_probability`; negative infinity when the branch has never
    /// skipped, so callers only generate end branches after a skip.
    pub fn end_log_likelihood(&self, state: &ObjectState) -> f64 {
        self.end_probability(state).ln()
    }

    /// Number of successor states to generate per (state, report) pair.
    /// A single constant-velocity motion model yields one.
    pub fn begin_new_states(&self, _state: &ObjectState, _report: Option<&ObjectReport>) -> usize {
        1
    }

    /// Construct successor `index` of `state`.
    ///
    /// With a report, the successor is a gated detection: the reference
    /// point policy resolves the measurement, the Mahalanobis gate decides
    /// admissibility, and a predict + correct produces the posterior with
    /// the measurement log-likelihood folded into the branch score. Outside
    /// the gate, or when the innovation covariance degenerates, no
    /// successor is produced. Without a report the successor is a skip:
    /// predict only, skip streak incremented.
    pub fn new_state(
        &self,
        index: usize,
        state: &ObjectState,
        report: Option<&ObjectReport>,
    ) -> Option<ObjectState> {
        debug_assert!(index < self.begin_new_states(state, report));

        let mut successor = state.clone();
        let continue_log_likelihood = self.continue_log_likelihood(state);
        if !successor.is_advanced() {
            successor.kalman_mut().predict();
        }
        successor.clear_advanced();

        match report {
            Some(report) => {
                let measurement = successor.update_reference_point_source(
                    &report.object().reference_point_source,
                    report.reference_point(),
                    report.corner_id(),
                );

                let distance = match successor.kalman().mahalanobis_distance(&measurement) {
                    Ok(distance) => distance,
                    Err(error) => {
                        tracing::debug!(%error, "discarding detection candidate");
                        return None;
                    }
                };
                if distance > self.max_mahalanobis_distance {
                    return None;
                }

                let measurement_log_likelihood = successor
                    .kalman()
                    .measurement_log_likelihood(&measurement)
                    .ok()?;
                successor.kalman_mut().correct(&measurement).ok()?;
                successor.reset_times_skipped();
                successor.set_log_likelihood(
                    state.log_likelihood()
                        + continue_log_likelihood
                        + self.detect_log_likelihood
                        + measurement_log_likelihood,
                );
                Some(successor)
            }
            None => {
                successor.increment_times_skipped();
                successor.set_log_likelihood(
                    state.log_likelihood() + continue_log_likelihood + self.skip_log_likelihood,
                );
                Some(successor)
            }
        }
    }

    /// State for a brand-new track hypothesis seeded from `report`:
    /// position from the resolved measurement, zero velocity, covariance
    /// from the configured initial state covariance. Branch score is
    /// `ln start_p + ln detect_p`.
    pub fn initial_state(&self, report: &ObjectReport) -> ObjectState {
        let kalman = self.kalman_filter();
        let mut state = ObjectState::new(
            kalman,
            self.start_log_likelihood + self.detect_log_likelihood,
            0,
            report.object().reference_point_type,
            &report.object().reference_point_source,
        );
        let measurement = state.update_reference_point_source(
            &report.object().reference_point_source,
            report.reference_point(),
            report.corner_id(),
        );
        state
            .kalman_mut()
            .set_state(Vector4::new(measurement.x, measurement.y, 0.0, 0.0));
        state
    }

    /// Resolved measurement coordinates a report would contribute to
    /// `state`, without mutating it.
    pub fn resolved_measurement(
        &self,
        state: &ObjectState,
        report: &ObjectReport,
    ) -> nalgebra::Vector2<f64> {
        let mut probe = state.clone();
        probe.update_reference_point_source(
            &report.object().reference_point_source,
            report.reference_point(),
            report.corner_id(),
        )
    }

    fn kalman_filter(&self) -> KalmanFilter {
        KalmanFilter::new(
            self.state_transition,
            self.measurement_matrix,
            self.measurement_noise_covariance,
            self.initial_state_covariance,
            self.process_noise_covariance,
        )
    }
}
