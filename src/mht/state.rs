//! Per-hypothesis object state: Kalman filter plus branch bookkeeping.
//!
//! Each hypothesis branch carries its own deep copy of the filter, the
//! accumulated branch log-likelihood, the consecutive skip count, and the
//! segment memory of the corner reference-point policy. Branches may
//! disagree about which corner is being tracked; divergent policies are
//! themselves evidence in the likelihood.

use nalgebra::{Vector2, Vector4};

use crate::common::geometry::{assignment_cost, shared_corner, Segment2D};
use crate::components::kalman::KalmanFilter;
use crate::mht::object::{ReferencePointSource, ReferencePointType};

/// Costs within this margin keep the incoming segment order.
const COST_TIE_TOLERANCE: f64 = 1e-9;

/// Mutable per-hypothesis state.
#[derive(Debug, Clone)]
pub struct ObjectState {
    kalman: KalmanFilter,
    log_likelihood: f64,
    times_skipped: u32,
    reference_point_type: ReferencePointType,
    segment_1: Option<Segment2D>,
    segment_2: Option<Segment2D>,
    advanced: bool,
}

impl ObjectState {
    /// Create a state and seed the segment memory from `source`.
    pub fn new(
        kalman: KalmanFilter,
        log_likelihood: f64,
        times_skipped: u32,
        reference_point_type: ReferencePointType,
        source: &ReferencePointSource,
    ) -> Self {
        let mut state = Self {
            kalman,
            log_likelihood,
            times_skipped,
            reference_point_type,
            segment_1: None,
            segment_2: None,
            advanced: false,
        };
        state.initialize_with_source(source);
        state
    }

    fn initialize_with_source(&mut self, source: &ReferencePointSource) {
        if let Some(first) = source.first() {
            self.segment_1 = Some(*first);
        }
        if let Some(second) = source.get(1) {
            self.segment_2 = Some(*second);
        }
    }

    /// Accumulated branch log-likelihood
    #[inline]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Overwrite the accumulated branch log-likelihood
    #[inline]
    pub fn set_log_likelihood(&mut self, log_likelihood: f64) {
        self.log_likelihood = log_likelihood;
    }

    /// Consecutive frames without an associated report on this branch
    #[inline]
    pub fn times_skipped(&self) -> u32 {
        self.times_skipped
    }

    /// Register one more frame without an associated report
    #[inline]
    pub fn increment_times_skipped(&mut self) {
        self.times_skipped += 1;
    }

    /// A report was associated; the skip streak is over
    #[inline]
    pub fn reset_times_skipped(&mut self) {
        self.times_skipped = 0;
    }

    /// Active reference-point policy
    #[inline]
    pub fn reference_point_type(&self) -> ReferencePointType {
        self.reference_point_type
    }

    /// The underlying filter
    #[inline]
    pub fn kalman(&self) -> &KalmanFilter {
        &self.kalman
    }

    /// Mutable access to the underlying filter
    #[inline]
    pub fn kalman_mut(&mut self) -> &mut KalmanFilter {
        &mut self.kalman
    }

    /// Posterior state `(x, y, vx, vy)`
    #[inline]
    pub fn state(&self) -> Vector4<f64> {
        self.kalman.state_post
    }

    /// Posterior x position
    #[inline]
    pub fn x(&self) -> f64 {
        self.kalman.state_post[0]
    }

    /// Posterior y position
    #[inline]
    pub fn y(&self) -> f64 {
        self.kalman.state_post[1]
    }

    /// Predicted x position
    #[inline]
    pub fn x_predicted(&self) -> f64 {
        self.kalman.state_pre[0]
    }

    /// Predicted y position
    #[inline]
    pub fn y_predicted(&self) -> f64 {
        self.kalman.state_pre[1]
    }

    /// Posterior x velocity
    #[inline]
    pub fn velocity_x(&self) -> f64 {
        self.kalman.state_post[2]
    }

    /// Posterior y velocity
    #[inline]
    pub fn velocity_y(&self) -> f64 {
        self.kalman.state_post[3]
    }

    /// First remembered segment of the tracked corner
    #[inline]
    pub fn segment_1(&self) -> Option<&Segment2D> {
        self.segment_1.as_ref()
    }

    /// Second remembered segment, when the L-shape provided one
    #[inline]
    pub fn segment_2(&self) -> Option<&Segment2D> {
        self.segment_2.as_ref()
    }

    /// Advance the filter one time step outside the branching cycle.
    ///
    /// Sets the advanced flag so the next branch extension does not step the
    /// filter a second time. Calling twice advances twice.
    pub fn advance(&mut self) {
        self.kalman.predict();
        self.advanced = true;
    }

    /// Whether the filter was already advanced for the coming frame
    #[inline]
    pub fn is_advanced(&self) -> bool {
        self.advanced
    }

    /// Clear the advanced flag (branch extension consumed it)
    #[inline]
    pub fn clear_advanced(&mut self) {
        self.advanced = false;
    }

    /// Re-resolve segment identity against a new observation and return the
    /// measurement point for the filter.
    ///
    /// For corner observations the remembered first segment keeps its
    /// identity: the incoming candidate with the lowest assignment cost to
    /// it becomes the new first segment, the other the second. Costs equal
    /// within `1e-9` keep the incoming order. Centroid and visible-endpoint
    /// observations pass the reference point through unchanged.
    pub fn update_reference_point_source(
        &mut self,
        source: &ReferencePointSource,
        reference_point: Vector2<f64>,
        corner_id: usize,
    ) -> Vector2<f64> {
        match self.reference_point_type {
            ReferencePointType::Centroid | ReferencePointType::VisibleEndpoint => reference_point,
            ReferencePointType::Corner => {
                self.reassign_segments(source);
                self.corner_measurement(reference_point, corner_id)
            }
        }
    }

    fn reassign_segments(&mut self, source: &ReferencePointSource) {
        let Some(previous) = self.segment_1 else {
            self.initialize_with_source(source);
            return;
        };

        match (source.first().copied(), source.get(1).copied()) {
            (Some(first), Some(second)) => {
                let cost_first = assignment_cost(&first, &previous);
                let cost_second = assignment_cost(&second, &previous);
                if cost_second + COST_TIE_TOLERANCE < cost_first {
                    self.segment_1 = Some(second);
                    self.segment_2 = Some(first);
                } else {
                    self.segment_1 = Some(first);
                    self.segment_2 = Some(second);
                }
            }
            (Some(only), None) => {
                // Single visible edge: refresh whichever remembered segment
                // it matches best.
                let cost_first = assignment_cost(&only, &previous);
                match self.segment_2 {
                    Some(second)
                        if assignment_cost(&only, &second) + COST_TIE_TOLERANCE < cost_first =>
                    {
                        self.segment_2 = Some(only);
                    }
                    _ => self.segment_1 = Some(only),
                }
            }
            _ => {}
        }
    }

    fn corner_measurement(&self, reference_point: Vector2<f64>, corner_id: usize) -> Vector2<f64> {
        match (self.segment_1.as_ref(), self.segment_2.as_ref()) {
            (Some(first), Some(second)) => shared_corner(first, second),
            (Some(first), None) => first.endpoint(corner_id),
            _ => reference_point,
        }
    }
}
