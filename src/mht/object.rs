//! Geometric observations consumed by the tracker.
//!
//! Upstream feature extraction turns a planar laser scan into a list of
//! [`Object`] records per frame, each carrying a reference point and the
//! segments it was derived from. The tracker wraps them into immutable
//! [`ObjectReport`]s stamped with the frame number.

use nalgebra::Vector2;
use smallvec::SmallVec;

use crate::common::geometry::Segment2D;
use crate::mht::errors::TrackerError;

/// Which geometric point of an observed object the filter locks onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePointType {
    /// Corner of an L-shape, defined by one or two segments
    Corner,
    /// Centroid of the observed points
    Centroid,
    /// Endpoint of the visible part of the object
    VisibleEndpoint,
}

/// Segments that define the observed corner: one for a single visible edge,
/// two for a full L-shape.
pub type ReferencePointSource = SmallVec<[Segment2D; 2]>;

/// One observed object extracted from a planar laser scan.
#[derive(Debug, Clone)]
pub struct Object {
    /// Reference point in the fixed planar frame, metres
    pub reference_point: Vector2<f64>,
    /// Active reference-point semantics
    pub reference_point_type: ReferencePointType,
    /// Segments the reference point was derived from
    pub reference_point_source: ReferencePointSource,
    /// Corner index within the source object
    pub corner_id: usize,
}

impl Object {
    /// Create a new observation
    pub fn new(
        reference_point: Vector2<f64>,
        reference_point_type: ReferencePointType,
        reference_point_source: ReferencePointSource,
        corner_id: usize,
    ) -> Self {
        Self {
            reference_point,
            reference_point_type,
            reference_point_source,
            corner_id,
        }
    }

    /// Corner observations must carry at least one source segment.
    pub fn has_valid_source(&self) -> bool {
        self.reference_point_type != ReferencePointType::Corner
            || !self.reference_point_source.is_empty()
    }

    /// Check the corner-source invariant.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.has_valid_source() {
            Ok(())
        } else {
            Err(TrackerError::EmptyReferenceSource)
        }
    }
}

/// An [`Object`] stamped with its frame number and the configured clutter
/// log-likelihood. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ObjectReport {
    object: Object,
    frame: u32,
    false_alarm_log_likelihood: f64,
}

impl ObjectReport {
    /// Wrap an observation for one frame
    pub fn new(object: Object, frame: u32, false_alarm_log_likelihood: f64) -> Self {
        Self {
            object,
            frame,
            false_alarm_log_likelihood,
        }
    }

    /// The wrapped observation
    #[inline]
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Frame number assigned by the tracker
    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Log-likelihood of this report being clutter
    #[inline]
    pub fn false_alarm_log_likelihood(&self) -> f64 {
        self.false_alarm_log_likelihood
    }

    /// Reference point of the wrapped observation
    #[inline]
    pub fn reference_point(&self) -> Vector2<f64> {
        self.object.reference_point
    }

    /// Corner index of the wrapped observation
    #[inline]
    pub fn corner_id(&self) -> usize {
        self.object.corner_id
    }
}
