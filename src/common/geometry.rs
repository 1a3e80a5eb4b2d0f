//! Planar segment geometry for the corner reference-point policy.
//!
//! Observed L-shapes arrive as one or two line segments. Deciding whether a
//! segment seen this frame is the same physical edge as one remembered from
//! the previous frame is done with a scalar assignment cost built from
//! orientation mismatch and midpoint distance; lower cost means a better
//! match.

use std::f64::consts::PI;

use nalgebra::Vector2;

/// Line segment in the fixed planar sensor frame. Units are metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment2D {
    /// First endpoint
    pub start: Vector2<f64>,
    /// Second endpoint
    pub end: Vector2<f64>,
}

impl Segment2D {
    /// Create a segment from two endpoints
    pub fn new(start: Vector2<f64>, end: Vector2<f64>) -> Self {
        Self { start, end }
    }

    /// Create a segment from raw coordinates
    pub fn from_points(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Vector2::new(x1, y1), Vector2::new(x2, y2))
    }

    /// Midpoint of the segment
    #[inline]
    pub fn midpoint(&self) -> Vector2<f64> {
        (self.start + self.end) * 0.5
    }

    /// Euclidean length of the segment
    #[inline]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Undirected orientation of the segment, folded into `[0, π)`.
    pub fn orientation(&self) -> f64 {
        let direction = self.end - self.start;
        let mut angle = direction.y.atan2(direction.x);
        if angle < 0.0 {
            angle += PI;
        }
        if angle >= PI {
            angle -= PI;
        }
        angle
    }

    /// Endpoint selected by index, taken modulo 2.
    #[inline]
    pub fn endpoint(&self, index: usize) -> Vector2<f64> {
        if index % 2 == 0 {
            self.start
        } else {
            self.end
        }
    }
}

/// Smallest signed rotation taking `source` onto `target`, in `(-π, π]`.
pub fn angle_between(target: f64, source: f64) -> f64 {
    let mut difference = target - source;
    while difference > PI {
        difference -= 2.0 * PI;
    }
    while difference <= -PI {
        difference += 2.0 * PI;
    }
    difference
}

/// Absolute angular difference between two undirected orientations.
///
/// Segment orientations are equivalent under a π rotation, so the result
/// lies in `[0, π/2]`.
pub fn abs_angle_between(target: f64, source: f64) -> f64 {
    let difference = angle_between(target, source).abs();
    if difference > PI / 2.0 {
        PI - difference
    } else {
        difference
    }
}

/// Assignment cost between two segments.
///
/// The cost is the orientation mismatch (radians) plus the midpoint
/// distance (metres). It is the criterion the corner policy uses to decide
/// segment identity across frames.
pub fn assignment_cost(lhs: &Segment2D, rhs: &Segment2D) -> f64 {
    abs_angle_between(lhs.orientation(), rhs.orientation())
        + (lhs.midpoint() - rhs.midpoint()).norm()
}

/// Corner shared by two segments of an L-shape: the endpoint of `lhs`
/// closest to any endpoint of `rhs`.
pub fn shared_corner(lhs: &Segment2D, rhs: &Segment2D) -> Vector2<f64> {
    let mut best_distance = f64::INFINITY;
    let mut corner = lhs.start;
    for i in 0..2 {
        for j in 0..2 {
            let p = lhs.endpoint(i);
            let q = rhs.endpoint(j);
            let distance = (p - q).norm_squared();
            if distance < best_distance {
                best_distance = distance;
                corner = p;
            }
        }
    }
    corner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_folding() {
        let horizontal = Segment2D::from_points(0.0, 0.0, 1.0, 0.0);
        let reversed = Segment2D::from_points(1.0, 0.0, 0.0, 0.0);
        assert!((horizontal.orientation() - 0.0).abs() < 1e-12);
        assert!((reversed.orientation() - 0.0).abs() < 1e-12);

        let vertical = Segment2D::from_points(0.0, 0.0, 0.0, 2.0);
        assert!((vertical.orientation() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_abs_angle_between_wraps() {
        // Orientations 0 and just under π describe nearly the same edge.
        assert!(abs_angle_between(0.0, PI - 0.01) < 0.011);
        assert!((abs_angle_between(0.0, PI / 2.0) - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_assignment_cost_prefers_same_edge() {
        let edge = Segment2D::from_points(0.0, 0.0, 1.0, 0.0);
        let same_moved = Segment2D::from_points(0.05, 0.01, 1.05, 0.01);
        let perpendicular = Segment2D::from_points(0.0, 0.0, 0.0, 1.0);

        assert!(assignment_cost(&edge, &same_moved) < assignment_cost(&edge, &perpendicular));
    }

    #[test]
    fn test_shared_corner() {
        let first = Segment2D::from_points(0.0, 0.0, 1.0, 0.0);
        let second = Segment2D::from_points(1.0, 0.0, 1.0, 1.0);

        let corner = shared_corner(&first, &second);
        assert!((corner.x - 1.0).abs() < 1e-12);
        assert!(corner.y.abs() < 1e-12);
    }
}
