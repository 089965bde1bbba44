use super::{cross, Point2d};
use cgmath::prelude::*;

/// Tolerance used to decide that two segments are parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// A straight line segment between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSegment2d {
    pub start: Point2d,
    pub end: Point2d,
}

impl LineSegment2d {
    pub const fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }

    /// The length of the segment.
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// Determines whether this segment touches or crosses `other`.
    ///
    /// Parallel segments (including two vertical ones) never reach the general
    /// case's division; they only intersect when collinear and overlapping.
    pub fn intersects(&self, other: &LineSegment2d) -> bool {
        let r = self.end - self.start;
        let s = other.end - other.start;
        let qp = other.start - self.start;
        let denom = cross(r, s);

        if denom.abs() <= PARALLEL_EPSILON * r.magnitude() * s.magnitude() {
            if cross(qp, r).abs() > PARALLEL_EPSILON * r.magnitude() * qp.magnitude() {
                // Parallel, on different lines
                return false;
            }
            return self.overlaps_collinear(other);
        }

        let t = cross(qp, s) / denom;
        let u = cross(qp, r) / denom;
        (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
    }

    /// Checks whether two collinear segments share any point, by projecting
    /// both onto this segment's dominant axis.
    fn overlaps_collinear(&self, other: &LineSegment2d) -> bool {
        let r = self.end - self.start;
        let project = |p: Point2d| {
            if r.x.abs() >= r.y.abs() {
                p.x
            } else {
                p.y
            }
        };
        let (a0, a1) = min_max(project(self.start), project(self.end));
        let (b0, b1) = min_max(project(other.start), project(other.end));
        a0 <= b1 && b0 <= a1
    }
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
