use super::{CubicFn, ParametricCurve2d, Point2d, Vector2d};
use crate::util::Interval;

/// A cubic Hermite spline over `t ∈ [0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HermiteCurve2d {
    x: CubicFn,
    y: CubicFn,
}

impl HermiteCurve2d {
    /// Creates a spline from its end points and end tangents.
    pub fn new(p0: Point2d, m0: Vector2d, p1: Point2d, m1: Vector2d) -> Self {
        Self {
            x: CubicFn::fit(0.0, p0.x, m0.x, 1.0, p1.x, m1.x),
            y: CubicFn::fit(0.0, p0.y, m0.y, 1.0, p1.y, m1.y),
        }
    }

    /// The position at `t`.
    pub fn coordinates(&self, t: f64) -> Point2d {
        self.sample(t)
    }
}

impl ParametricCurve2d for HermiteCurve2d {
    fn sample(&self, t: f64) -> Point2d {
        Point2d::new(self.x.y(t), self.y.y(t))
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        Vector2d::new(self.x.dy(t), self.y.dy(t))
    }

    fn sample_dt2(&self, t: f64) -> Vector2d {
        Vector2d::new(self.x.ddy(t), self.y.ddy(t))
    }
}
