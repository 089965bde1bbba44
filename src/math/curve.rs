use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
use std::f64::consts::FRAC_PI_2;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;

    /// Samples the derivative of the parametric curve.
    fn sample_dt(&self, t: f64) -> Vector2d;

    /// Samples the second derivative of the parametric curve.
    fn sample_dt2(&self, t: f64) -> Vector2d;

    /// The heading of the curve at `t`, in radians.
    ///
    /// A vertical tangent yields `±π/2` without dividing by `dx/dt`.
    fn direction(&self, t: f64) -> f64 {
        let d = self.sample_dt(t);
        if d.x == 0.0 {
            if d.y < 0.0 {
                -FRAC_PI_2
            } else {
                FRAC_PI_2
            }
        } else {
            d.y.atan2(d.x)
        }
    }

    /// The unsigned curvature of the curve at `t`, in 1/m.
    ///
    /// Returns zero where the curve is stationary.
    fn curvature(&self, t: f64) -> f64 {
        let d1 = self.sample_dt(t);
        let d2 = self.sample_dt2(t);
        let speed = d1.magnitude();
        if speed == 0.0 {
            return 0.0;
        }
        (d1.x * d2.y - d1.y * d2.x).abs() / speed.powi(3)
    }
}

/// Walks along a curve in `steps` uniform increments of `t`, keeping a point
/// each time the chord distance from the previously kept point reaches `dist`.
///
/// The first point is always the start of the curve. The end of the curve is
/// only included if it happens to fall on a kept step.
pub fn forward_stepped_points_along_curve(
    curve: &impl ParametricCurve2d,
    dist: f64,
    steps: usize,
) -> Vec<(f64, Point2d)> {
    let bounds = curve.bounds();
    let start = curve.sample(bounds.min);
    let dist2 = dist * dist;

    let mut points = vec![(bounds.min, start)];
    let mut last_p = start;

    for i in 1..=steps.max(1) {
        let t = bounds.lerp(i as f64 / steps.max(1) as f64);
        let p = curve.sample(t);
        if (p - last_p).magnitude2() >= dist2 {
            points.push((t, p));
            last_p = p;
        }
    }

    points
}
