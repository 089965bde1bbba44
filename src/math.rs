//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use cubic::CubicFn;
pub use curve::{forward_stepped_points_along_curve, ParametricCurve2d};
pub use hermite::HermiteCurve2d;
pub use lut::LookupTable;
pub use segment::LineSegment2d;
pub use util::*;

mod cubic;
mod curve;
mod hermite;
mod lut;
mod segment;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
