//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use curve::{equidistant_points_along_curve, Arc2d, LineSegment2d, ParametricCurve2d};
pub use util::*;

mod curve;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
