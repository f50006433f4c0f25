use super::{Point2d, Vector2d};
use cgmath::prelude::*;
use std::f64::consts::TAU;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees anticlockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The anticlockwise angle of a vector from the positive x-axis, in radians.
pub fn angle_of(vec: Vector2d) -> f64 {
    vec.y.atan2(vec.x)
}

/// Wraps an angle into the range `[0, 2pi)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let angle = angle % TAU;
    if angle < 0.0 {
        angle + TAU
    } else {
        angle
    }
}

/// The unit vector at the given anticlockwise angle from the positive x-axis.
pub fn unit_vector(angle: f64) -> Vector2d {
    Vector2d::new(angle.cos(), angle.sin())
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn angles_wrap_into_one_turn() {
        assert_approx_eq!(normalize_angle(0.5), 0.5);
        assert_approx_eq!(normalize_angle(-0.5), TAU - 0.5);
        assert_approx_eq!(normalize_angle(3.0 * PI), PI);
    }

    #[test]
    fn rot90_is_anticlockwise() {
        let v = rot90(Vector2d::new(1.0, 0.0));
        assert_approx_eq!(v.x, 0.0);
        assert_approx_eq!(v.y, 1.0);
    }

    #[test]
    fn local_projection() {
        let p = project_local(
            Point2d::new(3.0, 5.0),
            Point2d::new(1.0, 1.0),
            Vector2d::new(0.0, 1.0),
            Vector2d::new(-1.0, 0.0),
        );
        assert_approx_eq!(p.x, 4.0);
        assert_approx_eq!(p.y, -2.0);
    }
}
