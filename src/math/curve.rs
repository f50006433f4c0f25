use super::{unit_vector, Point2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn bounds(&self) -> Interval<f64> {
        (**self).bounds()
    }
}

/// A straight line segment.
#[derive(Copy, Clone, Debug)]
pub struct LineSegment2d {
    start: Point2d,
    end: Point2d,
}

impl LineSegment2d {
    /// Creates a line segment from its two end points.
    pub const fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }
}

impl ParametricCurve2d for LineSegment2d {
    fn sample(&self, t: f64) -> Point2d {
        self.start + t * (self.end - self.start)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }
}

/// A circular arc, anticlockwise for a positive sweep.
#[derive(Copy, Clone, Debug)]
pub struct Arc2d {
    centre: Point2d,
    radius: f64,
    start_angle: f64,
    sweep: f64,
}

impl Arc2d {
    /// Creates an arc around `centre` from `start_angle` sweeping `sweep` radians.
    pub fn new(centre: Point2d, radius: f64, start_angle: f64, sweep: f64) -> Self {
        Self {
            centre,
            radius,
            start_angle,
            sweep,
        }
    }
}

impl ParametricCurve2d for Arc2d {
    fn sample(&self, t: f64) -> Point2d {
        let angle = self.start_angle + t * self.sweep;
        self.centre + self.radius * unit_vector(angle)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }
}

/// Resamples a curve into points an equal distance `dist` apart,
/// returning the points and the total arc length.
pub fn equidistant_points_along_curve(
    curve: &impl ParametricCurve2d,
    dist: f64,
) -> (Vec<Point2d>, f64) {
    // Dense pass to build an arc length table
    const SUBDIVISIONS: usize = 4096;
    let bounds = curve.bounds();
    let dts = (0..=SUBDIVISIONS).map(|i| {
        let f = i as f64 / SUBDIVISIONS as f64;
        bounds.min + f * bounds.length()
    });
    let dense = dts.map(|t| curve.sample(t)).collect::<Vec<_>>();

    let mut length = 0.0;
    let mut points = vec![dense[0]];
    let mut next_at = dist;
    for pair in dense.windows(2) {
        let seg = (pair[1] - pair[0]).magnitude();
        while next_at <= length + seg {
            let f = (next_at - length) / seg;
            points.push(pair[0] + f * (pair[1] - pair[0]));
            next_at += dist;
        }
        length += seg;
    }

    // Keep the true end point unless it coincides with the last sample
    let end = dense[SUBDIVISIONS];
    if (end - *points.last().unwrap()).magnitude() > 0.001 * dist {
        points.push(end);
    }

    (points, length)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn arc_length_of_half_circle() {
        let arc = Arc2d::new(Point2d::new(0.0, 0.0), 10.0, 0.0, PI);
        let (points, length) = equidistant_points_along_curve(&arc, 0.5);
        assert_approx_eq!(length, 10.0 * PI, 0.01);
        for pair in points.windows(2) {
            assert!((pair[1] - pair[0]).magnitude() <= 0.51);
        }
    }

    #[test]
    fn line_is_sampled_uniformly() {
        let line = LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(8.0, 6.0));
        let (points, length) = equidistant_points_along_curve(&line, 1.0);
        assert_approx_eq!(length, 10.0, 1e-6);
        assert_eq!(points.len(), 11);
        assert_approx_eq!(points[5].x, 4.0, 1e-3);
        assert_approx_eq!(points[5].y, 3.0, 1e-3);
    }
}
