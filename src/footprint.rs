use crate::math::{project_local, rot90, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The physical envelope and performance limits of a vehicle,
/// carried by every crossing request.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleEnvelope {
    /// The vehicle length in m.
    pub length: f64,
    /// The vehicle width in m.
    pub width: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acceleration: f64,
    /// The maximum deceleration of the vehicle, a positive number in m/s^2.
    pub max_deceleration: f64,
}

/// The oriented rectangle of road a vehicle occupies at a pose.
#[derive(Clone, Copy, Debug)]
pub struct Footprint {
    /// The world space coordinates of the centre of the rectangle.
    centre: Point2d,
    /// A unit vector aligned with the vehicle's heading.
    dir: Vector2d,
    /// Half the rectangle's length in m.
    half_len: f64,
    /// Half the rectangle's width in m.
    half_wid: f64,
}

impl Footprint {
    /// Creates a footprint from its centre, heading and full extents.
    pub fn new(centre: Point2d, dir: Vector2d, length: f64, width: f64) -> Self {
        Self {
            centre,
            dir,
            half_len: 0.5 * length,
            half_wid: 0.5 * width,
        }
    }

    /// The footprint of a vehicle envelope at the given pose.
    pub fn of_envelope(envelope: &VehicleEnvelope, centre: Point2d, dir: Vector2d) -> Self {
        Self::new(centre, dir, envelope.length, envelope.width)
    }

    /// Grows the footprint by `buffer` metres on every side.
    pub fn inflate(&self, buffer: f64) -> Self {
        Self {
            half_len: self.half_len + buffer,
            half_wid: self.half_wid + buffer,
            ..*self
        }
    }

    /// The world space coordinates of the centre of the rectangle.
    pub fn centre(&self) -> Point2d {
        self.centre
    }

    /// The four corners of the rectangle.
    pub fn corners(&self) -> [Point2d; 4] {
        let long = self.half_len * self.dir;
        let lat = self.half_wid * rot90(self.dir);
        [
            self.centre + long + lat,
            self.centre + long - lat,
            self.centre - long - lat,
            self.centre - long + lat,
        ]
    }

    /// Returns true if the point lies within the rectangle.
    pub fn contains(&self, point: Point2d) -> bool {
        let local = project_local(point, self.centre, self.dir, rot90(self.dir));
        local.x.abs() <= self.half_len && local.y.abs() <= self.half_wid
    }

    /// Samples the rectangle's surface on a grid no coarser than `spacing`,
    /// including the boundary.
    pub fn samples(&self, spacing: f64) -> impl Iterator<Item = Point2d> + '_ {
        let n_long = usize::max((2.0 * self.half_len / spacing).ceil() as usize, 1);
        let n_lat = usize::max((2.0 * self.half_wid / spacing).ceil() as usize, 1);
        let lat_axis = rot90(self.dir);
        (0..=n_long).flat_map(move |i| {
            let x = self.half_len * (2.0 * i as f64 / n_long as f64 - 1.0);
            (0..=n_lat).map(move |j| {
                let y = self.half_wid * (2.0 * j as f64 / n_lat as f64 - 1.0);
                self.centre + x * self.dir + y * lat_axis
            })
        })
    }

    /// Returns true if the two rectangles overlap,
    /// by the separating axis test over both rectangles' axes.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        let axes = [self.dir, rot90(self.dir), other.dir, rot90(other.dir)];
        axes.iter().all(|axis| {
            let ours = self.project_onto(*axis);
            let theirs = other.project_onto(*axis);
            ours.max >= theirs.min && theirs.max >= ours.min
        })
    }

    /// The extent of the rectangle's corners projected onto an axis.
    fn project_onto(&self, axis: Vector2d) -> Interval<f64> {
        let mut extent = Interval::new(f64::INFINITY, f64::NEG_INFINITY);
        for corner in self.corners() {
            let d = corner.to_vec().dot(axis);
            extent.min = f64::min(extent.min, d);
            extent.max = f64::max(extent.max, d);
        }
        extent
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fp(x: f64, y: f64, angle: f64) -> Footprint {
        let dir = Vector2d::new(angle.cos(), angle.sin());
        Footprint::new(Point2d::new(x, y), dir, 5.0, 2.0)
    }

    #[test]
    fn contains_respects_orientation() {
        let f = fp(0.0, 0.0, 0.0);
        assert!(f.contains(Point2d::new(2.4, 0.9)));
        assert!(!f.contains(Point2d::new(2.6, 0.0)));
        assert!(!f.contains(Point2d::new(0.0, 1.1)));

        let f = fp(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert!(f.contains(Point2d::new(0.9, 2.4)));
        assert!(!f.contains(Point2d::new(0.0, 2.6)));
    }

    #[test]
    fn inflate_grows_every_side() {
        let f = fp(0.0, 0.0, 0.0).inflate(0.5);
        assert!(f.contains(Point2d::new(2.9, 1.4)));
        assert!(!f.contains(Point2d::new(3.1, 0.0)));
    }

    #[test]
    fn separated_rectangles_do_not_overlap() {
        let a = fp(0.0, 0.0, 0.0);
        assert!(a.overlaps(&fp(4.0, 0.0, 0.0)));
        assert!(!a.overlaps(&fp(6.0, 0.0, 0.0)));
        // Diagonal neighbour separated only on a rotated axis
        let b = fp(3.0, 2.6, std::f64::consts::FRAC_PI_4);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&fp(5.0, 4.5, std::f64::consts::FRAC_PI_4)));
    }

    #[test]
    fn samples_cover_the_boundary() {
        let f = fp(0.0, 0.0, 0.0);
        let samples = f.samples(1.0).collect::<Vec<_>>();
        assert!(samples.iter().all(|p| f.inflate(1e-9).contains(*p)));
        assert!(samples.iter().any(|p| (p.x - 2.5).abs() < 1e-9));
        assert!(samples.iter().any(|p| (p.x + 2.5).abs() < 1e-9));
    }
}
