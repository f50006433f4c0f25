use crate::math::{equidistant_points_along_curve, ParametricCurve2d, Point2d, Vector2d};
use crate::LaneId;
use cgmath::prelude::*;

/// The spacing of the resampled centre line points, in m.
const CENTRE_LINE_STEP: f64 = 0.5;

/// Classifies a lane's role around the intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneKind {
    /// Carries vehicles towards the intersection.
    Approach,
    /// Lies within the intersection.
    Interior,
    /// Carries vehicles away from the intersection.
    Departure,
}

/// A lane represents a single stream of traffic.
#[derive(Clone)]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// The lane's role around the intersection.
    kind: LaneKind,
    /// The geometry of the lane.
    curve: CentreLine,
    /// The maximum velocity on the lane in m/s.
    max_velocity: f64,
    /// The lanes that succeed this one.
    lanes_out: Vec<LaneId>,
    /// The lanes that precede this one.
    lanes_in: Vec<LaneId>,
}

/// The attributes of a lane.
pub struct LaneAttributes<'a> {
    /// A curve defining the centre line of the lane.
    pub curve: &'a dyn ParametricCurve2d,
    /// The lane's role around the intersection.
    pub kind: LaneKind,
    /// The maximum velocity on the lane in m/s.
    pub max_velocity: f64,
}

/// The result of sampling a lane's centre line.
#[derive(Clone, Copy, Debug)]
pub struct LaneSample {
    /// The position on the centre line.
    pub pos: Point2d,
    /// The tangent unit vector of the centre line.
    pub tan: Vector2d,
}

impl Lane {
    /// Creates a new lane.
    pub(crate) fn new(id: LaneId, attribs: &LaneAttributes) -> Self {
        Self {
            id,
            kind: attribs.kind,
            curve: CentreLine::new(&attribs.curve),
            max_velocity: attribs.max_velocity,
            lanes_out: vec![],
            lanes_in: vec![],
        }
    }

    /// Gets the lane's ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// The lane's role around the intersection.
    pub fn kind(&self) -> LaneKind {
        self.kind
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.curve.length()
    }

    /// The maximum velocity on the lane in m/s.
    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// The lanes that succeed this one.
    pub fn lanes_out(&self) -> &[LaneId] {
        &self.lanes_out
    }

    /// The lanes that precede this one.
    pub fn lanes_in(&self) -> &[LaneId] {
        &self.lanes_in
    }

    /// Adds a successor lane.
    pub(crate) fn add_lane_out(&mut self, lane_id: LaneId) {
        self.lanes_out.push(lane_id);
    }

    /// Adds a predecessor lane.
    pub(crate) fn add_lane_in(&mut self, lane_id: LaneId) {
        self.lanes_in.push(lane_id);
    }

    /// The pose at the start of the lane.
    pub fn start(&self) -> LaneSample {
        self.curve.sample_centre(0.0)
    }

    /// The pose at the end of the lane.
    pub fn end(&self) -> LaneSample {
        self.curve.sample_centre(self.length())
    }

    /// Samples the centre line at a longitudinal position.
    pub fn sample_centre(&self, pos: f64) -> LaneSample {
        self.curve.sample_centre(pos)
    }

    /// The longitudinal position on the lane nearest to a point, clamped to the lane.
    pub fn project(&self, point: Point2d) -> f64 {
        self.curve.project(point)
    }

    /// A point on the centre line `dist` metres ahead of `pos`, clamped to the lane end.
    pub fn lead_point(&self, pos: f64, dist: f64) -> Point2d {
        self.curve.sample_centre(f64::min(pos + dist, self.length())).pos
    }
}

/// An arclength-parameterised polyline approximation of a lane's centre line.
#[derive(Clone)]
pub(crate) struct CentreLine {
    points: Vec<Point2d>,
    step: f64,
    length: f64,
}

impl CentreLine {
    fn new(curve: &dyn ParametricCurve2d) -> Self {
        let (points, length) = equidistant_points_along_curve(&curve, CENTRE_LINE_STEP);
        Self {
            points,
            step: CENTRE_LINE_STEP,
            length,
        }
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn sample_centre(&self, pos: f64) -> LaneSample {
        let last = self.points.len() - 1;
        let idx = f64::max(pos / self.step, 0.0);
        let idx = usize::min(idx as usize, last - 1);
        let frac = f64::clamp(pos / self.step - idx as f64, 0.0, 1.0);
        let [p1, p2] = [self.points[idx], self.points[idx + 1]];
        LaneSample {
            pos: p1 + frac * (p2 - p1),
            tan: (p2 - p1).normalize(),
        }
    }

    fn project(&self, point: Point2d) -> f64 {
        let mut best = (f64::INFINITY, 0.0);
        for (idx, pair) in self.points.windows(2).enumerate() {
            let seg = pair[1] - pair[0];
            let t = f64::clamp((point - pair[0]).dot(seg) / seg.magnitude2(), 0.0, 1.0);
            let dist = (point - (pair[0] + t * seg)).magnitude2();
            if dist < best.0 {
                best = (dist, (idx as f64 + t) * self.step);
            }
        }
        f64::min(best.1, self.length)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{Arc2d, LineSegment2d};
    use assert_approx_eq::assert_approx_eq;
    use slotmap::Key;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn line_lane() -> Lane {
        let curve = LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(20.0, 0.0));
        Lane::new(
            LaneId::null(),
            &LaneAttributes {
                curve: &curve,
                kind: LaneKind::Approach,
                max_velocity: 10.0,
            },
        )
    }

    #[test]
    fn samples_along_a_straight_lane() {
        let lane = line_lane();
        assert_approx_eq!(lane.length(), 20.0, 1e-3);
        let s = lane.sample_centre(12.25);
        assert_approx_eq!(s.pos.x, 12.25, 1e-3);
        assert_approx_eq!(s.tan.x, 1.0, 1e-6);
    }

    #[test]
    fn projects_a_point_back_onto_the_lane() {
        let lane = line_lane();
        assert_approx_eq!(lane.project(Point2d::new(7.3, 2.0)), 7.3, 1e-3);
        assert_approx_eq!(lane.project(Point2d::new(-5.0, 0.0)), 0.0, 1e-6);
        assert_approx_eq!(lane.project(Point2d::new(50.0, 1.0)), 20.0, 1e-3);
    }

    #[test]
    fn arc_lane_tangents_follow_the_ring() {
        let curve = Arc2d::new(Point2d::new(0.0, 0.0), 10.0, 0.0, PI);
        let lane = Lane::new(
            LaneId::null(),
            &LaneAttributes {
                curve: &curve,
                kind: LaneKind::Interior,
                max_velocity: 8.0,
            },
        );
        assert_approx_eq!(lane.length(), 10.0 * PI, 0.05);
        // A quarter of the way round, the tangent points along +y rotated 45deg
        let s = lane.sample_centre(lane.length() * 0.25);
        let angle = s.tan.y.atan2(s.tan.x);
        assert_approx_eq!(angle, FRAC_PI_2 + PI / 4.0, 0.05);
    }
}
