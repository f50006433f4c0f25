use crate::footprint::{Footprint, VehicleEnvelope};
use crate::layout::RoadLayout;
use crate::LaneId;
use cgmath::prelude::*;
use crate::math::{Point2d, Vector2d};

/// A disposable kinematic stand-in for a vehicle, driven forward by the
/// trial simulation to discover which cells a crossing would occupy.
/// Constructed fresh for every query; never aliased with a real vehicle.
pub(crate) struct Replica<'a> {
    layout: &'a RoadLayout,
    envelope: VehicleEnvelope,
    /// The lane sequence to follow, arrival lane first.
    route: &'a [LaneId],
    /// Index of the lane currently being followed.
    lane_idx: usize,
    /// The world space coordinates of the centre of the replica.
    pos: Point2d,
    /// A unit vector aligned with the replica's heading.
    dir: Vector2d,
    /// The velocity in m/s.
    vel: f64,
    /// Distance ahead on the lane at which to aim when steering, in m.
    lead_distance: f64,
    /// The replica switches to the next lane within this distance of the
    /// current lane's end, in m.
    lane_end_epsilon: f64,
}

impl<'a> Replica<'a> {
    /// Creates a replica at the entry point of the first route lane.
    pub fn new(
        layout: &'a RoadLayout,
        route: &'a [LaneId],
        envelope: VehicleEnvelope,
        velocity: f64,
        lead_distance: f64,
        lane_end_epsilon: f64,
    ) -> Self {
        let start = layout.get_lane(route[0]).start();
        Self {
            layout,
            envelope,
            route,
            lane_idx: 0,
            pos: start.pos,
            dir: start.tan,
            vel: velocity,
            lead_distance,
            lane_end_epsilon,
        }
    }

    /// The replica's velocity in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The region of road the replica occupies.
    pub fn footprint(&self) -> Footprint {
        Footprint::of_envelope(&self.envelope, self.pos, self.dir)
    }

    /// Advances the replica by one time step.
    ///
    /// When `accelerating`, applies the envelope's maximum acceleration up
    /// to `max_velocity`; otherwise the replica coasts. Position advances
    /// trapezoidally, then a steering sub-step re-aims the replica at a
    /// lead point ahead on its current lane.
    pub fn step(&mut self, dt: f64, accelerating: bool, max_velocity: f64) {
        let vel = if accelerating {
            self.accelerate_to_max(dt, max_velocity)
        } else {
            self.coast()
        };
        let dist = 0.5 * (self.vel + vel) * dt;
        self.vel = vel;
        self.pos += dist * self.dir;
        self.steer();
    }

    /// The velocity after holding the current velocity for one step.
    fn coast(&self) -> f64 {
        self.vel
    }

    /// The velocity after one step of maximum acceleration, capped at `max_velocity`.
    fn accelerate_to_max(&self, dt: f64, max_velocity: f64) -> f64 {
        f64::min(
            self.vel + dt * self.envelope.max_acceleration,
            f64::max(max_velocity, self.vel),
        )
    }

    /// Re-aims the replica at a lead point ahead on its lane sequence,
    /// advancing to the next lane when within epsilon of the lane's end.
    fn steer(&mut self) {
        let mut lane = self.layout.get_lane(self.route[self.lane_idx]);
        let mut pos = lane.project(self.pos);

        // Switch to the next lane near the end of the current one
        while lane.length() - pos < self.lane_end_epsilon && self.lane_idx + 1 < self.route.len() {
            self.lane_idx += 1;
            lane = self.layout.get_lane(self.route[self.lane_idx]);
            pos = lane.project(self.pos);
        }

        // Never aim backwards; past the final lane's end the lead point
        // clamps behind the replica and the heading simply holds.
        let lead = lane.lead_point(pos, self.lead_distance);
        let aim = lead - self.pos;
        if aim.magnitude2() > 1e-6 && aim.dot(self.dir) > 0.0 {
            self.dir = aim.normalize();
        }
    }
}
