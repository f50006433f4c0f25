use crate::lane::{Lane, LaneAttributes, LaneKind, LaneSample};
use crate::math::{rot90, unit_vector, Arc2d, LineSegment2d, Point2d};
use crate::tile::Approach;
use crate::{LaneId, LaneSet};
use cgmath::prelude::*;
use std::f64::consts::TAU;

/// The sampling step used to locate rim crossings, in m.
const RIM_SCAN_STEP: f64 = 0.25;

/// The road context of a single intersection: its lanes, their
/// connectivity, and the ring geometry. Passed explicitly to the
/// components that need it; there is no global registry.
pub struct RoadLayout {
    /// The lanes in the network.
    lanes: LaneSet,
    /// The centre of the intersection.
    centre: Point2d,
    /// The inner radius of the ring in m.
    minimal_radius: f64,
    /// The outer radius of the ring in m.
    maximal_radius: f64,
    /// The radius of the central island, if any.
    central_radius: Option<f64>,
    /// The lane width in m.
    lane_width: f64,
    /// The entry/exit lane pairs of each approach road.
    approaches: Vec<ApproachRoad>,
}

/// The lane IDs making up one approach road.
#[derive(Clone, Copy, Debug)]
pub struct ApproachRoad {
    /// The lane entering the intersection.
    pub entry: LaneId,
    /// The lane leaving the intersection.
    pub exit: LaneId,
}

/// The attributes of a roundabout built with [RoadLayout::roundabout].
pub struct RoundaboutAttributes {
    /// The centre of the intersection.
    pub centre: Point2d,
    /// The radius of the ring's centre line in m.
    pub ring_radius: f64,
    /// The lane width in m.
    pub lane_width: f64,
    /// The length of each approach road in m.
    pub approach_length: f64,
    /// The number of approach roads, spaced evenly around the ring.
    pub num_approaches: usize,
    /// The maximum velocity on the ring in m/s.
    pub max_ring_velocity: f64,
    /// The maximum velocity on the approach roads in m/s.
    pub max_approach_velocity: f64,
}

impl RoadLayout {
    /// Creates an empty road layout around an intersection.
    pub fn new(
        centre: Point2d,
        minimal_radius: f64,
        maximal_radius: f64,
        central_radius: Option<f64>,
        lane_width: f64,
    ) -> Self {
        assert!(
            minimal_radius > 0.0 && maximal_radius > minimal_radius,
            "road layout radii are degenerate"
        );
        Self {
            lanes: LaneSet::default(),
            centre,
            minimal_radius,
            maximal_radius,
            central_radius,
            lane_width,
            approaches: vec![],
        }
    }

    /// Builds a roundabout with evenly spaced approach roads.
    ///
    /// Driving is anticlockwise. Each approach contributes a straight entry
    /// lane merging onto the ring and a straight exit lane diverging from
    /// it; the ring itself is a cycle of arc lanes split at every merge and
    /// diverge point so that routes can join and leave between them.
    pub fn roundabout(attribs: &RoundaboutAttributes) -> Self {
        let k = attribs.num_approaches;
        assert!(k >= 1, "a roundabout needs at least one approach");
        let r = attribs.ring_radius;
        let w = attribs.lane_width;
        let central = Some(r - 1.5 * w).filter(|c| *c > 0.0);
        let mut layout = Self::new(attribs.centre, r - w, r + w, central, w);

        let sector = TAU / k as f64;
        // Angular offset of the merge/diverge points from each approach
        let delta = 0.25 * sector;

        // Ring arcs: for each approach j, one long arc from its merge point
        // to the next approach's diverge point, and one short arc across the
        // next approach's mouth.
        let long_arcs = (0..k)
            .map(|j| {
                let start = j as f64 * sector + delta;
                let arc = Arc2d::new(attribs.centre, r, start, sector - 2.0 * delta);
                layout.add_lane(&LaneAttributes {
                    curve: &arc,
                    kind: LaneKind::Interior,
                    max_velocity: attribs.max_ring_velocity,
                })
            })
            .collect::<Vec<_>>();
        let short_arcs = (0..k)
            .map(|j| {
                let start = (j + 1) as f64 * sector - delta;
                let arc = Arc2d::new(attribs.centre, r, start, 2.0 * delta);
                layout.add_lane(&LaneAttributes {
                    curve: &arc,
                    kind: LaneKind::Interior,
                    max_velocity: attribs.max_ring_velocity,
                })
            })
            .collect::<Vec<_>>();

        // Approach roads
        for j in 0..k {
            let merge = j as f64 * sector + delta;
            let diverge = j as f64 * sector - delta;

            let u = unit_vector(merge);
            let entry_end = attribs.centre + r * u;
            let entry_dir = (rot90(u) - u).normalize();
            let entry_line = LineSegment2d::from_ends(
                entry_end - attribs.approach_length * entry_dir,
                entry_end,
            );
            let entry = layout.add_lane(&LaneAttributes {
                curve: &entry_line,
                kind: LaneKind::Approach,
                max_velocity: attribs.max_approach_velocity,
            });

            let u = unit_vector(diverge);
            let exit_start = attribs.centre + r * u;
            let exit_dir = (rot90(u) + u).normalize();
            let exit_line = LineSegment2d::from_ends(
                exit_start,
                exit_start + attribs.approach_length * exit_dir,
            );
            let exit = layout.add_lane(&LaneAttributes {
                curve: &exit_line,
                kind: LaneKind::Departure,
                max_velocity: attribs.max_approach_velocity,
            });

            layout.approaches.push(ApproachRoad { entry, exit });
        }

        // Connectivity
        for j in 0..k {
            let next = (j + 1) % k;
            layout.add_lane_connection(layout.approaches[j].entry, long_arcs[j]);
            layout.add_lane_connection(long_arcs[j], short_arcs[j]);
            layout.add_lane_connection(long_arcs[j], layout.approaches[next].exit);
            layout.add_lane_connection(short_arcs[j], long_arcs[next]);
        }

        layout
    }

    /// Adds a lane to the network.
    pub fn add_lane(&mut self, attributes: &LaneAttributes) -> LaneId {
        self.lanes.insert_with_key(|id| Lane::new(id, attributes))
    }

    /// Specifies that the end of the `from` lane connects to the start of the `to` lane.
    pub fn add_lane_connection(&mut self, from: LaneId, to: LaneId) {
        self.lanes[from].add_lane_out(to);
        self.lanes[to].add_lane_in(from);
    }

    /// Gets a reference to the lane with the given ID.
    pub fn get_lane(&self, lane_id: LaneId) -> &Lane {
        &self.lanes[lane_id]
    }

    /// Returns an iterator over all the lanes in the layout.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    /// The centre of the intersection.
    pub fn centre(&self) -> Point2d {
        self.centre
    }

    /// The inner radius of the ring in m.
    pub fn minimal_radius(&self) -> f64 {
        self.minimal_radius
    }

    /// The outer radius of the ring in m.
    pub fn maximal_radius(&self) -> f64 {
        self.maximal_radius
    }

    /// The radius of the central island, if any.
    pub fn central_radius(&self) -> Option<f64> {
        self.central_radius
    }

    /// The entry/exit lane pairs of each approach road.
    pub fn approaches(&self) -> &[ApproachRoad] {
        &self.approaches
    }

    /// Finds the cheapest lane sequence from `from` to `to`, inclusive.
    pub fn route(&self, from: LaneId, to: LaneId) -> Option<Vec<LaneId>> {
        let result = pathfinding::directed::dijkstra::dijkstra(
            &from,
            |id| successors(*id, &self.lanes),
            |id| *id == to,
        );
        result.map(|(route, _)| route)
    }

    /// The entry/exit poses of each approach road where its lanes cross the
    /// outer rim, as consumed by the tiled area's extension cells.
    pub fn approach_poses(&self) -> Vec<Approach> {
        self.approaches
            .iter()
            .map(|road| {
                let entry = self.rim_crossing(&self.lanes[road.entry], true);
                let exit = self.rim_crossing(&self.lanes[road.exit], false);
                Approach {
                    entry_point: entry.pos,
                    entry_heading: entry.tan,
                    exit_point: exit.pos,
                    exit_heading: exit.tan,
                    width: self.lane_width,
                }
            })
            .collect()
    }

    /// Scans a lane for the point where it crosses the outer rim.
    fn rim_crossing(&self, lane: &Lane, entering: bool) -> LaneSample {
        let mut pos = 0.0;
        while pos <= lane.length() {
            let sample = lane.sample_centre(pos);
            let radius = (sample.pos - self.centre).magnitude();
            let crossed = if entering {
                radius <= self.maximal_radius
            } else {
                radius >= self.maximal_radius
            };
            if crossed {
                return sample;
            }
            pos += RIM_SCAN_STEP;
        }
        lane.end()
    }
}

fn successors(lane_id: LaneId, lanes: &LaneSet) -> impl Iterator<Item = (LaneId, usize)> + '_ {
    let lane = &lanes[lane_id];
    let cost = (10.0 * lane.length() / lane.max_velocity()) as usize;
    lane.lanes_out().iter().map(move |id| (*id, cost))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lane::LaneKind;

    fn layout() -> RoadLayout {
        RoadLayout::roundabout(&RoundaboutAttributes {
            centre: Point2d::new(0.0, 0.0),
            ring_radius: 12.0,
            lane_width: 4.0,
            approach_length: 25.0,
            num_approaches: 4,
            max_ring_velocity: 8.0,
            max_approach_velocity: 10.0,
        })
    }

    #[test]
    fn roundabout_has_expected_lanes() {
        let layout = layout();
        assert_eq!(layout.approaches().len(), 4);
        let interior = layout
            .iter_lanes()
            .filter(|l| l.kind() == LaneKind::Interior)
            .count();
        assert_eq!(interior, 8);
    }

    #[test]
    fn routes_exist_between_every_approach_pair() {
        let layout = layout();
        for i in 0..4 {
            for j in 0..4 {
                let from = layout.approaches()[i].entry;
                let to = layout.approaches()[j].exit;
                let route = layout.route(from, to).expect("route must exist");
                assert_eq!(route[0], from);
                assert_eq!(*route.last().unwrap(), to);
            }
        }
    }

    #[test]
    fn nearer_exits_have_shorter_routes() {
        let layout = layout();
        let from = layout.approaches()[0].entry;
        let near = layout.route(from, layout.approaches()[1].exit).unwrap();
        let far = layout.route(from, layout.approaches()[3].exit).unwrap();
        assert!(near.len() < far.len());
    }

    #[test]
    fn approach_poses_sit_on_the_rim() {
        let layout = layout();
        for approach in layout.approach_poses() {
            let r_entry = (approach.entry_point - layout.centre()).magnitude();
            let r_exit = (approach.exit_point - layout.centre()).magnitude();
            assert!((r_entry - layout.maximal_radius()).abs() < 1.0);
            assert!((r_exit - layout.maximal_radius()).abs() < 1.0);
        }
    }
}
