use crate::footprint::VehicleEnvelope;
use crate::layout::RoadLayout;
use crate::ledger::{ReservationLedger, CLEANUP_MARGIN_STEPS};
use crate::replica::Replica;
use crate::tile::{TileId, TiledArea};
use crate::{LaneId, VehicleId};
use arrayvec::ArrayVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::rc::Rc;

/// One candidate crossing a vehicle offers: where and when it would arrive,
/// and where it wants to leave.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Proposal {
    /// The lane on which the vehicle arrives at the intersection.
    pub arrival_lane: LaneId,
    /// The lane on which the vehicle wants to leave.
    pub departure_lane: LaneId,
    /// The time at which the vehicle reaches the arrival lane's entry point.
    pub arrival_time: f64,
    /// The vehicle's velocity at arrival in m/s.
    pub arrival_velocity: f64,
    /// The maximum velocity the vehicle can sustain while turning, in m/s.
    pub max_turn_velocity: f64,
}

/// Inputs to one trial simulation.
pub struct CrossingQuery<'a> {
    /// The requesting vehicle.
    pub owner: VehicleId,
    /// The proposal under trial.
    pub proposal: Proposal,
    /// Whether the vehicle may accelerate while crossing.
    pub accelerating: bool,
    /// The vehicle's physical envelope.
    pub envelope: VehicleEnvelope,
    /// The lane sequence from arrival to departure lane.
    pub route: &'a [LaneId],
}

/// The verified outcome of a successful trial simulation: which cells at
/// which steps the crossing consumes, and the schedule that achieves it.
#[derive(Clone, Debug)]
pub struct Plan {
    /// The vehicle the plan belongs to.
    pub owner: VehicleId,
    /// The time at which the vehicle has fully left the intersection.
    pub exit_time: f64,
    /// The vehicle's velocity at exit in m/s.
    pub exit_velocity: f64,
    /// Every (tile, step) cell the crossing occupies, deduplicated,
    /// in discovery order.
    pub cells: Vec<(TileId, u64)>,
    /// The acceleration schedule from arrival to exit.
    pub profile: AccelerationProfile,
}

/// An acceleration schedule: up to two (acceleration, duration) segments
/// whose durations sum to the traversal time.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AccelerationProfile {
    segments: ArrayVec<(f64, f64), 2>,
}

impl AccelerationProfile {
    /// Derives the schedule for a crossing analytically.
    ///
    /// When accelerating towards a higher turn velocity, the vehicle holds
    /// maximum acceleration until it reaches that velocity (or runs out of
    /// time), then cruises; otherwise it cruises the whole way.
    pub(crate) fn derive(
        arrival_velocity: f64,
        max_turn_velocity: f64,
        max_acceleration: f64,
        traversal_time: f64,
        accelerating: bool,
    ) -> Self {
        assert!(
            traversal_time > 0.0,
            "crossing traversal time must be positive"
        );
        let mut segments = ArrayVec::new();
        if accelerating && max_turn_velocity > arrival_velocity && max_acceleration > 0.0 {
            let ramp = f64::min(
                traversal_time,
                (max_turn_velocity - arrival_velocity) / max_acceleration,
            );
            segments.push((max_acceleration, ramp));
            let remainder = traversal_time - ramp;
            if remainder > 0.0 {
                segments.push((0.0, remainder));
            }
        } else {
            segments.push((0.0, traversal_time));
        }
        Self { segments }
    }

    /// The (acceleration, duration) segments of the schedule.
    pub fn segments(&self) -> &[(f64, f64)] {
        &self.segments
    }

    /// The total duration of the schedule in seconds.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|(_, d)| d).sum()
    }
}

/// Tuning parameters of the trial simulation.
#[derive(Clone, Copy, Debug)]
pub struct TrialConfig {
    /// Static safety margin added around the replica's footprint, in m.
    pub safety_buffer: f64,
    /// Number of steps either side of the current step over which each
    /// overlapped cell must be free.
    pub time_buffer: u64,
    /// Distance ahead on the lane at which the replica aims when steering, in m.
    pub lead_distance: f64,
    /// The replica switches lanes within this distance of a lane's end, in m.
    pub lane_end_epsilon: f64,
    /// Upper bound on replica steps before the trial is declared broken.
    pub max_steps: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            safety_buffer: 0.5,
            time_buffer: 2,
            lead_distance: 3.0,
            lane_end_epsilon: 0.3,
            max_steps: 5_000,
        }
    }
}

/// Discovers the space-time cells a proposed crossing would occupy by
/// driving a disposable replica of the vehicle along its route, one step
/// at a time, against the current reservation ledger. Read-only with
/// respect to the ledger.
pub struct TrialSimulator {
    layout: Rc<RoadLayout>,
    area: Rc<TiledArea>,
    config: TrialConfig,
}

impl TrialSimulator {
    /// Creates a trial simulator over the given road and tile geometry.
    pub fn new(layout: Rc<RoadLayout>, area: Rc<TiledArea>, config: TrialConfig) -> Self {
        assert!(
            config.time_buffer < CLEANUP_MARGIN_STEPS,
            "conflict-check buffer must fit within the ledger's cleanup margin"
        );
        Self {
            layout,
            area,
            config,
        }
    }

    /// The simulator's tuning parameters.
    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Runs one trial simulation.
    ///
    /// Returns the full plan the crossing would consume, or `None` as soon
    /// as any required cell is already owned by another vehicle. Never
    /// writes to the ledger.
    pub fn query(&self, ledger: &ReservationLedger, q: &CrossingQuery) -> Option<Plan> {
        let grid = ledger.grid();
        let dt = grid.step_len();
        let mut replica = Replica::new(
            &self.layout,
            q.route,
            q.envelope,
            q.proposal.arrival_velocity,
            self.config.lead_distance,
            self.config.lane_end_epsilon,
        );

        let mut time = q.proposal.arrival_time;
        let mut cells: Vec<(TileId, u64)> = vec![];
        let mut seen: HashSet<(TileId, u64)> = HashSet::new();
        let mut entered = false;

        for _ in 0..self.config.max_steps {
            replica.step(dt, q.accelerating, q.proposal.max_turn_velocity);
            time += dt;

            let footprint = replica.footprint().inflate(self.config.safety_buffer);
            let overlapped = self.area.tiles_overlapping(&footprint);

            if overlapped.is_empty() {
                if !entered {
                    // Still on the approach; no cell checks yet
                    continue;
                }
                // The replica has fully left the intersection
                let exit_time = time;
                let traversal = exit_time - q.proposal.arrival_time;
                let profile = AccelerationProfile::derive(
                    q.proposal.arrival_velocity,
                    q.proposal.max_turn_velocity,
                    q.envelope.max_acceleration,
                    traversal,
                    q.accelerating,
                );
                return Some(Plan {
                    owner: q.owner,
                    exit_time,
                    exit_velocity: replica.vel(),
                    cells,
                    profile,
                });
            }

            entered = true;
            let step = grid.to_step(time);
            let window = step.saturating_sub(self.config.time_buffer)..=step + self.config.time_buffer;
            for tile in overlapped {
                for t in window.clone() {
                    if ledger.reserved_by(tile, t).map_or(false, |o| o != q.owner) {
                        // First conflict fails the whole proposal
                        return None;
                    }
                    if seen.insert((tile, t)) {
                        cells.push((tile, t));
                    }
                }
            }
        }

        log::error!(
            "trial replica failed to leave the intersection within {} steps",
            self.config.max_steps
        );
        panic!("trial simulation did not terminate");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn profile_durations_sum_to_traversal_time() {
        let profile = AccelerationProfile::derive(6.0, 9.0, 2.0, 10.0, true);
        assert_eq!(profile.segments().len(), 2);
        assert_approx_eq!(profile.duration(), 10.0, 1e-9);
        assert_approx_eq!(profile.segments()[0].0, 2.0);
        assert_approx_eq!(profile.segments()[0].1, 1.5);
        assert_approx_eq!(profile.segments()[1].1, 8.5);
    }

    #[test]
    fn slow_crossing_is_a_single_ramp() {
        // The whole traversal is spent accelerating
        let profile = AccelerationProfile::derive(1.0, 20.0, 1.0, 5.0, true);
        assert_eq!(profile.segments().len(), 1);
        assert_approx_eq!(profile.duration(), 5.0, 1e-9);
        assert_approx_eq!(profile.segments()[0].0, 1.0);
    }

    #[test]
    fn coasting_crossing_is_a_single_segment() {
        let profile = AccelerationProfile::derive(8.0, 8.0, 2.0, 7.25, false);
        assert_eq!(profile.segments().len(), 1);
        assert_approx_eq!(profile.segments()[0].0, 0.0);
        assert_approx_eq!(profile.duration(), 7.25, 1e-9);
    }

    #[test]
    #[should_panic]
    fn non_positive_traversal_is_a_defect() {
        AccelerationProfile::derive(8.0, 8.0, 2.0, 0.0, false);
    }
}
