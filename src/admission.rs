use crate::debug::debug_commit;
use crate::footprint::VehicleEnvelope;
use crate::lane::LaneKind;
use crate::layout::RoadLayout;
use crate::ledger::{ReservationLedger, TimeGrid};
use crate::tile::TiledArea;
use crate::trial::{AccelerationProfile, CrossingQuery, Proposal, TrialConfig, TrialSimulator};
use crate::{LaneId, VehicleId};
pub use policy::{AdmissionPolicy, FcfsPolicy};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

mod policy;

/// Reasons the controller may refuse a crossing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RejectReason {
    /// Every proposal's arrival time had already passed.
    ArrivalTimeTooLate,
    /// Every proposal's arrival time lay beyond the reservation horizon.
    ArrivalTimeTooLarge,
    /// Every remaining proposal conflicted with existing reservations.
    NoClearPath,
    /// The vehicle already holds a confirmed reservation.
    ConfirmedAnotherRequest,
    /// The vehicle contacted the controller before it was allowed to.
    /// Reserved for rate-limiting policies.
    BeforeNextAllowedComm,
}

/// A message from a vehicle to the intersection controller.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VehicleMessage {
    /// Asks for permission to cross, offering alternatives in preference order.
    Request {
        owner: VehicleId,
        request_id: u64,
        proposals: Vec<Proposal>,
        envelope: VehicleEnvelope,
    },
    /// Gives up a confirmed reservation before using it.
    Cancel { owner: VehicleId, reservation_id: u64 },
    /// Announces that the vehicle has finished crossing.
    Done { owner: VehicleId, reservation_id: u64 },
    /// Announces that the vehicle has cleared the exit zone.
    Away { owner: VehicleId, reservation_id: u64 },
}

/// A message from the intersection controller to a vehicle.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ControllerMessage {
    /// Grants a crossing. The vehicle must arrive on the given lane at the
    /// given time and velocity (within the stated tolerances) and follow
    /// the acceleration profile.
    Confirm {
        request_id: u64,
        arrival_time: f64,
        early_error: f64,
        late_error: f64,
        arrival_velocity: f64,
        arrival_lane: LaneId,
        departure_lane: LaneId,
        max_exit_zone_size: f64,
        profile: AccelerationProfile,
    },
    /// Refuses a crossing.
    Reject {
        request_id: u64,
        reason: RejectReason,
        next_allowed_communication_time: f64,
    },
}

/// Bookkeeping for one confirmed reservation.
#[derive(Clone, Copy, Debug)]
struct ReservationRecord {
    owner: VehicleId,
    departure_lane: LaneId,
    reservation_id: u64,
}

/// Bounds how much vehicle length may be in flight past one departure lane.
struct ExitZone {
    /// Total vehicle length the zone can hold, in m.
    capacity: f64,
    /// The vehicles admitted to the zone and their lengths.
    admitted: HashMap<VehicleId, f64>,
}

impl ExitZone {
    fn new(capacity: f64) -> Self {
        Self {
            capacity,
            admitted: HashMap::new(),
        }
    }

    fn used(&self) -> f64 {
        self.admitted.values().sum()
    }

    /// Admits a vehicle if its length still fits, true on success.
    fn admit(&mut self, owner: VehicleId, length: f64) -> bool {
        if self.used() + length > self.capacity {
            return false;
        }
        self.admitted.insert(owner, length);
        true
    }

    fn release(&mut self, owner: VehicleId) {
        self.admitted.remove(&owner);
    }
}

/// The admission controller of a single intersection.
///
/// Owns the reservation ledger and the confirmed-reservation map; both are
/// mutated only from within [IntersectionManager::process_messages], which
/// the driver calls exactly once per simulation step.
pub struct IntersectionManager {
    layout: Rc<RoadLayout>,
    trial: TrialSimulator,
    ledger: ReservationLedger,
    policy: Box<dyn AdmissionPolicy>,
    /// At most one confirmed reservation per vehicle.
    confirmed: HashMap<VehicleId, ReservationRecord>,
    /// One exit zone per departure lane.
    exit_zones: HashMap<LaneId, ExitZone>,
    /// Messages awaiting the next processing step, in arrival order.
    inbox: Vec<VehicleMessage>,
    /// Replies produced by the last processing step.
    outbox: Vec<ControllerMessage>,
}

impl IntersectionManager {
    /// Creates the admission controller for an intersection.
    ///
    /// # Parameters
    /// * `layout` - The intersection's road context.
    /// * `area` - The intersection's tile set.
    /// * `grid` - The reservation time grid.
    /// * `config` - Trial simulation tuning.
    /// * `policy` - The proposal ordering/filtering policy.
    /// * `exit_zone_capacity` - Vehicle length each departure lane can hold, in m.
    pub fn new(
        layout: Rc<RoadLayout>,
        area: Rc<TiledArea>,
        grid: TimeGrid,
        config: TrialConfig,
        policy: Box<dyn AdmissionPolicy>,
        exit_zone_capacity: f64,
    ) -> Self {
        let exit_zones = layout
            .iter_lanes()
            .filter(|lane| lane.kind() == LaneKind::Departure)
            .map(|lane| (lane.id(), ExitZone::new(exit_zone_capacity)))
            .collect();
        Self {
            trial: TrialSimulator::new(layout.clone(), area, config),
            layout,
            ledger: ReservationLedger::new(grid),
            policy,
            confirmed: HashMap::new(),
            exit_zones,
            inbox: vec![],
            outbox: vec![],
        }
    }

    /// Queues an inbound message for the next processing step.
    pub fn post(&mut self, message: VehicleMessage) {
        self.inbox.push(message);
    }

    /// Takes the replies produced so far.
    pub fn drain_replies(&mut self) -> Vec<ControllerMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// The intersection's reservation ledger.
    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    /// Returns true if the vehicle currently holds a confirmed reservation.
    pub fn has_reservation(&self, owner: VehicleId) -> bool {
        self.confirmed.contains_key(&owner)
    }

    /// Processes every queued message in arrival order, then clears the inbox.
    pub(crate) fn process_messages(&mut self, now: f64) {
        let inbox = std::mem::take(&mut self.inbox);
        for message in inbox {
            match message {
                VehicleMessage::Request {
                    owner,
                    request_id,
                    proposals,
                    envelope,
                } => self.handle_request(now, owner, request_id, &proposals, &envelope),
                VehicleMessage::Cancel {
                    owner,
                    reservation_id,
                } => self.handle_cancel(owner, reservation_id),
                VehicleMessage::Done {
                    owner,
                    reservation_id,
                } => self.handle_done(owner, reservation_id),
                VehicleMessage::Away {
                    owner,
                    reservation_id,
                } => self.handle_away(owner, reservation_id),
            }
        }
    }

    /// Compacts the reservation ledger.
    pub(crate) fn compact(&mut self, current_step: u64) {
        self.ledger.compact(current_step);
    }

    fn handle_request(
        &mut self,
        now: f64,
        owner: VehicleId,
        request_id: u64,
        proposals: &[Proposal],
        envelope: &VehicleEnvelope,
    ) {
        if self.confirmed.contains_key(&owner) {
            self.reject(now, request_id, RejectReason::ConfirmedAnotherRequest);
            return;
        }

        let proposals = match self.policy.select(now, proposals) {
            Ok(proposals) => proposals,
            Err(reason) => {
                self.reject(now, request_id, reason);
                return;
            }
        };

        for proposal in &proposals {
            let Some(route) = self.layout.route(proposal.arrival_lane, proposal.departure_lane)
            else {
                log::debug!("no route between requested lanes; skipping proposal");
                continue;
            };
            let accelerating = proposal.max_turn_velocity > proposal.arrival_velocity;
            let query = CrossingQuery {
                owner,
                proposal: *proposal,
                accelerating,
                envelope: *envelope,
                route: &route,
            };
            let Some(plan) = self.trial.query(&self.ledger, &query) else {
                continue;
            };

            // Bound how much vehicle length may queue past the exit
            let zone = self
                .exit_zones
                .get_mut(&proposal.departure_lane)
                .expect("departure lane has no exit zone");
            if !zone.admit(owner, envelope.length) {
                log::trace!("exit zone full for proposal; trying next");
                continue;
            }
            let max_exit_zone_size = zone.capacity;

            // The trial has already verified every cell; a refusal here means
            // the single-writer invariant was broken.
            let reserved = self.ledger.reserve(owner, &plan.cells);
            assert!(
                reserved,
                "trial-validated plan failed to commit; ledger is inconsistent"
            );
            debug_commit(owner, &plan.cells);

            self.confirmed.insert(
                owner,
                ReservationRecord {
                    owner,
                    departure_lane: proposal.departure_lane,
                    reservation_id: request_id,
                },
            );

            let late_error = self.trial.config().time_buffer as f64 * self.ledger.grid().step_len();
            let early_error = f64::min(late_error, proposal.arrival_time - now);
            self.outbox.push(ControllerMessage::Confirm {
                request_id,
                arrival_time: proposal.arrival_time,
                early_error,
                late_error,
                arrival_velocity: proposal.arrival_velocity,
                arrival_lane: proposal.arrival_lane,
                departure_lane: proposal.departure_lane,
                max_exit_zone_size,
                profile: plan.profile,
            });
            return;
        }

        self.reject(now, request_id, RejectReason::NoClearPath);
    }

    fn handle_cancel(&mut self, owner: VehicleId, reservation_id: u64) {
        let record = self.confirmed.get(&owner).copied();
        match record {
            Some(record) if record.reservation_id == reservation_id => {
                debug_assert_eq!(record.owner, owner);
                self.ledger.cancel(owner);
                if let Some(zone) = self.exit_zones.get_mut(&record.departure_lane) {
                    zone.release(owner);
                }
                self.confirmed.remove(&owner);
            }
            _ => {
                // Duplicate or late delivery; expected, not escalated
                log::debug!("ignoring cancel for unknown reservation {}", reservation_id);
            }
        }
    }

    fn handle_done(&mut self, owner: VehicleId, reservation_id: u64) {
        let record = self.confirmed.get(&owner).copied();
        match record {
            Some(record) if record.reservation_id == reservation_id => {
                // No ledger action; the cells age out through compaction.
                // Exit-zone capacity is held until the vehicle reports Away.
                self.confirmed.remove(&owner);
            }
            _ => {
                log::debug!("ignoring done for unknown reservation {}", reservation_id);
            }
        }
    }

    fn handle_away(&mut self, owner: VehicleId, reservation_id: u64) {
        // The record may already be gone if Done arrived first, so the
        // exit zones are keyed by owner rather than looked up via it.
        for zone in self.exit_zones.values_mut() {
            zone.release(owner);
        }
        let record = self.confirmed.get(&owner).copied();
        match record {
            Some(record) if record.reservation_id == reservation_id => {
                self.confirmed.remove(&owner);
            }
            Some(_) => {
                log::debug!("ignoring away for unknown reservation {}", reservation_id);
            }
            None => {}
        }
    }

    fn reject(&mut self, now: f64, request_id: u64, reason: RejectReason) {
        self.outbox.push(ControllerMessage::Reject {
            request_id,
            reason,
            next_allowed_communication_time: now,
        });
    }
}
