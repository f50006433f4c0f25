pub use admission::{
    AdmissionPolicy, ControllerMessage, FcfsPolicy, IntersectionManager, RejectReason,
    VehicleMessage,
};
pub use cgmath;
pub use footprint::{Footprint, VehicleEnvelope};
pub use lane::{Lane, LaneAttributes, LaneKind, LaneSample};
pub use layout::{ApproachRoad, RoadLayout, RoundaboutAttributes};
pub use ledger::{ReservationLedger, TimeGrid};
pub use simulation::Simulation;
pub use slotmap::{Key, KeyData};
use slotmap::{new_key_type, SlotMap};
pub use tile::{Approach, Tile, TileId, TiledArea};
pub use trial::{AccelerationProfile, CrossingQuery, Plan, Proposal, TrialConfig, TrialSimulator};
pub use util::Interval;

mod admission;
mod debug;
mod footprint;
mod lane;
mod layout;
mod ledger;
pub mod math;
mod replica;
mod simulation;
mod tile;
mod trial;
mod util;

new_key_type! {
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a vehicle, assigned by the driving agent.
    pub struct VehicleId;
    /// Unique ID of an intersection within a [Simulation].
    pub struct IntersectionId;
}

type LaneSet = SlotMap<LaneId, Lane>;
