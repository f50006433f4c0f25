use crate::admission::{ControllerMessage, IntersectionManager, VehicleMessage};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::ledger::TimeGrid;
use crate::IntersectionId;
use slotmap::SlotMap;

/// Number of discrete steps between reservation ledger compactions.
const COMPACTION_PERIOD_STEPS: u64 = 30;

/// The step driver for a set of independent intersections.
///
/// Advances simulated time in fixed increments; once per increment every
/// intersection's queued messages are delivered and processed synchronously,
/// ledgers are compacted on a fixed period, and time moves on. Everything
/// runs on the calling thread.
pub struct Simulation {
    /// The intersections being simulated.
    intersections: SlotMap<IntersectionId, IntersectionManager>,
    /// The discrete time grid shared by every intersection.
    grid: TimeGrid,
    /// The current step of simulation.
    step: u64,
    /// Debugging information from the previously simulated step.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation over the given time grid.
    pub fn new(grid: TimeGrid) -> Self {
        Self {
            intersections: SlotMap::default(),
            grid,
            step: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Adds an intersection to the simulation.
    pub fn add_intersection(&mut self, manager: IntersectionManager) -> IntersectionId {
        self.intersections.insert(manager)
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn get_intersection(&self, id: IntersectionId) -> &IntersectionManager {
        &self.intersections[id]
    }

    /// Queues a vehicle message for an intersection's next processing step.
    pub fn post(&mut self, id: IntersectionId, message: VehicleMessage) {
        self.intersections[id].post(message);
    }

    /// Takes the replies an intersection has produced so far.
    pub fn drain_replies(&mut self, id: IntersectionId) -> Vec<ControllerMessage> {
        self.intersections[id].drain_replies()
    }

    /// The simulation's time grid.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// The current simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.grid.to_time(self.step)
    }

    /// Gets the current simulation step index.
    pub fn step_index(&self) -> u64 {
        self.step
    }

    /// Advances the simulation by one discrete time step.
    pub fn step(&mut self) {
        let now = self.time();

        for (_, manager) in &mut self.intersections {
            manager.process_messages(now);
        }

        if self.step % COMPACTION_PERIOD_STEPS == 0 {
            for (_, manager) in &mut self.intersections {
                manager.compact(self.step);
            }
        }

        self.step += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the debugging information for the previously simulated step as a JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}
