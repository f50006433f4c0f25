use crate::tile::TileId;
use crate::VehicleId;
use std::collections::{HashMap, HashSet};

/// Entries whose step is this far behind the compaction step are dropped.
/// Must exceed the trial simulation's conflict-check time buffer so that
/// no live reservation's buffered window is ever compacted away.
pub(crate) const CLEANUP_MARGIN_STEPS: u64 = 8;

/// Converts between continuous time in seconds and discrete ledger steps.
#[derive(Clone, Copy, Debug)]
pub struct TimeGrid {
    step_len: f64,
}

impl TimeGrid {
    /// Creates a time grid with the given step duration in seconds.
    pub fn new(step_len: f64) -> Self {
        assert!(step_len > 0.0, "time grid step must be positive");
        Self { step_len }
    }

    /// The duration of one discrete step in seconds.
    pub fn step_len(&self) -> f64 {
        self.step_len
    }

    /// The discrete step containing the given time.
    pub fn to_step(&self, time: f64) -> u64 {
        f64::max(time / self.step_len, 0.0) as u64
    }

    /// The start time of the given step.
    pub fn to_time(&self, step: u64) -> f64 {
        step as f64 * self.step_len
    }

    /// How far the given time lies past the start of its step.
    pub fn remainder(&self, time: f64) -> f64 {
        time - self.to_time(self.to_step(time))
    }
}

/// The reservation table of one intersection: a sparse map from
/// (tile, step) to the vehicle that owns that patch of space-time.
/// Enforces mutual exclusion; at most one owner per cell.
pub struct ReservationLedger {
    grid: TimeGrid,
    entries: HashMap<(TileId, u64), VehicleId>,
}

impl ReservationLedger {
    /// Creates an empty ledger over the given time grid.
    pub fn new(grid: TimeGrid) -> Self {
        Self {
            grid,
            entries: HashMap::new(),
        }
    }

    /// The ledger's time grid.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Atomically reserves every listed cell for `owner`.
    ///
    /// Either all cells are currently unowned and every one becomes owned
    /// by `owner`, or the ledger is left unchanged and `false` is returned.
    pub fn reserve(&mut self, owner: VehicleId, cells: &[(TileId, u64)]) -> bool {
        let conflict = cells
            .iter()
            .any(|cell| self.entries.get(cell).map_or(false, |o| *o != owner));
        if conflict {
            return false;
        }
        for cell in cells {
            self.entries.insert(*cell, owner);
        }
        true
    }

    /// Removes every entry owned by `owner`. Idempotent; unknown owners are a no-op.
    pub fn cancel(&mut self, owner: VehicleId) {
        self.entries.retain(|_, o| *o != owner);
    }

    /// Returns true if the cell is owned by any vehicle.
    pub fn is_reserved(&self, tile: TileId, step: u64) -> bool {
        self.entries.contains_key(&(tile, step))
    }

    /// The owner of the cell, if any.
    pub fn reserved_by(&self, tile: TileId, step: u64) -> Option<VehicleId> {
        self.entries.get(&(tile, step)).copied()
    }

    /// The tiles reserved at the given step.
    pub fn reserved_tiles_at(&self, step: u64) -> HashSet<TileId> {
        self.entries
            .keys()
            .filter(|(_, s)| *s == step)
            .map(|(tile, _)| *tile)
            .collect()
    }

    /// The vehicles holding a reservation at the given step.
    pub fn owners_at(&self, step: u64) -> HashSet<VehicleId> {
        self.entries
            .iter()
            .filter(|((_, s), _)| *s == step)
            .map(|(_, owner)| *owner)
            .collect()
    }

    /// Drops entries far enough in the past that they can no longer be
    /// queried. Never drops an entry within the buffered window of a
    /// still-live reservation.
    pub fn compact(&mut self, current_step: u64) {
        let horizon = current_step.saturating_sub(CLEANUP_MARGIN_STEPS);
        let before = self.entries.len();
        self.entries.retain(|(_, step), _| *step >= horizon);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::trace!("compacted {} reservation entries before step {}", dropped, horizon);
        }
    }

    /// The number of reserved cells.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no cell is reserved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use slotmap::KeyData;

    fn veh(id: u64) -> VehicleId {
        VehicleId::from(KeyData::from_ffi(id))
    }

    fn ledger() -> ReservationLedger {
        ReservationLedger::new(TimeGrid::new(0.1))
    }

    #[test]
    fn time_conversions() {
        let grid = TimeGrid::new(0.25);
        assert_eq!(grid.to_step(1.0), 4);
        assert_eq!(grid.to_step(1.1), 4);
        assert_eq!(grid.to_step(0.0), 0);
        assert_approx_eq!(grid.to_time(4), 1.0);
        assert_approx_eq!(grid.remainder(1.1), 0.1);
    }

    #[test]
    fn reserve_is_atomic() {
        let mut ledger = ledger();
        assert!(ledger.reserve(veh(1), &[(0, 10), (1, 10), (1, 11)]));
        // A batch with any conflicting cell changes nothing
        assert!(!ledger.reserve(veh(2), &[(5, 10), (1, 11)]));
        assert!(!ledger.is_reserved(5, 10));
        assert_eq!(ledger.reserved_by(1, 11), Some(veh(1)));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn mutual_exclusion_holds_across_owners() {
        let mut ledger = ledger();
        assert!(ledger.reserve(veh(1), &[(3, 7)]));
        assert!(!ledger.reserve(veh(2), &[(3, 7)]));
        assert!(ledger.reserve(veh(2), &[(3, 8)]));
        assert_eq!(ledger.owners_at(7), [veh(1)].into_iter().collect());
        assert_eq!(ledger.owners_at(8), [veh(2)].into_iter().collect());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut ledger = ledger();
        ledger.reserve(veh(1), &[(0, 1), (1, 2)]);
        ledger.reserve(veh(2), &[(2, 3)]);
        ledger.cancel(veh(1));
        assert_eq!(ledger.len(), 1);
        ledger.cancel(veh(1));
        assert_eq!(ledger.len(), 1);
        // Unknown owner is a no-op
        ledger.cancel(veh(99));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_reserved(2, 3));
    }

    #[test]
    fn compaction_drops_only_the_past() {
        let mut ledger = ledger();
        ledger.reserve(veh(1), &[(0, 5), (0, 40), (0, 100)]);
        ledger.compact(30);
        assert!(!ledger.is_reserved(0, 5));
        assert!(ledger.is_reserved(0, 40));
        assert!(ledger.is_reserved(0, 100));
        // Entries within the margin behind the current step survive
        ledger.reserve(veh(2), &[(1, 26)]);
        ledger.compact(30);
        assert!(ledger.is_reserved(1, 26));
    }

    #[test]
    fn reserved_tiles_at_a_step() {
        let mut ledger = ledger();
        ledger.reserve(veh(1), &[(4, 9), (6, 9), (6, 10)]);
        let tiles = ledger.reserved_tiles_at(9);
        assert_eq!(tiles, [4, 6].into_iter().collect());
    }
}
