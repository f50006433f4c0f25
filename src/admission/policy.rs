use super::RejectReason;
use crate::trial::Proposal;

/// Chooses the order in which a request's proposals are attempted and
/// applies the admission time-window rules. This is the only place those
/// choices are made; swapping the policy never touches the ledger or the
/// trial simulation.
pub trait AdmissionPolicy {
    /// Filters and orders a request's proposals.
    ///
    /// Returns the proposals worth trialling, in the order to try them,
    /// or the reason to reject the request when none survive.
    fn select(&mut self, now: f64, proposals: &[Proposal])
        -> Result<Vec<Proposal>, RejectReason>;
}

/// First-come-first-served admission: requests are served strictly in
/// arrival order and proposals are kept in the vehicle's preference order.
pub struct FcfsPolicy {
    /// How far into the future a reservation may be made, in seconds.
    horizon: f64,
}

impl FcfsPolicy {
    /// Creates an FCFS policy with the given reservation horizon in seconds.
    pub fn new(horizon: f64) -> Self {
        Self { horizon }
    }
}

impl Default for FcfsPolicy {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl AdmissionPolicy for FcfsPolicy {
    fn select(
        &mut self,
        now: f64,
        proposals: &[Proposal],
    ) -> Result<Vec<Proposal>, RejectReason> {
        let timely = proposals
            .iter()
            .filter(|p| p.arrival_time > now)
            .copied()
            .collect::<Vec<_>>();
        if timely.is_empty() {
            return Err(RejectReason::ArrivalTimeTooLate);
        }

        let within_horizon = timely
            .into_iter()
            .filter(|p| p.arrival_time <= now + self.horizon)
            .collect::<Vec<_>>();
        if within_horizon.is_empty() {
            return Err(RejectReason::ArrivalTimeTooLarge);
        }

        Ok(within_horizon)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::LaneId;
    use slotmap::Key;

    fn proposal(arrival_time: f64) -> Proposal {
        Proposal {
            arrival_lane: LaneId::null(),
            departure_lane: LaneId::null(),
            arrival_time,
            arrival_velocity: 8.0,
            max_turn_velocity: 8.0,
        }
    }

    #[test]
    fn past_arrivals_are_too_late() {
        let mut policy = FcfsPolicy::new(10.0);
        let result = policy.select(5.0, &[proposal(5.0), proposal(4.0)]);
        assert_eq!(result.unwrap_err(), RejectReason::ArrivalTimeTooLate);
    }

    #[test]
    fn distant_arrivals_are_too_large() {
        let mut policy = FcfsPolicy::new(10.0);
        let result = policy.select(5.0, &[proposal(16.0), proposal(20.0)]);
        assert_eq!(result.unwrap_err(), RejectReason::ArrivalTimeTooLarge);
    }

    #[test]
    fn survivors_keep_their_preference_order() {
        let mut policy = FcfsPolicy::new(10.0);
        let kept = policy
            .select(5.0, &[proposal(4.0), proposal(9.0), proposal(7.0), proposal(16.0)])
            .unwrap();
        let times = kept.iter().map(|p| p.arrival_time).collect::<Vec<_>>();
        assert_eq!(times, vec![9.0, 7.0]);
    }
}
