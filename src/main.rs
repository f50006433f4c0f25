use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use rand::prelude::*;
use rand_distr::Normal;
use roundabout_sim::{
    ControllerMessage, FcfsPolicy, IntersectionManager, KeyData, Proposal, RoadLayout,
    RoundaboutAttributes, Simulation, TiledArea, TimeGrid, TrialConfig, VehicleEnvelope,
    VehicleId, VehicleMessage,
};

const NUM_STEPS: u64 = 36_000; // one hour at 0.1s steps

fn main() {
    let grid = TimeGrid::new(0.1);
    let layout = Rc::new(RoadLayout::roundabout(&RoundaboutAttributes {
        centre: roundabout_sim::cgmath::Point2::new(0.0, 0.0),
        ring_radius: 12.0,
        lane_width: 4.0,
        approach_length: 30.0,
        num_approaches: 4,
        max_ring_velocity: 8.0,
        max_approach_velocity: 12.0,
    }));
    let area = Rc::new(TiledArea::build(
        layout.centre(),
        layout.minimal_radius(),
        layout.maximal_radius(),
        layout.central_radius(),
        24,
        &layout.approach_poses(),
    ));
    let manager = IntersectionManager::new(
        layout.clone(),
        area,
        grid,
        TrialConfig::default(),
        Box::new(FcfsPolicy::default()),
        30.0,
    );
    let mut sim = Simulation::new(grid);
    let intersection = sim.add_intersection(manager);

    let envelope = VehicleEnvelope {
        length: 4.5,
        width: 2.0,
        max_acceleration: 2.5,
        max_deceleration: 4.0,
    };

    let mut rng = rand::thread_rng();
    let arrival_jitter = Normal::new(4.0f64, 1.5).unwrap();

    let mut next_id = 1u64;
    let mut requested: HashMap<u64, VehicleId> = HashMap::new();
    let mut crossing: Vec<(u64, VehicleId, u64)> = vec![];
    let (mut confirmed, mut rejected) = (0usize, 0usize);

    println!("Simulating...");
    let start = Instant::now();
    for _ in 0..NUM_STEPS {
        // A fresh vehicle tries its luck every second
        if sim.step_index() % 10 == 0 {
            let owner = VehicleId::from(KeyData::from_ffi(next_id));
            let request_id = next_id;
            next_id += 1;

            let from = rng.gen_range(0..4);
            let to = rng.gen_range(0..4);
            let arrival_time =
                sim.time() + arrival_jitter.sample(&mut rng).clamp(1.0, 9.0);
            let proposals = vec![Proposal {
                arrival_lane: layout.approaches()[from].entry,
                departure_lane: layout.approaches()[to].exit,
                arrival_time,
                arrival_velocity: 8.0,
                max_turn_velocity: 8.0,
            }];
            requested.insert(request_id, owner);
            sim.post(
                intersection,
                VehicleMessage::Request {
                    owner,
                    request_id,
                    proposals,
                    envelope,
                },
            );
        }

        sim.step();

        for reply in sim.drain_replies(intersection) {
            match reply {
                ControllerMessage::Confirm {
                    request_id,
                    arrival_time,
                    profile,
                    ..
                } => {
                    confirmed += 1;
                    let owner = requested.remove(&request_id).unwrap();
                    let exit_step = grid.to_step(arrival_time + profile.duration());
                    crossing.push((exit_step + 5, owner, request_id));
                }
                ControllerMessage::Reject { request_id, .. } => {
                    rejected += 1;
                    requested.remove(&request_id);
                }
            }
        }

        // Vehicles that have crossed report back
        let now = sim.step_index();
        crossing.retain(|(exit_step, owner, reservation_id)| {
            if *exit_step <= now {
                sim.post(
                    intersection,
                    VehicleMessage::Done {
                        owner: *owner,
                        reservation_id: *reservation_id,
                    },
                );
                sim.post(
                    intersection,
                    VehicleMessage::Away {
                        owner: *owner,
                        reservation_id: *reservation_id,
                    },
                );
                false
            } else {
                true
            }
        });

        if sim.step_index() % 6_000 == 0 {
            println!(
                "t={:.0}s: {} confirmed, {} rejected, {} cells reserved",
                sim.time(),
                confirmed,
                rejected,
                sim.get_intersection(intersection).ledger().len(),
            );
        }
    }

    let elapsed = start.elapsed();
    println!(
        "Simulated {:.0}s of traffic in {:?} --> {:.0}x speedup ({} confirmed, {} rejected)",
        sim.time(),
        elapsed,
        sim.time() / elapsed.as_secs_f64(),
        confirmed,
        rejected,
    );
}
