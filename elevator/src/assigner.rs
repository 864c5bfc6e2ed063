/// ----- HALL ASSIGNER -----
/// Deterministic in-process replacement for the course's external
/// hall_request_assigner executable. The cost of giving a request to a
/// node is its simulated time to idle: the request logic is replayed with
/// a fixed charge per floor traversed and a larger one per stop, so
/// detours, extra stops and direction reversals all price themselves in.
/// Identical input yields identical output on every node.

use std::collections::HashMap;

use shared_resources::behaviour::Behaviour;
use shared_resources::call::Call;
use shared_resources::config::ClearingPolicy;
use shared_resources::direction::Direction;
use shared_resources::node_id;

use crate::elevator::Elevator;
use crate::requests;

const TRAVEL_TIME: u32 = 10;
const DOOR_OPEN_TIME: u32 = 30;

/// One candidate node as the master sees it from its last snapshot.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub behaviour: Behaviour,
    pub floor: u8,
    pub direction: Direction,
    pub cab_requests: Vec<bool>,
}

/// Assign every active hall request to exactly one of the given nodes.
/// Requests are placed one at a time in (floor, call) order, each going to
/// the node whose simulated workload grows the least; ties break to the
/// smaller id. Returns an empty map when there are no candidates, in which
/// case the caller keeps its previous assignment.
pub fn assign(
    hall_requests: &[[bool; 2]],
    states: &HashMap<String, NodeState>,
    num_floors: u8,
) -> HashMap<String, Vec<Vec<bool>>> {
    if states.is_empty() {
        return HashMap::new();
    }

    let mut ids: Vec<&String> = states.keys().collect();
    ids.sort_by(|a, b| node_id::cmp(a, b));

    let mut sims: HashMap<&String, Elevator> = ids
        .iter()
        .map(|id| (*id, simulated_elevator(&states[*id], num_floors)))
        .collect();
    let mut output: HashMap<String, Vec<Vec<bool>>> = ids
        .iter()
        .map(|id| {
            (
                (*id).clone(),
                vec![vec![false; Call::num_hall_calls() as usize]; num_floors as usize],
            )
        })
        .collect();

    for floor in 0..num_floors {
        for call in Call::iter_hall() {
            if !hall_requests[floor as usize][call as usize] {
                continue;
            }
            let best = ids
                .iter()
                .min_by_key(|id| {
                    let mut sim = sims[*id].clone();
                    sim.set_request(floor, call, true);
                    time_to_idle(sim)
                })
                .unwrap();
            sims.get_mut(best).unwrap().set_request(floor, call, true);
            output.get_mut(*best).unwrap()[floor as usize][call as usize] = true;
        }
    }
    output
}

fn simulated_elevator(state: &NodeState, num_floors: u8) -> Elevator {
    let mut e = Elevator::new(num_floors);
    e.floor = state.floor;
    e.direction = state.direction;
    e.behaviour = state.behaviour;
    for floor in 0..num_floors {
        if state.cab_requests.get(floor as usize).copied().unwrap_or(false) {
            e.set_request(floor, Call::Cab, true);
        }
    }
    e
}

fn step(e: &mut Elevator) {
    match e.direction {
        Direction::Up if e.floor + 1 < e.num_floors => e.floor += 1,
        Direction::Down if e.floor > 0 => e.floor -= 1,
        _ => {}
    }
}

/// Simulated time until the elevator has drained its request matrix.
fn time_to_idle(mut e: Elevator) -> u32 {
    let mut duration = 0;

    match e.behaviour {
        Behaviour::Idle => {
            let pair = requests::choose_direction(&e);
            e.direction = pair.direction;
            if pair.behaviour == Behaviour::Idle {
                return duration;
            }
        }
        Behaviour::Moving => {
            duration += TRAVEL_TIME / 2;
            step(&mut e);
        }
        Behaviour::DoorOpen => {
            duration += DOOR_OPEN_TIME / 2;
        }
    }

    // Every stop clears at least one request, so the simulation is bounded;
    // the step cap only guards against an inconsistent snapshot.
    let max_steps = 8 * e.num_floors as u32 + 8;
    for _ in 0..max_steps {
        if requests::should_stop(&e) {
            if requests::requests_here(&e) {
                requests::clear_at_current_floor(&mut e, ClearingPolicy::InDirection);
                duration += DOOR_OPEN_TIME;
            }
            let pair = requests::choose_direction(&e);
            e.direction = pair.direction;
            match pair.behaviour {
                Behaviour::Idle => return duration,
                Behaviour::DoorOpen => continue,
                Behaviour::Moving => {}
            }
        }
        step(&mut e);
        duration += TRAVEL_TIME;
    }
    duration
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(floor: u8) -> NodeState {
        NodeState {
            behaviour: Behaviour::Idle,
            floor,
            direction: Direction::Stop,
            cab_requests: vec![false; 4],
        }
    }

    fn no_requests() -> Vec<[bool; 2]> {
        vec![[false, false]; 4]
    }

    fn states(entries: Vec<(&str, NodeState)>) -> HashMap<String, NodeState> {
        entries.into_iter().map(|(id, s)| (id.to_string(), s)).collect()
    }

    fn assigned_to(output: &HashMap<String, Vec<Vec<bool>>>, floor: u8, call: Call) -> Vec<String> {
        output
            .iter()
            .filter(|(_, matrix)| matrix[floor as usize][call as usize])
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[test]
    fn every_request_gets_exactly_one_owner() {
        let mut hall = no_requests();
        hall[0][1] = true;
        hall[2][0] = true;
        hall[3][1] = true;
        let output = assign(&hall, &states(vec![("1", idle(0)), ("2", idle(3))]), 4);

        for floor in 0..4 {
            for call in Call::iter_hall() {
                let owners = assigned_to(&output, floor, call);
                let expected = usize::from(hall[floor as usize][call as usize]);
                assert_eq!(owners.len(), expected, "floor {} {:?}", floor, call);
            }
        }
    }

    #[test]
    fn closest_idle_elevator_wins() {
        let mut hall = no_requests();
        hall[1][0] = true;
        let output = assign(&hall, &states(vec![("1", idle(3)), ("2", idle(1))]), 4);
        assert_eq!(assigned_to(&output, 1, Call::HallUp), vec![String::from("2")]);
    }

    #[test]
    fn busy_elevator_loses_to_an_idle_one() {
        let mut busy = idle(0);
        busy.behaviour = Behaviour::Moving;
        busy.direction = Direction::Up;
        busy.cab_requests = vec![false, false, false, true];

        let mut hall = no_requests();
        hall[1][1] = true;
        let output = assign(&hall, &states(vec![("1", busy), ("2", idle(1))]), 4);
        assert_eq!(assigned_to(&output, 1, Call::HallDown), vec![String::from("2")]);
    }

    #[test]
    fn ties_break_to_the_smaller_id() {
        let mut hall = no_requests();
        hall[2][0] = true;
        let output = assign(&hall, &states(vec![("7", idle(1)), ("3", idle(1))]), 4);
        assert_eq!(assigned_to(&output, 2, Call::HallUp), vec![String::from("3")]);
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let mut hall = no_requests();
        hall[0][0] = true;
        hall[3][1] = true;
        let input = states(vec![("1", idle(2)), ("2", idle(0)), ("3", idle(3))]);
        let first = assign(&hall, &input, 4);
        let second = assign(&hall, &input, 4);
        assert_eq!(first, second);
    }

    #[test]
    fn no_candidates_yields_no_assignment() {
        let mut hall = no_requests();
        hall[1][0] = true;
        assert!(assign(&hall, &HashMap::new(), 4).is_empty());
    }

    #[test]
    fn requests_spread_over_the_bank() {
        // Two far-apart calls with two idle elevators should not pile onto
        // one cabin.
        let mut hall = no_requests();
        hall[0][0] = true;
        hall[3][1] = true;
        let output = assign(&hall, &states(vec![("1", idle(0)), ("2", idle(3))]), 4);
        assert_eq!(assigned_to(&output, 0, Call::HallUp), vec![String::from("1")]);
        assert_eq!(assigned_to(&output, 3, Call::HallDown), vec![String::from("2")]);
    }
}
