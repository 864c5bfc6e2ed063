/// ----- REQUEST LOGIC -----
/// Pure functions over the local elevator state: where to go next, whether
/// to stop at the floor just reached, and which requests a stop serves.
/// Everything here is free of side effects so the FSM and the hall
/// assigner can share it.

use shared_resources::behaviour::Behaviour;
use shared_resources::call::Call;
use shared_resources::config::ClearingPolicy;
use shared_resources::direction::Direction;
use shared_resources::request::Request;

use crate::elevator::Elevator;

pub struct DirectionBehaviourPair {
    pub direction: Direction,
    pub behaviour: Behaviour,
}

pub fn requests_above(e: &Elevator) -> bool {
    ((e.floor + 1)..e.num_floors).any(|floor| Call::iter().any(|call| e.request(floor, call)))
}

pub fn requests_below(e: &Elevator) -> bool {
    (0..e.floor).any(|floor| Call::iter().any(|call| e.request(floor, call)))
}

pub fn requests_here(e: &Elevator) -> bool {
    Call::iter().any(|call| e.request(e.floor, call))
}

pub fn any_requests(e: &Elevator) -> bool {
    requests_above(e) || requests_here(e) || requests_below(e)
}

/// Continue in the travel direction while work remains there, then serve
/// the current floor, then reverse; otherwise go idle.
pub fn choose_direction(e: &Elevator) -> DirectionBehaviourPair {
    match e.direction {
        Direction::Up => {
            if requests_above(e) {
                DirectionBehaviourPair { direction: Direction::Up, behaviour: Behaviour::Moving }
            } else if requests_here(e) {
                DirectionBehaviourPair { direction: Direction::Down, behaviour: Behaviour::DoorOpen }
            } else if requests_below(e) {
                DirectionBehaviourPair { direction: Direction::Down, behaviour: Behaviour::Moving }
            } else {
                DirectionBehaviourPair { direction: Direction::Stop, behaviour: Behaviour::Idle }
            }
        }
        Direction::Down => {
            if requests_below(e) {
                DirectionBehaviourPair { direction: Direction::Down, behaviour: Behaviour::Moving }
            } else if requests_here(e) {
                DirectionBehaviourPair { direction: Direction::Up, behaviour: Behaviour::DoorOpen }
            } else if requests_above(e) {
                DirectionBehaviourPair { direction: Direction::Up, behaviour: Behaviour::Moving }
            } else {
                DirectionBehaviourPair { direction: Direction::Stop, behaviour: Behaviour::Idle }
            }
        }
        Direction::Stop => {
            if requests_here(e) {
                DirectionBehaviourPair { direction: Direction::Stop, behaviour: Behaviour::DoorOpen }
            } else if requests_above(e) {
                DirectionBehaviourPair { direction: Direction::Up, behaviour: Behaviour::Moving }
            } else if requests_below(e) {
                DirectionBehaviourPair { direction: Direction::Down, behaviour: Behaviour::Moving }
            } else {
                DirectionBehaviourPair { direction: Direction::Stop, behaviour: Behaviour::Idle }
            }
        }
    }
}

pub fn should_stop(e: &Elevator) -> bool {
    match e.direction {
        Direction::Down => {
            e.request(e.floor, Call::HallDown)
                || e.request(e.floor, Call::Cab)
                || !requests_below(e)
                || e.floor == 0
        }
        Direction::Up => {
            e.request(e.floor, Call::HallUp)
                || e.request(e.floor, Call::Cab)
                || !requests_above(e)
                || e.floor == e.num_floors - 1
        }
        Direction::Stop => true,
    }
}

/// Whether a press at the elevator's own floor can be served by simply
/// reopening the door.
pub fn should_clear_immediately(e: &Elevator, floor: u8, call: Call, policy: ClearingPolicy) -> bool {
    if e.floor != floor {
        return false;
    }
    match policy {
        ClearingPolicy::All => true,
        ClearingPolicy::InDirection => {
            call == Call::Cab
                || e.direction == Direction::Stop
                || e.direction.to_call() == Some(call)
        }
    }
}

/// Clear the requests a stop at the current floor serves, returning them.
/// Under `InDirection` the opposing hall call survives the stop unless
/// this floor is the last errand in the travel direction.
pub fn clear_at_current_floor(e: &mut Elevator, policy: ClearingPolicy) -> Vec<Request> {
    let mut served = Vec::new();
    let mut clear = |e: &mut Elevator, call: Call| {
        if e.request(e.floor, call) {
            e.set_request(e.floor, call, false);
            served.push(Request { floor: e.floor, call });
        }
    };

    match policy {
        ClearingPolicy::All => {
            for call in Call::iter() {
                clear(e, call);
            }
        }
        ClearingPolicy::InDirection => {
            clear(e, Call::Cab);
            match e.direction {
                Direction::Up => {
                    if !requests_above(e) && !e.request(e.floor, Call::HallUp) {
                        clear(e, Call::HallDown);
                    }
                    clear(e, Call::HallUp);
                }
                Direction::Down => {
                    if !requests_below(e) && !e.request(e.floor, Call::HallDown) {
                        clear(e, Call::HallUp);
                    }
                    clear(e, Call::HallDown);
                }
                Direction::Stop => {
                    clear(e, Call::HallUp);
                    clear(e, Call::HallDown);
                }
            }
        }
    }
    served
}
