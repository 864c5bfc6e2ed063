/// ----- FSM MODULE -----
/// The behavioural state machine for the local cabin: Idle, Moving or
/// DoorOpen. It owns the motor, the cab lamps and the local request
/// matrix; hall assignments arrive from the synchronizer, and every served
/// hall request is reported back so the owner's completion can be
/// broadcast. Events that do not apply to the current state are ignored
/// on purpose.

use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver, Sender};

use shared_resources::behaviour::Behaviour;
use shared_resources::call::Call;
use shared_resources::config::{ClearingPolicy, ElevatorConfig};
use shared_resources::direction::Direction;
use shared_resources::request::Request;

use crate::elevator::Elevator;
use crate::requests;

/// What the rest of the node needs to know about the cabin, refreshed on
/// every FSM event.
#[derive(Debug, Clone)]
pub struct LocalState {
    pub behaviour: Behaviour,
    pub floor: u8,
    pub direction: Direction,
    pub cab_requests: Vec<bool>,
}

pub fn main(
    elevator_settings: ElevatorConfig,
    cab_button_rx: Receiver<u8>,
    our_hall_requests_rx: Receiver<Vec<Vec<bool>>>,
    floor_sensor_rx: Receiver<u8>,
    doors_closing_rx: Receiver<bool>,
    doors_activate_tx: Sender<bool>,
    motor_direction_tx: Sender<Direction>,
    floor_indicator_tx: Sender<u8>,
    button_light_tx: Sender<(Request, bool)>,
    completed_tx: Sender<Request>,
    local_state_tx: Sender<LocalState>,
) {
    let policy = elevator_settings.clearing_policy;
    let mut e = Elevator::new(elevator_settings.num_floors);
    let mut floor_known = false;

    let timer = tick(Duration::from_millis(250));

    loop {
        select! {
            recv(cab_button_rx) -> msg => {
                let floor = msg.unwrap();
                if e.behaviour == Behaviour::DoorOpen
                    && requests::should_clear_immediately(&e, floor, Call::Cab, policy) {
                    doors_activate_tx.send(true).unwrap();
                } else {
                    e.set_request(floor, Call::Cab, true);
                    button_light_tx.send((Request { floor, call: Call::Cab }, true)).unwrap();
                    start_if_idle(&mut e, &doors_activate_tx, &motor_direction_tx, &button_light_tx, &completed_tx, policy);
                }
            },
            recv(our_hall_requests_rx) -> msg => {
                e.set_hall_requests(&msg.unwrap());
                start_if_idle(&mut e, &doors_activate_tx, &motor_direction_tx, &button_light_tx, &completed_tx, policy);
            },
            recv(floor_sensor_rx) -> msg => {
                e.floor = msg.unwrap();
                floor_known = true;
                floor_indicator_tx.send(e.floor).unwrap();
                if e.behaviour == Behaviour::Moving {
                    if requests::should_stop(&e) && requests::requests_here(&e) {
                        motor_direction_tx.send(Direction::Stop).unwrap();
                        serve_current_floor(&mut e, &doors_activate_tx, &button_light_tx, &completed_tx, policy);
                    } else if !requests::any_requests(&e) {
                        // Bootstrap landing: we drove down to find a known
                        // floor and there is nothing to do yet.
                        motor_direction_tx.send(Direction::Stop).unwrap();
                        e.direction = Direction::Stop;
                        e.behaviour = Behaviour::Idle;
                    } else if requests::should_stop(&e) {
                        motor_direction_tx.send(Direction::Stop).unwrap();
                        e.direction = Direction::Stop;
                        e.behaviour = Behaviour::Idle;
                    }
                }
            },
            recv(doors_closing_rx) -> _ => {
                if e.behaviour == Behaviour::DoorOpen {
                    let pair = requests::choose_direction(&e);
                    e.direction = pair.direction;
                    e.behaviour = pair.behaviour;
                    match e.behaviour {
                        Behaviour::DoorOpen => {
                            serve_current_floor(&mut e, &doors_activate_tx, &button_light_tx, &completed_tx, policy);
                        }
                        Behaviour::Moving => {
                            motor_direction_tx.send(e.direction).unwrap();
                        }
                        Behaviour::Idle => {}
                    }
                }
            },
            recv(timer) -> _ => {
                start_if_idle(&mut e, &doors_activate_tx, &motor_direction_tx, &button_light_tx, &completed_tx, policy);
            },
        }

        if floor_known {
            local_state_tx.send(LocalState {
                behaviour: e.behaviour,
                floor: e.floor,
                direction: e.direction,
                cab_requests: e.cab_requests(),
            }).unwrap();
        }
    }
}

/// An idle elevator re-evaluates its direction as soon as new work shows
/// up: either start moving or serve a request at this very floor.
fn start_if_idle(
    e: &mut Elevator,
    doors_activate_tx: &Sender<bool>,
    motor_direction_tx: &Sender<Direction>,
    button_light_tx: &Sender<(Request, bool)>,
    completed_tx: &Sender<Request>,
    policy: ClearingPolicy,
) {
    if e.behaviour != Behaviour::Idle {
        return;
    }
    let pair = requests::choose_direction(e);
    e.direction = pair.direction;
    e.behaviour = pair.behaviour;
    match e.behaviour {
        Behaviour::Moving => {
            motor_direction_tx.send(e.direction).unwrap();
        }
        Behaviour::DoorOpen => {
            serve_current_floor(e, doors_activate_tx, button_light_tx, completed_tx, policy);
        }
        Behaviour::Idle => {}
    }
}

/// Stop-side effects of serving the current floor: clear what this stop
/// serves, report served hall calls, drop the cab lamp, open the door.
fn serve_current_floor(
    e: &mut Elevator,
    doors_activate_tx: &Sender<bool>,
    button_light_tx: &Sender<(Request, bool)>,
    completed_tx: &Sender<Request>,
    policy: ClearingPolicy,
) {
    for request in requests::clear_at_current_floor(e, policy) {
        match request.call {
            Call::Cab => {
                button_light_tx.send((request, false)).unwrap();
            }
            Call::HallUp | Call::HallDown => {
                completed_tx.send(request).unwrap();
            }
        }
    }
    doors_activate_tx.send(true).unwrap();
    e.behaviour = Behaviour::DoorOpen;
}
