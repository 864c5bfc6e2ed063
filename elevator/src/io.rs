/// ----- I/O MODULE -----
/// Polls the elevator driver and fans sensor events out on channels, and
/// owns the command side: button lamps, motor, door light and floor
/// indicator. Losing the driver connection is the one fatal error in the
/// system, so init propagates it.

use std::io;
use std::thread::spawn;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use driver_rust::elevio::{elev, poll};

use shared_resources::call::Call;
use shared_resources::config::{ElevatorConfig, ServerConfig};
use shared_resources::direction::Direction;
use shared_resources::request::Request;

pub struct IoChannels {
    pub cab_button_rx: Receiver<u8>,
    pub hall_button_rx: Receiver<poll::CallButton>,
    pub floor_sensor_rx: Receiver<u8>,
    pub stop_button_rx: Receiver<bool>,
    pub obstruction_rx: Receiver<bool>,
    pub button_light_tx: Sender<(Request, bool)>,
    pub motor_direction_tx: Sender<Direction>,
    pub door_light_tx: Sender<bool>,
    pub floor_indicator_tx: Sender<u8>,
}

pub fn init(server: &ServerConfig, settings: &ElevatorConfig) -> io::Result<IoChannels> {
    let serveraddr = format!("localhost:{}", server.port);
    let elevator = elev::Elevator::init(serveraddr.as_str(), settings.num_floors)?;
    let num_floors = settings.num_floors;

    let poll_period = Duration::from_millis(25);

    let (cab_button_tx, cab_button_rx) = unbounded();
    let (hall_button_tx, hall_button_rx) = unbounded();
    {
        let (call_button_tx, call_button_rx) = unbounded();
        let elevator = elevator.clone();
        spawn(move || poll::call_buttons(elevator, call_button_tx, poll_period));
        spawn(move || loop {
            let button = call_button_rx.recv().unwrap();
            match button.call {
                elev::CAB => cab_button_tx.send(button.floor).unwrap(),
                _ => hall_button_tx.send(button).unwrap(),
            }
        });
    }

    let (floor_sensor_tx, floor_sensor_rx) = unbounded();
    {
        let elevator = elevator.clone();
        spawn(move || poll::floor_sensor(elevator, floor_sensor_tx, poll_period));
    }

    let (stop_button_tx, stop_button_rx) = unbounded();
    {
        let elevator = elevator.clone();
        spawn(move || poll::stop_button(elevator, stop_button_tx, poll_period));
    }

    let (obstruction_tx, obstruction_rx) = unbounded();
    {
        let elevator = elevator.clone();
        spawn(move || poll::obstruction(elevator, obstruction_tx, poll_period));
    }

    let (button_light_tx, button_light_rx) = unbounded::<(Request, bool)>();
    {
        let elevator = elevator.clone();
        spawn(move || loop {
            let (request, on) = button_light_rx.recv().unwrap();
            elevator.call_button_light(request.floor, request.call.as_elev_constant(), on);
        });
    }

    let (motor_direction_tx, motor_direction_rx) = unbounded::<Direction>();
    {
        let elevator = elevator.clone();
        spawn(move || loop {
            let direction = motor_direction_rx.recv().unwrap();
            elevator.motor_direction(direction.as_elev_constant());
        });
    }

    let (door_light_tx, door_light_rx) = unbounded();
    {
        let elevator = elevator.clone();
        spawn(move || loop {
            let on = door_light_rx.recv().unwrap();
            elevator.door_light(on);
        });
    }

    let (floor_indicator_tx, floor_indicator_rx) = unbounded();
    {
        let elevator = elevator.clone();
        spawn(move || loop {
            let floor = floor_indicator_rx.recv().unwrap();
            elevator.floor_indicator(floor);
        });
    }

    // Known starting state: no stale lamps from a previous run.
    for floor in 0..num_floors {
        for call in Call::iter() {
            button_light_tx.send((Request { floor, call }, false)).unwrap();
        }
    }
    door_light_tx.send(false).unwrap();

    // Boot between floors: drive down until the first sensor reading.
    if elevator.floor_sensor().is_none() {
        motor_direction_tx.send(Direction::Down).unwrap();
    }

    Ok(IoChannels {
        cab_button_rx,
        hall_button_rx,
        floor_sensor_rx,
        stop_button_rx,
        obstruction_rx,
        button_light_tx,
        motor_direction_tx,
        door_light_tx,
        floor_indicator_tx,
    })
}
