use std::process;
use std::thread;

use crossbeam_channel::{select, unbounded};
use log::info;

use network_rust::udpnet;
use shared_resources::config::NodeConfig;
use shared_resources::message::{Assignment, Snapshot};

pub mod assigner;
pub mod coordinator;
pub mod debug;
pub mod doors;
pub mod elevator;
pub mod fsm;
pub mod io;
pub mod requests;
pub mod sync;

fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = NodeConfig::get();
    info!("node {} starting", config.id);

    // INITIALIZE CHANNELS
    let (doors_activate_tx, doors_activate_rx) = unbounded();
    let (doors_closing_tx, doors_closing_rx) = unbounded();
    let (our_hall_requests_tx, our_hall_requests_rx) = unbounded();
    let (completed_tx, completed_rx) = unbounded();
    let (local_state_tx, local_state_rx) = unbounded();
    let (peer_update_tx, peer_update_rx) = unbounded();
    let (snapshot_out_tx, snapshot_out_rx) = unbounded::<Snapshot>();
    let (snapshot_in_tx, snapshot_in_rx) = unbounded::<Snapshot>();
    let (assignment_out_tx, assignment_out_rx) = unbounded::<Assignment>();
    let (assignment_in_tx, assignment_in_rx) = unbounded::<Assignment>();
    let (monitor_tx, monitor_rx) = unbounded();
    // Held for the life of the program so the heartbeat stays enabled.
    let (_peer_tx_enable_tx, peer_tx_enable_rx) = unbounded::<bool>();

    // INITIALIZE I/O MODULE
    let channels = io::init(&config.server, &config.elevator)?;
    let button_light_tx = channels.button_light_tx;

    // INITIALIZE THREAD FOR DOOR EVENTS
    {
        let door_open_duration = config.elevator.door_open_duration;
        thread::spawn(move || doors::main(
            door_open_duration,
            channels.obstruction_rx,
            doors_activate_rx,
            doors_closing_tx,
            channels.door_light_tx,
        ));
    }

    // INITIALIZE THREAD FOR STATE MACHINE
    {
        let elevator_settings = config.elevator.clone();
        let button_light_tx = button_light_tx.clone();
        thread::spawn(move || fsm::main(
            elevator_settings,
            channels.cab_button_rx,
            our_hall_requests_rx,
            channels.floor_sensor_rx,
            doors_closing_rx,
            doors_activate_tx,
            channels.motor_direction_tx,
            channels.floor_indicator_tx,
            button_light_tx,
            completed_tx,
            local_state_tx,
        ));
    }

    // INITIALIZE NETWORK THREADS
    {
        let id = config.id.clone();
        let port = config.network.peer_port;
        thread::spawn(move || {
            if udpnet::peers::tx(port, id, peer_tx_enable_rx).is_err() {
                process::exit(1);
            }
        });
    }
    {
        let port = config.network.peer_port;
        thread::spawn(move || {
            if udpnet::peers::rx(port, peer_update_tx).is_err() {
                process::exit(1);
            }
        });
    }
    {
        let port = config.network.snapshot_port;
        thread::spawn(move || {
            if udpnet::bcast::tx(port, snapshot_out_rx).is_err() {
                process::exit(1);
            }
        });
    }
    {
        let port = config.network.snapshot_port;
        thread::spawn(move || {
            if udpnet::bcast::rx(port, snapshot_in_tx).is_err() {
                process::exit(1);
            }
        });
    }
    {
        let port = config.network.assignment_port;
        thread::spawn(move || {
            if udpnet::bcast::tx(port, assignment_out_rx).is_err() {
                process::exit(1);
            }
        });
    }
    {
        let port = config.network.assignment_port;
        thread::spawn(move || {
            if udpnet::bcast::rx(port, assignment_in_tx).is_err() {
                process::exit(1);
            }
        });
    }

    // INITIALIZE THREAD FOR SYNCHRONIZER
    {
        let config = config.clone();
        thread::spawn(move || sync::main(
            config,
            channels.hall_button_rx,
            completed_rx,
            local_state_rx,
            peer_update_rx,
            snapshot_in_rx,
            assignment_in_rx,
            snapshot_out_tx,
            assignment_out_tx,
            our_hall_requests_tx,
            button_light_tx,
            monitor_tx,
        ));
    }

    // INITIALIZE DEBUG MODULE
    {
        let num_floors = config.elevator.num_floors;
        thread::spawn(move || debug::main(num_floors, monitor_rx));
    }

    loop {
        select! {
            recv(channels.stop_button_rx) -> _ => {
                println!("STOPPING PROGRAM...");
                return Ok(())
            }
        }
    }
}
