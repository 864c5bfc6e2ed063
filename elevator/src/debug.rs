/// ----- DEBUG MODULE -----
/// Redraws a status table in the terminal whenever the synchronizer
/// publishes a snapshot of the node: role, peer list, local machine state
/// and the replicated hall request table.

use std::io::{stdout, Stdout, Write};

use crossbeam_channel::Receiver;
use crossterm::{cursor, terminal, ExecutableCommand, Result};

use shared_resources::behaviour::Behaviour;
use shared_resources::call::Call;
use shared_resources::direction::Direction;
use shared_resources::request_store::RequestStatus;

use crate::coordinator::Role;
use crate::sync::SystemStatus;

pub fn main(num_floors: u8, status_rx: Receiver<SystemStatus>) -> Result<()> {
    let mut stdout = stdout();
    let status_size = 2 * num_floors as u16 + 16;

    for _ in 0..status_size {
        writeln!(stdout)?;
    }

    loop {
        let status = status_rx.recv().unwrap();
        printstatus(&mut stdout, status_size, &status)?;
    }
}

fn printstatus(stdout: &mut Stdout, status_size: u16, status: &SystemStatus) -> Result<()> {
    stdout.execute(cursor::MoveUp(status_size))?;
    stdout.execute(terminal::Clear(terminal::ClearType::FromCursorDown))?;

    let role = match status.role {
        Role::Standalone => "standalone",
        Role::Backup => "backup",
        Role::Master => "master",
    };
    writeln!(stdout, "+------------+--------------------------------------+")?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "NODE", status.id)?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "ROLE", role)?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "MASTER", status.master)?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "PEERS", status.peers.join(" "))?;
    writeln!(stdout, "+------------+--------------------------------------+")?;

    let (behaviour, floor, direction) = match &status.local {
        Some(local) => {
            let behaviour = match local.behaviour {
                Behaviour::Idle => "idle",
                Behaviour::Moving => "moving",
                Behaviour::DoorOpen => "doorOpen",
            };
            let direction = match local.direction {
                Direction::Up => "up",
                Direction::Down => "down",
                Direction::Stop => "stop",
            };
            (behaviour, local.floor.to_string(), direction)
        }
        None => ("booting", String::from("?"), "down"),
    };
    writeln!(stdout, "| {0:<10} | {1:<36} |", "STATE", behaviour)?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "FLOOR", floor)?;
    writeln!(stdout, "| {0:<10} | {1:<36} |", "DIRECTION", direction)?;
    writeln!(stdout, "+------------+------------+------------+------------+")?;

    writeln!(stdout, "| {0:<10} | {1:<10} | {2:<10} | {3:<10} |", "FLOOR", "HALL UP", "HALL DOWN", "CAB")?;
    let cab = status.store.cab_requests();
    for floor in (0..status.store.num_floors()).rev() {
        writeln!(stdout, "+------------+------------+------------+------------+")?;
        writeln!(
            stdout,
            "| {0:<10} | {1:<10} | {2:<10} | {3:<10} |",
            floor,
            status.store.hall_status(floor, Call::HallUp).map_or_else(String::new, statusname),
            status.store.hall_status(floor, Call::HallDown).map_or_else(String::new, statusname),
            cab[floor as usize],
        )?;
    }
    writeln!(stdout, "+------------+------------+------------+------------+")?;

    Ok(())
}

fn statusname(status: &RequestStatus) -> String {
    match status {
        RequestStatus::NoCall => String::from("-"),
        RequestStatus::Unconfirmed => String::from("new"),
        RequestStatus::Assigned { owner } => format!("-> {owner}"),
        RequestStatus::Completed => String::from("done"),
    }
}
