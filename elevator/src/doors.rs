/// ----- DOOR MODULE -----
/// Owns the door light and the door timer. The FSM only ever asks for the
/// door to open; this module decides when it has closed again. Obstruction
/// suspends the timer outright, and releasing it re-arms the full duration,
/// never a stale remainder.

use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, Sender};

pub struct DoorTimer {
    duration: Duration,
    deadline: Option<Instant>,
    obstructed: bool,
    open: bool,
}

impl DoorTimer {
    pub fn new(duration: Duration) -> Self {
        DoorTimer {
            duration,
            deadline: None,
            obstructed: false,
            open: false,
        }
    }

    pub fn activate(&mut self, now: Instant) {
        self.open = true;
        self.deadline = if self.obstructed {
            None
        } else {
            Some(now + self.duration)
        };
    }

    pub fn on_obstruction(&mut self, active: bool, now: Instant) {
        self.obstructed = active;
        if self.open {
            self.deadline = if active { None } else { Some(now + self.duration) };
        }
    }

    /// True exactly once, when an armed timer expires.
    pub fn expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.open && !self.obstructed && now >= deadline => {
                self.open = false;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub fn main(
    door_open_duration: f64,
    obstruction_rx: Receiver<bool>,
    doors_activate_rx: Receiver<bool>,
    doors_closing_tx: Sender<bool>,
    door_light_tx: Sender<bool>,
) {
    let mut timer = DoorTimer::new(Duration::from_secs_f64(door_open_duration));
    let poll = tick(Duration::from_millis(25));

    loop {
        select! {
            recv(obstruction_rx) -> msg => {
                timer.on_obstruction(msg.unwrap(), Instant::now());
            },
            recv(doors_activate_rx) -> _ => {
                timer.activate(Instant::now());
                door_light_tx.send(true).unwrap();
            },
            recv(poll) -> _ => {
                if timer.expired(Instant::now()) {
                    door_light_tx.send(false).unwrap();
                    doors_closing_tx.send(true).unwrap();
                }
            },
        }
    }
}
