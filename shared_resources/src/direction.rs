use driver_rust::elevio::elev;

use crate::call::Call;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Stop,
    Up,
}

impl Direction {
    pub fn as_elev_constant(self) -> u8 {
        match self {
            Direction::Down => elev::DIRN_DOWN,
            Direction::Stop => elev::DIRN_STOP,
            Direction::Up => elev::DIRN_UP,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Stop => Direction::Stop,
            Direction::Up => Direction::Down,
        }
    }

    pub fn to_call(self) -> Option<Call> {
        match self {
            Direction::Up => Some(Call::HallUp),
            Direction::Down => Some(Call::HallDown),
            Direction::Stop => None,
        }
    }
}
