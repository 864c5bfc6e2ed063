use shared_resources::behaviour::Behaviour;
use shared_resources::call::Call;
use shared_resources::direction::Direction;

/// The local elevator as the FSM sees it: position, travel state and the
/// request matrix it is currently committed to (its own cab calls plus the
/// hall calls assigned to it).
#[derive(Debug, Clone, PartialEq)]
pub struct Elevator {
    pub num_floors: u8,
    pub floor: u8,
    pub direction: Direction,
    pub behaviour: Behaviour,
    pub requests: Vec<Vec<bool>>,
}

impl Elevator {
    /// The cabin position is unknown at boot, so the elevator starts out
    /// driving down until the first floor sensor reading.
    pub fn new(num_floors: u8) -> Self {
        Elevator {
            num_floors,
            floor: 0,
            direction: Direction::Down,
            behaviour: Behaviour::Moving,
            requests: vec![vec![false; Call::num_calls() as usize]; num_floors as usize],
        }
    }

    pub fn request(&self, floor: u8, call: Call) -> bool {
        self.requests[floor as usize][call as usize]
    }

    pub fn set_request(&mut self, floor: u8, call: Call, value: bool) {
        self.requests[floor as usize][call as usize] = value;
    }

    pub fn cab_requests(&self) -> Vec<bool> {
        (0..self.num_floors)
            .map(|floor| self.request(floor, Call::Cab))
            .collect()
    }

    /// Replace the hall columns with a fresh assignment, leaving cab
    /// requests untouched.
    pub fn set_hall_requests(&mut self, hall_requests: &[Vec<bool>]) {
        for floor in 0..self.num_floors as usize {
            for call in Call::iter_hall() {
                self.requests[floor][call as usize] = hall_requests[floor][call as usize];
            }
        }
    }
}
