/// ----- REQUEST STORE -----
/// Lifecycle tracking for every button on one node, plus the merge rule
/// that reconciles replicas received from peers. The hall columns follow
/// the cycle NoCall -> Unconfirmed -> Assigned -> Completed -> NoCall;
/// cab calls are private to the node and never merged.

use crate::call::Call;
use crate::node_id;
use crate::request::Request;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RequestStatus {
    NoCall,
    Unconfirmed,
    Assigned { owner: String },
    Completed,
}

impl RequestStatus {
    fn rank(&self) -> u8 {
        match self {
            RequestStatus::NoCall => 0,
            RequestStatus::Unconfirmed => 1,
            RequestStatus::Assigned { .. } => 2,
            RequestStatus::Completed => 3,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Unconfirmed | RequestStatus::Assigned { .. })
    }
}

/// Commutative and idempotent: the further-along status wins, except that
/// Completed meeting NoCall resolves to NoCall (the cycle wrap) and two
/// conflicting owners resolve to the smaller id. The wrap is applied
/// pairwise against a running replica, so duplicated and reordered
/// snapshots still converge.
fn merge_status(a: &RequestStatus, b: &RequestStatus) -> RequestStatus {
    use RequestStatus::*;
    match (a, b) {
        (Completed, NoCall) | (NoCall, Completed) => NoCall,
        (Assigned { owner: x }, Assigned { owner: y }) => {
            let owner = if node_id::cmp(x, y).is_le() { x } else { y };
            Assigned { owner: owner.clone() }
        }
        _ => {
            if a.rank() >= b.rank() {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

fn hall_index(call: Call) -> Option<usize> {
    match call {
        Call::HallUp => Some(0),
        Call::HallDown => Some(1),
        Call::Cab => None,
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestStore {
    num_floors: u8,
    hall: Vec<[RequestStatus; 2]>,
    cab: Vec<bool>,
}

impl RequestStore {
    pub fn new(num_floors: u8) -> Self {
        RequestStore {
            num_floors,
            hall: vec![[RequestStatus::NoCall, RequestStatus::NoCall]; num_floors as usize],
            cab: vec![false; num_floors as usize],
        }
    }

    pub fn num_floors(&self) -> u8 {
        self.num_floors
    }

    /// None for cab calls, which have no hall column.
    pub fn hall_status(&self, floor: u8, call: Call) -> Option<&RequestStatus> {
        hall_index(call).map(|idx| &self.hall[floor as usize][idx])
    }

    /// A button press only creates a new request; it never disturbs a
    /// request that is already assigned or just completed.
    pub fn press_hall(&mut self, floor: u8, call: Call) {
        if let Some(idx) = hall_index(call) {
            let slot = &mut self.hall[floor as usize][idx];
            if *slot == RequestStatus::NoCall {
                *slot = RequestStatus::Unconfirmed;
            }
        }
    }

    pub fn press_cab(&mut self, floor: u8) {
        self.cab[floor as usize] = true;
    }

    pub fn clear_cab(&mut self, floor: u8) {
        self.cab[floor as usize] = false;
    }

    pub fn cab_requests(&self) -> Vec<bool> {
        self.cab.clone()
    }

    pub fn set_cab_requests(&mut self, cab: Vec<bool>) {
        debug_assert_eq!(cab.len(), self.num_floors as usize);
        self.cab = cab;
    }

    pub fn assign(&mut self, floor: u8, call: Call, owner: &str) {
        if let Some(idx) = hall_index(call) {
            let slot = &mut self.hall[floor as usize][idx];
            if *slot != RequestStatus::Completed {
                *slot = RequestStatus::Assigned { owner: owner.to_string() };
            }
        }
    }

    /// Assignments promote and retarget, but never clear: a slot leaves the
    /// table only through an explicit completion from its owner.
    pub fn apply_assignments(
        &mut self,
        assignments: &std::collections::HashMap<String, Vec<Vec<bool>>>,
    ) {
        for (owner, matrix) in assignments {
            for floor in 0..self.num_floors {
                for call in Call::iter_hall() {
                    if matrix[floor as usize][call as usize] {
                        self.assign(floor, call, owner);
                    }
                }
            }
        }
    }

    pub fn complete(&mut self, floor: u8, call: Call) {
        if let Some(idx) = hall_index(call) {
            let slot = &mut self.hall[floor as usize][idx];
            if *slot != RequestStatus::NoCall {
                *slot = RequestStatus::Completed;
            }
        }
    }

    pub fn retire(&mut self, floor: u8, call: Call) {
        if let Some(idx) = hall_index(call) {
            let slot = &mut self.hall[floor as usize][idx];
            if *slot == RequestStatus::Completed {
                *slot = RequestStatus::NoCall;
            }
        }
    }

    /// Reconcile with a replica received from a peer, returning the slots
    /// that reached Completed through this merge so the caller can start
    /// their retirement clock. Cab columns are the owning node's private
    /// state and are left untouched.
    pub fn merge(&mut self, remote: &RequestStore) -> Vec<Request> {
        let mut newly_completed = Vec::new();
        for floor in 0..self.num_floors {
            for call in Call::iter_hall() {
                let idx = call as usize;
                let slot = &mut self.hall[floor as usize][idx];
                let merged = merge_status(slot, &remote.hall[floor as usize][idx]);
                if merged == RequestStatus::Completed && *slot != RequestStatus::Completed {
                    newly_completed.push(Request { floor, call });
                }
                *slot = merged;
            }
        }
        newly_completed
    }

    pub fn active_hall_requests(&self) -> Vec<[bool; 2]> {
        self.hall
            .iter()
            .map(|row| [row[0].is_active(), row[1].is_active()])
            .collect()
    }

    pub fn hall_requests_owned_by(&self, id: &str) -> Vec<Vec<bool>> {
        self.hall
            .iter()
            .map(|row| {
                row.iter()
                    .map(|status| matches!(status, RequestStatus::Assigned { owner } if owner == id))
                    .collect()
            })
            .collect()
    }

    /// Hall lamps follow confirmation: a call lights up once some node has
    /// been named its owner, and goes dark when the cycle wraps back.
    pub fn hall_lamps(&self) -> Vec<[bool; 2]> {
        self.hall
            .iter()
            .map(|row| {
                [
                    matches!(row[0], RequestStatus::Assigned { .. }),
                    matches!(row[1], RequestStatus::Assigned { .. }),
                ]
            })
            .collect()
    }

}
