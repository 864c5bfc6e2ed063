use std::collections::HashMap;

use crate::behaviour::Behaviour;
use crate::direction::Direction;
use crate::request_store::RequestStore;

/// Periodic state snapshot broadcast by every node. Carries the full
/// request store replica so peers can merge it field by field.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub behaviour: Behaviour,
    pub floor: u8,
    pub direction: Direction,
    pub store: RequestStore,
}

/// Hall assignment table broadcast by the current master:
/// node id -> [floor][hall up, hall down].
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub master: String,
    pub hall_requests: HashMap<String, Vec<Vec<bool>>>,
}
