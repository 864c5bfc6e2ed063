#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Idle,
    Moving,
    DoorOpen,
}
