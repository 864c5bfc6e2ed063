pub mod bcast;
pub mod peers;
mod sock;
