pub mod behaviour;
pub mod call;
pub mod config;
pub mod direction;
pub mod message;
pub mod node_id;
pub mod request;
pub mod request_store;
