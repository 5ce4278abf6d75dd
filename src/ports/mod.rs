//! Port traits for the collaborators a decision cycle talks to.

pub mod balance_port;
pub mod config_port;
pub mod data_port;
pub mod notify_port;
pub mod order_port;
