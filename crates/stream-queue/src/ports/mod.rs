//! Ports layer.
//!
//! Defines the hexagonal architecture port traits:
//! - Inbound (Driving) ports: API exposed to applications
//! - Outbound (Driven) ports: the broker the queue runs on

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
