//! Adapters layer.
//!
//! Concrete [`BrokerPort`](crate::ports::BrokerPort) implementations.

pub mod memory;
pub mod resp;

pub use memory::InMemoryBroker;
pub use resp::{RespBroker, RespSettings, DEFAULT_POOL_SIZE};
