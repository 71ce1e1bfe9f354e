//! # RESP Broker Adapter
//!
//! Implements [`BrokerPort`](crate::ports::BrokerPort) against a
//! Redis-compatible server using stream commands:
//!
//! | Port operation | Command |
//! |----------------|---------|
//! | `append` | `XADD <topic> * data <envelope>` |
//! | `create_group` | `XGROUP CREATE <topic> <group> <start> MKSTREAM` |
//! | `read_group` | `XREADGROUP GROUP <group> <consumer> [COUNT n] [BLOCK ms] STREAMS <topic> >`, or `<id>` to replay own pending entries |
//! | `ack` | `XACK <topic> <group> <id>` |
//! | `pending` | `XPENDING <topic> <group>` |
//!
//! Server error replies are classified by their leading error code
//! (`BUSYGROUP`, `NOGROUP`), never by the message text.
//!
//! Each command borrows a connection from a small pool for its full round
//! trip; blocking reads therefore occupy one connection and leave the rest
//! free for appends and acks.

mod broker;
pub mod codec;
mod connection;

pub use broker::{RespBroker, RespSettings, DEFAULT_POOL_SIZE};
pub use codec::RespValue;
pub use connection::RespConnection;

use thiserror::Error;

use crate::domain::BrokerError;

/// Transport-level failure on a RESP connection.
#[derive(Debug, Error)]
pub enum RespError {
    /// Socket error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent bytes that are not valid RESP2.
    #[error("protocol: {0}")]
    Protocol(String),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

impl From<RespError> for BrokerError {
    fn from(err: RespError) -> Self {
        match err {
            RespError::Protocol(msg) => BrokerError::protocol(msg),
            other => BrokerError::connection(other.to_string()),
        }
    }
}
