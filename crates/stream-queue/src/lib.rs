//! # Stream Queue - Consumer-Group Queue and Pub/Sub
//!
//! At-least-once work distribution over an append-only stream broker.
//! Producers append enveloped payloads to a topic; every consumer group on
//! that topic sees each entry, and within a group each entry goes to exactly
//! one member until it is acknowledged.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐
//! │  Producer    │ ────────────→ │              │
//! └──────────────┘               │  BrokerPort  │ ← RespBroker (TCP)
//! ┌──────────────┐  drain() /    │              │ ← InMemoryBroker
//! │  Consumer    │ ←──────────── │              │
//! └──────────────┘  subscribe()  └──────────────┘
//!        │
//!        ▼
//!  MessageHandler ──→ Ok: ack    Err: stays pending
//! ```
//!
//! ## Delivery
//!
//! - An entry is acknowledged only after its handler returns `Ok`.
//! - Malformed, rejected, or unacknowledged entries stay pending for the
//!   consumer that read them. That consumer replays its pending entries
//!   before taking new ones, alternating so a poison entry cannot starve
//!   fresh work.
//! - Handlers must therefore be idempotent.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryBroker, RespBroker, RespSettings, DEFAULT_POOL_SIZE};
pub use domain::{
    BrokerError, BrokerErrorKind, ConsumerIdentity, EntryId, Envelope, EnvelopeError, Fields,
    HandlerError, PendingSummary, QueueError, ReadCursor, ReadLimit, StartPosition,
    StreamEntry,
};
pub use ports::{handler_fn, BrokerPort, MessageHandler, Publisher, Subscriber};
pub use service::{
    Consumer, ConsumerConfig, DrainReport, EntryFailure, FailureKind, GroupProvisioner,
    GroupStatus, Producer,
};
