//! Error taxonomy for the queue.
//!
//! Broker failures carry a structured [`BrokerErrorKind`] so callers never
//! have to inspect human-readable messages. Per-entry conditions
//! (malformed entry, handler failure, ack failure) are separate
//! [`QueueError`] variants so batch draining can contain them.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::entities::EntryId;

/// Error produced by a message handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a broker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorKind {
    /// The consumer group already exists on the topic.
    GroupExists,
    /// The topic or the consumer group does not exist.
    NoGroup,
    /// The broker could not be reached or the connection dropped.
    Connection,
    /// The broker did not answer in time.
    Timeout,
    /// The broker answered with something that could not be understood.
    Protocol,
    /// Any other error reported by the broker.
    Server,
}

impl fmt::Display for BrokerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerErrorKind::GroupExists => "group exists",
            BrokerErrorKind::NoGroup => "no such group",
            BrokerErrorKind::Connection => "connection",
            BrokerErrorKind::Timeout => "timeout",
            BrokerErrorKind::Protocol => "protocol",
            BrokerErrorKind::Server => "server",
        };
        f.write_str(name)
    }
}

/// Failure reported by a [`BrokerPort`](crate::ports::BrokerPort).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct BrokerError {
    kind: BrokerErrorKind,
    message: String,
}

impl BrokerError {
    /// Create an error of the given kind.
    pub fn new(kind: BrokerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`BrokerErrorKind::Connection`] error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::Connection, message)
    }

    /// Shorthand for a [`BrokerErrorKind::Protocol`] error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::Protocol, message)
    }

    /// The structured kind.
    #[must_use]
    pub fn kind(&self) -> BrokerErrorKind {
        self.kind
    }

    /// The broker's message, for logs only.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Transport-level failures that should abort the calling operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            BrokerErrorKind::Connection | BrokerErrorKind::Timeout
        )
    }
}

/// Failure to encode or decode an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The entry does not carry the reserved envelope field.
    #[error("entry has no `{0}` field")]
    MissingField(&'static str),

    /// The envelope field could not be decoded.
    #[error("undecodable envelope: {0}")]
    Undecodable(#[from] serde_json::Error),
}

/// Error surfaced by producers and consumers.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Broker-level failure (connectivity, missing group, ...).
    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    /// The entry's envelope was missing or could not be decoded.
    /// The entry stays pending.
    #[error("malformed entry {id}: {source}")]
    Malformed {
        id: EntryId,
        #[source]
        source: EnvelopeError,
    },

    /// The handler rejected the entry. The entry stays pending.
    #[error("handler failed on entry {id}: {source}")]
    Handler {
        id: EntryId,
        #[source]
        source: HandlerError,
    },

    /// The handler succeeded but the acknowledgment failed.
    /// The entry stays pending.
    #[error("acknowledge failed for entry {id}: {source}")]
    Ack {
        id: EntryId,
        #[source]
        source: BrokerError,
    },

    /// A payload could not be wrapped into an envelope.
    #[error("envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The read did not complete before the client-side deadline.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// The read was cancelled by a shutdown signal.
    #[error("cancelled")]
    Cancelled,

    /// Consumer settings that cannot work together.
    #[error("invalid consumer configuration: {0}")]
    InvalidConfig(String),
}

impl QueueError {
    /// The entry this error is about, for per-entry conditions.
    #[must_use]
    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            QueueError::Malformed { id, .. }
            | QueueError::Handler { id, .. }
            | QueueError::Ack { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// True for failures that concern the connection rather than one entry.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            QueueError::Broker(e) => e.is_fatal(),
            QueueError::Timeout(_) => true,
            _ => false,
        }
    }
}
