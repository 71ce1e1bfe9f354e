//! Core value types for streams, consumer groups, and pending entries.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Field map carried by a stream entry.
///
/// Keys are field names, values are raw bytes as stored by the broker.
pub type Fields = BTreeMap<String, Bytes>;

/// Broker-assigned entry identifier (`<millis>-<sequence>`).
///
/// Ids are strictly increasing within a topic, so the derived ordering
/// matches append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId {
    /// Milliseconds component.
    pub ms: u64,
    /// Sequence within the same millisecond.
    pub seq: u64,
}

impl EntryId {
    /// The id that sorts before every real entry.
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    /// Create an id from its two components.
    #[must_use]
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// The smallest id strictly greater than `self`.
    #[must_use]
    pub fn successor(&self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self { ms: self.ms, seq },
            None => Self {
                ms: self.ms.saturating_add(1),
                seq: 0,
            },
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Error returned when an entry id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entry id: {0:?}")]
pub struct ParseEntryIdError(pub String);

impl FromStr for EntryId {
    type Err = ParseEntryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEntryIdError(s.to_string());
        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, seq),
            None => (s, "0"),
        };
        Ok(Self {
            ms: ms.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// One entry as returned by a group read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Broker-assigned id.
    pub id: EntryId,
    /// Field map as stored.
    pub fields: Fields,
}

/// Name of one consumer inside a group.
///
/// The broker attributes pending entries per identity, so two running
/// consumers must never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity(String);

impl ConsumerIdentity {
    /// Generate a fresh random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Use an explicit, caller-chosen identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as sent to the broker.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a newly created group starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Only entries appended after the group is created (`$`).
    #[default]
    NewOnly,
    /// Every entry in the topic (`0`).
    Beginning,
    /// Entries strictly after the given id.
    After(EntryId),
}

impl StartPosition {
    /// Wire form understood by the broker.
    #[must_use]
    pub fn as_wire(&self) -> String {
        match self {
            StartPosition::NewOnly => "$".to_string(),
            StartPosition::Beginning => "0".to_string(),
            StartPosition::After(id) => id.to_string(),
        }
    }
}

/// Upper bound on entries returned by one group read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLimit {
    /// Everything currently undelivered.
    Unbounded,
    /// At most this many entries.
    AtMost(NonZeroUsize),
}

impl ReadLimit {
    /// Map a caller-facing count to a read limit.
    ///
    /// A count of zero means "all currently available", never a
    /// zero-length read.
    #[must_use]
    pub fn from_count(count: usize) -> Self {
        match NonZeroUsize::new(count) {
            Some(n) => ReadLimit::AtMost(n),
            None => ReadLimit::Unbounded,
        }
    }

    /// A limit of exactly one entry.
    #[must_use]
    pub fn single() -> Self {
        ReadLimit::AtMost(NonZeroUsize::MIN)
    }

    /// The explicit count, if bounded.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        match self {
            ReadLimit::Unbounded => None,
            ReadLimit::AtMost(n) => Some(n.get()),
        }
    }
}

/// Which slice of a group's stream a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadCursor {
    /// Entries never delivered to the group (`>`).
    #[default]
    New,
    /// The reading consumer's own pending entries with ids above the given
    /// one. Never blocks.
    Pending(EntryId),
}

impl ReadCursor {
    /// Replay this consumer's pending entries from the start.
    #[must_use]
    pub fn history() -> Self {
        ReadCursor::Pending(EntryId::ZERO)
    }

    /// Wire form understood by the broker.
    #[must_use]
    pub fn as_wire(&self) -> String {
        match self {
            ReadCursor::New => ">".to_string(),
            ReadCursor::Pending(id) => id.to_string(),
        }
    }
}

/// Summary of a group's pending-entry list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingSummary {
    /// Delivered but unacknowledged entries across all consumers.
    pub count: u64,
    /// Smallest pending id.
    pub lowest: Option<EntryId>,
    /// Largest pending id.
    pub highest: Option<EntryId>,
    /// Pending count per consumer identity.
    pub consumers: Vec<(String, u64)>,
}

impl PendingSummary {
    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Pending count attributed to one consumer.
    #[must_use]
    pub fn for_consumer(&self, consumer: &str) -> u64 {
        self.consumers
            .iter()
            .find(|(name, _)| name == consumer)
            .map_or(0, |(_, count)| *count)
    }
}
