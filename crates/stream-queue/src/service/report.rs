//! Per-call accounting for batch drains.

use std::fmt;

use crate::domain::{EntryId, QueueError};

/// Why an entry was left pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Envelope field missing or undecodable.
    Malformed,
    /// The handler returned an error.
    Handler,
    /// The handler succeeded but the acknowledgment failed.
    Ack,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Malformed => f.write_str("malformed"),
            FailureKind::Handler => f.write_str("handler"),
            FailureKind::Ack => f.write_str("ack"),
        }
    }
}

/// One entry that stayed pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub id: EntryId,
    pub kind: FailureKind,
    pub message: String,
}

impl EntryFailure {
    pub(crate) fn from_error(err: &QueueError) -> Option<Self> {
        let (id, kind) = match err {
            QueueError::Malformed { id, .. } => (*id, FailureKind::Malformed),
            QueueError::Handler { id, .. } => (*id, FailureKind::Handler),
            QueueError::Ack { id, .. } => (*id, FailureKind::Ack),
            _ => return None,
        };
        Some(Self {
            id,
            kind,
            message: err.to_string(),
        })
    }
}

/// Result of one batch drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries returned by the broker.
    pub delivered: usize,
    /// Entries handled and acknowledged.
    pub acknowledged: usize,
    /// Entries left pending, in delivery order.
    pub failures: Vec<EntryFailure>,
}

impl DrainReport {
    /// True when the broker had nothing to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delivered == 0
    }

    /// Number of failures of one kind.
    #[must_use]
    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}
