//! Outbound (Driven) port: the broker.
//!
//! The queue needs exactly five capabilities from the underlying
//! log-structured broker. Each call is atomic at the broker, so
//! implementations are shared behind an `Arc` without extra locking.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{
    BrokerError, ConsumerIdentity, EntryId, Fields, PendingSummary, ReadCursor, ReadLimit,
    StartPosition, StreamEntry,
};

/// Minimal command surface of a consumer-group broker.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Append an entry to `topic`, creating the topic if needed.
    ///
    /// # Returns
    ///
    /// The broker-assigned id of the new entry.
    async fn append(&self, topic: &str, fields: Fields) -> Result<EntryId, BrokerError>;

    /// Create `group` on `topic` positioned at `start`, creating the topic if
    /// absent.
    ///
    /// # Errors
    ///
    /// - `GroupExists` if the group is already there
    /// - `Connection` / `Timeout` on transport failure
    async fn create_group(
        &self,
        topic: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BrokerError>;

    /// Read up to `limit` entries for `consumer`, in id order.
    ///
    /// With [`ReadCursor::New`], returns undelivered entries and moves them
    /// to the group's pending list, attributed to `consumer`. With
    /// [`ReadCursor::Pending`], re-delivers entries already pending for
    /// `consumer`, bumping their delivery count. `block` applies to new
    /// entries only: it waits up to that long when none are available. An
    /// empty vector means nothing was available.
    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &ConsumerIdentity,
        cursor: ReadCursor,
        limit: ReadLimit,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, BrokerError>;

    /// Acknowledge an entry, removing it from the group's pending list.
    ///
    /// # Returns
    ///
    /// `true` if the entry was pending, `false` if it was already acknowledged.
    async fn ack(&self, topic: &str, group: &str, id: &EntryId) -> Result<bool, BrokerError>;

    /// Summary of the group's pending-entry list, for diagnostics.
    async fn pending(&self, topic: &str, group: &str) -> Result<PendingSummary, BrokerError>;
}
