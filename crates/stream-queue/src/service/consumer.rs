//! # Consumer
//!
//! The delivery/acknowledgment engine. Both access patterns run the same
//! per-entry protocol:
//!
//! ```text
//! read_group ──→ decode envelope ──→ handler(payload) ──→ ack
//!                     │                    │               │
//!                 malformed             failed          failed
//!                     └────────────────────┴───────────────┘
//!                                          │
//!                      entry stays pending for this consumer
//! ```
//!
//! - `drain` contains per-entry failures in a [`DrainReport`] and keeps
//!   going; only a broker-level read failure fails the call.
//! - `subscribe` handles a single entry and surfaces any failure directly.
//!
//! Every read first replays this consumer's own pending entries, walking
//! them in id order across calls, and tops the batch up with new entries.
//! Once the walk runs dry it starts over, and that read takes new entries
//! only (blocking if configured). A batch of poison entries therefore delays
//! fresh work by at most one read.
//!
//! Handlers may see the same payload more than once and must be idempotent.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::provisioner::GroupProvisioner;
use super::report::{DrainReport, EntryFailure};
use crate::domain::{
    BrokerError, ConsumerIdentity, Envelope, EntryId, PendingSummary, QueueError, ReadCursor,
    ReadLimit, StartPosition, StreamEntry,
};
use crate::ports::{BrokerPort, MessageHandler, Subscriber};

/// Default client-side deadline on a single read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Where the group starts if this consumer creates it.
    pub start: StartPosition,
    /// Broker-side wait for new entries when none are available.
    pub block: Option<Duration>,
    /// Client-side deadline on each read. Must exceed `block`.
    pub read_timeout: Option<Duration>,
}

impl ConsumerConfig {
    /// Reject a read deadline that would cut off the broker-side wait.
    pub fn validate(&self) -> Result<(), QueueError> {
        if let (Some(deadline), Some(block)) = (self.read_timeout, self.block) {
            if deadline <= block {
                return Err(QueueError::InvalidConfig(format!(
                    "read timeout {deadline:?} must exceed block {block:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            start: StartPosition::NewOnly,
            block: None,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

/// One member of a consumer group.
///
/// Every running instance must hold a distinct [`ConsumerIdentity`]; the
/// broker attributes pending entries per identity.
pub struct Consumer {
    broker: Arc<dyn BrokerPort>,
    topic: String,
    group: String,
    identity: ConsumerIdentity,
    config: ConsumerConfig,
    /// Last own pending entry replayed; `ZERO` restarts the walk.
    replayed: Mutex<EntryId>,
}

impl Consumer {
    /// Create a consumer with a freshly generated identity, provisioning the
    /// group if needed.
    pub async fn new(
        broker: Arc<dyn BrokerPort>,
        topic: impl Into<String>,
        group: impl Into<String>,
        config: ConsumerConfig,
    ) -> Result<Self, QueueError> {
        Self::with_identity(broker, topic, group, ConsumerIdentity::generate(), config).await
    }

    /// Create a consumer with an explicit identity.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `read_timeout` does not exceed `block`
    /// - `Broker` if the group cannot be provisioned
    pub async fn with_identity(
        broker: Arc<dyn BrokerPort>,
        topic: impl Into<String>,
        group: impl Into<String>,
        identity: ConsumerIdentity,
        config: ConsumerConfig,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let topic = topic.into();
        let group = group.into();
        GroupProvisioner::new(broker.clone())
            .ensure_group(&topic, &group, config.start)
            .await?;
        debug!(topic = %topic, group = %group, consumer = %identity, "Consumer ready");
        Ok(Self {
            broker,
            topic,
            group,
            identity,
            config,
            replayed: Mutex::new(EntryId::ZERO),
        })
    }

    /// Topic being consumed.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Group this consumer belongs to.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// This instance's identity within the group.
    #[must_use]
    pub fn identity(&self) -> &ConsumerIdentity {
        &self.identity
    }

    /// Read up to `limit` entries (0 = all currently available) and run each
    /// through `handler`, acknowledging the ones it accepts.
    ///
    /// # Errors
    ///
    /// Only broker-level read failures and the read deadline. Per-entry
    /// problems are recorded in the returned report.
    pub async fn drain<H>(&self, limit: usize, handler: &H) -> Result<DrainReport, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let entries = self.read(ReadLimit::from_count(limit), None).await?;
        Ok(self.process_batch(entries, handler).await)
    }

    /// Like [`drain`](Self::drain), but the read is abandoned with
    /// [`QueueError::Cancelled`] once `shutdown` turns `true`. Entries already
    /// returned by the broker are still processed.
    pub async fn drain_until<H>(
        &self,
        limit: usize,
        handler: &H,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<DrainReport, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let entries = self
            .read(ReadLimit::from_count(limit), Some(shutdown))
            .await?;
        Ok(self.process_batch(entries, handler).await)
    }

    /// Read at most one entry and run it through `handler`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))` - handled and acknowledged
    /// - `Ok(None)` - nothing available
    /// - `Err(Malformed | Handler | Ack)` - the entry stays pending
    pub async fn subscribe<H>(&self, handler: &H) -> Result<Option<EntryId>, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let entries = self.read(ReadLimit::single(), None).await?;
        self.process_first(entries, handler).await
    }

    /// Like [`subscribe`](Self::subscribe), cancellable during the read.
    pub async fn subscribe_until<H>(
        &self,
        handler: &H,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<EntryId>, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let entries = self.read(ReadLimit::single(), Some(shutdown)).await?;
        self.process_first(entries, handler).await
    }

    /// The group's pending-entry summary, for diagnostics.
    pub async fn pending(&self) -> Result<PendingSummary, QueueError> {
        Ok(self.broker.pending(&self.topic, &self.group).await?)
    }

    async fn read(
        &self,
        limit: ReadLimit,
        shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Result<Vec<StreamEntry>, QueueError> {
        let read = async {
            let call = self.fetch(limit);
            match self.config.read_timeout {
                Some(deadline) => tokio::time::timeout(deadline, call)
                    .await
                    .map_err(|_| QueueError::Timeout(deadline))?
                    .map_err(QueueError::from),
                None => call.await.map_err(QueueError::from),
            }
        };

        let Some(shutdown) = shutdown else {
            return read.await;
        };
        if *shutdown.borrow() {
            return Err(QueueError::Cancelled);
        }
        tokio::select! {
            result = read => result,
            () = shutdown_signalled(shutdown) => Err(QueueError::Cancelled),
        }
    }

    /// Own pending entries after the replay position, topped up with new
    /// ones; new entries only (with `block`) once the replay runs dry.
    async fn fetch(&self, limit: ReadLimit) -> Result<Vec<StreamEntry>, BrokerError> {
        let after = *self.replayed.lock();
        let mut batch = self.read_group(ReadCursor::Pending(after), limit, None).await?;

        let Some(last) = batch.last().map(|entry| entry.id) else {
            *self.replayed.lock() = EntryId::ZERO;
            return self
                .read_group(ReadCursor::New, limit, self.config.block)
                .await;
        };
        *self.replayed.lock() = last;
        debug!(
            topic = %self.topic,
            group = %self.group,
            consumer = %self.identity,
            replayed = batch.len(),
            "Redelivering pending entries"
        );

        let room = match limit.count() {
            Some(max) => max.saturating_sub(batch.len()),
            None => usize::MAX,
        };
        if room > 0 {
            let top_up = match limit {
                ReadLimit::Unbounded => ReadLimit::Unbounded,
                ReadLimit::AtMost(_) => ReadLimit::from_count(room),
            };
            batch.extend(self.read_group(ReadCursor::New, top_up, None).await?);
        }
        Ok(batch)
    }

    async fn read_group(
        &self,
        cursor: ReadCursor,
        limit: ReadLimit,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, BrokerError> {
        self.broker
            .read_group(&self.topic, &self.group, &self.identity, cursor, limit, block)
            .await
    }

    async fn process_batch<H>(&self, entries: Vec<StreamEntry>, handler: &H) -> DrainReport
    where
        H: MessageHandler + ?Sized,
    {
        let mut report = DrainReport {
            delivered: entries.len(),
            ..DrainReport::default()
        };
        for entry in entries {
            match self.process(entry, handler).await {
                Ok(_) => report.acknowledged += 1,
                Err(err) => report.failures.extend(EntryFailure::from_error(&err)),
            }
        }
        report
    }

    async fn process_first<H>(
        &self,
        entries: Vec<StreamEntry>,
        handler: &H,
    ) -> Result<Option<EntryId>, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        match entries.into_iter().next() {
            Some(entry) => self.process(entry, handler).await.map(Some),
            None => Ok(None),
        }
    }

    /// Decode, handle, acknowledge. Any failure leaves the entry pending.
    async fn process<H>(&self, entry: StreamEntry, handler: &H) -> Result<EntryId, QueueError>
    where
        H: MessageHandler + ?Sized,
    {
        let id = entry.id;
        let result = async {
            let envelope = Envelope::from_fields(&entry.fields)
                .map_err(|source| QueueError::Malformed { id, source })?;
            handler
                .handle(envelope.payload())
                .await
                .map_err(|source| QueueError::Handler { id, source })?;
            self.broker
                .ack(&self.topic, &self.group, &id)
                .await
                .map_err(|source| QueueError::Ack { id, source })?;
            Ok::<_, QueueError>(id)
        }
        .await;

        match &result {
            Ok(_) => debug!(topic = %self.topic, group = %self.group, entry_id = %id, "Acknowledged"),
            Err(err) => warn!(
                topic = %self.topic,
                group = %self.group,
                consumer = %self.identity,
                entry_id = %id,
                error = %err,
                "Entry left pending"
            ),
        }
        result
    }
}

/// Resolves once the flag is `true`; never resolves if the sender is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Subscriber for Consumer {
    async fn subscribe(
        &self,
        handler: &dyn MessageHandler,
    ) -> Result<Option<EntryId>, QueueError> {
        Consumer::subscribe(self, handler).await
    }
}
