//! # In-Memory Broker
//!
//! A process-local log-structured broker with consumer groups.
//!
//! Each topic is an ordered map of entries plus a set of groups. A group
//! keeps a delivery cursor (`last_delivered`) and a pending-entry list
//! attributed per consumer. Reads move entries past the cursor into the
//! pending list; acks remove them. History reads hand a consumer its own
//! pending entries again and count each redelivery. Nothing is ever deleted
//! from a topic.
//!
//! Suitable for tests and single-process embedding. Fault injection
//! (`set_offline`, `fail_acks`) lets callers exercise connectivity and
//! acknowledgment failure paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::{
    BrokerError, BrokerErrorKind, ConsumerIdentity, EntryId, Fields, PendingSummary, ReadCursor,
    ReadLimit, StartPosition, StreamEntry,
};
use crate::ports::BrokerPort;

/// One delivered-but-unacknowledged entry.
#[derive(Debug, Clone)]
struct PendingEntry {
    consumer: String,
    delivery_count: u64,
}

#[derive(Debug, Default)]
struct Group {
    last_delivered: EntryId,
    pending: BTreeMap<EntryId, PendingEntry>,
}

#[derive(Debug, Default)]
struct Topic {
    entries: BTreeMap<EntryId, Fields>,
    last_id: EntryId,
    groups: HashMap<String, Group>,
}

impl Topic {
    fn next_id(&self) -> EntryId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        if now > self.last_id.ms {
            EntryId::new(now, 0)
        } else {
            self.last_id.successor()
        }
    }
}

/// In-memory implementation of [`BrokerPort`].
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, Topic>>,
    appended: Notify,
    offline: AtomicBool,
    fail_acks: AtomicBool,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing (or regaining) connectivity: while offline every
    /// command fails with a `Connection` error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every acknowledgment fail until reset.
    pub fn fail_acks(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Number of entries stored in a topic.
    #[must_use]
    pub fn topic_len(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, |t| t.entries.len())
    }

    /// How many times an entry has been delivered to the group, if pending.
    #[must_use]
    pub fn delivery_count(&self, topic: &str, group: &str, id: &EntryId) -> Option<u64> {
        let topics = self.topics.lock();
        topics
            .get(topic)?
            .groups
            .get(group)?
            .pending
            .get(id)
            .map(|p| p.delivery_count)
    }

    fn check_online(&self) -> Result<(), BrokerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BrokerError::connection("broker offline"));
        }
        Ok(())
    }

    fn no_group(topic: &str, group: &str) -> BrokerError {
        BrokerError::new(
            BrokerErrorKind::NoGroup,
            format!("no consumer group '{group}' on topic '{topic}'"),
        )
    }

    /// Redeliver up to `limit` of the consumer's own pending entries above
    /// `after`.
    fn take_pending(
        &self,
        topic: &str,
        group: &str,
        consumer: &ConsumerIdentity,
        after: EntryId,
        limit: ReadLimit,
    ) -> Result<Vec<StreamEntry>, BrokerError> {
        let mut topics = self.topics.lock();
        let t = topics
            .get_mut(topic)
            .ok_or_else(|| Self::no_group(topic, group))?;
        let g = t
            .groups
            .get_mut(group)
            .ok_or_else(|| Self::no_group(topic, group))?;

        let max = limit.count().unwrap_or(usize::MAX);
        let mut batch = Vec::new();
        for (id, pending) in g.pending.range_mut(after.successor()..) {
            if batch.len() == max {
                break;
            }
            if pending.consumer != consumer.as_str() {
                continue;
            }
            pending.delivery_count += 1;
            batch.push(StreamEntry {
                id: *id,
                fields: t.entries.get(id).cloned().unwrap_or_default(),
            });
        }
        Ok(batch)
    }

    /// Move up to `limit` undelivered entries into the consumer's pending list.
    fn take_undelivered(
        &self,
        topic: &str,
        group: &str,
        consumer: &ConsumerIdentity,
        limit: ReadLimit,
    ) -> Result<Vec<StreamEntry>, BrokerError> {
        let mut topics = self.topics.lock();
        let t = topics
            .get_mut(topic)
            .ok_or_else(|| Self::no_group(topic, group))?;
        let g = t
            .groups
            .get_mut(group)
            .ok_or_else(|| Self::no_group(topic, group))?;

        let max = limit.count().unwrap_or(usize::MAX);
        let batch: Vec<StreamEntry> = t
            .entries
            .range(g.last_delivered.successor()..)
            .take(max)
            .map(|(id, fields)| StreamEntry {
                id: *id,
                fields: fields.clone(),
            })
            .collect();

        for entry in &batch {
            g.pending.insert(
                entry.id,
                PendingEntry {
                    consumer: consumer.as_str().to_string(),
                    delivery_count: 1,
                },
            );
        }
        if let Some(last) = batch.last() {
            g.last_delivered = last.id;
        }
        Ok(batch)
    }
}

#[async_trait]
impl BrokerPort for InMemoryBroker {
    async fn append(&self, topic: &str, fields: Fields) -> Result<EntryId, BrokerError> {
        self.check_online()?;
        let id = {
            let mut topics = self.topics.lock();
            let t = topics.entry(topic.to_string()).or_default();
            let id = t.next_id();
            t.entries.insert(id, fields);
            t.last_id = id;
            id
        };
        self.appended.notify_waiters();
        debug!(topic, entry_id = %id, "Entry appended");
        Ok(id)
    }

    async fn create_group(
        &self,
        topic: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BrokerError> {
        self.check_online()?;
        let mut topics = self.topics.lock();
        let t = topics.entry(topic.to_string()).or_default();
        if t.groups.contains_key(group) {
            return Err(BrokerError::new(
                BrokerErrorKind::GroupExists,
                format!("consumer group '{group}' already exists"),
            ));
        }
        let last_delivered = match start {
            StartPosition::NewOnly => t.last_id,
            StartPosition::Beginning => EntryId::ZERO,
            StartPosition::After(id) => id,
        };
        t.groups.insert(
            group.to_string(),
            Group {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &ConsumerIdentity,
        cursor: ReadCursor,
        limit: ReadLimit,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, BrokerError> {
        self.check_online()?;
        if let ReadCursor::Pending(after) = cursor {
            return self.take_pending(topic, group, consumer, after, limit);
        }
        let deadline = block.map(|d| tokio::time::Instant::now() + d);

        loop {
            // Register interest before looking so an append between the
            // check and the wait is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.take_undelivered(topic, group, consumer, limit)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            let Some(deadline) = deadline else {
                return Ok(batch);
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
            self.check_online()?;
        }
    }

    async fn ack(&self, topic: &str, group: &str, id: &EntryId) -> Result<bool, BrokerError> {
        self.check_online()?;
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(BrokerError::connection("acknowledgment dropped"));
        }
        let mut topics = self.topics.lock();
        let g = topics
            .get_mut(topic)
            .and_then(|t| t.groups.get_mut(group))
            .ok_or_else(|| Self::no_group(topic, group))?;
        Ok(g.pending.remove(id).is_some())
    }

    async fn pending(&self, topic: &str, group: &str) -> Result<PendingSummary, BrokerError> {
        self.check_online()?;
        let topics = self.topics.lock();
        let g = topics
            .get(topic)
            .and_then(|t| t.groups.get(group))
            .ok_or_else(|| Self::no_group(topic, group))?;

        let mut per_consumer: BTreeMap<&str, u64> = BTreeMap::new();
        for entry in g.pending.values() {
            *per_consumer.entry(entry.consumer.as_str()).or_insert(0) += 1;
        }

        Ok(PendingSummary {
            count: g.pending.len() as u64,
            lowest: g.pending.keys().next().copied(),
            highest: g.pending.keys().next_back().copied(),
            consumers: per_consumer
                .into_iter()
                .map(|(name, count)| (name.to_string(), count))
                .collect(),
        })
    }
}
