//! Producer: wraps payloads in envelopes and appends them to a topic.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::provisioner::GroupProvisioner;
use crate::domain::{Envelope, EntryId, QueueError, StartPosition};
use crate::ports::{BrokerPort, Publisher};

/// Appends payloads to one topic.
///
/// No buffering, batching, or retry: each `publish` is exactly one append.
pub struct Producer {
    broker: Arc<dyn BrokerPort>,
    topic: String,
}

impl Producer {
    /// Create a producer for `topic`, provisioning `group` so entries
    /// published from now on are visible to it.
    pub async fn new(
        broker: Arc<dyn BrokerPort>,
        topic: impl Into<String>,
        group: &str,
    ) -> Result<Self, QueueError> {
        let topic = topic.into();
        GroupProvisioner::new(broker.clone())
            .ensure_group(&topic, group, StartPosition::NewOnly)
            .await?;
        Ok(Self { broker, topic })
    }

    /// The topic this producer appends to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wrap `payload` and append it.
    pub async fn publish(&self, payload: &[u8]) -> Result<EntryId, QueueError> {
        let fields = Envelope::new(payload).to_fields()?;
        let id = self.broker.append(&self.topic, fields).await?;
        debug!(topic = %self.topic, entry_id = %id, bytes = payload.len(), "Published");
        Ok(id)
    }
}

#[async_trait]
impl Publisher for Producer {
    async fn publish(&self, payload: &[u8]) -> Result<EntryId, QueueError> {
        Producer::publish(self, payload).await
    }
}
