//! Idempotent (topic, group) provisioning.

use std::sync::Arc;
use tracing::info;

use crate::domain::{BrokerError, BrokerErrorKind, StartPosition};
use crate::ports::BrokerPort;

/// Outcome of [`GroupProvisioner::ensure_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// The group was created by this call.
    Created,
    /// The group was already there; nothing changed.
    AlreadyExists,
}

/// Makes sure a consumer group exists before anything reads or writes.
#[derive(Clone)]
pub struct GroupProvisioner {
    broker: Arc<dyn BrokerPort>,
}

impl GroupProvisioner {
    /// Create a provisioner over a broker.
    pub fn new(broker: Arc<dyn BrokerPort>) -> Self {
        Self { broker }
    }

    /// Create `topic` (if absent) and `group` on it at `start`.
    ///
    /// Calling this again for an existing group is a no-op. Any failure other
    /// than "group exists" is returned.
    pub async fn ensure_group(
        &self,
        topic: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<GroupStatus, BrokerError> {
        match self.broker.create_group(topic, group, start).await {
            Ok(()) => {
                info!(topic, group, start = %start.as_wire(), "Consumer group created");
                Ok(GroupStatus::Created)
            }
            Err(e) if e.kind() == BrokerErrorKind::GroupExists => {
                info!(topic, group, "Consumer group already exists");
                Ok(GroupStatus::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }
}
