//! Demo job payload and the worker that consumes it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use stream_queue::{HandlerError, MessageHandler};
use tracing::info;

/// The job the demo producer pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestJob {
    pub data: String,
}

impl TestJob {
    /// `"<seq> / <timestamp>"`.
    #[must_use]
    pub fn numbered(seq: u64, at: DateTime<Utc>) -> Self {
        Self {
            data: format!("{seq} / {}", at.to_rfc3339()),
        }
    }

    /// JSON encoding used as the queue payload.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a queue payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Decodes each payload as a [`TestJob`] and logs it.
///
/// Payloads that are not valid jobs are rejected, which leaves the entry
/// pending.
#[derive(Debug, Default)]
pub struct JobWorker {
    processed: AtomicU64,
}

impl JobWorker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs handled successfully so far.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageHandler for JobWorker {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let job = TestJob::from_payload(payload)?;
        info!(data = %job.data, "Job received");
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
