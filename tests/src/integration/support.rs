//! Shared fixtures for the scenarios.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use stream_queue::{
    Consumer, ConsumerConfig, HandlerError, InMemoryBroker, MessageHandler, Producer,
};

pub const TOPIC: &str = "test-stream";
pub const GROUP: &str = "my-test-group";

/// Records every payload it sees; rejects the ones it was told to, either
/// always or only on their first attempt.
#[derive(Default)]
pub struct RecordingHandler {
    attempts: Mutex<Vec<Vec<u8>>>,
    accepted: Mutex<Vec<Vec<u8>>>,
    reject: HashSet<Vec<u8>>,
    first_attempt_only: bool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        Self {
            reject: payloads.into_iter().map(|p| p.as_ref().to_vec()).collect(),
            ..Self::default()
        }
    }

    /// Reject each listed payload once, then accept it on redelivery.
    pub fn failing_once<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        Self {
            first_attempt_only: true,
            ..Self::rejecting(payloads)
        }
    }

    pub fn attempts(&self) -> Vec<Vec<u8>> {
        self.attempts.lock().clone()
    }

    pub fn accepted(&self) -> Vec<Vec<u8>> {
        self.accepted.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let seen_before = {
            let mut attempts = self.attempts.lock();
            let seen = attempts.iter().any(|p| p.as_slice() == payload);
            attempts.push(payload.to_vec());
            seen
        };
        let retry_allowed = self.first_attempt_only && seen_before;
        if self.reject.contains(payload) && !retry_allowed {
            return Err(format!("rejected {} bytes", payload.len()).into());
        }
        self.accepted.lock().push(payload.to_vec());
        Ok(())
    }
}

pub async fn producer(broker: &Arc<InMemoryBroker>) -> Producer {
    Producer::new(broker.clone(), TOPIC, GROUP).await.unwrap()
}

pub async fn consumer(broker: &Arc<InMemoryBroker>, group: &str) -> Consumer {
    Consumer::new(broker.clone(), TOPIC, group, ConsumerConfig::default())
        .await
        .unwrap()
}
