//! # Fan-out Scenarios
//!
//! Publish/subscribe across groups: every group on a topic receives every
//! entry appended after it was created, independently of the others. Also
//! drives the queue through its trait objects and through the runtime's
//! consumer loop.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use queue_runtime::{run_consumer, ConsumeMode, ConsumerSettings, JobWorker, TestJob};
    use stream_queue::{
        Consumer, ConsumerConfig, InMemoryBroker, Publisher, StartPosition, Subscriber,
    };
    use tokio::sync::watch;

    use super::super::support::{consumer, producer, RecordingHandler, GROUP, TOPIC};

    #[tokio::test]
    async fn test_each_group_receives_every_entry() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let billing = consumer(&broker, "billing").await;
        let audit = consumer(&broker, "audit").await;

        producer.publish(b"order-1").await.unwrap();
        producer.publish(b"order-2").await.unwrap();

        let billing_seen = RecordingHandler::new();
        let audit_seen = RecordingHandler::rejecting([b"order-1"]);
        billing.drain(0, &billing_seen).await.unwrap();
        audit.drain(0, &audit_seen).await.unwrap();

        assert_eq!(billing_seen.accepted().len(), 2);
        assert_eq!(audit_seen.attempts().len(), 2);
        // A failure in one group does not affect another.
        assert!(billing.pending().await.unwrap().is_empty());
        assert_eq!(audit.pending().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_late_group_start_position() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        producer.publish(b"history").await.unwrap();

        let new_only = consumer(&broker, "late-new").await;
        let replay = Consumer::new(
            broker.clone(),
            TOPIC,
            "late-replay",
            ConsumerConfig {
                start: StartPosition::Beginning,
                ..ConsumerConfig::default()
            },
        )
        .await
        .unwrap();
        producer.publish(b"fresh").await.unwrap();

        let new_seen = RecordingHandler::new();
        let replay_seen = RecordingHandler::new();
        new_only.drain(0, &new_seen).await.unwrap();
        replay.drain(0, &replay_seen).await.unwrap();

        assert_eq!(new_seen.accepted(), vec![b"fresh".to_vec()]);
        assert_eq!(
            replay_seen.accepted(),
            vec![b"history".to_vec(), b"fresh".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_queue_through_trait_objects() {
        let broker = Arc::new(InMemoryBroker::new());
        let publisher: Arc<dyn Publisher> = Arc::new(producer(&broker).await);
        let subscriber: Arc<dyn Subscriber> = Arc::new(consumer(&broker, GROUP).await);
        let handler = RecordingHandler::new();

        assert_eq!(subscriber.subscribe(&handler).await.unwrap(), None);
        let id = publisher.publish(b"via-trait").await.unwrap();
        assert_eq!(subscriber.subscribe(&handler).await.unwrap(), Some(id));
        assert_eq!(handler.accepted(), vec![b"via-trait".to_vec()]);
    }

    #[tokio::test]
    async fn test_runtime_loop_consumes_demo_jobs() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        for seq in 1..=3 {
            let job = TestJob {
                data: format!("{seq} / scenario"),
            };
            producer.publish(&job.to_payload().unwrap()).await.unwrap();
        }

        let settings = ConsumerSettings {
            batch_limit: 0,
            block: Some(Duration::from_millis(20)),
            read_timeout: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(10),
        };
        let (stop, mut shutdown) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let _ = stop.send(true);
        });

        let worker = JobWorker::new();
        let summary = run_consumer(
            &consumer,
            &worker,
            ConsumeMode::Batch,
            &settings,
            &mut shutdown,
        )
        .await
        .unwrap();

        assert_eq!(worker.processed(), 3);
        assert_eq!(summary.acknowledged, 3);
        assert_eq!(summary.failed, 0);
    }
}
