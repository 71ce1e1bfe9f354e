//! # Delivery Scenarios
//!
//! One producer, one group. Covers provisioning idempotence, payload
//! fidelity, batch draining, what stays pending after each kind of
//! per-entry failure, and how pending entries come back.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use proptest::prelude::*;
    use stream_queue::{
        BrokerPort, Fields, FailureKind, GroupProvisioner, GroupStatus, InMemoryBroker,
        QueueError, StartPosition,
    };

    use super::super::support::{consumer, producer, RecordingHandler, GROUP, TOPIC};

    // =========================================================================
    // PROVISIONING
    // =========================================================================

    #[tokio::test]
    async fn test_ensure_group_twice_is_not_an_error() {
        let broker = Arc::new(InMemoryBroker::new());
        let provisioner = GroupProvisioner::new(broker.clone());

        for topic in ["a", "b"] {
            for group in ["g1", "g2"] {
                provisioner
                    .ensure_group(topic, group, StartPosition::NewOnly)
                    .await
                    .unwrap();
                let again = provisioner
                    .ensure_group(topic, group, StartPosition::NewOnly)
                    .await
                    .unwrap();
                assert_eq!(again, GroupStatus::AlreadyExists);
            }
        }
    }

    #[tokio::test]
    async fn test_producer_and_consumer_share_one_group() {
        let broker = Arc::new(InMemoryBroker::new());
        let _producer = producer(&broker).await;
        let _first = consumer(&broker, GROUP).await;
        let _second = consumer(&broker, GROUP).await;
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    #[tokio::test]
    async fn test_publish_then_drain_one_delivers_unchanged_payload() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;
        let payload = b"\x00binary\xffpayload".to_vec();

        producer.publish(&payload).await.unwrap();
        let handler = RecordingHandler::new();
        let report = consumer.drain(1, &handler).await.unwrap();

        assert_eq!(report.acknowledged, 1);
        assert_eq!(handler.accepted(), vec![payload]);
        assert_eq!(consumer.pending().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_drain_zero_takes_everything_available() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        for i in 0..5u8 {
            producer.publish(&[i]).await.unwrap();
        }
        let handler = RecordingHandler::new();
        let report = consumer.drain(0, &handler).await.unwrap();

        assert_eq!(report.delivered, 5);
        assert_eq!(report.acknowledged, 5);
        assert_eq!(handler.accepted().len(), 5);
    }

    #[tokio::test]
    async fn test_rejected_entry_stays_pending_while_rest_are_acked() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        producer.publish(b"a").await.unwrap();
        let rejected = producer.publish(b"b").await.unwrap();
        producer.publish(b"c").await.unwrap();

        let handler = RecordingHandler::rejecting([b"b"]);
        let report = consumer.drain(0, &handler).await.unwrap();

        assert_eq!(report.delivered, 3);
        assert_eq!(report.acknowledged, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, rejected);
        assert_eq!(report.failures[0].kind, FailureKind::Handler);
        assert_eq!(handler.accepted(), vec![b"a".to_vec(), b"c".to_vec()]);

        let pending = consumer.pending().await.unwrap();
        assert_eq!(pending.count, 1);
        assert_eq!(pending.lowest, Some(rejected));
        assert_eq!(pending.for_consumer(consumer.identity().as_str()), 1);
    }

    #[tokio::test]
    async fn test_rejected_entry_is_redelivered_until_accepted() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        let id = producer.publish(b"flaky").await.unwrap();
        let handler = RecordingHandler::failing_once([b"flaky"]);
        let first = consumer.drain(0, &handler).await.unwrap();
        assert_eq!(first.count(FailureKind::Handler), 1);
        assert_eq!(broker.delivery_count(TOPIC, GROUP, &id), Some(1));

        let second = consumer.drain(0, &handler).await.unwrap();
        assert_eq!(second.delivered, 1);
        assert_eq!(second.acknowledged, 1);
        assert_eq!(handler.attempts(), vec![b"flaky".to_vec(), b"flaky".to_vec()]);
        assert_eq!(handler.accepted(), vec![b"flaky".to_vec()]);
        assert!(consumer.pending().await.unwrap().is_empty());
        assert_eq!(broker.delivery_count(TOPIC, GROUP, &id), None);
    }

    #[tokio::test]
    async fn test_poison_entry_does_not_starve_new_entries() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        let poison = producer.publish(b"poison").await.unwrap();
        for seq in 0..5u8 {
            producer.publish(&[seq]).await.unwrap();
        }
        let handler = RecordingHandler::rejecting([b"poison"]);
        // Retries of the poison entry alternate with fresh entries.
        for _ in 0..12 {
            let _ = consumer.subscribe(&handler).await;
        }

        assert_eq!(
            handler.accepted(),
            (0..5u8).map(|seq| vec![seq]).collect::<Vec<_>>()
        );
        let pending = consumer.pending().await.unwrap();
        assert_eq!(pending.count, 1);
        assert_eq!(pending.lowest, Some(poison));
        assert_eq!(broker.delivery_count(TOPIC, GROUP, &poison), Some(7));
    }

    #[tokio::test]
    async fn test_malformed_entry_never_reaches_handler() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        let mut foreign = Fields::new();
        foreign.insert("payload".into(), Bytes::from_static(b"raw"));
        let foreign_id = broker.append(TOPIC, foreign).await.unwrap();
        producer.publish(b"ok").await.unwrap();

        let handler = RecordingHandler::new();
        let report = consumer.drain(0, &handler).await.unwrap();

        assert_eq!(report.count(FailureKind::Malformed), 1);
        assert_eq!(report.failures[0].id, foreign_id);
        assert_eq!(handler.attempts(), vec![b"ok".to_vec()]);
    }

    #[tokio::test]
    async fn test_ack_failure_leaves_handled_entry_pending() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;

        let first = producer.publish(b"first").await.unwrap();
        broker.fail_acks(true);
        let handler = RecordingHandler::new();
        let err = consumer.subscribe(&handler).await.unwrap_err();
        assert!(matches!(err, QueueError::Ack { .. }));
        assert_eq!(handler.accepted(), vec![b"first".to_vec()]);

        broker.fail_acks(false);
        let second = producer.publish(b"second").await.unwrap();
        // The handled-but-unacknowledged entry comes back first.
        assert_eq!(consumer.subscribe(&handler).await.unwrap(), Some(first));
        assert!(consumer.pending().await.unwrap().is_empty());
        assert_eq!(consumer.subscribe(&handler).await.unwrap(), Some(second));
        assert_eq!(
            handler.accepted(),
            vec![b"first".to_vec(), b"first".to_vec(), b"second".to_vec()]
        );
    }

    // =========================================================================
    // END-TO-END SCENARIO
    // =========================================================================

    #[tokio::test]
    async fn test_subscribe_then_batch_preserves_order() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let consumer = consumer(&broker, GROUP).await;
        let handler = RecordingHandler::new();

        let hello = producer.publish(b"hello").await.unwrap();
        assert_eq!(consumer.subscribe(&handler).await.unwrap(), Some(hello));

        producer.publish(b"a").await.unwrap();
        producer.publish(b"b").await.unwrap();
        let report = consumer.drain(0, &handler).await.unwrap();

        assert_eq!(report.acknowledged, 2);
        assert_eq!(
            handler.accepted(),
            vec![b"hello".to_vec(), b"a".to_vec(), b"b".to_vec()]
        );
        assert!(consumer.pending().await.unwrap().is_empty());
    }

    // =========================================================================
    // PAYLOAD FIDELITY
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_any_payload_survives_the_queue(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let received = runtime.block_on(async {
                let broker = Arc::new(InMemoryBroker::new());
                let producer = producer(&broker).await;
                let consumer = consumer(&broker, GROUP).await;
                producer.publish(&payload).await.unwrap();

                let handler = RecordingHandler::new();
                consumer.drain(1, &handler).await.unwrap();
                handler.accepted()
            });
            prop_assert_eq!(received, vec![payload]);
        }
    }
}
