//! # Concurrency Scenarios
//!
//! Several producers appending at once while competing consumers of one
//! group drain. Every published entry must be handled exactly once on the
//! non-failure path. On the failure path every entry is either handled or
//! observable as pending, and transient failures are retried to completion.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use stream_queue::{Consumer, InMemoryBroker};
    use tokio::task::JoinHandle;

    use super::super::support::{consumer, producer, RecordingHandler, GROUP, TOPIC};

    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 25;

    fn payload(producer: usize, seq: usize) -> Vec<u8> {
        format!("{producer}:{seq}").into_bytes()
    }

    async fn spawn_producers(broker: &Arc<InMemoryBroker>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(PRODUCERS);
        for p in 0..PRODUCERS {
            let producer = producer(broker).await;
            tasks.push(tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    producer.publish(&payload(p, seq)).await.unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        tasks
    }

    fn spawn_consumer(
        consumer: Consumer,
        handler: Arc<RecordingHandler>,
        done: Arc<AtomicBool>,
    ) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut delivered = 0;
            loop {
                // Sample before reading: an empty read after this is final.
                let finished = done.load(Ordering::SeqCst);
                let report = consumer.drain(10, &*handler).await.unwrap();
                delivered += report.delivered;
                if report.is_empty() {
                    if finished {
                        return delivered;
                    }
                    tokio::task::yield_now().await;
                }
            }
        })
    }

    async fn run(handler: Arc<RecordingHandler>) -> (Arc<InMemoryBroker>, usize) {
        let broker = Arc::new(InMemoryBroker::new());
        let done = Arc::new(AtomicBool::new(false));

        let consumers = vec![
            spawn_consumer(consumer(&broker, GROUP).await, handler.clone(), done.clone()),
            spawn_consumer(consumer(&broker, GROUP).await, handler.clone(), done.clone()),
        ];

        for task in spawn_producers(&broker).await {
            task.await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let mut delivered = 0;
        for task in consumers {
            delivered += task.await.unwrap();
        }
        (broker, delivered)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_loss_and_no_duplicates_without_failures() {
        let handler = Arc::new(RecordingHandler::new());
        let (broker, delivered) = run(handler.clone()).await;

        let total = PRODUCERS * PER_PRODUCER;
        assert_eq!(broker.topic_len(TOPIC), total);
        assert_eq!(delivered, total);

        let accepted = handler.accepted();
        assert_eq!(accepted.len(), total);
        let unique: HashSet<_> = accepted.into_iter().collect();
        let expected: HashSet<_> = (0..PRODUCERS)
            .flat_map(|p| (0..PER_PRODUCER).map(move |s| payload(p, s)))
            .collect();
        assert_eq!(unique, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_are_accounted_as_pending() {
        let rejected: Vec<Vec<u8>> = (0..PRODUCERS)
            .flat_map(|p| (0..PER_PRODUCER).step_by(7).map(move |s| payload(p, s)))
            .collect();
        let handler = Arc::new(RecordingHandler::rejecting(rejected.iter()));
        let (broker, delivered) = run(handler.clone()).await;

        let total = PRODUCERS * PER_PRODUCER;
        // Rejected entries are redelivered, so some are seen more than once.
        assert!(delivered > total);

        let observer = consumer(&broker, GROUP).await;
        let pending = observer.pending().await.unwrap();
        assert_eq!(pending.count as usize, rejected.len());
        assert_eq!(handler.accepted().len() + pending.count as usize, total);

        let attempts = handler.attempts();
        for payload in &rejected {
            assert!(attempts.iter().filter(|a| *a == payload).count() >= 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transient_failures_are_retried_to_completion() {
        let flaky: Vec<Vec<u8>> = (0..PRODUCERS)
            .flat_map(|p| (0..PER_PRODUCER).step_by(5).map(move |s| payload(p, s)))
            .collect();
        let handler = Arc::new(RecordingHandler::failing_once(flaky.iter()));
        let (broker, delivered) = run(handler.clone()).await;

        let total = PRODUCERS * PER_PRODUCER;
        assert_eq!(delivered, total + flaky.len());
        assert_eq!(handler.attempts().len(), total + flaky.len());

        let accepted = handler.accepted();
        assert_eq!(accepted.len(), total);
        let unique: HashSet<_> = accepted.into_iter().collect();
        assert_eq!(unique.len(), total);

        let observer = consumer(&broker, GROUP).await;
        assert!(observer.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_competing_consumers_split_entries() {
        let broker = Arc::new(InMemoryBroker::new());
        let producer = producer(&broker).await;
        let first = consumer(&broker, GROUP).await;
        let second = consumer(&broker, GROUP).await;

        for i in 0..4u8 {
            producer.publish(&[i]).await.unwrap();
        }

        let a = RecordingHandler::new();
        let b = RecordingHandler::new();
        assert_eq!(first.drain(2, &a).await.unwrap().delivered, 2);
        assert_eq!(second.drain(0, &b).await.unwrap().delivered, 2);
        assert_eq!(a.accepted(), vec![vec![0], vec![1]]);
        assert_eq!(b.accepted(), vec![vec![2], vec![3]]);
        assert_ne!(first.identity(), second.identity());
    }
}
