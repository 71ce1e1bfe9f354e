//! The consumer run loop.

use stream_queue::{Consumer, DrainReport, MessageHandler, QueueError};
use tokio::sync::watch;
use tracing::debug;

use crate::config::ConsumerSettings;

/// How the loop reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeMode {
    /// `drain(batch_limit)` each iteration.
    Batch,
    /// `subscribe` one entry at a time.
    Single,
}

/// Totals across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reads: u64,
    pub delivered: u64,
    pub acknowledged: u64,
    pub failed: u64,
}

impl RunSummary {
    fn record(&mut self, report: &DrainReport) {
        self.delivered += report.delivered as u64;
        self.acknowledged += report.acknowledged as u64;
        self.failed += report.failures.len() as u64;
    }
}

/// Read and handle until `shutdown` turns `true`.
///
/// Per-entry failures are counted and the loop continues. Broker failures
/// and read deadlines end the loop with an error.
pub async fn run_consumer<H>(
    consumer: &Consumer,
    handler: &H,
    mode: ConsumeMode,
    settings: &ConsumerSettings,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<RunSummary, QueueError>
where
    H: MessageHandler + ?Sized,
{
    let mut summary = RunSummary::default();
    loop {
        let outcome = match mode {
            ConsumeMode::Batch => consumer
                .drain_until(settings.batch_limit, handler, shutdown)
                .await
                .map(|report| {
                    summary.record(&report);
                    report.delivered
                }),
            ConsumeMode::Single => match consumer.subscribe_until(handler, shutdown).await {
                Ok(Some(_)) => {
                    summary.delivered += 1;
                    summary.acknowledged += 1;
                    Ok(1)
                }
                Ok(None) => Ok(0),
                Err(e) if e.entry_id().is_some() => {
                    summary.delivered += 1;
                    summary.failed += 1;
                    Ok(1)
                }
                Err(e) => Err(e),
            },
        };

        let delivered = match outcome {
            Ok(n) => n,
            Err(QueueError::Cancelled) => break,
            Err(e) => return Err(e),
        };
        summary.reads += 1;

        if delivered == 0 {
            debug!(backoff = ?settings.idle_backoff, "Nothing to consume");
            tokio::select! {
                () = tokio::time::sleep(settings.idle_backoff) => {}
                _ = shutdown.changed() => break,
            }
        }
    }
    Ok(summary)
}
