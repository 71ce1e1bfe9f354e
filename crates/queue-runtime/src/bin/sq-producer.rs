//! sq-producer: pushes a numbered demo job onto a topic at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;

use queue_runtime::{init_logging, shutdown, RuntimeConfig, StreamArgs, TestJob};
use stream_queue::{Producer, RespBroker};

/// Publish demo jobs to a stream queue topic
#[derive(Parser, Debug)]
#[command(name = "sq-producer")]
#[command(about = "Publish demo jobs to a stream queue topic")]
struct Args {
    #[command(flatten)]
    stream: StreamArgs,

    /// Delay between jobs in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Stop after this many jobs (run until Ctrl-C when omitted)
    #[arg(long)]
    count: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let config = RuntimeConfig::from_env().context("invalid configuration")?;
    let broker = RespBroker::connect(config.broker.settings())
        .await
        .context("cannot reach broker")?;
    let producer = Producer::new(Arc::new(broker), args.stream.topic.clone(), &args.stream.group)
        .await
        .context("cannot provision consumer group")?;
    info!(topic = %args.stream.topic, group = %args.stream.group, "Producer started");

    let mut shutdown = shutdown::ctrl_c();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        seq += 1;
        let payload = TestJob::numbered(seq, Utc::now()).to_payload()?;
        let id = producer
            .publish(&payload)
            .await
            .with_context(|| format!("publishing job {seq}"))?;
        info!(seq, entry_id = %id, "Pushed job");

        if args.count.is_some_and(|limit| seq >= limit) {
            break;
        }
    }

    info!(pushed = seq, "Producer stopped");
    Ok(())
}
