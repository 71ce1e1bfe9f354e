//! sq-consumer: consumes demo jobs from a topic as one member of a group.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use queue_runtime::{
    init_logging, run_consumer, shutdown, ConsumeMode, JobWorker, RuntimeConfig, StreamArgs,
};
use stream_queue::{Consumer, RespBroker};

/// Consume demo jobs from a stream queue topic
#[derive(Parser, Debug)]
#[command(name = "sq-consumer")]
#[command(about = "Consume demo jobs from a stream queue topic")]
struct Args {
    #[command(flatten)]
    stream: StreamArgs,

    /// Read one entry at a time instead of draining batches
    #[arg(long)]
    single: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let config = RuntimeConfig::from_env().context("invalid configuration")?;
    let broker = RespBroker::connect(config.broker.settings())
        .await
        .context("cannot reach broker")?;
    let consumer = Consumer::new(
        Arc::new(broker),
        args.stream.topic.clone(),
        args.stream.group.clone(),
        config.consumer.consumer_config(),
    )
    .await
    .context("cannot provision consumer group")?;
    info!(
        topic = %args.stream.topic,
        group = %args.stream.group,
        consumer = %consumer.identity(),
        "Consumer started"
    );

    let mode = if args.single {
        ConsumeMode::Single
    } else {
        ConsumeMode::Batch
    };
    let worker = JobWorker::new();
    let mut shutdown = shutdown::ctrl_c();

    let summary = run_consumer(&consumer, &worker, mode, &config.consumer, &mut shutdown)
        .await
        .context("consumer loop failed")?;
    info!(
        reads = summary.reads,
        acknowledged = summary.acknowledged,
        failed = summary.failed,
        "Consumer stopped"
    );
    Ok(())
}
