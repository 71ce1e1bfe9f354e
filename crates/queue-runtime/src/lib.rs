//! # Queue Runtime
//!
//! Process bootstrap around `stream-queue`.
//!
//! ## Modules
//!
//! - `config` - environment configuration (`REDIS_*`, `SQ_*`)
//! - `logging` - tracing subscriber with `RUST_LOG` filtering
//! - `cli` - arguments shared by `sq-producer` and `sq-consumer`
//! - `jobs` - the demo job payload and its worker
//! - `runner` - the consumer loop
//! - `shutdown` - Ctrl-C to `watch` flag
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments, initialize logging
//! 2. Load configuration from the environment
//! 3. Connect to the broker (PING under the connect deadline)
//! 4. Provision the consumer group
//! 5. Run until Ctrl-C

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod runner;
pub mod shutdown;

pub use cli::{StreamArgs, DEFAULT_GROUP, DEFAULT_TOPIC};
pub use config::{BrokerConfig, ConfigError, ConsumerSettings, RuntimeConfig};
pub use jobs::{JobWorker, TestJob};
pub use logging::init_logging;
pub use runner::{run_consumer, ConsumeMode, RunSummary};
