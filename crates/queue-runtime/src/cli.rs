//! Command-line arguments shared by the binaries.

use clap::Args;

/// Topic used when `--topic` is not given.
pub const DEFAULT_TOPIC: &str = "test-stream";

/// Group used when `--group` is not given.
pub const DEFAULT_GROUP: &str = "my-test-group";

/// Which stream and consumer group to work on.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StreamArgs {
    /// Topic (stream key)
    #[arg(long, default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Consumer group name
    #[arg(long, default_value = DEFAULT_GROUP)]
    pub group: String,
}
