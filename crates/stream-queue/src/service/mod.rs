//! Service layer: producer, consumer, and group provisioning.

pub mod consumer;
pub mod producer;
pub mod provisioner;
pub mod report;

pub use consumer::{Consumer, ConsumerConfig, DEFAULT_READ_TIMEOUT};
pub use producer::Producer;
pub use provisioner::{GroupProvisioner, GroupStatus};
pub use report::{DrainReport, EntryFailure, FailureKind};
