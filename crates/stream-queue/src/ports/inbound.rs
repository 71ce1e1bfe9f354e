//! # Inbound Ports
//!
//! Driving API exposed to applications: publishing payloads, subscribing to
//! them, and the handler callback invoked per delivered payload.
//!
//! Handlers may run more than once for the same payload (at-least-once
//! delivery), so they must be idempotent.

use async_trait::async_trait;

use crate::domain::{EntryId, HandlerError, QueueError};

/// Callback invoked with each delivered payload.
///
/// Returning `Ok` acknowledges the entry; returning `Err` leaves it pending
/// for redelivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one payload.
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Adapter turning a synchronous closure into a [`MessageHandler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a handler.
///
/// ```rust,ignore
/// let handler = handler_fn(|payload| {
///     println!("{} bytes", payload.len());
///     Ok(())
/// });
/// consumer.drain(0, &handler).await?;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&[u8]) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&[u8]) -> Result<(), HandlerError> + Send + Sync,
{
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        (self.0)(payload)
    }
}

/// Publishing side of the queue.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Append a payload to the topic.
    async fn publish(&self, payload: &[u8]) -> Result<EntryId, QueueError>;
}

/// Single-message subscription side of the queue.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Read one entry and run `handler` on it.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))` - the entry was handled and acknowledged
    /// - `Ok(None)` - nothing was available within the read window
    /// - `Err(_)` - the entry (if any) was left pending
    async fn subscribe(&self, handler: &dyn MessageHandler)
        -> Result<Option<EntryId>, QueueError>;
}
