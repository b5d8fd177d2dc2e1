/// In-process transport backed by a Tokio broadcast channel.
pub mod memory;
/// Redis pub/sub transport.
#[cfg(feature = "redis-bus")]
pub mod redis_bus;
/// Topic key format shared by every component.
pub mod topic;

use std::error::Error;

use futures::{future::BoxFuture, stream::BoxStream};
use thiserror::Error;

pub use self::topic::{TopicKey, TopicNamespace, TopicParseError};

/// Message received through a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete channel the message was published on.
    pub channel: String,
    /// Raw message body.
    pub payload: String,
}

/// Stream of pattern messages. The stream ends when the transport drops the subscription.
pub type MessageStream = BoxStream<'static, BusMessage>;

/// Error raised by pub/sub transports.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport could not serve the call.
    #[error("pub/sub transport unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl BusError {
    /// Construct an unavailable error from any transport failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        BusError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Process-wide publish/subscribe transport with pattern subscriptions.
pub trait UpdateBus: Send + Sync {
    /// Publish `payload` on the channel named by `topic`.
    fn publish(&self, topic: TopicKey, payload: String) -> BoxFuture<'static, Result<(), BusError>>;
    /// Subscribe to every channel matching `pattern` (`prefix*` or an exact channel name).
    fn psubscribe(&self, pattern: String) -> BoxFuture<'static, Result<MessageStream, BusError>>;
    /// Round trip to the transport.
    fn health_check(&self) -> BoxFuture<'static, Result<(), BusError>>;
}
