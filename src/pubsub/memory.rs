use futures::{StreamExt, future::BoxFuture};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, warn};

use super::{BusError, BusMessage, MessageStream, TopicKey, UpdateBus, topic::pattern_matches};

const DEFAULT_CAPACITY: usize = 256;

/// Single-process bus used when no external broker is configured.
pub struct MemoryBus {
    sender: broadcast::Sender<BusMessage>,
}

impl MemoryBus {
    /// Construct a bus whose subscribers may lag by up to `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl UpdateBus for MemoryBus {
    fn publish(&self, topic: TopicKey, payload: String) -> BoxFuture<'static, Result<(), BusError>> {
        let message = BusMessage {
            channel: topic.to_string(),
            payload,
        };
        // No subscriber is not an error for a broadcast transport.
        if self.sender.send(message).is_err() {
            debug!(%topic, "published with no active subscribers");
        }
        Box::pin(async { Ok(()) })
    }

    fn psubscribe(&self, pattern: String) -> BoxFuture<'static, Result<MessageStream, BusError>> {
        let receiver = self.sender.subscribe();
        Box::pin(async move {
            let stream = BroadcastStream::new(receiver).filter_map(move |item| {
                let matched = match item {
                    Ok(message) if pattern_matches(&pattern, &message.channel) => Some(message),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, pattern = %pattern, "subscriber lagged; messages dropped");
                        None
                    }
                };
                futures::future::ready(matched)
            });
            Ok(stream.boxed())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, Result<(), BusError>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::pubsub::TopicNamespace;

    #[tokio::test]
    async fn pattern_subscriber_receives_only_matching_topics() {
        let bus = MemoryBus::default();
        let mut stream = bus
            .psubscribe(TopicNamespace::Match.pattern())
            .await
            .unwrap();

        bus.publish(TopicKey::for_tournament(1), "ignored".into())
            .await
            .unwrap();
        bus.publish(TopicKey::for_match(5), "{\"runs\":4}".into())
            .await
            .unwrap();

        let message = timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.channel, "match-scope:5");
        assert_eq!(message.payload, "{\"runs\":4}");
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = MemoryBus::new(4);
        assert!(
            bus.publish(TopicKey::for_match(1), "{}".into())
                .await
                .is_ok()
        );
    }
}
