use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    pubsub::{BusMessage, TopicKey, TopicNamespace, TopicParseError},
    state::{
        SharedState,
        registry::{BroadcastReport, ConnectionRegistry},
    },
};

/// Forward every match-topic message to the viewers of that match, forever.
///
/// The subscription is re-established with exponential backoff whenever the transport
/// refuses it or the message stream ends.
pub async fn run(state: SharedState) {
    let bus = state.bus();
    let pattern = TopicNamespace::Match.pattern();
    let mut backoff = Backoff::new(
        state.config().bridge_initial_backoff,
        state.config().bridge_max_backoff,
    );

    loop {
        match bus.psubscribe(pattern.clone()).await {
            Ok(mut messages) => {
                info!(%pattern, "subscription bridge listening");
                backoff.reset();
                while let Some(message) = messages.next().await {
                    if let Err(err) = dispatch(state.registry(), &message) {
                        warn!(channel = %message.channel, error = %err, "skipping message with malformed topic");
                    }
                }
                warn!(%pattern, "subscription stream ended; resubscribing");
            }
            Err(err) => {
                warn!(%pattern, error = %err, "failed to subscribe to match topics");
            }
        }

        let delay = backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "waiting before resubscribing");
        sleep(delay).await;
    }
}

/// Route one pub/sub message to the registry.
pub fn dispatch(
    registry: &ConnectionRegistry,
    message: &BusMessage,
) -> Result<BroadcastReport, TopicParseError> {
    let topic = TopicKey::parse(&message.channel)?;
    if topic.namespace() != TopicNamespace::Match {
        return Err(TopicParseError::UnknownNamespace(message.channel.clone()));
    }
    Ok(registry.broadcast(topic.id(), &message.payload))
}

/// Doubling delay with a little jitter so replicas do not reconnect in lockstep.
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }

    fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        let spread = (base.as_millis() / 4) as u64;
        base + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}
