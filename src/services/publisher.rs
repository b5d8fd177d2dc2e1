use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    dto::events::{TournamentEvent, TournamentEventKind},
    error::DeliveryError,
    pubsub::{TopicKey, UpdateBus},
    state::{match_aggregate::MatchId, score::ScoreDocument},
};

/// Serializes committed state and hands it to the pub/sub transport.
///
/// Publishing happens after the write is committed and is never allowed to fail the
/// write: every error is logged here and returned only so callers can observe it.
#[derive(Clone)]
pub struct UpdatePublisher {
    bus: Arc<dyn UpdateBus>,
    timeout: Duration,
}

impl UpdatePublisher {
    /// Publisher over `bus`, bounding each publish by `timeout`.
    pub fn new(bus: Arc<dyn UpdateBus>, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    /// Publish the full score document on the match topic.
    pub async fn publish_score(
        &self,
        match_id: MatchId,
        score: &ScoreDocument,
    ) -> Result<(), DeliveryError> {
        let result = self.send(TopicKey::for_match(match_id), score).await;
        if let Err(err) = &result {
            warn!(match_id, error = %err, "failed to publish score update");
        }
        result
    }

    /// Publish a lifecycle event on the tournament topic.
    pub async fn publish_tournament_event<T>(
        &self,
        tournament_id: i64,
        kind: TournamentEventKind,
        data: &T,
    ) -> Result<(), DeliveryError>
    where
        T: Serialize,
    {
        let event = TournamentEvent {
            event_type: kind,
            data,
        };
        let result = self
            .send(TopicKey::for_tournament(tournament_id), &event)
            .await;
        if let Err(err) = &result {
            warn!(tournament_id, event = %kind, error = %err, "failed to publish tournament event");
        }
        result
    }

    async fn send<T>(&self, topic: TopicKey, value: &T) -> Result<(), DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        timeout(self.timeout, self.bus.publish(topic, payload))
            .await
            .map_err(|_| DeliveryError::Timeout)??;
        debug!(%topic, "published update");
        Ok(())
    }
}
