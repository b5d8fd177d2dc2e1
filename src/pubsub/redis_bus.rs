use futures::{StreamExt, future::BoxFuture};
use redis::{AsyncCommands, Client, RedisError, aio::MultiplexedConnection};
use tracing::warn;

use super::{BusError, BusMessage, MessageStream, TopicKey, UpdateBus};

impl From<RedisError> for BusError {
    fn from(err: RedisError) -> Self {
        BusError::unavailable(err.to_string(), err)
    }
}

/// Redis pub/sub transport shared by every process of a deployment.
///
/// Publishing goes through one multiplexed connection; each pattern subscription opens its
/// own dedicated connection because Redis puts subscribed connections into push mode.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: MultiplexedConnection,
}

impl RedisBus {
    /// Open the client and the shared publishing connection.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = Client::open(url)?;
        let publisher = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { client, publisher })
    }
}

impl UpdateBus for RedisBus {
    fn publish(&self, topic: TopicKey, payload: String) -> BoxFuture<'static, Result<(), BusError>> {
        let mut conn = self.publisher.clone();
        Box::pin(async move {
            conn.publish::<_, _, i64>(topic.to_string(), payload)
                .await
                .map_err(BusError::from)?;
            Ok(())
        })
    }

    fn psubscribe(&self, pattern: String) -> BoxFuture<'static, Result<MessageStream, BusError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut pubsub = client.get_async_connection().await?.into_pubsub();
            pubsub.psubscribe(&pattern).await?;

            let stream = pubsub.into_on_message().filter_map(|msg| {
                let message = match msg.get_payload::<String>() {
                    Ok(payload) => Some(BusMessage {
                        channel: msg.get_channel_name().to_string(),
                        payload,
                    }),
                    Err(err) => {
                        warn!(
                            channel = msg.get_channel_name(),
                            error = %err,
                            "dropping pub/sub message with undecodable payload"
                        );
                        None
                    }
                };
                futures::future::ready(message)
            });
            Ok(stream.boxed())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, Result<(), BusError>> {
        let mut conn = self.publisher.clone();
        Box::pin(async move {
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map_err(BusError::from)?;
            Ok(())
        })
    }
}
