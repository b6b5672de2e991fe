use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::PubSub;

use super::{StoreError, Subscription};

/// Subscription on a dedicated Redis pub/sub connection.
pub struct RedisSubscription {
    pubsub: PubSub,
    topics: Vec<String>,
}

impl RedisSubscription {
    pub async fn open(client: &redis::Client, topics: &[String]) -> Result<Self, StoreError> {
        let mut pubsub = client.get_async_pubsub().await?;
        for topic in topics {
            pubsub.subscribe(topic).await?;
        }

        tracing::info!(topics = ?topics, "Subscribed to message topics");
        Ok(Self {
            pubsub,
            topics: topics.to_vec(),
        })
    }
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn receive(&mut self) -> Result<(String, String), StoreError> {
        let mut messages = std::pin::pin!(self.pubsub.on_message());
        let msg = messages
            .next()
            .await
            .ok_or(StoreError::SubscriptionClosed)?;

        let payload: String = msg.get_payload()?;
        Ok((msg.get_channel_name().to_string(), payload))
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        let Self { mut pubsub, topics } = *self;
        for topic in &topics {
            pubsub.unsubscribe(topic).await?;
        }
        tracing::debug!(topics = ?topics, "Unsubscribed from message topics");
        Ok(())
    }
}
