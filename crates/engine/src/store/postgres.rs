use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use herald_common::types::{Channel, Message, MessageStatus, StatusKind, Template, UserChannel};

use super::pubsub::RedisSubscription;
use super::{MessageStore, StoreError, Subscription, UserDirectory};

/// Postgres-backed message store publishing through Redis.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    redis: ConnectionManager,
    client: redis::Client,
}

/// Raw `messages` row.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: String,
    user_id: i64,
    external_id: i64,
    channel: i16,
    template: i16,
    timestamp: DateTime<Utc>,
    params: serde_json::Value,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            entity: "message",
            reason,
        };

        Ok(Message {
            channel: Channel::try_from(row.channel).map_err(|e| corrupt(e.to_string()))?,
            template: Template::try_from(row.template).map_err(|e| corrupt(e.to_string()))?,
            id: row.id,
            user_id: row.user_id,
            external_id: row.external_id,
            timestamp: row.timestamp.timestamp_millis(),
            params: row.params,
        })
    }
}

fn timestamp_of(message: &Message) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(message.timestamp).ok_or_else(|| StoreError::Corrupt {
        entity: "message",
        reason: format!("timestamp {} out of range", message.timestamp),
    })
}

impl PgMessageStore {
    /// `client` opens the dedicated pub/sub connections; `redis` serves publishes.
    pub fn new(pool: PgPool, redis: ConnectionManager, client: redis::Client) -> Self {
        Self {
            pool,
            redis,
            client,
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, user_id, external_id, channel, template, timestamp, params)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&message.id)
        .bind(message.user_id)
        .bind(message.external_id)
        .bind(message.channel.code())
        .bind(message.template.code())
        .bind(timestamp_of(message)?)
        .bind(&message.params)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_status(
        &self,
        message_id: &str,
        status: StatusKind,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO message_statuses (message_id, status, description) VALUES ($1, $2, $3)",
        )
        .bind(message_id)
        .bind(status)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, external_id, channel, template, timestamp, params
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }

    async fn find_last_status(
        &self,
        message_id: &str,
    ) -> Result<Option<MessageStatus>, StoreError> {
        let status: Option<MessageStatus> = sqlx::query_as(
            r#"
            SELECT id, message_id, status, description, created_at
            FROM message_statuses
            WHERE message_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }

    async fn find_duplicate(
        &self,
        message: &Message,
        window: TimeDelta,
    ) -> Result<Option<String>, StoreError> {
        let at = timestamp_of(message)?;

        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM messages
            WHERE user_id = $1
              AND external_id = $2
              AND channel = $3
              AND template = $4
              AND timestamp >= $5
              AND timestamp <= $6
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(message.user_id)
        .bind(message.external_id)
        .bind(message.channel.code())
        .bind(message.template.code())
        .bind(at - window)
        .bind(at + window)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_in_flight(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT m.id, m.user_id, m.external_id, m.channel, m.template, m.timestamp, m.params
            FROM messages m
            LEFT JOIN LATERAL (
                SELECT s.status
                FROM message_statuses s
                WHERE s.message_id = m.id
                ORDER BY s.created_at DESC, s.id DESC
                LIMIT 1
            ) last_status ON true
            WHERE m.created_at > $1
              AND m.created_at < $2
              AND (last_status.status IS NULL OR last_status.status IN ('new', 'sending'))
            ORDER BY m.created_at
            "#,
        )
        .bind(created_after)
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let mut redis = self.redis.clone();
        let receivers: i64 = redis.publish(topic, payload).await?;

        tracing::debug!(topic, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<Box<dyn Subscription>, StoreError> {
        let subscription = RedisSubscription::open(&self.client, topics).await?;
        Ok(Box::new(subscription))
    }
}

/// Resolves users through their configured `user_channels` rows.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    /// A user exists once it has at least one channel configured.
    async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_channels WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn find_recipient(
        &self,
        user_id: i64,
        channel: Channel,
    ) -> Result<Option<UserChannel>, StoreError> {
        let settings: Option<UserChannel> = sqlx::query_as(
            r#"
            SELECT id, user_id, channel, recipient, can_notify
            FROM user_channels
            WHERE user_id = $1 AND channel = $2
            "#,
        )
        .bind(user_id)
        .bind(channel.code())
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }
}
