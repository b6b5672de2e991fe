//! Storage and broker boundary of the dispatch engine.
//!
//! The engine only talks to these traits; `postgres` provides the production
//! implementation (Postgres for rows, Redis for pub/sub).

pub mod postgres;
pub mod pubsub;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use herald_common::types::{Channel, Message, MessageStatus, StatusKind, UserChannel};
use thiserror::Error;

pub use postgres::{PgMessageStore, PgUserDirectory};
pub use pubsub::RedisSubscription;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("subscription closed")]
    SubscriptionClosed,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable message and status storage plus the pub/sub primitive.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Append a status row.
    async fn create_status(
        &self,
        message_id: &str,
        status: StatusKind,
        description: &str,
    ) -> Result<(), StoreError>;

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, StoreError>;

    /// Most recent status row of a message.
    async fn find_last_status(&self, message_id: &str)
    -> Result<Option<MessageStatus>, StoreError>;

    /// ID of an earlier message with the same user, external ID, channel and
    /// template whose timestamp lies within `window` of `message.timestamp`.
    async fn find_duplicate(
        &self,
        message: &Message,
        window: TimeDelta,
    ) -> Result<Option<String>, StoreError>;

    /// Messages created strictly between the two instants that have not
    /// reached `sent` or `failed`.
    async fn find_in_flight(
        &self,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError>;

    async fn publish(&self, topic: &str, payload: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, topics: &[String]) -> Result<Box<dyn Subscription>, StoreError>;
}

/// A live subscription to one or more topics.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next `(topic, payload)` pair.
    async fn receive(&mut self) -> Result<(String, String), StoreError>;

    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Resolves users and their per-channel delivery settings.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user_id: i64) -> Result<bool, StoreError>;

    async fn find_recipient(
        &self,
        user_id: i64,
        channel: Channel,
    ) -> Result<Option<UserChannel>, StoreError>;
}
