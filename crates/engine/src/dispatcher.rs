//! Message dispatcher: accepts sends and runs the delivery pipeline.
//!
//! `send` validates an ID, suppresses near-duplicates, persists the message
//! with a `new` status and publishes the ID on its channel topic. The
//! delivery pipeline (`deliver`) is shared by the channel workers and the
//! reconciliation sweeper.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use herald_common::types::{Channel, Message, MessageStatus, StatusKind, Template};
use herald_notifier::DriverRegistry;
use herald_templates::TemplateRegistry;

use crate::error::DispatchError;
use crate::message_id;
use crate::store::{MessageStore, UserDirectory};
use crate::topic;

/// Submissions of the same logical message within this many minutes of each
/// other collapse into one.
pub const DUPLICATE_WINDOW_MINUTES: i64 = 5;

/// Default pause after a failed pub/sub receive.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Dispatch engine handle. Cheap to clone; clones share all collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) store: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    drivers: Arc<DriverRegistry>,
    templates: Arc<TemplateRegistry>,
    pub(crate) retry_backoff: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        drivers: DriverRegistry,
        templates: TemplateRegistry,
    ) -> Self {
        Self {
            store,
            users,
            drivers: Arc::new(drivers),
            templates: Arc::new(templates),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override the pause between failed pub/sub receives.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Build the deterministic ID for a message.
    pub fn generate_id(
        &self,
        channel: Channel,
        template: Template,
        user_id: i64,
        timestamp: i64,
        external_id: i64,
    ) -> String {
        message_id::generate(channel, template, user_id, timestamp, external_id)
    }

    /// Decode and fully validate an ID: format, registry membership, user
    /// existence and timestamp window.
    pub async fn parse_id(&self, id: &str) -> Result<Message, DispatchError> {
        let message = message_id::decode(id)?;

        if !self.users.user_exists(message.user_id).await? {
            return Err(DispatchError::InvalidUser);
        }

        message_id::check_timestamp(message.timestamp, Utc::now())?;
        Ok(message)
    }

    pub async fn validate_id(&self, id: &str) -> Result<(), DispatchError> {
        self.parse_id(id).await.map(|_| ())
    }

    /// Accept a message for delivery and return its canonical ID.
    ///
    /// When a near-duplicate exists, its ID is returned and nothing is
    /// written. The message, status and publish writes are not transactional;
    /// partial writes are picked up by the sweeper.
    pub async fn send(&self, id: &str, params: serde_json::Value) -> Result<String, DispatchError> {
        let mut message = self.parse_id(id).await?;
        message.params = params;

        let window = TimeDelta::minutes(DUPLICATE_WINDOW_MINUTES);
        if let Some(existing) = self.store.find_duplicate(&message, window).await? {
            tracing::info!(
                message_id = %message.id,
                existing_id = %existing,
                "Duplicate submission, returning existing message"
            );
            return Ok(existing);
        }

        self.store.create_message(&message).await?;
        self.store
            .create_status(&message.id, StatusKind::New, "")
            .await?;
        self.store
            .publish(&topic::pubsub_key(message.channel), &message.id)
            .await?;

        tracing::info!(
            message_id = %message.id,
            channel = %message.channel,
            template = %message.template,
            "Message accepted"
        );

        Ok(message.id)
    }

    /// Latest status row of a message.
    pub async fn get_status(&self, id: &str) -> Result<MessageStatus, DispatchError> {
        self.validate_id(id).await?;

        self.store
            .find_last_status(id)
            .await?
            .ok_or(DispatchError::MessageNotFound)
    }

    /// Render and deliver one message, recording `sending` then `sent`.
    ///
    /// Failures after `sending` write no further status, leaving the message
    /// for the sweeper.
    pub async fn deliver(&self, message: &Message) -> Result<(), DispatchError> {
        tracing::debug!(message_id = %message.id, channel = %message.channel, "Sending message");
        self.record_status(&message.id, StatusKind::Sending, "Sending a message")
            .await;

        let driver = self.drivers.get(message.channel)?;

        let settings = self
            .users
            .find_recipient(message.user_id, message.channel)
            .await?
            .ok_or(DispatchError::RecipientNotFound {
                user_id: message.user_id,
                channel: message.channel,
            })?;
        if !settings.can_notify {
            return Err(DispatchError::NotifyDisabled {
                user_id: message.user_id,
                channel: message.channel,
            });
        }

        let content = self
            .templates
            .render(message.template, &message.params, message.channel)?;
        driver.send(&settings.recipient, &content).await?;

        self.record_status(&message.id, StatusKind::Sent, "Message sent")
            .await;
        tracing::info!(message_id = %message.id, channel = %message.channel, "Message sent");

        Ok(())
    }

    /// Append a status row, logging instead of failing.
    pub(crate) async fn record_status(&self, message_id: &str, status: StatusKind, description: &str) {
        if let Err(e) = self
            .store
            .create_status(message_id, status, description)
            .await
        {
            tracing::error!(
                message_id,
                status = %status,
                description,
                error = %e,
                "Failed to record message status"
            );
        }
    }
}
