//! Channel drivers that deliver rendered notifications:
//! - Telegram (Bot API `sendMessage`)
//! - Email (Resend HTTP API)
//! - Discord (incoming webhooks)
//!
//! Drivers are looked up by `Channel` through a `DriverRegistry` populated
//! once from configuration at startup.

pub mod discord;
pub mod email;
pub mod registry;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use herald_common::types::Channel;
use thiserror::Error;

pub use registry::DriverRegistry;

/// Timeout applied to every outgoing delivery request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("channel driver not found: {0}")]
    DriverNotFound(Channel),

    #[error("invalid {channel} recipient '{recipient}'")]
    InvalidRecipient { channel: Channel, recipient: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{channel} API rejected the message ({status}): {body}")]
    Rejected {
        channel: Channel,
        status: u16,
        body: String,
    },
}

/// Delivery capability for one channel.
#[async_trait]
pub trait ChannelDriver: Send + Sync {
    /// The channel this driver delivers to.
    fn channel(&self) -> Channel;

    /// Deliver `content` to `recipient` (chat id, email address, webhook URL).
    async fn send(&self, recipient: &str, content: &str) -> Result<(), NotifierError>;
}

/// Turn a non-success HTTP response into `NotifierError::Rejected`.
pub(crate) async fn check_response(
    channel: Channel,
    response: reqwest::Response,
) -> Result<(), NotifierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(channel = %channel, status = status.as_u16(), "Delivery rejected");
    Err(NotifierError::Rejected {
        channel,
        status: status.as_u16(),
        body,
    })
}
