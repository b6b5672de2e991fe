use async_trait::async_trait;
use herald_common::types::Channel;
use serde::Serialize;

use crate::{ChannelDriver, NotifierError, check_response};

const WEBHOOK_PREFIXES: &[&str] = &[
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
];

/// Discord driver. The recipient is the user's incoming webhook URL.
pub struct DiscordDriver {
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    content: &'a str,
}

impl DiscordDriver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn is_webhook_url(recipient: &str) -> bool {
        WEBHOOK_PREFIXES
            .iter()
            .any(|prefix| recipient.starts_with(prefix))
    }
}

#[async_trait]
impl ChannelDriver for DiscordDriver {
    fn channel(&self) -> Channel {
        Channel::Discord
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), NotifierError> {
        // Only post to Discord itself; recipients are user-supplied.
        if !Self::is_webhook_url(recipient) {
            return Err(NotifierError::InvalidRecipient {
                channel: Channel::Discord,
                recipient: recipient.to_string(),
            });
        }

        let response = self
            .client
            .post(recipient)
            .json(&WebhookRequest { content })
            .send()
            .await?;

        check_response(Channel::Discord, response).await
    }
}
