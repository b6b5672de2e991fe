use async_trait::async_trait;
use herald_common::types::Channel;
use serde::Serialize;

use crate::{ChannelDriver, NotifierError, check_response};

/// Telegram Bot API driver. The recipient is a chat id.
pub struct TelegramDriver {
    client: reqwest::Client,
    host: String,
    bot_token: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramDriver {
    pub fn new(client: reqwest::Client, host: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
            bot_token: bot_token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://{}/bot{}/{}", self.host, self.bot_token, method)
    }
}

#[async_trait]
impl ChannelDriver for TelegramDriver {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), NotifierError> {
        let request = SendMessageRequest {
            chat_id: recipient,
            text: content,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        check_response(Channel::Telegram, response).await
    }
}
