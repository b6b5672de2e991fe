use async_trait::async_trait;
use herald_common::types::Channel;
use serde::Serialize;

use crate::{ChannelDriver, NotifierError, check_response};

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

/// Email driver backed by the Resend HTTP API. The recipient is an address.
pub struct EmailDriver {
    client: reqwest::Client,
    api_key: String,
    from: String,
    subject: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl EmailDriver {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
            subject: subject.into(),
        }
    }

    fn request<'a>(&'a self, recipient: &'a str, content: &'a str) -> SendEmailRequest<'a> {
        SendEmailRequest {
            from: &self.from,
            to: [recipient],
            subject: &self.subject,
            html: content,
        }
    }
}

#[async_trait]
impl ChannelDriver for EmailDriver {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), NotifierError> {
        if !recipient.contains('@') {
            return Err(NotifierError::InvalidRecipient {
                channel: Channel::Email,
                recipient: recipient.to_string(),
            });
        }

        let response = self
            .client
            .post(RESEND_EMAILS_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request(recipient, content))
            .send()
            .await?;

        check_response(Channel::Email, response).await
    }
}
