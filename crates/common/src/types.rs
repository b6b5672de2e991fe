use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a name or numeric code does not match a registered variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Delivery medium. The numeric codes are part of the message ID format and
/// the pub/sub topic names, so they must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram = 1,
    Email = 2,
    Discord = 3,
}

impl Channel {
    /// Every registered channel, in code order.
    pub const ALL: [Channel; 3] = [Channel::Telegram, Channel::Email, Channel::Discord];

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|channel| i64::from(channel.code()) == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Telegram => "telegram",
            Channel::Email => "email",
            Channel::Discord => "discord",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "channel",
                value: s.to_string(),
            })
    }
}

impl TryFrom<i16> for Channel {
    type Error = UnknownVariant;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(code)).ok_or_else(|| UnknownVariant {
            kind: "channel",
            value: code.to_string(),
        })
    }
}

/// Logical message template. Codes are part of the message ID format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Receipt = 1,
}

impl Template {
    pub const ALL: [Template; 1] = [Template::Receipt];

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|template| i64::from(template.code()) == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Template::Receipt => "receipt",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|template| template.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "message template",
                value: s.to_string(),
            })
    }
}

impl TryFrom<i16> for Template {
    type Error = UnknownVariant;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(code)).ok_or_else(|| UnknownVariant {
            kind: "message template",
            value: code.to_string(),
        })
    }
}

/// Message lifecycle marker. Rows are appended, never updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    New,
    Sending,
    Sent,
    Failed,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::New => write!(f, "new"),
            StatusKind::Sending => write!(f, "sending"),
            StatusKind::Sent => write!(f, "sent"),
            StatusKind::Failed => write!(f, "failed"),
        }
    }
}

/// One logical notification, identified by its deterministic ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user_id: i64,
    pub channel: Channel,
    pub template: Template,
    /// Epoch milliseconds, right-padded to 13 digits.
    pub timestamp: i64,
    pub external_id: i64,
    pub params: serde_json::Value,
}

/// A row of a message's status history. The latest row is the current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageStatus {
    pub id: i64,
    pub message_id: String,
    pub status: StatusKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A user's delivery settings for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserChannel {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "i16")]
    pub channel: Channel,
    pub recipient: String,
    pub can_notify: bool,
}
