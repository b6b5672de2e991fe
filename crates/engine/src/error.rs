use herald_common::error::AppError;
use herald_common::types::Channel;
use herald_notifier::NotifierError;
use herald_templates::TemplateError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors produced by the dispatch engine.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("messageId: invalid")]
    InvalidMessageId,

    #[error("messageId: invalid channel")]
    InvalidChannel,

    #[error("messageId: invalid message template")]
    InvalidTemplate,

    #[error("messageId: invalid user")]
    InvalidUser,

    #[error("messageId: invalid timestamp")]
    InvalidTimestamp,

    #[error("message not found")]
    MessageNotFound,

    #[error("user {user_id} has no {channel} channel configured")]
    RecipientNotFound { user_id: i64, channel: Channel },

    #[error("user {user_id} does not accept {channel} notifications")]
    NotifyDisabled { user_id: i64, channel: Channel },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Notifier(#[from] NotifierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Whether the caller supplied a malformed or unknown message ID.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DispatchError::InvalidMessageId
                | DispatchError::InvalidChannel
                | DispatchError::InvalidTemplate
                | DispatchError::InvalidUser
                | DispatchError::InvalidTimestamp
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Redis(e) => AppError::Redis(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        if err.is_validation() {
            return AppError::Validation(err.to_string());
        }

        match err {
            DispatchError::MessageNotFound => AppError::NotFound(err.to_string()),
            DispatchError::Store(e) => e.into(),
            DispatchError::Notifier(NotifierError::DriverNotFound(_)) => {
                AppError::Config(err.to_string())
            }
            DispatchError::Notifier(_) => AppError::Delivery(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}
