//! User channel service: CRUD for per-user delivery settings.
//!
//! A user is known to the dispatcher once it has at least one row here.

use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::{Channel, UserChannel};

pub struct UserChannelService;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserChannelParams {
    pub user_id: i64,
    pub channel: String,
    pub recipient: String,
    #[serde(default = "default_can_notify")]
    pub can_notify: bool,
}

fn default_can_notify() -> bool {
    true
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserChannelParams {
    pub recipient: Option<String>,
    pub can_notify: Option<bool>,
}

fn conflict(err: sqlx::Error, user_id: i64, channel: Channel) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Validation(format!(
            "user {} already has a {} channel",
            user_id, channel
        )),
        other => AppError::Database(other),
    }
}

impl UserChannelService {
    pub async fn create(
        pool: &PgPool,
        params: &CreateUserChannelParams,
    ) -> Result<UserChannel, AppError> {
        let channel = params
            .channel
            .parse::<Channel>()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if params.recipient.trim().is_empty() {
            return Err(AppError::Validation("recipient must not be empty".to_string()));
        }

        let created: UserChannel = sqlx::query_as(
            r#"
            INSERT INTO user_channels (user_id, channel, recipient, can_notify)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, channel, recipient, can_notify
            "#,
        )
        .bind(params.user_id)
        .bind(channel.code())
        .bind(params.recipient.trim())
        .bind(params.can_notify)
        .fetch_one(pool)
        .await
        .map_err(|e| conflict(e, params.user_id, channel))?;

        tracing::info!(
            user_channel_id = created.id,
            user_id = created.user_id,
            channel = %channel,
            "User channel created"
        );

        Ok(created)
    }

    pub async fn get(pool: &PgPool, id: i64) -> Result<UserChannel, AppError> {
        sqlx::query_as(
            "SELECT id, user_id, channel, recipient, can_notify FROM user_channels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User channel {} not found", id)))
    }

    /// All channels of a user, ordered by channel code.
    pub async fn list_by_user(pool: &PgPool, user_id: i64) -> Result<Vec<UserChannel>, AppError> {
        let channels: Vec<UserChannel> = sqlx::query_as(
            r#"
            SELECT id, user_id, channel, recipient, can_notify
            FROM user_channels
            WHERE user_id = $1
            ORDER BY channel
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(channels)
    }

    /// Change the recipient and/or consent flag. Absent fields keep their value.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        params: &UpdateUserChannelParams,
    ) -> Result<UserChannel, AppError> {
        let existing = Self::get(pool, id).await?;

        let recipient = match &params.recipient {
            Some(r) if r.trim().is_empty() => {
                return Err(AppError::Validation("recipient must not be empty".to_string()));
            }
            Some(r) => r.trim().to_string(),
            None => existing.recipient,
        };
        let can_notify = params.can_notify.unwrap_or(existing.can_notify);

        let updated: UserChannel = sqlx::query_as(
            r#"
            UPDATE user_channels
            SET recipient = $1, can_notify = $2
            WHERE id = $3
            RETURNING id, user_id, channel, recipient, can_notify
            "#,
        )
        .bind(&recipient)
        .bind(can_notify)
        .bind(id)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_channel_id = id, can_notify, "User channel updated");
        Ok(updated)
    }

    /// Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM user_channels WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(user_channel_id = id, "User channel deleted");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_params_default_to_notify() {
        let params: CreateUserChannelParams = serde_json::from_value(serde_json::json!({
            "userId": 7,
            "channel": "telegram",
            "recipient": "123456"
        }))
        .unwrap();

        assert_eq!(params.user_id, 7);
        assert!(params.can_notify);
    }

    #[test]
    fn test_update_params_are_optional() {
        let params: UpdateUserChannelParams =
            serde_json::from_value(serde_json::json!({ "canNotify": false })).unwrap();

        assert_eq!(params.recipient, None);
        assert_eq!(params.can_notify, Some(false));
    }
}
