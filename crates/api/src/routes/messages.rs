//! Message routes: ID generation, submission and status polling.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_common::error::AppError;
use herald_common::types::{Channel, MessageStatus, StatusKind, Template};
use herald_engine::DispatchError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/message/generate-id", post(generate_id))
        .route("/message/{id}/send", post(send_message))
        .route("/message/{id}/status", get(message_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIdRequest {
    pub user_id: i64,
    pub channel: String,
    pub message_template: String,
    pub timestamp: i64,
    pub external_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateIdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub status: StatusKind,
    pub status_description: String,
    pub status_time: DateTime<Utc>,
}

impl From<MessageStatus> for MessageResponse {
    fn from(status: MessageStatus) -> Self {
        Self {
            id: status.message_id,
            status: status.status,
            status_description: status.description,
            status_time: status.created_at,
        }
    }
}

/// POST /message/generate-id: Build the deterministic ID for a message.
async fn generate_id(
    State(state): State<AppState>,
    Json(request): Json<GenerateIdRequest>,
) -> Result<Json<GenerateIdResponse>, AppError> {
    let channel: Channel = request
        .channel
        .parse()
        .map_err(|_| DispatchError::InvalidChannel)?;
    let template: Template = request
        .message_template
        .parse()
        .map_err(|_| DispatchError::InvalidTemplate)?;

    for (field, value) in [
        ("userId", request.user_id),
        ("timestamp", request.timestamp),
        ("externalId", request.external_id),
    ] {
        if value < 0 {
            return Err(AppError::Validation(format!("{field} must not be negative")));
        }
    }

    let id = state.dispatcher.generate_id(
        channel,
        template,
        request.user_id,
        request.timestamp,
        request.external_id,
    );
    Ok(Json(GenerateIdResponse { id }))
}

/// POST /message/{id}/send: Submit a message and report its current status.
///
/// A near-duplicate submission reports the status of the earlier message.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let resolved = state.dispatcher.send(&id, request.params).await?;
    let status = state.dispatcher.get_status(&resolved).await?;
    Ok(Json(status.into()))
}

/// GET /message/{id}/status: Latest status of a message.
async fn message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let status = state.dispatcher.get_status(&id).await?;
    Ok(Json(status.into()))
}
