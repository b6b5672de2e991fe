//! User channel CRUD routes.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use herald_common::error::AppError;
use herald_common::types::UserChannel;
use herald_engine::user_channel::{
    CreateUserChannelParams, UpdateUserChannelParams, UserChannelService,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/channel", post(create_channel))
        .route(
            "/user/channel/{id}",
            get(read_channel).patch(update_channel).delete(delete_channel),
        )
        .route("/user/{user_id}/channels", get(list_channels))
}

/// POST /user/channel
async fn create_channel(
    State(state): State<AppState>,
    Json(params): Json<CreateUserChannelParams>,
) -> Result<Json<UserChannel>, AppError> {
    let channel = UserChannelService::create(&state.pool, &params).await?;
    Ok(Json(channel))
}

/// GET /user/channel/{id}
async fn read_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserChannel>, AppError> {
    let channel = UserChannelService::get(&state.pool, id).await?;
    Ok(Json(channel))
}

/// PATCH /user/channel/{id}
async fn update_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(params): Json<UpdateUserChannelParams>,
) -> Result<Json<UserChannel>, AppError> {
    let channel = UserChannelService::update(&state.pool, id, &params).await?;
    Ok(Json(channel))
}

/// DELETE /user/channel/{id}
async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = UserChannelService::delete(&state.pool, id).await?;
    if deleted {
        Ok(Json(serde_json::json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("User channel {} not found", id)))
    }
}

/// GET /user/{user_id}/channels
async fn list_channels(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<UserChannel>>, AppError> {
    let channels = UserChannelService::list_by_user(&state.pool, user_id).await?;
    Ok(Json(channels))
}
