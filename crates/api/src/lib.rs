//! HTTP surface of the notification service.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /message/generate-id`, `POST /message/{id}/send`, `GET /message/{id}/status`
//! - CRUD `/user/channel`, `GET /user/{userId}/channels`

pub mod routes;
pub mod state;
