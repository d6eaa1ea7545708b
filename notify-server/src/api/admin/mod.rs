//! Admin API handlers.
//!
//! Operational inspection of the outbox and recipient preferences. Every
//! endpoint requires the `Notify-Admin-Authorization` header with the
//! plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /outbox/failed`              – list exhausted entries
//! - `POST /outbox/{id}/requeue`        – re-arm one exhausted entry
//! - `GET  /recipients/{id}/preferences` – show a recipient's preferences
//! - `PUT  /recipients/{id}/preferences` – apply a partial preferences update

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use notify_core::store::StoreError;

use crate::state::AppState;

mod list_failed;
mod preferences;
mod requeue;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/outbox/failed", get(list_failed::list_failed))
        .route("/outbox/{id}/requeue", post(requeue::requeue))
        .route(
            "/recipients/{recipient_id}/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Store(StoreError),
    NotFound,
    /// Only FAILED entries with no attempts left can be requeued.
    NotExhausted,
}

impl From<StoreError> for AdminApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Store(e) => {
                tracing::error!(error = %e, "Admin API store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::NotExhausted => {
                (StatusCode::CONFLICT, "entry is not exhausted").into_response()
            }
        }
    }
}
