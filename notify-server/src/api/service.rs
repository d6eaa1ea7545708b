//! Event intake API.
//!
//! Called by the business modules that produce events; requests carry a
//! signed body verified via the `Notify-Signature` header.
//!
//! # Endpoints
//!
//! - `POST /events` – route one event into the outbox

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use notify_core::processors::RouteError;
use notify_sdk::objects::{NotificationEvent, RouteEventResponse};

use crate::api::extractors::SignedBody;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(route_event))
}

/// `POST /events`: record notification intent for one event.
///
/// Returns `202 Accepted` once the outbox entries are durable; delivery
/// happens later on the worker pool. Unknown event types and events that
/// match nobody are accepted with zero entries created.
async fn route_event(
    state: axum::extract::State<AppState>,
    SignedBody(event): SignedBody<NotificationEvent>,
) -> Result<impl IntoResponse, ServiceApiError> {
    let outcome = state.router.route_event(&event).await?;
    Ok((StatusCode::ACCEPTED, Json(RouteEventResponse::from(outcome))))
}

#[derive(Debug)]
enum ServiceApiError {
    Route(RouteError),
}

impl From<RouteError> for ServiceApiError {
    fn from(err: RouteError) -> Self {
        Self::Route(err)
    }
}

impl IntoResponse for ServiceApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ServiceApiError::Route(e) => {
                tracing::error!(error = %e, "Failed to route event");
                (StatusCode::SERVICE_UNAVAILABLE, "notification intent not recorded").into_response()
            }
        }
    }
}
