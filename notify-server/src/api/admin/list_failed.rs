use axum::{Json, extract::Query, response::IntoResponse};
use notify_sdk::objects::{ListFailedQuery, OutboxEntryResponse, clamp_limit};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /outbox/failed`: entries that ran out of attempts, most recently
/// attempted first.
pub async fn list_failed(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Query(query): Query<ListFailedQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let entries = state.outbox.list_exhausted(clamp_limit(query.limit)).await?;

    let response: Vec<OutboxEntryResponse> = entries.iter().map(Into::into).collect();
    Ok(Json(response))
}
