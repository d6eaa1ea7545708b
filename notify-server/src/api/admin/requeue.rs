use axum::{Json, extract::Path, response::IntoResponse};
use notify_sdk::objects::OutboxEntryResponse;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /outbox/{id}/requeue`: reset an exhausted entry to PENDING with
/// zero attempts so the workers pick it up again.
pub async fn requeue(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AdminApiError> {
    if state.outbox.get_entry(id).await?.is_none() {
        return Err(AdminApiError::NotFound);
    }

    if !state.outbox.requeue(id, OffsetDateTime::now_utc()).await? {
        return Err(AdminApiError::NotExhausted);
    }

    let entry = state
        .outbox
        .get_entry(id)
        .await?
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(
        entry_id = %id,
        recipient_id = %entry.recipient_id,
        channel = ?entry.channel,
        "Exhausted outbox entry requeued"
    );

    Ok(Json(OutboxEntryResponse::from(&entry)))
}
