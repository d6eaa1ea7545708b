use axum::{Json, extract::Path, response::IntoResponse};
use notify_sdk::objects::PreferenceUpdate;

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /recipients/{recipient_id}/preferences`
///
/// A recipient without stored preferences gets the defaults, never a 404.
pub async fn get_preferences(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(recipient_id): Path<String>,
) -> Result<impl IntoResponse, AdminApiError> {
    let preferences = state.preferences.get_preferences(&recipient_id).await?;
    Ok(Json(preferences))
}

/// `PUT /recipients/{recipient_id}/preferences`: partial update, returns
/// the preferences as stored.
pub async fn update_preferences(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Path(recipient_id): Path<String>,
    Json(update): Json<PreferenceUpdate>,
) -> Result<impl IntoResponse, AdminApiError> {
    let preferences = state
        .preferences
        .update_preferences(&recipient_id, update)
        .await?;

    tracing::info!(recipient_id = %recipient_id, "Recipient preferences updated");
    Ok(Json(preferences))
}
