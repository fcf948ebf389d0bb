//! Preference handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::{AppError, AppState, CurrentUser};
use finch_core::models::{PreferencesUpdate, UserPreferences};

/// GET /api/preferences - Stored preferences, or defaults
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<UserPreferences>, AppError> {
    Ok(Json(state.engine.preferences(&user.id)?))
}

/// PATCH /api/preferences - Partial update; out-of-range values are a 400
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<UserPreferences>, AppError> {
    let details = serde_json::to_string(&update)?;
    let prefs = state.engine.update_preferences(&user.id, update)?;

    state.db.log_audit(
        &user.id,
        "update",
        Some("preferences"),
        Some(&user.id),
        Some(&details),
    )?;

    Ok(Json(prefs))
}
