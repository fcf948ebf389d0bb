//! Push device registration

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, CurrentUser, SuccessResponse};

const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub token: String,
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_platform() -> String {
    "unknown".to_string()
}

/// POST /api/devices - Register a push token for the caller
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let token = req.token.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(AppError::bad_request("Device token is required"));
    }

    state.db.register_device(&user.id, token, req.platform.trim())?;

    // Tokens are credentials; only the platform goes to the audit log
    state.db.log_audit(
        &user.id,
        "register",
        Some("device"),
        None,
        Some(&format!("platform={}", req.platform.trim())),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/devices/:token
pub async fn unregister_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(token): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.unregister_device(&user.id, &token)? {
        return Err(AppError::not_found("Device not found"));
    }

    state
        .db
        .log_audit(&user.id, "unregister", Some("device"), None, None)?;

    Ok(Json(SuccessResponse { success: true }))
}
