//! Health endpoint

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppError, AppState};
use finch_core::ai::AIStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// None when no AI backend is configured
    pub ai: Option<AIStatus>,
    pub push_transport: Option<&'static str>,
}

/// GET /api/health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, AppError> {
    // Probe the database so a broken pool shows up here
    state.db.conn()?;

    let ai = match state.engine.ai() {
        Some(client) => Some(client.status().await),
        None => None,
    };

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ai,
        push_transport: state.engine.push().map(|p| p.transport_name()),
    }))
}
