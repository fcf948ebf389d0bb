//! On-demand reminder sweeps

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::{AppError, AppState, CurrentUser};
use finch_core::models::Notification;

#[derive(Serialize)]
pub struct SweepResponse {
    /// Triggers the sweeps produced
    pub processed: usize,
    pub notifications: Vec<Notification>,
}

/// POST /api/sweeps/run - Budget, bill, and goal sweeps for the caller
pub async fn run_sweeps(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<SweepResponse>, AppError> {
    let outcomes = state.engine.run_sweeps(&user.id, Utc::now()).await?;
    let processed = outcomes.len();
    let notifications: Vec<Notification> = outcomes
        .into_iter()
        .filter_map(|o| o.notification().cloned())
        .collect();

    state.db.log_audit(
        &user.id,
        "sweep",
        Some("notification"),
        None,
        Some(&format!(
            "processed={} created={}",
            processed,
            notifications.len()
        )),
    )?;

    Ok(Json(SweepResponse {
        processed,
        notifications,
    }))
}
