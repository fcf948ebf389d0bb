//! Notification handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProcessResponse;
use crate::{AppError, AppState, CurrentUser, SuccessResponse, MAX_PAGE_LIMIT};
use finch_core::models::{
    Notification, NotificationCategory, NotificationFilter, NotificationStats, NotificationUpdate,
    Priority,
};
use finch_core::notify::sample_trigger;
use finch_core::Trigger;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub unread_only: bool,
    pub category: Option<String>,
    pub priority: Option<String>,
    /// Only notifications created at or after this instant (RFC 3339)
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// Load a notification the caller owns
fn owned_notification(
    state: &AppState,
    user: &CurrentUser,
    id: &str,
) -> Result<Notification, AppError> {
    let notification = state
        .db
        .get_notification(id)?
        .filter(|n| !n.is_deleted)
        .ok_or_else(|| AppError::not_found("Notification not found"))?;

    if notification.user_id != user.id {
        return Err(AppError::forbidden("Notification belongs to another user"));
    }
    Ok(notification)
}

/// POST /api/notifications - Run a trigger through the engine
///
/// The trigger always runs for the authenticated caller at server time,
/// whatever user id or timestamp the body names. Rate-limit windows and
/// quiet hours only ever see the server clock.
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(mut trigger): Json<Trigger>,
) -> Result<Json<ProcessResponse>, AppError> {
    trigger.user_id = user.id.clone();
    trigger.timestamp = Utc::now();
    let trigger_type = trigger.trigger_type();

    let outcome = state.engine.process(trigger).await?;
    let response = ProcessResponse::from(outcome);

    let details = match (&response.notification, response.reason) {
        (Some(n), _) => format!("trigger={} priority={}", trigger_type, n.priority),
        (None, Some(reason)) => format!("trigger={} filtered={}", trigger_type, reason),
        (None, None) => format!("trigger={}", trigger_type),
    };
    state.db.log_audit(
        &user.id,
        "trigger",
        Some("notification"),
        response.notification.as_ref().map(|n| n.id.as_str()),
        Some(&details),
    )?;

    Ok(Json(response))
}

/// POST /api/notifications/sample - Run the sample transaction trigger
pub async fn create_sample(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProcessResponse>, AppError> {
    let outcome = state
        .engine
        .process(sample_trigger(&user.id, Utc::now()))
        .await?;
    let response = ProcessResponse::from(outcome);

    state.db.log_audit(
        &user.id,
        "sample",
        Some("notification"),
        response.notification.as_ref().map(|n| n.id.as_str()),
        None,
    )?;

    Ok(Json(response))
}

/// GET /api/notifications - List the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&params.limit) {
        return Err(AppError::bad_request(&format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }
    if params.offset < 0 {
        return Err(AppError::bad_request("offset must not be negative"));
    }

    let category = params
        .category
        .as_deref()
        .map(str::parse::<NotificationCategory>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;
    let priority = params
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let filter = NotificationFilter {
        unread_only: params.unread_only,
        category,
        priority,
        since: params.since,
        limit: params.limit,
        offset: params.offset,
    };

    Ok(Json(state.db.list_notifications(&user.id, &filter)?))
}

/// GET /api/notifications/stats - Counts for the caller
pub async fn notification_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<NotificationStats>, AppError> {
    Ok(Json(state.db.notification_stats(&user.id, Utc::now())?))
}

/// POST /api/notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.db.mark_all_notifications_read(&user.id, Utc::now())?;

    state.db.log_audit(
        &user.id,
        "mark_all_read",
        Some("notification"),
        None,
        Some(&format!("count={}", updated)),
    )?;

    Ok(Json(MarkAllReadResponse { updated }))
}

/// GET /api/notifications/:id
pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, AppError> {
    Ok(Json(owned_notification(&state, &user, &id)?))
}

/// PATCH /api/notifications/:id - Read, archive, or act on a notification
pub async fn update_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(update): Json<NotificationUpdate>,
) -> Result<Json<Notification>, AppError> {
    let notification = owned_notification(&state, &user, &id)?;

    let updated = state
        .engine
        .apply_update(&notification, &update, Utc::now())?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;

    let mut changes = Vec::new();
    if let Some(v) = update.is_read {
        changes.push(format!("is_read={}", v));
    }
    if let Some(v) = update.is_archived {
        changes.push(format!("is_archived={}", v));
    }
    if let Some(action) = update.action_taken {
        changes.push(format!("action={}", action));
    }
    state.db.log_audit(
        &user.id,
        "update",
        Some("notification"),
        Some(&id),
        Some(&changes.join(" ")),
    )?;

    Ok(Json(updated))
}

/// DELETE /api/notifications/:id - Soft delete
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    owned_notification(&state, &user, &id)?;
    let success = state.db.delete_notification(&id)?;

    state
        .db
        .log_audit(&user.id, "delete", Some("notification"), Some(&id), None)?;

    Ok(Json(SuccessResponse { success }))
}
