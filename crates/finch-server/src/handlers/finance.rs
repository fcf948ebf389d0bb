//! Finance record handlers
//!
//! Transactions, budgets, bills, and goals are the engine's context. Storing
//! a transaction or moving a goal forward also runs the matching trigger.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ProcessResponse;
use crate::{AppError, AppState, CurrentUser, SuccessResponse, MAX_PAGE_LIMIT};
use finch_core::models::{Bill, Budget, Goal, NewBill, NewTransaction, Transaction, TransactionType};
use finch_core::notify::{goal_milestone_trigger, TransactionEvent};
use finch_core::{Trigger, TriggerKind};

// ========== Transactions ==========

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: f64,
    pub vendor: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub transaction_type: TransactionType,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CreateTransactionResponse {
    pub transaction: Transaction,
    pub result: ProcessResponse,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// POST /api/transactions - Store a transaction and run its trigger
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<CreateTransactionResponse>, AppError> {
    let now = Utc::now();
    let id = state.db.insert_transaction(&NewTransaction {
        user_id: user.id.clone(),
        amount: req.amount,
        vendor: non_empty(req.vendor, "Unknown"),
        category: non_empty(req.category, "Other"),
        transaction_type: req.transaction_type,
        date: req.date.unwrap_or(now),
    })?;
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::internal("Stored transaction disappeared"))?;

    let trigger = Trigger::new(
        &user.id,
        TriggerKind::TransactionCreated {
            transaction: TransactionEvent::from_transaction(&transaction),
        },
        now,
    )
    .with_dedupe_key(format!("transaction:{}", transaction.id));
    let result = ProcessResponse::from(state.engine.process(trigger).await?);

    state.db.log_audit(
        &user.id,
        "create",
        Some("transaction"),
        Some(&transaction.id.to_string()),
        Some(&format!("created_notification={}", result.created)),
    )?;

    Ok(Json(CreateTransactionResponse {
        transaction,
        result,
    }))
}

/// GET /api/transactions - Newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db.recent_transactions(&user.id, limit, None)?))
}

// ========== Budgets ==========

#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    pub category: String,
    pub amount: f64,
}

/// POST /api/budgets - Create or replace the budget for a category
pub async fn upsert_budget(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<BudgetRequest>,
) -> Result<Json<Budget>, AppError> {
    if req.category.trim().is_empty() {
        return Err(AppError::bad_request("Budget category is required"));
    }
    let id = state.db.upsert_budget(&user.id, &req.category, req.amount)?;
    let budget = state
        .db
        .get_budget(id)?
        .ok_or_else(|| AppError::internal("Stored budget disappeared"))?;

    state.db.log_audit(
        &user.id,
        "upsert",
        Some("budget"),
        Some(&id.to_string()),
        Some(&format!("category={} amount={}", budget.category, budget.amount)),
    )?;

    Ok(Json(budget))
}

/// GET /api/budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Budget>>, AppError> {
    Ok(Json(state.db.list_budgets(&user.id)?))
}

// ========== Bills ==========

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub bill_type: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct BillQuery {
    #[serde(default)]
    pub unpaid_only: bool,
}

/// POST /api/bills
pub async fn create_bill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateBillRequest>,
) -> Result<Json<Bill>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Bill name is required"));
    }
    if !req.amount.is_finite() || req.amount < 0.0 {
        return Err(AppError::bad_request("Bill amount must be a positive number"));
    }

    let id = state.db.create_bill(&NewBill {
        user_id: user.id.clone(),
        name: req.name,
        amount: req.amount,
        bill_type: req.bill_type,
        due_date: req.due_date,
    })?;
    let bill = state
        .db
        .get_bill(id)?
        .ok_or_else(|| AppError::internal("Stored bill disappeared"))?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("bill"),
        Some(&id.to_string()),
        Some(&format!("due={}", bill.due_date)),
    )?;

    Ok(Json(bill))
}

/// GET /api/bills
pub async fn list_bills(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<BillQuery>,
) -> Result<Json<Vec<Bill>>, AppError> {
    Ok(Json(state.db.list_bills(&user.id, params.unpaid_only)?))
}

/// POST /api/bills/:id/pay
pub async fn pay_bill(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let bill = state
        .db
        .get_bill(id)?
        .ok_or_else(|| AppError::not_found("Bill not found"))?;
    if bill.user_id != user.id {
        return Err(AppError::forbidden("Bill belongs to another user"));
    }

    state.db.mark_bill_paid(id, Utc::now())?;
    state
        .db
        .log_audit(&user.id, "pay", Some("bill"), Some(&id.to_string()), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

// ========== Goals ==========

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    pub current_amount: f64,
}

#[derive(Serialize)]
pub struct GoalResponse {
    pub goal: Goal,
    /// Present when the goal crossed a milestone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessResponse>,
}

/// Run the milestone trigger for a goal, if it reached one
async fn check_milestone(state: &AppState, goal: &Goal) -> Result<Option<ProcessResponse>, AppError> {
    match goal_milestone_trigger(goal, Utc::now()) {
        Some(trigger) => Ok(Some(ProcessResponse::from(
            state.engine.process(trigger).await?,
        ))),
        None => Ok(None),
    }
}

/// POST /api/goals
pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Goal name is required"));
    }
    let id = state
        .db
        .create_goal(&user.id, &req.name, req.target_amount, req.current_amount)?;
    let goal = state
        .db
        .get_goal(id)?
        .ok_or_else(|| AppError::internal("Stored goal disappeared"))?;
    let result = check_milestone(&state, &goal).await?;

    state
        .db
        .log_audit(&user.id, "create", Some("goal"), Some(&id.to_string()), None)?;

    Ok(Json(GoalResponse { goal, result }))
}

/// GET /api/goals
pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Goal>>, AppError> {
    Ok(Json(state.db.list_goals(&user.id)?))
}

/// PATCH /api/goals/:id - Record progress, celebrating any new milestone
pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<GoalResponse>, AppError> {
    if !req.current_amount.is_finite() || req.current_amount < 0.0 {
        return Err(AppError::bad_request("current_amount must not be negative"));
    }
    let existing = state
        .db
        .get_goal(id)?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    if existing.user_id != user.id {
        return Err(AppError::forbidden("Goal belongs to another user"));
    }

    state.db.update_goal_progress(id, req.current_amount)?;
    let goal = state
        .db
        .get_goal(id)?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    let result = check_milestone(&state, &goal).await?;

    state.db.log_audit(
        &user.id,
        "update",
        Some("goal"),
        Some(&id.to_string()),
        Some(&format!("current_amount={}", req.current_amount)),
    )?;

    Ok(Json(GoalResponse { goal, result }))
}
