//! Types that flow through the notification pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::MerchantStats;
use crate::models::{Notification, NotificationCategory, Transaction, TransactionType};

fn unknown_vendor() -> String {
    "Unknown".to_string()
}

fn other_category() -> String {
    "Other".to_string()
}

/// Transaction as carried by a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Stored transaction id, when the transaction was persisted first
    #[serde(default)]
    pub id: Option<i64>,
    pub amount: f64,
    #[serde(default = "unknown_vendor")]
    pub vendor: String,
    #[serde(default = "other_category")]
    pub category: String,
    #[serde(default)]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl TransactionEvent {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            id: Some(tx.id),
            amount: tx.amount,
            vendor: tx.vendor.clone(),
            category: tx.category.clone(),
            transaction_type: tx.transaction_type,
            date: Some(tx.date),
        }
    }

    pub fn abs_amount(&self) -> f64 {
        self.amount.abs()
    }

    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    /// A vendor worth tracking history for
    pub fn has_known_vendor(&self) -> bool {
        let vendor = self.vendor.trim();
        !vendor.is_empty() && !vendor.eq_ignore_ascii_case("unknown")
    }
}

/// Bill as carried by a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillEvent {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub bill_type: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// The event-specific part of a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TriggerKind {
    TransactionCreated {
        transaction: TransactionEvent,
    },
    BudgetThreshold {
        #[serde(default)]
        budget_id: Option<i64>,
        category: String,
        /// Fraction of the limit used (0.9 = 90%)
        percentage: f64,
        #[serde(default)]
        spent: f64,
        #[serde(default)]
        limit: f64,
    },
    BillDue {
        bill: BillEvent,
        days_until_due: i64,
    },
    GoalMilestone {
        #[serde(default)]
        goal_id: Option<i64>,
        goal_name: String,
        /// Percent of the target reached (0-100)
        milestone: f64,
    },
    AnomalyDetected {
        transaction: TransactionEvent,
        #[serde(default)]
        reasons: Vec<String>,
    },
    InsightGenerated {
        insight_type: String,
        title: String,
        description: String,
        #[serde(default)]
        potential_savings: f64,
        #[serde(default)]
        is_actionable: bool,
    },
    CashflowPrediction {
        summary: String,
        #[serde(default)]
        projected_balance: f64,
    },
}

impl TriggerKind {
    /// Wire name, also stored as the notification's trigger_type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionCreated { .. } => "transaction_created",
            Self::BudgetThreshold { .. } => "budget_threshold",
            Self::BillDue { .. } => "bill_due",
            Self::GoalMilestone { .. } => "goal_milestone",
            Self::AnomalyDetected { .. } => "anomaly_detected",
            Self::InsightGenerated { .. } => "insight_generated",
            Self::CashflowPrediction { .. } => "cashflow_prediction",
        }
    }

    /// Category a trigger maps to before any anomaly upgrade
    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::TransactionCreated { .. } => NotificationCategory::SmartTransaction,
            Self::BudgetThreshold { .. } => NotificationCategory::BudgetAlert,
            Self::BillDue { .. } => NotificationCategory::BillReminder,
            Self::GoalMilestone { .. } => NotificationCategory::GoalProgress,
            Self::AnomalyDetected { .. } => NotificationCategory::FraudDetection,
            Self::InsightGenerated { .. } => NotificationCategory::AiInsight,
            Self::CashflowPrediction { .. } => NotificationCategory::CashflowPrediction,
        }
    }

    /// The transaction this trigger is about, if any
    pub fn transaction(&self) -> Option<&TransactionEvent> {
        match self {
            Self::TransactionCreated { transaction } | Self::AnomalyDetected { transaction, .. } => {
                Some(transaction)
            }
            _ => None,
        }
    }

    /// Spending category the context is built around
    pub fn subject_category(&self) -> Option<&str> {
        match self {
            Self::BudgetThreshold { category, .. } => Some(category),
            _ => self.transaction().map(|t| t.category.as_str()),
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// An event fed into the pipeline, consumed once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Filled from the authenticated caller by the API
    #[serde(default)]
    pub user_id: String,
    #[serde(flatten)]
    pub kind: TriggerKind,
    /// Also the pipeline's notion of "now"
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
    /// Idempotency key; a second trigger with the same key is dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

impl Trigger {
    pub fn new(user_id: &str, kind: TriggerKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            timestamp,
            dedupe_key: None,
        }
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn trigger_type(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Bucket of the local hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }
}

/// Ninety-day summary of how a user spends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingPattern {
    /// Top expense categories by count
    pub usual_categories: Vec<String>,
    /// Tail categories seen exactly once
    pub unusual_categories: Vec<String>,
    /// Busiest local hours
    pub peak_hours: Vec<u32>,
    pub average_daily_spend: f64,
    pub average_transaction: f64,
    pub usually_exceeds_budget: bool,
    /// Expenses the pattern was built from
    pub transaction_count: usize,
}

impl SpendingPattern {
    pub fn has_data(&self) -> bool {
        self.transaction_count > 0
    }
}

/// Where a category's monthly budget stands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget_id: i64,
    pub amount: f64,
    pub spent: f64,
    /// Percent of the limit used (90.0 = 90%)
    pub percentage_used: f64,
    pub remaining: f64,
}

/// Read-only snapshot assembled per trigger
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationContext {
    pub spending_pattern: SpendingPattern,
    pub budget_status: Option<BudgetStatus>,
    /// Newest first
    pub transaction_history: Vec<Transaction>,
    pub similar_transactions: Vec<Transaction>,
    pub merchant_history: Option<MerchantStats>,
    pub time_of_day: Option<TimeOfDay>,
    pub day_of_week: Option<String>,
    pub is_unusual_time: bool,
    /// Mean expense in the trigger's category
    pub user_average: Option<f64>,
    /// Percent change of this month's category spend vs last month
    pub previous_month_comparison: Option<f64>,
    pub financial_health_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub analysis: Option<String>,
    pub recommendations: Vec<String>,
}

/// Result of the anomaly heuristics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub is_anomaly: bool,
    /// Sum of fired check weights, capped at 1.0
    pub risk_score: f64,
    pub reasons: Vec<String>,
    pub explanation: String,
    pub recommended_action: String,
}

/// Why a trigger did not produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    Disabled,
    RateLimited,
    CategoryDisabled,
    Duplicate,
    LowScore,
    QuietHours,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::RateLimited => "rate_limited",
            Self::CategoryDisabled => "category_disabled",
            Self::Duplicate => "duplicate",
            Self::LowScore => "low_score",
            Self::QuietHours => "quiet_hours",
        }
    }
}

impl std::fmt::Display for FilterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the pipeline did with a trigger
#[derive(Debug, Clone)]
pub enum Outcome {
    Created(Box<Notification>),
    Filtered(FilterReason),
}

impl Outcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Self::Created(n) => Some(n),
            Self::Filtered(_) => None,
        }
    }

    pub fn filter_reason(&self) -> Option<FilterReason> {
        match self {
            Self::Created(_) => None,
            Self::Filtered(reason) => Some(*reason),
        }
    }
}
