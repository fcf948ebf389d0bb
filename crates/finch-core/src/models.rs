//! Domain models for Finch

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Finance records
// ============================================================================

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    #[default]
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" | "credit" => Ok(Self::Income),
            "expense" | "debit" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    /// Always positive; direction is carried by `transaction_type`
    pub amount: f64,
    pub vendor: String,
    pub category: String,
    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }
}

/// Transaction to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub amount: f64,
    pub vendor: String,
    pub category: String,
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub date: DateTime<Utc>,
}

/// Monthly spending limit for a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: String,
    pub category: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// A recurring or one-off bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub amount: f64,
    /// Free-form type such as "electricity" or "credit card"
    pub bill_type: String,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Whole days from `today` until the due date (negative when overdue)
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_date - today).num_days()
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    /// Paid after the due date
    pub fn was_paid_late(&self) -> bool {
        self.paid_at
            .map(|paid| paid.date_naive() > self.due_date)
            .unwrap_or(false)
    }
}

/// Bill to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    pub user_id: String,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub bill_type: String,
    pub due_date: NaiveDate,
}

/// Savings goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Progress toward the target as a percentage (0..=100+)
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }
        self.current_amount / self.target_amount * 100.0
    }
}

/// Registered push device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub user_id: String,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Notification enums
// ============================================================================

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    SmartTransaction,
    FraudDetection,
    BudgetAlert,
    SpendingInsight,
    BillReminder,
    EmiLoan,
    GoalProgress,
    SavingsOpportunity,
    IncomeTracking,
    CashflowPrediction,
    AiInsight,
    ProactiveRecommendation,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmartTransaction => "smart_transaction",
            Self::FraudDetection => "fraud_detection",
            Self::BudgetAlert => "budget_alert",
            Self::SpendingInsight => "spending_insight",
            Self::BillReminder => "bill_reminder",
            Self::EmiLoan => "emi_loan",
            Self::GoalProgress => "goal_progress",
            Self::SavingsOpportunity => "savings_opportunity",
            Self::IncomeTracking => "income_tracking",
            Self::CashflowPrediction => "cashflow_prediction",
            Self::AiInsight => "ai_insight",
            Self::ProactiveRecommendation => "proactive_recommendation",
        }
    }

    /// Icon shown alongside the notification
    pub fn icon(&self) -> &'static str {
        match self {
            Self::SmartTransaction => "💳",
            Self::FraudDetection => "🚨",
            Self::BudgetAlert => "📊",
            Self::SpendingInsight => "💡",
            Self::BillReminder => "📅",
            Self::EmiLoan => "🏦",
            Self::GoalProgress => "🎯",
            Self::SavingsOpportunity => "💰",
            Self::IncomeTracking => "📈",
            Self::CashflowPrediction => "🔮",
            Self::AiInsight => "🎓",
            Self::ProactiveRecommendation => "✨",
        }
    }

    pub fn all() -> &'static [NotificationCategory] {
        &[
            Self::SmartTransaction,
            Self::FraudDetection,
            Self::BudgetAlert,
            Self::SpendingInsight,
            Self::BillReminder,
            Self::EmiLoan,
            Self::GoalProgress,
            Self::SavingsOpportunity,
            Self::IncomeTracking,
            Self::CashflowPrediction,
            Self::AiInsight,
            Self::ProactiveRecommendation,
        ]
    }
}

impl std::str::FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown notification category: {}", s))
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification priority, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    /// Critical and high notifications are pushed immediately
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "info" => Ok(Self::Info),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    InApp,
    Email,
    Sms,
    Widget,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::InApp => "in_app",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Widget => "widget",
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "in_app" | "inapp" => Ok(Self::InApp),
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "widget" => Ok(Self::Widget),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action a user can take on a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    View,
    Dismiss,
    Snooze,
    MarkSafe,
    ReportFraud,
    EditCategory,
    PayNow,
    ViewBudget,
    AddMoney,
    ViewBreakdown,
    GetTips,
    AdjustSettings,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Dismiss => "dismiss",
            Self::Snooze => "snooze",
            Self::MarkSafe => "mark_safe",
            Self::ReportFraud => "report_fraud",
            Self::EditCategory => "edit_category",
            Self::PayNow => "pay_now",
            Self::ViewBudget => "view_budget",
            Self::AddMoney => "add_money",
            Self::ViewBreakdown => "view_breakdown",
            Self::GetTips => "get_tips",
            Self::AdjustSettings => "adjust_settings",
        }
    }

    /// Actions that signal the user found the notification worthwhile
    pub fn is_engagement(&self) -> bool {
        matches!(self, Self::View | Self::PayNow | Self::AddMoney)
    }
}

impl std::str::FromStr for NotificationAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "view" => Ok(Self::View),
            "dismiss" => Ok(Self::Dismiss),
            "snooze" => Ok(Self::Snooze),
            "mark_safe" => Ok(Self::MarkSafe),
            "report_fraud" => Ok(Self::ReportFraud),
            "edit_category" => Ok(Self::EditCategory),
            "pay_now" => Ok(Self::PayNow),
            "view_budget" => Ok(Self::ViewBudget),
            "add_money" => Ok(Self::AddMoney),
            "view_breakdown" => Ok(Self::ViewBreakdown),
            "get_tips" => Ok(Self::GetTips),
            "adjust_settings" => Ok(Self::AdjustSettings),
            _ => Err(format!("Unknown notification action: {}", s)),
        }
    }
}

impl std::fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// A single stat row in rich content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichStat {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_positive: Option<bool>,
}

/// Structured extras rendered by clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichContent {
    pub category_icon: String,
    pub show_chart: bool,
    #[serde(default)]
    pub stats: Vec<RichStat>,
    #[serde(default)]
    pub chips: Vec<String>,
}

/// A persisted notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub category: NotificationCategory,
    pub priority: Priority,
    pub title: String,
    pub body: String,
    pub rich_content: RichContent,
    pub trigger_type: String,
    pub importance_score: f64,
    pub relevance_score: f64,
    pub risk_score: Option<f64>,
    pub related_transaction_id: Option<i64>,
    pub related_budget_id: Option<i64>,
    pub related_bill_id: Option<i64>,
    pub related_goal_id: Option<i64>,
    pub channels: Vec<Channel>,
    pub available_actions: Vec<NotificationAction>,
    pub optimal_delivery_time: Option<DateTime<Utc>>,
    pub dedupe_key: Option<String>,
    pub is_read: bool,
    pub is_archived: bool,
    pub is_deleted: bool,
    pub is_delivered: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub action_taken: Option<NotificationAction>,
    pub action_taken_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Partial update applied by the owning user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationUpdate {
    pub is_read: Option<bool>,
    pub is_archived: Option<bool>,
    pub action_taken: Option<NotificationAction>,
}

/// Filters for listing a user's notifications
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub category: Option<NotificationCategory>,
    pub priority: Option<Priority>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            unread_only: false,
            category: None,
            priority: None,
            since: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Per-user notification counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub by_category: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub recent_24h: i64,
}

// ============================================================================
// Preferences
// ============================================================================

/// Per-user notification preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub user_id: String,
    pub notifications_enabled: bool,
    pub quiet_hours_enabled: bool,
    /// Local hour (0-23) when quiet hours begin
    pub quiet_hours_start: u32,
    /// Local hour (0-23) when quiet hours end (exclusive)
    pub quiet_hours_end: u32,
    /// Fixed offset from UTC used for every hour-of-day rule
    pub timezone_offset_minutes: i32,
    /// Missing categories are enabled
    pub category_preferences: HashMap<NotificationCategory, bool>,
    pub channel_preferences: HashMap<NotificationCategory, Vec<Channel>>,
    pub high_value_threshold: f64,
    /// Budget usage fractions that trigger an alert
    pub budget_alert_thresholds: Vec<f64>,
    /// Days before due date that trigger a reminder
    pub bill_reminder_days: Vec<i64>,
    pub learn_optimal_times: bool,
    pub max_notifications_per_hour: u32,
    pub max_notifications_per_day: u32,
    pub show_insights: bool,
    pub show_recommendations: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            notifications_enabled: true,
            quiet_hours_enabled: false,
            quiet_hours_start: 22,
            quiet_hours_end: 7,
            timezone_offset_minutes: 0,
            category_preferences: HashMap::new(),
            channel_preferences: HashMap::new(),
            high_value_threshold: 5000.0,
            budget_alert_thresholds: vec![0.75, 0.9, 1.0, 1.1],
            bill_reminder_days: vec![7, 3, 1, 0],
            learn_optimal_times: true,
            max_notifications_per_hour: 10,
            max_notifications_per_day: 50,
            show_insights: true,
            show_recommendations: true,
            updated_at: None,
        }
    }
}

impl UserPreferences {
    /// Defaults for a user with no stored preferences
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_category_enabled(&self, category: NotificationCategory) -> bool {
        self.category_preferences
            .get(&category)
            .copied()
            .unwrap_or(true)
    }

    /// The user's fixed UTC offset, falling back to UTC when out of range
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Hour of day (0-23) of `at` in the user's timezone
    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset()).hour()
    }

    /// Whether `hour` falls inside the quiet window
    ///
    /// `start < end` is a same-day window `[start, end)`; otherwise the
    /// window wraps midnight. Disabled quiet hours never match.
    pub fn in_quiet_hours(&self, hour: u32) -> bool {
        if !self.quiet_hours_enabled {
            return false;
        }
        let (start, end) = (self.quiet_hours_start, self.quiet_hours_end);
        if start < end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

/// Partial preferences update (PATCH semantics)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub notifications_enabled: Option<bool>,
    pub quiet_hours_enabled: Option<bool>,
    pub quiet_hours_start: Option<u32>,
    pub quiet_hours_end: Option<u32>,
    pub timezone_offset_minutes: Option<i32>,
    pub category_preferences: Option<HashMap<NotificationCategory, bool>>,
    pub channel_preferences: Option<HashMap<NotificationCategory, Vec<Channel>>>,
    pub high_value_threshold: Option<f64>,
    pub budget_alert_thresholds: Option<Vec<f64>>,
    pub bill_reminder_days: Option<Vec<i64>>,
    pub learn_optimal_times: Option<bool>,
    pub max_notifications_per_hour: Option<u32>,
    pub max_notifications_per_day: Option<u32>,
    pub show_insights: Option<bool>,
    pub show_recommendations: Option<bool>,
}

impl PreferencesUpdate {
    /// Validate ranges before applying
    pub fn validate(&self) -> std::result::Result<(), String> {
        for hour in [self.quiet_hours_start, self.quiet_hours_end]
            .into_iter()
            .flatten()
        {
            if hour > 23 {
                return Err(format!("Quiet hour must be 0-23, got {}", hour));
            }
        }
        if let Some(offset) = self.timezone_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(format!("Timezone offset out of range: {}", offset));
            }
        }
        if self.max_notifications_per_hour == Some(0) || self.max_notifications_per_day == Some(0)
        {
            return Err("Rate limits must be at least 1".to_string());
        }
        Ok(())
    }

    /// Merge set fields into `prefs`
    pub fn apply(self, prefs: &mut UserPreferences) {
        if let Some(v) = self.notifications_enabled {
            prefs.notifications_enabled = v;
        }
        if let Some(v) = self.quiet_hours_enabled {
            prefs.quiet_hours_enabled = v;
        }
        if let Some(v) = self.quiet_hours_start {
            prefs.quiet_hours_start = v;
        }
        if let Some(v) = self.quiet_hours_end {
            prefs.quiet_hours_end = v;
        }
        if let Some(v) = self.timezone_offset_minutes {
            prefs.timezone_offset_minutes = v;
        }
        if let Some(v) = self.category_preferences {
            prefs.category_preferences.extend(v);
        }
        if let Some(v) = self.channel_preferences {
            prefs.channel_preferences.extend(v);
        }
        if let Some(v) = self.high_value_threshold {
            prefs.high_value_threshold = v;
        }
        if let Some(v) = self.budget_alert_thresholds {
            prefs.budget_alert_thresholds = v;
        }
        if let Some(v) = self.bill_reminder_days {
            prefs.bill_reminder_days = v;
        }
        if let Some(v) = self.learn_optimal_times {
            prefs.learn_optimal_times = v;
        }
        if let Some(v) = self.max_notifications_per_hour {
            prefs.max_notifications_per_hour = v;
        }
        if let Some(v) = self.max_notifications_per_day {
            prefs.max_notifications_per_day = v;
        }
        if let Some(v) = self.show_insights {
            prefs.show_insights = v;
        }
        if let Some(v) = self.show_recommendations {
            prefs.show_recommendations = v;
        }
    }
}

// ============================================================================
// Personalization
// ============================================================================

/// Coarse engagement bucket derived from open rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Learned per-user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub user_id: String,
    /// Transaction category -> interest in [0, 1]
    pub category_interests: HashMap<String, f64>,
    /// Notification category -> engagement in [0, 1]
    pub engagement_scores: HashMap<String, f64>,
    /// Local hour -> number of interactions
    pub active_hours: BTreeMap<u32, u32>,
    pub average_transaction_amount: f64,
    pub engagement_level: EngagementLevel,
    pub has_active_goals: bool,
    pub frequently_exceeds_budget: bool,
    pub frequently_late_on_bills: bool,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            category_interests: HashMap::new(),
            engagement_scores: HashMap::new(),
            active_hours: BTreeMap::new(),
            average_transaction_amount: 0.0,
            engagement_level: EngagementLevel::Medium,
            has_active_goals: false,
            frequently_exceeds_budget: false,
            frequently_late_on_bills: false,
        }
    }
}

impl UserProfile {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Engagement for a notification category, 0.5 when unknown
    pub fn engagement(&self, category: NotificationCategory) -> f64 {
        self.engagement_scores
            .get(category.as_str())
            .copied()
            .unwrap_or(0.5)
    }

    /// Interest in a transaction category, 0.5 when unknown
    pub fn interest(&self, category: &str) -> f64 {
        self.category_interests
            .get(category)
            .copied()
            .unwrap_or(0.5)
    }

    /// Most active hours, busiest first (ties broken by earlier hour)
    pub fn top_active_hours(&self, n: usize) -> Vec<u32> {
        let mut hours: Vec<(u32, u32)> = self
            .active_hours
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(&hour, &count)| (hour, count))
            .collect();
        hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hours.into_iter().take(n).map(|(hour, _)| hour).collect()
    }
}

/// Stored record of a created notification and what the user did with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub notification_id: String,
    pub user_id: String,
    pub category: NotificationCategory,
    pub trigger_type: String,
    /// Transaction category the notification was about, if any
    pub subject_category: Option<String>,
    pub importance: f64,
    pub relevance: f64,
    pub opened: bool,
    pub action_taken: Option<NotificationAction>,
    pub dismissed_within_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Dismissed within five seconds of creation
    pub fn is_quick_dismiss(&self) -> bool {
        self.action_taken == Some(NotificationAction::Dismiss)
            && self
                .dismissed_within_seconds
                .map(|s| s < 5.0)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in NotificationCategory::all() {
            let parsed: NotificationCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, *category);
        }
        assert_eq!(NotificationCategory::all().len(), 12);
        assert!("nonsense".parse::<NotificationCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationCategory::FraudDetection).unwrap();
        assert_eq!(json, "\"fraud_detection\"");
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let prefs = UserPreferences {
            quiet_hours_enabled: true,
            quiet_hours_start: 13,
            quiet_hours_end: 15,
            ..Default::default()
        };
        assert!(!prefs.in_quiet_hours(12));
        assert!(prefs.in_quiet_hours(13));
        assert!(prefs.in_quiet_hours(14));
        assert!(!prefs.in_quiet_hours(15));
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let prefs = UserPreferences {
            quiet_hours_enabled: true,
            ..Default::default()
        };
        assert!(prefs.in_quiet_hours(22));
        assert!(prefs.in_quiet_hours(23));
        assert!(prefs.in_quiet_hours(0));
        assert!(prefs.in_quiet_hours(6));
        assert!(!prefs.in_quiet_hours(7));
        assert!(!prefs.in_quiet_hours(21));
    }

    #[test]
    fn test_quiet_hours_disabled() {
        let prefs = UserPreferences::default();
        assert!(!prefs.in_quiet_hours(23));
    }

    #[test]
    fn test_local_hour_uses_offset() {
        let prefs = UserPreferences {
            timezone_offset_minutes: 330,
            ..Default::default()
        };
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap()
            .and_utc();
        // 20:00 UTC is 01:30 in UTC+05:30
        assert_eq!(prefs.local_hour(at), 1);
    }

    #[test]
    fn test_preferences_update_merges() {
        let mut prefs = UserPreferences::for_user("u1");
        let mut categories = HashMap::new();
        categories.insert(NotificationCategory::GoalProgress, false);
        let update = PreferencesUpdate {
            quiet_hours_enabled: Some(true),
            category_preferences: Some(categories),
            ..Default::default()
        };
        update.apply(&mut prefs);
        assert!(prefs.quiet_hours_enabled);
        assert!(!prefs.is_category_enabled(NotificationCategory::GoalProgress));
        assert!(prefs.is_category_enabled(NotificationCategory::BudgetAlert));
        assert_eq!(prefs.max_notifications_per_hour, 10);
    }

    #[test]
    fn test_preferences_update_validation() {
        let bad = PreferencesUpdate {
            quiet_hours_start: Some(24),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let zero = PreferencesUpdate {
            max_notifications_per_day: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(PreferencesUpdate::default().validate().is_ok());
    }

    #[test]
    fn test_preferences_json_with_category_keys() {
        let mut prefs = UserPreferences::for_user("u1");
        prefs
            .channel_preferences
            .insert(NotificationCategory::BillReminder, vec![Channel::Sms]);
        let json = serde_json::to_string(&prefs).unwrap();
        assert!(json.contains("\"bill_reminder\""));
        let back: UserPreferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefs);
    }

    #[test]
    fn test_top_active_hours_ordering() {
        let mut profile = UserProfile::for_user("u1");
        profile.active_hours.insert(9, 3);
        profile.active_hours.insert(20, 5);
        profile.active_hours.insert(13, 3);
        profile.active_hours.insert(7, 1);
        assert_eq!(profile.top_active_hours(3), vec![20, 9, 13]);
    }

    #[test]
    fn test_bill_late_payment() {
        let due = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut bill = Bill {
            id: 1,
            user_id: "u1".into(),
            name: "Power".into(),
            amount: 1200.0,
            bill_type: "electricity".into(),
            due_date: due,
            paid_at: None,
            created_at: Utc::now(),
        };
        assert!(!bill.was_paid_late());
        bill.paid_at = Some(
            NaiveDate::from_ymd_opt(2024, 5, 12)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
                .and_utc(),
        );
        assert!(bill.was_paid_late());
        assert_eq!(
            bill.days_until_due(NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()),
            3
        );
    }
}
