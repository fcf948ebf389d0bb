//! Context Generator - assembles the historical snapshot for a trigger
//!
//! Everything here is read-only: the snapshot is rebuilt per trigger and
//! never persisted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Months, NaiveDate, Timelike, Utc};

use crate::config::ContextConfig;
use crate::db::{month_start, months_back, Database};
use crate::error::Result;
use crate::models::{Transaction, UserPreferences, UserProfile};

use super::types::{BudgetStatus, NotificationContext, SpendingPattern, TimeOfDay, Trigger};

const USUAL_CATEGORY_COUNT: usize = 5;
const PEAK_HOUR_COUNT: usize = 3;
const SAME_VENDOR_LIMIT: usize = 5;

/// Builds a [`NotificationContext`] from stored finance data
pub struct ContextGenerator {
    db: Database,
    config: ContextConfig,
}

impl ContextGenerator {
    pub fn new(db: Database, config: ContextConfig) -> Self {
        Self { db, config }
    }

    /// Assemble the context for one trigger
    pub fn generate(
        &self,
        trigger: &Trigger,
        prefs: &UserPreferences,
        profile: &UserProfile,
    ) -> Result<NotificationContext> {
        let user_id = trigger.user_id.as_str();
        let now = trigger.timestamp;
        let offset = prefs.offset();
        // Budget months follow the user's calendar, like the budget sweep
        let today = now.with_timezone(&offset).date_naive();
        let tx = trigger.kind.transaction();
        let exclude_id = tx.and_then(|t| t.id);

        let mut ctx = NotificationContext {
            spending_pattern: self.spending_pattern(user_id, now, exclude_id, prefs, profile)?,
            ..Default::default()
        };

        let category = trigger.kind.subject_category();
        if let Some(category) = category {
            ctx.budget_status = self.budget_status(user_id, category, today)?;
        }

        ctx.transaction_history =
            self.db
                .recent_transactions(user_id, self.config.history_limit, exclude_id)?;

        if let Some(tx) = tx {
            ctx.similar_transactions = self.similar_transactions(
                user_id,
                &tx.category,
                &tx.vendor,
                exclude_id,
                &ctx.transaction_history,
            )?;
            if tx.has_known_vendor() {
                ctx.merchant_history = Some(self.db.merchant_stats(user_id, &tx.vendor, exclude_id)?);
            }
        }

        if let Some(category) = category {
            ctx.user_average = category_average(&ctx.transaction_history, category);
            ctx.previous_month_comparison =
                self.previous_month_comparison(user_id, category, today)?;
        }

        // Transactions carry their own time; everything else happens "now"
        let event_time = tx.and_then(|t| t.date).unwrap_or(now);
        let local = event_time.with_timezone(&offset);
        ctx.time_of_day = Some(TimeOfDay::from_hour(local.hour()));
        ctx.day_of_week = Some(local.format("%A").to_string());
        ctx.is_unusual_time = is_unusual_time(local.hour(), &ctx.transaction_history, prefs);

        ctx.financial_health_score = Some(health_score(
            ctx.budget_status.as_ref().map(|b| b.percentage_used),
            ctx.previous_month_comparison,
        ));

        Ok(ctx)
    }

    fn spending_pattern(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        exclude_id: Option<i64>,
        prefs: &UserPreferences,
        profile: &UserProfile,
    ) -> Result<SpendingPattern> {
        let window_days = self.config.pattern_window_days.max(1);
        let since = now - Duration::days(window_days);
        let expenses: Vec<Transaction> = self
            .db
            .transactions_since(user_id, since, exclude_id)?
            .into_iter()
            .filter(|t| t.is_expense())
            .collect();

        let mut pattern = SpendingPattern {
            usually_exceeds_budget: profile.frequently_exceeds_budget,
            transaction_count: expenses.len(),
            ..Default::default()
        };
        if expenses.is_empty() {
            return Ok(pattern);
        }

        let mut by_category: HashMap<&str, usize> = HashMap::new();
        let mut by_hour: HashMap<u32, usize> = HashMap::new();
        for t in &expenses {
            *by_category.entry(t.category.as_str()).or_insert(0) += 1;
            *by_hour.entry(prefs.local_hour(t.date)).or_insert(0) += 1;
        }

        let ranked = rank(by_category);
        pattern.usual_categories = ranked
            .iter()
            .take(USUAL_CATEGORY_COUNT)
            .map(|(c, _)| c.to_string())
            .collect();
        pattern.unusual_categories = ranked
            .iter()
            .skip(ranked.len().saturating_sub(3))
            .filter(|(_, count)| *count == 1)
            .map(|(c, _)| c.to_string())
            .collect();
        pattern.peak_hours = rank(by_hour)
            .into_iter()
            .take(PEAK_HOUR_COUNT)
            .map(|(h, _)| h)
            .collect();

        let total: f64 = expenses.iter().map(|t| t.amount.abs()).sum();
        pattern.average_daily_spend = total / window_days as f64;
        pattern.average_transaction = total / expenses.len() as f64;

        Ok(pattern)
    }

    fn budget_status(
        &self,
        user_id: &str,
        category: &str,
        today: NaiveDate,
    ) -> Result<Option<BudgetStatus>> {
        let Some(budget) = self.db.budget_for_category(user_id, category)? else {
            return Ok(None);
        };

        let (start, end) = current_month(today);
        let spent = self
            .db
            .expense_total_between(user_id, Some(&budget.category), start, end)?;
        let percentage_used = if budget.amount > 0.0 {
            spent / budget.amount * 100.0
        } else {
            0.0
        };

        Ok(Some(BudgetStatus {
            budget_id: budget.id,
            amount: budget.amount,
            spent,
            percentage_used,
            remaining: budget.amount - spent,
        }))
    }

    fn similar_transactions(
        &self,
        user_id: &str,
        category: &str,
        vendor: &str,
        exclude_id: Option<i64>,
        history: &[Transaction],
    ) -> Result<Vec<Transaction>> {
        let mut similar =
            self.db
                .transactions_in_category(user_id, category, self.config.similar_limit, exclude_id)?;

        let same_vendor: Vec<Transaction> = history
            .iter()
            .filter(|t| t.vendor.eq_ignore_ascii_case(vendor))
            .filter(|t| !similar.iter().any(|s| s.id == t.id))
            .take(SAME_VENDOR_LIMIT)
            .cloned()
            .collect();
        similar.extend(same_vendor);
        Ok(similar)
    }

    fn previous_month_comparison(
        &self,
        user_id: &str,
        category: &str,
        today: NaiveDate,
    ) -> Result<Option<f64>> {
        let (start, end) = current_month(today);
        let this_month = self
            .db
            .expense_total_between(user_id, Some(category), start, end)?;
        let last_month = self.db.expense_total_between(
            user_id,
            Some(category),
            months_back(today, 1),
            start,
        )?;

        if last_month <= 0.0 {
            return Ok(None);
        }
        Ok(Some((this_month - last_month) / last_month * 100.0))
    }
}

/// `[first of this month, first of next month)`
fn current_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = month_start(today);
    let end = start
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}

/// Sort by count descending, ties by key
fn rank<K: Ord + Copy>(counts: HashMap<K, usize>) -> Vec<(K, usize)> {
    let mut ranked: Vec<(K, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

fn category_average(history: &[Transaction], category: &str) -> Option<f64> {
    let amounts: Vec<f64> = history
        .iter()
        .filter(|t| t.is_expense() && t.category.eq_ignore_ascii_case(category))
        .map(|t| t.amount.abs())
        .collect();
    if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum::<f64>() / amounts.len() as f64)
    }
}

fn is_unusual_time(hour: u32, history: &[Transaction], prefs: &UserPreferences) -> bool {
    if history.is_empty() {
        return false;
    }
    let mean = history
        .iter()
        .map(|t| prefs.local_hour(t.date) as f64)
        .sum::<f64>()
        / history.len() as f64;
    (hour as f64 - mean).abs() > 4.0
}

/// 0-100 from budget usage and month-over-month trend
pub fn health_score(budget_percentage: Option<f64>, trend: Option<f64>) -> f64 {
    let mut score = 50.0;

    if let Some(pct) = budget_percentage {
        score += if pct <= 75.0 {
            30.0
        } else if pct <= 90.0 {
            20.0
        } else if pct <= 100.0 {
            10.0
        } else {
            -10.0
        };
    }

    if let Some(trend) = trend {
        score += if trend < 0.0 {
            20.0
        } else if trend < 10.0 {
            10.0
        } else {
            -10.0
        };
    }

    f64::clamp(score, 0.0, 100.0)
}
