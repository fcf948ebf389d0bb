//! Importance scoring and priority selection

use crate::config::PriorityBands;
use crate::models::{NotificationCategory, Priority};

use super::types::{NotificationContext, TriggerKind};

/// Trigger types whose insight is worth surfacing prominently
const HIGH_VALUE_INSIGHTS: &[&str] = &[
    "spending_spike",
    "savings_opportunity",
    "fraud_risk",
    "budget_forecast",
    "cashflow_warning",
];

const ESSENTIAL_CATEGORIES: &[&str] = &["loan emi", "insurance", "healthcare", "rent"];

const CRITICAL_BILL_TYPES: &[&str] = &["electricity", "rent", "loan", "credit card", "insurance"];

/// Objective significance of a trigger, 0-100
pub struct NotificationScorer;

impl NotificationScorer {
    pub fn new() -> Self {
        Self
    }

    /// Importance of a trigger given its context
    ///
    /// `is_anomaly` adds a flat bonus on top of the per-kind score.
    pub fn importance(
        &self,
        kind: &TriggerKind,
        ctx: &NotificationContext,
        is_anomaly: bool,
    ) -> f64 {
        let mut score = match kind {
            TriggerKind::TransactionCreated { transaction } => {
                let amount = transaction.abs_amount();
                let mut score = 40.0 + amount_bonus(amount);

                if transaction.is_income() {
                    score += 15.0;
                }

                if let Some(avg) = ctx.user_average.filter(|avg| *avg > 0.0) {
                    let ratio = amount / avg;
                    score += if ratio >= 3.0 {
                        15.0
                    } else if ratio >= 2.0 {
                        10.0
                    } else if ratio >= 1.5 {
                        5.0
                    } else {
                        0.0
                    };
                }

                if let Some(budget) = &ctx.budget_status {
                    let pct = budget.percentage_used;
                    score += if pct >= 100.0 {
                        20.0
                    } else if pct >= 90.0 {
                        15.0
                    } else if pct >= 75.0 {
                        10.0
                    } else {
                        0.0
                    };
                }

                if ctx.is_unusual_time {
                    score += 10.0;
                }

                if contains_any(&transaction.category, ESSENTIAL_CATEGORIES) {
                    score += 10.0;
                }
                score
            }
            TriggerKind::BudgetThreshold { percentage, .. } => {
                let pct = *percentage;
                let mut score = 30.0
                    + if pct >= 1.1 {
                        40.0
                    } else if pct >= 1.0 {
                        30.0
                    } else if pct >= 0.9 {
                        20.0
                    } else if pct >= 0.75 {
                        10.0
                    } else {
                        0.0
                    };
                if ctx.spending_pattern.usually_exceeds_budget && pct >= 0.9 {
                    score += 10.0;
                }
                score
            }
            TriggerKind::BillDue {
                bill,
                days_until_due,
            } => {
                let urgency = match *days_until_due {
                    0 => 40.0,
                    1 => 30.0,
                    3 => 15.0,
                    7 => 5.0,
                    _ => 0.0,
                };
                let amount = bill.amount.abs();
                let size = if amount >= 10_000.0 {
                    15.0
                } else if amount >= 5000.0 {
                    10.0
                } else if amount >= 1000.0 {
                    5.0
                } else {
                    0.0
                };
                let critical = if contains_any(&bill.bill_type, CRITICAL_BILL_TYPES) {
                    10.0
                } else {
                    0.0
                };
                40.0 + urgency + size + critical
            }
            TriggerKind::GoalMilestone { milestone, .. } => {
                let m = *milestone;
                let mut score = 30.0
                    + if m >= 100.0 {
                        40.0
                    } else if m >= 75.0 {
                        25.0
                    } else if m >= 50.0 {
                        20.0
                    } else if m >= 25.0 {
                        15.0
                    } else if m >= 10.0 {
                        10.0
                    } else {
                        0.0
                    };
                // Early encouragement
                if m <= 10.0 {
                    score += 10.0;
                }
                score
            }
            TriggerKind::AnomalyDetected { .. } => 95.0,
            TriggerKind::InsightGenerated {
                insight_type,
                potential_savings,
                is_actionable,
                ..
            } => {
                let mut score = 35.0;
                if HIGH_VALUE_INSIGHTS.contains(&insight_type.as_str()) {
                    score += 25.0;
                }
                score += if *potential_savings >= 5000.0 {
                    20.0
                } else if *potential_savings >= 1000.0 {
                    10.0
                } else {
                    0.0
                };
                if *is_actionable {
                    score += 15.0;
                }
                score
            }
            TriggerKind::CashflowPrediction { .. } => 50.0,
        };

        if is_anomaly {
            score += 30.0;
        }

        score.clamp(0.0, 100.0)
    }
}

impl Default for NotificationScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn amount_bonus(amount: f64) -> f64 {
    if amount >= 50_000.0 {
        30.0
    } else if amount >= 10_000.0 {
        20.0
    } else if amount >= 5000.0 {
        10.0
    } else if amount >= 1000.0 {
        5.0
    } else {
        0.0
    }
}

fn contains_any(value: &str, needles: &[&str]) -> bool {
    let value = value.to_lowercase();
    needles.iter().any(|n| value.contains(n))
}

/// Priority from the two scores; fraud is always critical
pub fn select_priority(
    category: NotificationCategory,
    importance: f64,
    relevance: f64,
    bands: &PriorityBands,
) -> Priority {
    if category == NotificationCategory::FraudDetection {
        return Priority::Critical;
    }

    let avg = (importance + relevance) / 2.0;
    if avg >= bands.high {
        Priority::High
    } else if avg >= bands.medium {
        Priority::Medium
    } else if avg >= bands.low {
        Priority::Low
    } else {
        Priority::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use crate::notify::types::{BillEvent, BudgetStatus, TransactionEvent};

    fn tx(amount: f64, category: &str, transaction_type: TransactionType) -> TriggerKind {
        TriggerKind::TransactionCreated {
            transaction: TransactionEvent {
                id: None,
                amount,
                vendor: "Shop".into(),
                category: category.into(),
                transaction_type,
                date: None,
            },
        }
    }

    #[test]
    fn test_transaction_importance() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext::default();

        assert_eq!(scorer.importance(&tx(500.0, "Food", TransactionType::Expense), &ctx, false), 40.0);
        assert_eq!(scorer.importance(&tx(5000.0, "Food", TransactionType::Expense), &ctx, false), 50.0);
        assert_eq!(scorer.importance(&tx(-12_000.0, "Food", TransactionType::Expense), &ctx, false), 60.0);
        assert_eq!(scorer.importance(&tx(1000.0, "Salary", TransactionType::Income), &ctx, false), 60.0);
        assert_eq!(scorer.importance(&tx(100.0, "Rent", TransactionType::Expense), &ctx, false), 50.0);
    }

    #[test]
    fn test_transaction_context_bonuses() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext {
            user_average: Some(1000.0),
            budget_status: Some(BudgetStatus {
                budget_id: 1,
                amount: 10_000.0,
                spent: 9500.0,
                percentage_used: 95.0,
                remaining: 500.0,
            }),
            is_unusual_time: true,
            ..Default::default()
        };
        // 40 + 5 (amount) + 15 (3x) + 15 (95%) + 10 (time)
        assert_eq!(scorer.importance(&tx(3000.0, "Food", TransactionType::Expense), &ctx, false), 85.0);
    }

    #[test]
    fn test_large_anomalous_transaction_is_clamped() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext {
            user_average: Some(5000.0),
            ..Default::default()
        };
        let score = scorer.importance(&tx(50_000.0, "Shopping", TransactionType::Expense), &ctx, true);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_budget_importance() {
        let scorer = NotificationScorer::new();
        let mut ctx = NotificationContext::default();
        let kind = |percentage| TriggerKind::BudgetThreshold {
            budget_id: None,
            category: "Food".into(),
            percentage,
            spent: 0.0,
            limit: 0.0,
        };
        assert_eq!(scorer.importance(&kind(0.5), &ctx, false), 30.0);
        assert_eq!(scorer.importance(&kind(0.75), &ctx, false), 40.0);
        assert_eq!(scorer.importance(&kind(0.9), &ctx, false), 50.0);
        assert_eq!(scorer.importance(&kind(1.2), &ctx, false), 70.0);

        ctx.spending_pattern.usually_exceeds_budget = true;
        assert_eq!(scorer.importance(&kind(0.9), &ctx, false), 60.0);
        assert_eq!(scorer.importance(&kind(0.8), &ctx, false), 40.0);
    }

    #[test]
    fn test_bill_importance() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext::default();
        let kind = |days, amount: f64, bill_type: &str| TriggerKind::BillDue {
            bill: BillEvent {
                id: None,
                name: "Bill".into(),
                amount,
                bill_type: bill_type.into(),
                due_date: None,
            },
            days_until_due: days,
        };
        assert_eq!(scorer.importance(&kind(0, 500.0, "misc"), &ctx, false), 80.0);
        assert_eq!(scorer.importance(&kind(2, 500.0, "misc"), &ctx, false), 40.0);
        // 40 + 15 + 15 + 10
        assert_eq!(scorer.importance(&kind(3, 20_000.0, "Rent"), &ctx, false), 80.0);
    }

    #[test]
    fn test_goal_importance() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext::default();
        let kind = |milestone| TriggerKind::GoalMilestone {
            goal_id: None,
            goal_name: "Trip".into(),
            milestone,
        };
        assert_eq!(scorer.importance(&kind(100.0), &ctx, false), 70.0);
        assert_eq!(scorer.importance(&kind(50.0), &ctx, false), 50.0);
        assert_eq!(scorer.importance(&kind(10.0), &ctx, false), 50.0);
        assert_eq!(scorer.importance(&kind(5.0), &ctx, false), 40.0);
    }

    #[test]
    fn test_insight_and_fixed_importance() {
        let scorer = NotificationScorer::new();
        let ctx = NotificationContext::default();
        let insight = TriggerKind::InsightGenerated {
            insight_type: "savings_opportunity".into(),
            title: "Save".into(),
            description: "Cancel it".into(),
            potential_savings: 6000.0,
            is_actionable: true,
        };
        assert_eq!(scorer.importance(&insight, &ctx, false), 95.0);

        let anomaly = TriggerKind::AnomalyDetected {
            transaction: TransactionEvent {
                id: None,
                amount: 1.0,
                vendor: "x".into(),
                category: "y".into(),
                transaction_type: TransactionType::Expense,
                date: None,
            },
            reasons: vec![],
        };
        assert_eq!(scorer.importance(&anomaly, &ctx, false), 95.0);

        let cashflow = TriggerKind::CashflowPrediction {
            summary: "ok".into(),
            projected_balance: 0.0,
        };
        assert_eq!(scorer.importance(&cashflow, &ctx, false), 50.0);
    }

    #[test]
    fn test_select_priority() {
        let bands = crate::config::EngineConfig::default().priority;
        let cat = NotificationCategory::SmartTransaction;
        assert_eq!(select_priority(cat, 90.0, 80.0, &bands), Priority::High);
        assert_eq!(select_priority(cat, 70.0, 60.0, &bands), Priority::Medium);
        assert_eq!(select_priority(cat, 40.0, 40.0, &bands), Priority::Low);
        assert_eq!(select_priority(cat, 10.0, 20.0, &bands), Priority::Info);
        assert_eq!(
            select_priority(NotificationCategory::FraudDetection, 0.0, 0.0, &bands),
            Priority::Critical
        );
    }
}
