//! Triggers built from stored records
//!
//! Sweeps compare budgets, bills, and goals against the user's thresholds
//! and emit triggers with dedupe keys, so running a sweep twice never
//! notifies twice.

use chrono::{DateTime, Utc};

use crate::db::{month_start, Database};
use crate::error::Result;
use crate::models::{Goal, TransactionType, UserPreferences};

use super::types::{BillEvent, TransactionEvent, Trigger, TriggerKind};

/// Goal progress milestones worth celebrating
pub const GOAL_MILESTONES: [f64; 4] = [25.0, 50.0, 75.0, 100.0];

/// One trigger per budget whose spend this month crossed a threshold
///
/// Only the highest crossed threshold fires.
pub fn budget_sweep(
    db: &Database,
    prefs: &UserPreferences,
    now: DateTime<Utc>,
) -> Result<Vec<Trigger>> {
    let today = now.with_timezone(&prefs.offset()).date_naive();
    let start = month_start(today);
    let end = today.succ_opt().unwrap_or(today);

    let mut thresholds = prefs.budget_alert_thresholds.clone();
    thresholds.retain(|t| t.is_finite() && *t > 0.0);
    thresholds.sort_by(|a, b| b.total_cmp(a));

    let mut triggers = Vec::new();
    for budget in db.list_budgets(&prefs.user_id)? {
        if budget.amount <= 0.0 {
            continue;
        }
        let spent = db.expense_total_between(&prefs.user_id, Some(&budget.category), start, end)?;
        let fraction = spent / budget.amount;

        let Some(threshold) = thresholds.iter().find(|t| fraction >= **t) else {
            continue;
        };

        let key = format!(
            "budget:{}:{}:{}",
            budget.id,
            today.format("%Y-%m"),
            threshold
        );
        triggers.push(
            Trigger::new(
                &prefs.user_id,
                TriggerKind::BudgetThreshold {
                    budget_id: Some(budget.id),
                    category: budget.category.clone(),
                    percentage: fraction,
                    spent,
                    limit: budget.amount,
                },
                now,
            )
            .with_dedupe_key(key),
        );
    }
    Ok(triggers)
}

/// One trigger per unpaid bill due in one of the reminder days
pub fn bill_sweep(
    db: &Database,
    prefs: &UserPreferences,
    now: DateTime<Utc>,
) -> Result<Vec<Trigger>> {
    let today = now.with_timezone(&prefs.offset()).date_naive();

    let triggers = db
        .list_bills(&prefs.user_id, true)?
        .into_iter()
        .filter_map(|bill| {
            let days = bill.days_until_due(today);
            if !prefs.bill_reminder_days.contains(&days) {
                return None;
            }
            let key = format!("bill:{}:{}:{}", bill.id, bill.due_date, days);
            Some(
                Trigger::new(
                    &prefs.user_id,
                    TriggerKind::BillDue {
                        bill: BillEvent {
                            id: Some(bill.id),
                            name: bill.name,
                            amount: bill.amount,
                            bill_type: bill.bill_type,
                            due_date: Some(bill.due_date),
                        },
                        days_until_due: days,
                    },
                    now,
                )
                .with_dedupe_key(key),
            )
        })
        .collect();
    Ok(triggers)
}

/// Trigger for the highest milestone an active goal has reached
pub fn goal_milestone_trigger(goal: &Goal, now: DateTime<Utc>) -> Option<Trigger> {
    if !goal.is_active {
        return None;
    }
    let progress = goal.progress_percent();
    let milestone = GOAL_MILESTONES
        .iter()
        .rev()
        .find(|m| progress >= **m)
        .copied()?;

    Some(
        Trigger::new(
            &goal.user_id,
            TriggerKind::GoalMilestone {
                goal_id: Some(goal.id),
                goal_name: goal.name.clone(),
                milestone,
            },
            now,
        )
        .with_dedupe_key(format!("goal:{}:{}", goal.id, milestone)),
    )
}

/// Milestone triggers for every goal of a user
pub fn goal_sweep(db: &Database, user_id: &str, now: DateTime<Utc>) -> Result<Vec<Trigger>> {
    Ok(db
        .list_goals(user_id)?
        .iter()
        .filter_map(|goal| goal_milestone_trigger(goal, now))
        .collect())
}

/// A representative transaction for trying the pipeline out
pub fn sample_trigger(user_id: &str, now: DateTime<Utc>) -> Trigger {
    Trigger::new(
        user_id,
        TriggerKind::TransactionCreated {
            transaction: TransactionEvent {
                id: None,
                amount: 5000.0,
                vendor: "TestMerchant".to_string(),
                category: "Shopping".to_string(),
                transaction_type: TransactionType::Expense,
                date: Some(now),
            },
        },
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBill, NewTransaction};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
    }

    fn spend(db: &Database, amount: f64, category: &str) {
        db.insert_transaction(&NewTransaction {
            user_id: "u1".into(),
            amount,
            vendor: "Shop".into(),
            category: category.into(),
            transaction_type: TransactionType::Expense,
            date: now() - Duration::days(1),
        })
        .unwrap();
    }

    #[test]
    fn test_budget_sweep_picks_highest_threshold() {
        let db = Database::in_memory().unwrap();
        let food = db.upsert_budget("u1", "Food", 1000.0).unwrap();
        db.upsert_budget("u1", "Travel", 1000.0).unwrap();
        spend(&db, 950.0, "Food");
        spend(&db, 100.0, "Travel");

        let prefs = UserPreferences::for_user("u1");
        let triggers = budget_sweep(&db, &prefs, now()).unwrap();
        assert_eq!(triggers.len(), 1);

        let trigger = &triggers[0];
        assert_eq!(
            trigger.dedupe_key.as_deref(),
            Some(format!("budget:{}:2024-05:0.9", food).as_str())
        );
        match &trigger.kind {
            TriggerKind::BudgetThreshold {
                category,
                percentage,
                spent,
                limit,
                ..
            } => {
                assert_eq!(category, "Food");
                assert!((percentage - 0.95).abs() < 1e-9);
                assert_eq!(*spent, 950.0);
                assert_eq!(*limit, 1000.0);
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_bill_sweep_matches_reminder_days() {
        let db = Database::in_memory().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let mut ids = Vec::new();
        for (name, days) in [("Rent", 3), ("Gym", 5), ("Power", 0)] {
            ids.push(
                db.create_bill(&NewBill {
                    user_id: "u1".into(),
                    name: name.into(),
                    amount: 500.0,
                    bill_type: "utility".into(),
                    due_date: today + Duration::days(days),
                })
                .unwrap(),
            );
        }
        db.mark_bill_paid(ids[2], now()).unwrap();

        let triggers = bill_sweep(&db, &UserPreferences::for_user("u1"), now()).unwrap();
        assert_eq!(triggers.len(), 1);
        assert_eq!(
            triggers[0].dedupe_key.as_deref(),
            Some(format!("bill:{}:2024-05-23:3", ids[0]).as_str())
        );
    }

    #[test]
    fn test_goal_milestones() {
        let mut goal = Goal {
            id: 7,
            user_id: "u1".into(),
            name: "Trip".into(),
            target_amount: 1000.0,
            current_amount: 100.0,
            is_active: true,
            created_at: now(),
        };
        assert!(goal_milestone_trigger(&goal, now()).is_none());

        goal.current_amount = 800.0;
        let trigger = goal_milestone_trigger(&goal, now()).unwrap();
        assert_eq!(trigger.dedupe_key.as_deref(), Some("goal:7:75"));

        goal.is_active = false;
        assert!(goal_milestone_trigger(&goal, now()).is_none());
    }

    #[test]
    fn test_sample_trigger() {
        let trigger = sample_trigger("u1", now());
        let tx = trigger.kind.transaction().unwrap();
        assert_eq!(tx.amount, 5000.0);
        assert_eq!(tx.vendor, "TestMerchant");
        assert_eq!(tx.category, "Shopping");
    }
}
