//! Personalization - relevance scoring and learning from interactions
//!
//! Profiles are cached per user in a `DashMap`. A cache miss loads the stored
//! learned fields and re-derives the aggregate fields from finance data.

use chrono::{DateTime, Duration, Timelike, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::PersonalizationConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    EngagementLevel, InteractionRecord, Notification, NotificationAction, NotificationCategory,
    UserPreferences, UserProfile,
};

use super::types::{NotificationContext, TriggerKind};

/// Default when the profile has no usable transaction average
const DEFAULT_AVERAGE_TRANSACTION: f64 = 1000.0;

const LEARNING_STEP: f64 = 0.1;

/// Window the profile's average transaction is computed over
const PROFILE_WINDOW_DAYS: i64 = 90;

/// Relevance scoring and profile learning for all users
pub struct Personalizer {
    db: Database,
    config: PersonalizationConfig,
    profiles: DashMap<String, UserProfile>,
}

impl Personalizer {
    pub fn new(db: Database, config: PersonalizationConfig) -> Self {
        Self {
            db,
            config,
            profiles: DashMap::new(),
        }
    }

    /// Cached profile, loading and deriving it on a miss
    pub fn profile(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserProfile> {
        if let Some(profile) = self.profiles.get(user_id) {
            return Ok(profile.value().clone());
        }

        let mut profile = self
            .db
            .get_profile(user_id)?
            .unwrap_or_else(|| UserProfile::for_user(user_id));
        self.derive_aggregates(&mut profile, now)?;

        debug!(
            user = user_id,
            engagement = profile.engagement_level.as_str(),
            "Loaded user profile"
        );
        self.profiles.insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    /// Drop a cached profile so the next read reloads it
    pub fn invalidate(&self, user_id: &str) {
        self.profiles.remove(user_id);
    }

    fn derive_aggregates(&self, profile: &mut UserProfile, now: DateTime<Utc>) -> Result<()> {
        let user_id = profile.user_id.clone();

        let since = now - Duration::days(PROFILE_WINDOW_DAYS);
        let expenses: Vec<f64> = self
            .db
            .transactions_since(&user_id, since, None)?
            .iter()
            .filter(|t| t.is_expense())
            .map(|t| t.amount.abs())
            .collect();
        profile.average_transaction_amount = if expenses.is_empty() {
            0.0
        } else {
            expenses.iter().sum::<f64>() / expenses.len() as f64
        };

        profile.has_active_goals = self.db.has_active_goals(&user_id)?;
        profile.frequently_exceeds_budget =
            self.db.months_over_budget(&user_id, now.date_naive(), 3)? >= 2;
        profile.frequently_late_on_bills = self.db.count_late_bills(&user_id)? >= 2;

        let recent = self
            .db
            .recent_interactions(&user_id, self.config.interaction_window)?;
        profile.engagement_level = engagement_level(&recent);
        Ok(())
    }

    /// Relevance of a trigger to this user, 0-100
    ///
    /// The same-type interactions among the user's last `interaction_window`
    /// nudge the base score; a failed history lookup leaves it untouched.
    pub fn relevance(
        &self,
        user_id: &str,
        kind: &TriggerKind,
        profile: &UserProfile,
        ctx: &NotificationContext,
    ) -> f64 {
        let base = base_relevance(kind, profile, ctx);
        let boost = match self
            .db
            .recent_interactions(user_id, self.config.interaction_window)
        {
            Ok(history) => {
                let same_type: Vec<InteractionRecord> = history
                    .into_iter()
                    .filter(|r| r.trigger_type == kind.as_str())
                    .collect();
                interaction_boost(&same_type)
            }
            Err(e) => {
                warn!(user = user_id, error = %e, "Interaction history unavailable");
                0.0
            }
        };
        (base + boost).clamp(0.0, 100.0)
    }

    /// Best time to deliver a non-urgent notification
    pub fn optimal_delivery_time(
        &self,
        profile: &UserProfile,
        prefs: &UserPreferences,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        optimal_delivery_time(
            profile,
            prefs,
            now,
            Duration::hours(self.config.optimal_time_horizon_hours),
        )
    }

    /// Store the interaction record for a freshly created notification
    pub fn record_created(
        &self,
        notification: &Notification,
        subject_category: Option<&str>,
    ) -> Result<()> {
        self.db.insert_interaction(&InteractionRecord {
            notification_id: notification.id.clone(),
            user_id: notification.user_id.clone(),
            category: notification.category,
            trigger_type: notification.trigger_type.clone(),
            subject_category: subject_category.map(str::to_string),
            importance: notification.importance_score,
            relevance: notification.relevance_score,
            opened: false,
            action_taken: None,
            dismissed_within_seconds: None,
            created_at: notification.created_at,
        })
    }

    /// Learn from a user's action on a notification
    ///
    /// Engagement actions raise the category engagement and subject interest;
    /// a quick dismiss lowers them. The local hour becomes more "active"
    /// either way.
    pub fn learn(
        &self,
        notification_id: &str,
        action: NotificationAction,
        prefs: &UserPreferences,
        at: DateTime<Utc>,
    ) -> Result<Option<InteractionRecord>> {
        let Some(record) = self.db.record_interaction_action(notification_id, action, at)? else {
            return Ok(None);
        };

        let mut profile = self.profile(&record.user_id, at)?;
        let delta = if action.is_engagement() {
            LEARNING_STEP
        } else if record.is_quick_dismiss() {
            -LEARNING_STEP
        } else {
            0.0
        };

        if delta != 0.0 {
            let engagement = profile.engagement(record.category);
            profile.engagement_scores.insert(
                record.category.as_str().to_string(),
                (engagement + delta).clamp(0.0, 1.0),
            );
            if let Some(subject) = &record.subject_category {
                let interest = profile.interest(subject);
                profile
                    .category_interests
                    .insert(subject.clone(), (interest + delta).clamp(0.0, 1.0));
            }
        }

        let hour = prefs.local_hour(at);
        *profile.active_hours.entry(hour).or_insert(0) += 1;

        self.db.save_profile(&profile)?;
        self.profiles.insert(record.user_id.clone(), profile);
        Ok(Some(record))
    }
}

/// Relevance before interaction history
pub fn base_relevance(kind: &TriggerKind, profile: &UserProfile, ctx: &NotificationContext) -> f64 {
    match kind {
        TriggerKind::TransactionCreated { transaction } => {
            let mut score = 50.0 + (profile.interest(&transaction.category) - 0.5) * 40.0;

            let avg = if profile.average_transaction_amount > 0.0 {
                profile.average_transaction_amount
            } else {
                DEFAULT_AVERAGE_TRANSACTION
            };
            let amount = transaction.abs_amount();
            if amount >= avg * 2.0 {
                score += 20.0;
            } else if amount >= avg {
                score += 10.0;
            }

            if ctx.budget_status.is_some() {
                score += 15.0;
            }
            score
        }
        TriggerKind::BudgetThreshold { .. } => {
            let mut score = 60.0;
            if profile.frequently_exceeds_budget {
                score += 20.0;
            }
            score + (profile.engagement(NotificationCategory::BudgetAlert) - 0.5) * 40.0
        }
        TriggerKind::BillDue { days_until_due, .. } => {
            let days = *days_until_due;
            let mut score = 50.0
                + if days <= 1 {
                    30.0
                } else if days <= 3 {
                    20.0
                } else if days <= 7 {
                    10.0
                } else {
                    0.0
                };
            if profile.frequently_late_on_bills {
                score += 20.0;
            }
            score + (profile.engagement(NotificationCategory::BillReminder) - 0.5) * 20.0
        }
        TriggerKind::GoalMilestone { .. } => {
            let mut score =
                55.0 + (profile.engagement(NotificationCategory::GoalProgress) - 0.5) * 50.0;
            if profile.has_active_goals {
                score += 20.0;
            }
            score
        }
        TriggerKind::InsightGenerated { .. } => {
            let mut score =
                45.0 + (profile.engagement(NotificationCategory::AiInsight) - 0.5) * 60.0;
            if profile.engagement_level == EngagementLevel::High {
                score += 20.0;
            }
            score
        }
        TriggerKind::AnomalyDetected { .. } | TriggerKind::CashflowPrediction { .. } => 50.0,
    }
}

/// Score adjustment from how the user treated similar notifications
pub fn interaction_boost(history: &[InteractionRecord]) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    let n = history.len() as f64;
    let open_rate = history.iter().filter(|r| r.opened).count() as f64 / n;
    let action_rate = history
        .iter()
        .filter(|r| r.action_taken.is_some_and(|a| a != NotificationAction::Dismiss))
        .count() as f64
        / n;
    let quick_dismiss_rate = history.iter().filter(|r| r.is_quick_dismiss()).count() as f64 / n;

    (open_rate - 0.5) * 20.0 + (action_rate - 0.3) * 25.0 - quick_dismiss_rate * 15.0
}

/// Engagement bucket from open rate over recent interactions
pub fn engagement_level(recent: &[InteractionRecord]) -> EngagementLevel {
    if recent.is_empty() {
        return EngagementLevel::Medium;
    }
    let open_rate = recent.iter().filter(|r| r.opened).count() as f64 / recent.len() as f64;
    if open_rate >= 0.7 {
        EngagementLevel::High
    } else if open_rate < 0.3 && recent.len() >= 5 {
        EngagementLevel::Low
    } else {
        EngagementLevel::Medium
    }
}

/// Next top-ranked active hour later today within `horizon`, else tomorrow
/// at the busiest hour. Hours are in the user's timezone.
pub fn optimal_delivery_time(
    profile: &UserProfile,
    prefs: &UserPreferences,
    now: DateTime<Utc>,
    horizon: Duration,
) -> Option<DateTime<Utc>> {
    if !prefs.learn_optimal_times {
        return None;
    }
    let ranked = profile.top_active_hours(3);
    let first = *ranked.first()?;

    let local_now = now.with_timezone(&prefs.offset());
    let at_hour = |date: chrono::NaiveDate, hour: u32| {
        date.and_hms_opt(hour, 0, 0)
            .and_then(|naive| naive.and_local_timezone(prefs.offset()).single())
            .map(|local| local.with_timezone(&Utc))
    };

    for hour in &ranked {
        if *hour > local_now.hour() {
            let candidate = at_hour(local_now.date_naive(), *hour)?;
            if candidate - now <= horizon {
                return Some(candidate);
            }
        }
    }

    let tomorrow = local_now.date_naive().succ_opt()?;
    at_hour(tomorrow, first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBill, NewTransaction, TransactionType};
    use crate::notify::types::{BudgetStatus, TransactionEvent};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 10, 20, 0).unwrap()
    }

    fn record(opened: bool, action: Option<NotificationAction>, secs: Option<f64>) -> InteractionRecord {
        InteractionRecord {
            notification_id: "n".into(),
            user_id: "u1".into(),
            category: NotificationCategory::SmartTransaction,
            trigger_type: "transaction_created".into(),
            subject_category: Some("Food".into()),
            importance: 50.0,
            relevance: 50.0,
            opened,
            action_taken: action,
            dismissed_within_seconds: secs,
            created_at: now(),
        }
    }

    fn tx_kind(amount: f64, category: &str) -> TriggerKind {
        TriggerKind::TransactionCreated {
            transaction: TransactionEvent {
                id: None,
                amount,
                vendor: "Shop".into(),
                category: category.into(),
                transaction_type: TransactionType::Expense,
                date: None,
            },
        }
    }

    #[test]
    fn test_transaction_relevance() {
        let mut profile = UserProfile::for_user("u1");
        let ctx = NotificationContext::default();

        // Unknown interest and the 1000 default average
        assert_eq!(base_relevance(&tx_kind(500.0, "Food"), &profile, &ctx), 50.0);
        assert_eq!(base_relevance(&tx_kind(1500.0, "Food"), &profile, &ctx), 60.0);
        assert_eq!(base_relevance(&tx_kind(2000.0, "Food"), &profile, &ctx), 70.0);

        profile.category_interests.insert("Food".into(), 1.0);
        profile.average_transaction_amount = 4000.0;
        let ctx = NotificationContext {
            budget_status: Some(BudgetStatus {
                budget_id: 1,
                amount: 1000.0,
                spent: 10.0,
                percentage_used: 1.0,
                remaining: 990.0,
            }),
            ..Default::default()
        };
        assert_eq!(base_relevance(&tx_kind(2000.0, "Food"), &profile, &ctx), 85.0);
    }

    #[test]
    fn test_anomaly_relevance_is_flat() {
        let mut profile = UserProfile::for_user("u1");
        profile.category_interests.insert("Food".into(), 1.0);
        let ctx = NotificationContext::default();

        let kind = match tx_kind(5000.0, "Food") {
            TriggerKind::TransactionCreated { transaction } => TriggerKind::AnomalyDetected {
                transaction,
                reasons: vec!["Very high amount".into()],
            },
            other => other,
        };
        assert_eq!(base_relevance(&kind, &profile, &ctx), 50.0);
        assert_eq!(base_relevance(&tx_kind(5000.0, "Food"), &profile, &ctx), 90.0);
    }

    #[test]
    fn test_other_relevance() {
        let mut profile = UserProfile::for_user("u1");
        let ctx = NotificationContext::default();
        let bill = |days| TriggerKind::BillDue {
            bill: crate::notify::types::BillEvent {
                id: None,
                name: "Rent".into(),
                amount: 1.0,
                bill_type: "rent".into(),
                due_date: None,
            },
            days_until_due: days,
        };
        assert_eq!(base_relevance(&bill(1), &profile, &ctx), 80.0);
        assert_eq!(base_relevance(&bill(7), &profile, &ctx), 60.0);

        profile.frequently_late_on_bills = true;
        profile
            .engagement_scores
            .insert("bill_reminder".into(), 1.0);
        assert_eq!(base_relevance(&bill(14), &profile, &ctx), 80.0);

        let goal = TriggerKind::GoalMilestone {
            goal_id: None,
            goal_name: "Trip".into(),
            milestone: 50.0,
        };
        profile.has_active_goals = true;
        assert_eq!(base_relevance(&goal, &profile, &ctx), 75.0);

        let insight = TriggerKind::InsightGenerated {
            insight_type: "x".into(),
            title: "t".into(),
            description: "d".into(),
            potential_savings: 0.0,
            is_actionable: false,
        };
        profile.engagement_level = EngagementLevel::High;
        assert_eq!(base_relevance(&insight, &profile, &ctx), 65.0);
    }

    #[test]
    fn test_interaction_boost() {
        assert_eq!(interaction_boost(&[]), 0.0);

        let engaged = vec![
            record(true, Some(NotificationAction::View), Some(30.0)),
            record(true, Some(NotificationAction::PayNow), Some(60.0)),
        ];
        // (1 - 0.5) * 20 + (1 - 0.3) * 25
        assert!((interaction_boost(&engaged) - 27.5).abs() < 1e-9);

        let dismissive = vec![
            record(true, Some(NotificationAction::Dismiss), Some(2.0)),
            record(false, None, None),
        ];
        // (0.5 - 0.5) * 20 + (0 - 0.3) * 25 - 0.5 * 15
        assert!((interaction_boost(&dismissive) + 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_interaction_window_covers_all_types() {
        let db = Database::in_memory().unwrap();
        let personalizer =
            Personalizer::new(db.clone(), crate::config::EngineConfig::default().personalization);
        let profile = UserProfile::for_user("u1");
        let ctx = NotificationContext::default();
        let kind = tx_kind(500.0, "Food");

        let mut engaged = record(true, Some(NotificationAction::View), Some(30.0));
        engaged.notification_id = "old".into();
        engaged.created_at = now() - Duration::days(2);
        db.insert_interaction(&engaged).unwrap();
        assert!((personalizer.relevance("u1", &kind, &profile, &ctx) - 77.5).abs() < 1e-9);

        // Twenty newer bill reminders push it out of the window
        for i in 0..20 {
            let mut bill = record(false, None, None);
            bill.notification_id = format!("bill-{}", i);
            bill.trigger_type = "bill_due".into();
            bill.created_at = now() - Duration::hours(i);
            db.insert_interaction(&bill).unwrap();
        }
        assert_eq!(personalizer.relevance("u1", &kind, &profile, &ctx), 50.0);
    }

    #[test]
    fn test_engagement_level() {
        assert_eq!(engagement_level(&[]), EngagementLevel::Medium);

        let opened: Vec<_> = (0..4).map(|_| record(true, None, None)).collect();
        assert_eq!(engagement_level(&opened), EngagementLevel::High);

        let ignored: Vec<_> = (0..5).map(|_| record(false, None, None)).collect();
        assert_eq!(engagement_level(&ignored), EngagementLevel::Low);
        assert_eq!(engagement_level(&ignored[..3]), EngagementLevel::Medium);
    }

    #[test]
    fn test_optimal_delivery_time() {
        let mut profile = UserProfile::for_user("u1");
        let prefs = UserPreferences::default();
        let horizon = Duration::hours(8);

        assert!(optimal_delivery_time(&profile, &prefs, now(), horizon).is_none());

        profile.active_hours.insert(20, 9);
        profile.active_hours.insert(13, 5);
        profile.active_hours.insert(8, 2);

        // 20:00 is more than 8h away, so the next ranked hour wins
        let at = optimal_delivery_time(&profile, &prefs, now(), horizon).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 15, 13, 0, 0).unwrap());

        // After every ranked hour has passed, tomorrow at the busiest one
        let late = Utc.with_ymd_and_hms(2024, 5, 15, 21, 5, 0).unwrap();
        let at = optimal_delivery_time(&profile, &prefs, late, horizon).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 16, 20, 0, 0).unwrap());

        let off = UserPreferences {
            learn_optimal_times: false,
            ..Default::default()
        };
        assert!(optimal_delivery_time(&profile, &off, now(), horizon).is_none());
    }

    #[test]
    fn test_optimal_delivery_time_respects_offset() {
        let mut profile = UserProfile::for_user("u1");
        profile.active_hours.insert(18, 3);
        let prefs = UserPreferences {
            timezone_offset_minutes: 330,
            ..Default::default()
        };
        // 10:20 UTC is 15:50 local; 18:00 local is 12:30 UTC
        let at = optimal_delivery_time(&profile, &prefs, now(), Duration::hours(8)).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 15, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_profile_derived_on_miss() {
        let db = Database::in_memory().unwrap();
        for (amount, days) in [(1000.0, 5), (3000.0, 10), (999_999.0, 200)] {
            db.insert_transaction(&NewTransaction {
                user_id: "u1".into(),
                amount,
                vendor: "Shop".into(),
                category: "Food".into(),
                transaction_type: TransactionType::Expense,
                date: now() - Duration::days(days),
            })
            .unwrap();
        }
        db.create_goal("u1", "Trip", 10_000.0, 0.0).unwrap();
        for day in [1, 2] {
            let id = db
                .create_bill(&NewBill {
                    user_id: "u1".into(),
                    name: format!("Bill {}", day),
                    amount: 100.0,
                    bill_type: "utility".into(),
                    due_date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
                })
                .unwrap();
            db.mark_bill_paid(id, Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap())
                .unwrap();
        }

        let personalizer = Personalizer::new(db, crate::config::EngineConfig::default().personalization);
        let profile = personalizer.profile("u1", now()).unwrap();
        assert_eq!(profile.average_transaction_amount, 2000.0);
        assert!(profile.has_active_goals);
        assert!(profile.frequently_late_on_bills);
        assert!(!profile.frequently_exceeds_budget);
        assert_eq!(profile.engagement_level, EngagementLevel::Medium);
    }

    #[test]
    fn test_learning_from_actions() {
        let db = Database::in_memory().unwrap();
        let personalizer =
            Personalizer::new(db.clone(), crate::config::EngineConfig::default().personalization);
        let prefs = UserPreferences::for_user("u1");

        let mut quick = record(false, None, None);
        quick.notification_id = "n-quick".into();
        db.insert_interaction(&quick).unwrap();
        let mut viewed = record(false, None, None);
        viewed.notification_id = "n-view".into();
        db.insert_interaction(&viewed).unwrap();

        personalizer
            .learn("n-view", NotificationAction::View, &prefs, now() + Duration::minutes(1))
            .unwrap()
            .unwrap();
        let profile = personalizer.profile("u1", now()).unwrap();
        assert!((profile.engagement(NotificationCategory::SmartTransaction) - 0.6).abs() < 1e-9);
        assert!((profile.interest("Food") - 0.6).abs() < 1e-9);
        assert_eq!(profile.active_hours.get(&10), Some(&1));

        let updated = personalizer
            .learn("n-quick", NotificationAction::Dismiss, &prefs, now() + Duration::seconds(2))
            .unwrap()
            .unwrap();
        assert!(updated.is_quick_dismiss());
        let profile = personalizer.profile("u1", now()).unwrap();
        assert!((profile.engagement(NotificationCategory::SmartTransaction) - 0.5).abs() < 1e-9);
        assert_eq!(profile.active_hours.get(&10), Some(&2));

        // Learned fields survive a cache flush
        personalizer.invalidate("u1");
        let reloaded = personalizer.profile("u1", now()).unwrap();
        assert_eq!(reloaded.active_hours.get(&10), Some(&2));

        assert!(personalizer
            .learn("missing", NotificationAction::View, &prefs, now())
            .unwrap()
            .is_none());
    }
}
