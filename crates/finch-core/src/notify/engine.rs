//! Notification Engine - the gate pipeline from trigger to notification

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::ai::AIClient;
use crate::config::EngineConfig;
use crate::db::Database;
use crate::delivery::PushDispatcher;
use crate::error::{Error, Result};
use crate::models::{
    Channel, Notification, NotificationAction, NotificationCategory, NotificationUpdate,
    PreferencesUpdate, Priority, UserPreferences, UserProfile,
};

use super::anomaly::AnomalyDetector;
use super::content::ContentGenerator;
use super::context::ContextGenerator;
use super::personalization::Personalizer;
use super::rate_limit::RateLimiter;
use super::scorer::{select_priority, NotificationScorer};
use super::triggers::{bill_sweep, budget_sweep, goal_sweep};
use super::types::{FilterReason, NotificationContext, Outcome, Trigger, TriggerKind};

/// Disambiguates ids generated within the same instant
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Decides whether a trigger becomes a notification, and builds it
pub struct NotificationEngine {
    db: Database,
    config: EngineConfig,
    context: ContextGenerator,
    detector: AnomalyDetector,
    scorer: NotificationScorer,
    personalizer: Personalizer,
    rate_limiter: RateLimiter,
    content: ContentGenerator,
    push: Option<PushDispatcher>,
}

impl NotificationEngine {
    pub fn new(db: Database, ai: Option<AIClient>, config: EngineConfig) -> Self {
        Self {
            context: ContextGenerator::new(db.clone(), config.context.clone()),
            detector: AnomalyDetector::new(&config.content.currency),
            scorer: NotificationScorer::new(),
            personalizer: Personalizer::new(db.clone(), config.personalization.clone()),
            rate_limiter: RateLimiter::new(),
            content: ContentGenerator::new(ai, config.content.clone()),
            push: None,
            db,
            config,
        }
    }

    /// Push urgent notifications through this dispatcher
    pub fn with_push(mut self, dispatcher: PushDispatcher) -> Self {
        self.push = Some(dispatcher);
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ai(&self) -> Option<&AIClient> {
        self.content.ai()
    }

    pub fn push(&self) -> Option<&PushDispatcher> {
        self.push.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn personalizer(&self) -> &Personalizer {
        &self.personalizer
    }

    /// Stored preferences, or defaults for a new user
    pub fn preferences(&self, user_id: &str) -> Result<UserPreferences> {
        Ok(self
            .db
            .get_preferences(user_id)?
            .unwrap_or_else(|| UserPreferences::for_user(user_id)))
    }

    /// Validate and apply a partial preferences update
    pub fn update_preferences(
        &self,
        user_id: &str,
        update: PreferencesUpdate,
    ) -> Result<UserPreferences> {
        update.validate().map_err(Error::InvalidData)?;
        let mut prefs = self.preferences(user_id)?;
        update.apply(&mut prefs);
        prefs.updated_at = Some(Utc::now());
        self.db.save_preferences(&prefs)?;
        Ok(prefs)
    }

    /// Run a trigger through every gate
    ///
    /// Only a persistence failure is an error; every other problem degrades
    /// (empty context, template copy, zero interaction boost).
    pub async fn process(&self, trigger: Trigger) -> Result<Outcome> {
        let user_id = trigger.user_id.clone();
        let now = trigger.timestamp;
        let trigger_type = trigger.trigger_type();

        let prefs = self.preferences(&user_id).unwrap_or_else(|e| {
            warn!(user = %user_id, error = %e, "Preferences unavailable, using defaults");
            UserPreferences::for_user(&user_id)
        });

        if !prefs.notifications_enabled {
            return Ok(filtered(&user_id, trigger_type, FilterReason::Disabled));
        }

        if !self.rate_limiter.is_allowed(
            &user_id,
            prefs.max_notifications_per_hour,
            prefs.max_notifications_per_day,
            now,
        ) {
            return Ok(filtered(&user_id, trigger_type, FilterReason::RateLimited));
        }

        let mut category = trigger.kind.category();
        if !prefs.is_category_enabled(category) {
            return Ok(filtered(
                &user_id,
                trigger_type,
                FilterReason::CategoryDisabled,
            ));
        }

        if let Some(key) = &trigger.dedupe_key {
            match self.db.dedupe_key_exists(&user_id, key) {
                Ok(true) => return Ok(filtered(&user_id, trigger_type, FilterReason::Duplicate)),
                Ok(false) => {}
                Err(e) => warn!(user = %user_id, error = %e, "Dedupe lookup failed"),
            }
        }

        let profile = self.personalizer.profile(&user_id, now).unwrap_or_else(|e| {
            warn!(user = %user_id, error = %e, "Profile unavailable, using defaults");
            UserProfile::for_user(&user_id)
        });

        let mut ctx = self
            .context
            .generate(&trigger, &prefs, &profile)
            .unwrap_or_else(|e| {
                warn!(user = %user_id, error = %e, "Context generation failed");
                NotificationContext::default()
            });

        let mut is_anomaly = false;
        let mut reasons: Vec<String> = Vec::new();
        match &trigger.kind {
            TriggerKind::TransactionCreated { transaction } => {
                let local_hour = prefs.local_hour(transaction.date.unwrap_or(now));
                let report = self.detector.detect(transaction, local_hour, now, &ctx);
                if report.is_anomaly {
                    info!(
                        user = %user_id,
                        risk = report.risk_score,
                        reasons = report.reasons.len(),
                        "Transaction flagged as anomalous"
                    );
                    is_anomaly = true;
                    category = NotificationCategory::FraudDetection;
                    ctx.risk_score = Some(report.risk_score);
                    ctx.analysis = Some(report.explanation);
                    ctx.recommendations.push(report.recommended_action);
                    reasons = report.reasons;
                }
            }
            TriggerKind::AnomalyDetected {
                reasons: given, ..
            } => {
                if !given.is_empty() {
                    ctx.analysis = Some(given.join("; "));
                }
                reasons = given.clone();
            }
            _ => {}
        }

        let importance = self.scorer.importance(&trigger.kind, &ctx, is_anomaly);
        let relevance = self
            .personalizer
            .relevance(&user_id, &trigger.kind, &profile, &ctx);

        let scoring = &self.config.scoring;
        if importance < scoring.min_importance && relevance < scoring.min_relevance {
            debug!(importance, relevance, "Scores below threshold");
            return Ok(filtered(&user_id, trigger_type, FilterReason::LowScore));
        }

        let priority = select_priority(category, importance, relevance, &self.config.priority);

        if priority != Priority::Critical && prefs.in_quiet_hours(prefs.local_hour(now)) {
            return Ok(filtered(&user_id, trigger_type, FilterReason::QuietHours));
        }

        let content = self.content.generate(&trigger, category, &ctx, &reasons).await;

        let optimal_delivery_time = if matches!(priority, Priority::Low | Priority::Medium) {
            self.personalizer
                .optimal_delivery_time(&profile, &prefs, now)
        } else {
            None
        };

        let mut notification = Notification {
            id: notification_id(&user_id, trigger_type, now),
            user_id: user_id.clone(),
            category,
            priority,
            title: content.title,
            body: content.body,
            rich_content: content.rich_content,
            trigger_type: trigger_type.to_string(),
            importance_score: importance,
            relevance_score: relevance,
            risk_score: ctx.risk_score,
            related_transaction_id: trigger.kind.transaction().and_then(|t| t.id),
            related_budget_id: related_budget_id(&trigger.kind, &ctx),
            related_bill_id: match &trigger.kind {
                TriggerKind::BillDue { bill, .. } => bill.id,
                _ => None,
            },
            related_goal_id: match &trigger.kind {
                TriggerKind::GoalMilestone { goal_id, .. } => *goal_id,
                _ => None,
            },
            channels: select_channels(category, priority, &prefs),
            available_actions: select_actions(category),
            optimal_delivery_time,
            dedupe_key: trigger.dedupe_key.clone(),
            is_read: false,
            is_archived: false,
            is_deleted: false,
            is_delivered: false,
            opened_at: None,
            action_taken: None,
            action_taken_at: None,
            created_at: now,
        };

        if !self.db.insert_notification(&notification)? {
            return Ok(filtered(&user_id, trigger_type, FilterReason::Duplicate));
        }

        self.rate_limiter.record(&user_id, now);

        if let Err(e) = self
            .personalizer
            .record_created(&notification, trigger.kind.subject_category())
        {
            warn!(user = %user_id, error = %e, "Failed to record interaction");
        }

        info!(
            user = %user_id,
            id = %notification.id,
            category = category.as_str(),
            priority = priority.as_str(),
            importance,
            relevance,
            "Notification created"
        );

        if let Some(push) = &self.push {
            if PushDispatcher::should_push(&notification) {
                match push.deliver(&notification).await {
                    Ok(report) if report.sent > 0 => notification.is_delivered = true,
                    Ok(_) => {}
                    Err(e) => warn!(id = %notification.id, error = %e, "Push delivery failed"),
                }
            }
        }

        Ok(Outcome::Created(Box::new(notification)))
    }

    /// Apply a user's read/archive/action update and learn from it
    pub fn apply_update(
        &self,
        notification: &Notification,
        update: &NotificationUpdate,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let updated = self.db.update_notification(&notification.id, update, at)?;

        if let Some(action) = update.action_taken {
            let prefs = self.preferences(&notification.user_id)?;
            if let Err(e) = self.personalizer.learn(&notification.id, action, &prefs, at) {
                warn!(id = %notification.id, error = %e, "Failed to learn from action");
            }
        } else if update.is_read == Some(true) {
            if let Err(e) = self.db.mark_interaction_opened(&notification.id) {
                warn!(id = %notification.id, error = %e, "Failed to mark interaction opened");
            }
        }

        Ok(updated)
    }

    /// Budget, bill, and goal sweeps for one user
    pub async fn run_sweeps(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<Outcome>> {
        let prefs = self.preferences(user_id)?;

        let mut triggers = budget_sweep(&self.db, &prefs, now)?;
        triggers.extend(bill_sweep(&self.db, &prefs, now)?);
        triggers.extend(goal_sweep(&self.db, user_id, now)?);

        let mut outcomes = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            outcomes.push(self.process(trigger).await?);
        }

        debug!(
            user = user_id,
            created = outcomes.iter().filter(|o| o.notification().is_some()).count(),
            total = outcomes.len(),
            "Sweeps finished"
        );
        Ok(outcomes)
    }
}

fn filtered(user_id: &str, trigger_type: &str, reason: FilterReason) -> Outcome {
    debug!(user = user_id, trigger = trigger_type, reason = reason.as_str(), "Trigger filtered");
    Outcome::Filtered(reason)
}

/// `notif_{user}_{32 hex chars}`
fn notification_id(user_id: &str, trigger_type: &str, at: DateTime<Utc>) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(trigger_type.as_bytes());
    hasher.update(at.to_rfc3339().as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("notif_{}_{}", user_id, &digest[..32])
}

fn related_budget_id(kind: &TriggerKind, ctx: &NotificationContext) -> Option<i64> {
    match kind {
        TriggerKind::BudgetThreshold { budget_id, .. } => {
            budget_id.or_else(|| ctx.budget_status.as_ref().map(|b| b.budget_id))
        }
        _ => ctx.budget_status.as_ref().map(|b| b.budget_id),
    }
}

/// Preference override, else by priority
pub fn select_channels(
    category: NotificationCategory,
    priority: Priority,
    prefs: &UserPreferences,
) -> Vec<Channel> {
    if let Some(channels) = prefs.channel_preferences.get(&category) {
        if !channels.is_empty() {
            return channels.clone();
        }
    }

    match priority {
        Priority::Critical => vec![Channel::Push, Channel::InApp, Channel::Sms, Channel::Email],
        Priority::High => vec![Channel::Push, Channel::InApp],
        Priority::Medium => vec![Channel::InApp, Channel::Email],
        Priority::Low | Priority::Info => vec![Channel::InApp],
    }
}

/// View and dismiss plus the category's own actions
pub fn select_actions(category: NotificationCategory) -> Vec<NotificationAction> {
    use NotificationAction::*;

    let mut actions = vec![View, Dismiss];
    match category {
        NotificationCategory::FraudDetection => actions.extend([MarkSafe, ReportFraud]),
        NotificationCategory::SmartTransaction => actions.push(EditCategory),
        NotificationCategory::BillReminder => actions.extend([PayNow, Snooze]),
        NotificationCategory::BudgetAlert => actions.extend([ViewBudget, GetTips]),
        NotificationCategory::GoalProgress => actions.push(AddMoney),
        NotificationCategory::SpendingInsight | NotificationCategory::AiInsight => {
            actions.push(ViewBreakdown)
        }
        _ => {}
    }
    actions
}
