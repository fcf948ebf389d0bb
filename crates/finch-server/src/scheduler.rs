//! Background reminder sweeps
//!
//! Budget, bill, and goal reminders have no event of their own, so the
//! server sweeps every user with finance data on a fixed interval:
//!
//! - `FINCH_SWEEP_ENABLED`: set to "false" to turn the scheduler off
//! - `FINCH_SWEEP_INTERVAL_MINUTES`: minutes between sweeps (default: 60, 0 disables)
//!
//! Sweeps are idempotent per day through the notification dedupe keys, so a
//! short interval only costs queries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{error, info, warn};

use finch_core::NotificationEngine;

/// Configuration for scheduled sweeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepScheduleConfig {
    /// Minutes between sweeps
    pub interval_minutes: u64,
}

impl Default for SweepScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
        }
    }
}

impl SweepScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None when sweeps are disabled
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var("FINCH_SWEEP_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);
        if !enabled {
            info!("FINCH_SWEEP_ENABLED is off, reminder sweeps disabled");
            return None;
        }

        let interval_minutes = match std::env::var("FINCH_SWEEP_INTERVAL_MINUTES") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(minutes) => minutes,
                Err(_) => {
                    warn!(value = %raw, "Invalid FINCH_SWEEP_INTERVAL_MINUTES, using default");
                    Self::default().interval_minutes
                }
            },
            Err(_) => Self::default().interval_minutes,
        };

        if interval_minutes == 0 {
            warn!("FINCH_SWEEP_INTERVAL_MINUTES is 0, reminder sweeps disabled");
            return None;
        }

        Some(Self { interval_minutes })
    }

    /// Time between sweeps, saturating for absurdly large minute counts
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Totals for one pass over every user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub users: usize,
    pub triggers: usize,
    pub created: usize,
    pub failed_users: usize,
}

/// Start the sweep scheduler as a background task
pub fn start_sweep_scheduler(engine: Arc<NotificationEngine>, config: SweepScheduleConfig) {
    info!(
        "Starting sweep scheduler: every {} minutes",
        config.interval_minutes
    );

    tokio::spawn(async move {
        let mut ticker = interval(config.period());

        // Skip the first immediate tick - nothing to sweep at startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match run_sweep_pass(&engine, Utc::now()).await {
                Ok(summary) => info!(
                    users = summary.users,
                    triggers = summary.triggers,
                    created = summary.created,
                    failed = summary.failed_users,
                    "Scheduled sweep completed"
                ),
                Err(e) => error!("Scheduled sweep failed: {}", e),
            }
        }
    });
}

/// Sweep every user once
///
/// A failure for one user is logged and counted; the pass carries on.
pub async fn run_sweep_pass(
    engine: &NotificationEngine,
    now: DateTime<Utc>,
) -> Result<SweepSummary, String> {
    let db = engine.db();
    let users = db
        .list_user_ids()
        .map_err(|e| format!("Failed to list users: {}", e))?;

    let mut summary = SweepSummary {
        users: users.len(),
        ..Default::default()
    };

    for user in &users {
        match engine.run_sweeps(user, now).await {
            Ok(outcomes) => {
                summary.triggers += outcomes.len();
                summary.created += outcomes.iter().filter(|o| o.notification().is_some()).count();
            }
            Err(e) => {
                warn!(user = %user, error = %e, "Sweep failed for user");
                summary.failed_users += 1;
            }
        }
    }

    // Log to audit (as "scheduler" user)
    if let Err(e) = db.log_audit(
        "scheduler",
        "sweep_scheduled",
        Some("notification"),
        None,
        Some(&format!(
            "users={} triggers={} created={}",
            summary.users, summary.triggers, summary.created
        )),
    ) {
        warn!("Failed to log scheduled sweep to audit: {}", e);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use finch_core::models::NewBill;
    use finch_core::{Database, EngineConfig};

    #[test]
    fn test_config_from_env() {
        // One test so the env mutations don't race each other
        std::env::remove_var("FINCH_SWEEP_ENABLED");
        std::env::remove_var("FINCH_SWEEP_INTERVAL_MINUTES");
        assert_eq!(
            SweepScheduleConfig::from_env(),
            Some(SweepScheduleConfig { interval_minutes: 60 })
        );

        std::env::set_var("FINCH_SWEEP_INTERVAL_MINUTES", "15");
        assert_eq!(
            SweepScheduleConfig::from_env(),
            Some(SweepScheduleConfig { interval_minutes: 15 })
        );

        std::env::set_var("FINCH_SWEEP_INTERVAL_MINUTES", "0");
        assert!(SweepScheduleConfig::from_env().is_none());

        std::env::set_var("FINCH_SWEEP_INTERVAL_MINUTES", "soon");
        assert_eq!(
            SweepScheduleConfig::from_env(),
            Some(SweepScheduleConfig { interval_minutes: 60 })
        );
        std::env::remove_var("FINCH_SWEEP_INTERVAL_MINUTES");

        std::env::set_var("FINCH_SWEEP_ENABLED", "false");
        assert!(SweepScheduleConfig::from_env().is_none());
        std::env::remove_var("FINCH_SWEEP_ENABLED");
    }

    #[test]
    fn test_period_saturates() {
        let config = SweepScheduleConfig { interval_minutes: 15 };
        assert_eq!(config.period(), Duration::from_secs(900));

        let huge = SweepScheduleConfig {
            interval_minutes: u64::MAX,
        };
        assert_eq!(huge.period(), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_sweep_pass_covers_every_user() {
        let db = Database::in_memory().unwrap();
        for user in ["asha", "ravi"] {
            db.create_bill(&NewBill {
                user_id: user.to_string(),
                name: "Rent".to_string(),
                amount: 25000.0,
                bill_type: "rent".to_string(),
                due_date: NaiveDate::from_ymd_opt(2024, 5, 21).unwrap(),
            })
            .unwrap();
        }
        let engine = NotificationEngine::new(db.clone(), None, EngineConfig::default());
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();

        let summary = run_sweep_pass(&engine, now).await.unwrap();
        assert_eq!(summary.users, 2);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed_users, 0);

        // Second pass on the same day only hits dedupe
        let again = run_sweep_pass(&engine, now).await.unwrap();
        assert_eq!(again.triggers, 2);
        assert_eq!(again.created, 0);

        let audit = db.list_audit_log(Some("scheduler"), 10).unwrap();
        assert!(audit
            .iter()
            .any(|e| e.action == "sweep_scheduled"));
    }

    #[tokio::test]
    async fn test_sweep_pass_without_users() {
        let db = Database::in_memory().unwrap();
        let engine = NotificationEngine::new(db, None, EngineConfig::default());

        let summary = run_sweep_pass(&engine, Utc::now()).await.unwrap();
        assert_eq!(summary, SweepSummary::default());
    }
}
