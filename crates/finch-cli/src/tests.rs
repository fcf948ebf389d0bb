//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::{TimeZone, Utc};
use clap::Parser;
use finch_core::db::Database;
use finch_core::models::{NotificationAction, NotificationCategory, NotificationFilter};
use finch_core::{EngineConfig, NotificationEngine, TriggerKind};

use crate::cli::{Cli, Commands, PrefsAction, TriggerCommand};
use crate::commands::{self, truncate, PrefsArgs};

fn setup_engine() -> NotificationEngine {
    let db = Database::in_memory().unwrap();
    NotificationEngine::new(db, None, EngineConfig::default())
}

/// Run the sample trigger and return the created notification's id
async fn create_sample(engine: &NotificationEngine, user: &str) -> String {
    commands::cmd_sample(engine, user).await.unwrap();
    let list = engine
        .db()
        .list_notifications(user, &NotificationFilter::default())
        .unwrap();
    list[0].id.clone()
}

// ========== Argument Parsing ==========

#[test]
fn test_parse_global_args() {
    let cli = Cli::try_parse_from([
        "finch", "--db", "x.db", "--user", "asha", "trigger", "bill", "--name", "Rent",
        "--amount", "25000", "--days", "3",
    ])
    .unwrap();

    assert_eq!(cli.db.to_str(), Some("x.db"));
    assert_eq!(cli.user, "asha");
    match cli.command {
        Commands::Trigger {
            kind: TriggerCommand::Bill { name, days, .. },
        } => {
            assert_eq!(name, "Rent");
            assert_eq!(days, 3);
        }
        _ => panic!("expected bill trigger"),
    }
}

#[test]
fn test_parse_prefs_negative_offset() {
    let cli = Cli::try_parse_from([
        "finch",
        "prefs",
        "set",
        "--timezone-offset",
        "-300",
        "--disable",
        "ai_insight,spending_insight",
    ])
    .unwrap();

    match cli.command {
        Commands::Prefs {
            action:
                Some(PrefsAction::Set {
                    timezone_offset,
                    disable,
                    ..
                }),
        } => {
            assert_eq!(timezone_offset, Some(-300));
            assert_eq!(disable, vec!["ai_insight", "spending_insight"]);
        }
        _ => panic!("expected prefs set"),
    }
}

#[test]
fn test_quiet_hours_flags_conflict() {
    let result = Cli::try_parse_from([
        "finch",
        "prefs",
        "set",
        "--quiet-hours",
        "22-7",
        "--no-quiet-hours",
    ]);
    assert!(result.is_err());
}

// ========== Trigger Building ==========

#[test]
fn test_build_transaction_trigger() {
    let db = Database::in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();

    let trigger = commands::build_trigger(
        &db,
        "asha",
        TriggerCommand::Transaction {
            amount: -1200.0,
            vendor: "Swiggy".to_string(),
            category: "Food".to_string(),
            income: false,
            store: false,
        },
        now,
    )
    .unwrap();

    assert_eq!(trigger.user_id, "asha");
    assert_eq!(trigger.timestamp, now);
    assert!(trigger.dedupe_key.is_none());
    match trigger.kind {
        TriggerKind::TransactionCreated { transaction } => {
            assert_eq!(transaction.amount, 1200.0);
            assert_eq!(transaction.id, None);
        }
        other => panic!("unexpected trigger {:?}", other),
    }
    assert!(db.recent_transactions("asha", 10, None).unwrap().is_empty());
}

#[test]
fn test_build_stored_transaction_trigger() {
    let db = Database::in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();

    let trigger = commands::build_trigger(
        &db,
        "asha",
        TriggerCommand::Transaction {
            amount: 80000.0,
            vendor: "Employer".to_string(),
            category: "Salary".to_string(),
            income: true,
            store: true,
        },
        now,
    )
    .unwrap();

    let stored = db.recent_transactions("asha", 10, None).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_expense());
    assert_eq!(
        trigger.dedupe_key,
        Some(format!("transaction:{}", stored[0].id))
    );
}

#[test]
fn test_build_budget_trigger() {
    let db = Database::in_memory().unwrap();

    let trigger = commands::build_trigger(
        &db,
        "asha",
        TriggerCommand::Budget {
            category: "Groceries".to_string(),
            spent: 4500.0,
            limit: 5000.0,
        },
        Utc::now(),
    )
    .unwrap();

    match trigger.kind {
        TriggerKind::BudgetThreshold { percentage, .. } => {
            assert!((percentage - 0.9).abs() < 1e-9)
        }
        other => panic!("unexpected trigger {:?}", other),
    }

    let zero_limit = commands::build_trigger(
        &db,
        "asha",
        TriggerCommand::Budget {
            category: "Groceries".to_string(),
            spent: 100.0,
            limit: 0.0,
        },
        Utc::now(),
    );
    assert!(zero_limit.is_err());
}

#[test]
fn test_build_bill_trigger_sets_due_date() {
    let db = Database::in_memory().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();

    let trigger = commands::build_trigger(
        &db,
        "asha",
        TriggerCommand::Bill {
            name: "Rent".to_string(),
            amount: 25000.0,
            days: 3,
            bill_type: "rent".to_string(),
        },
        now,
    )
    .unwrap();

    match trigger.kind {
        TriggerKind::BillDue {
            bill,
            days_until_due,
        } => {
            assert_eq!(days_until_due, 3);
            assert_eq!(bill.due_date.unwrap().to_string(), "2024-05-23");
        }
        other => panic!("unexpected trigger {:?}", other),
    }
}

// ========== Preferences ==========

#[test]
fn test_parse_quiet_hours() {
    assert_eq!(commands::parse_quiet_hours("22-7").unwrap(), (22, 7));
    assert_eq!(commands::parse_quiet_hours(" 1 - 5 ").unwrap(), (1, 5));
    assert!(commands::parse_quiet_hours("22").is_err());
    assert!(commands::parse_quiet_hours("late-early").is_err());
}

#[test]
fn test_build_prefs_update() {
    let update = commands::build_prefs_update(PrefsArgs {
        quiet_hours: Some("23-6".to_string()),
        max_per_hour: Some(4),
        disable: vec!["ai_insight".to_string()],
        enable: vec!["fraud_detection".to_string()],
        ..Default::default()
    })
    .unwrap();

    assert_eq!(update.quiet_hours_enabled, Some(true));
    assert_eq!(update.quiet_hours_start, Some(23));
    assert_eq!(update.quiet_hours_end, Some(6));
    assert_eq!(update.max_notifications_per_hour, Some(4));
    let categories = update.category_preferences.unwrap();
    assert_eq!(categories.get(&NotificationCategory::AiInsight), Some(&false));
    assert_eq!(
        categories.get(&NotificationCategory::FraudDetection),
        Some(&true)
    );

    let bad = commands::build_prefs_update(PrefsArgs {
        disable: vec!["horoscope".to_string()],
        ..Default::default()
    });
    assert!(bad.is_err());
}

#[test]
fn test_cmd_prefs_set_validates() {
    let engine = setup_engine();

    let update = commands::build_prefs_update(PrefsArgs {
        quiet_hours: Some("25-7".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert!(commands::cmd_prefs_set(&engine, "asha", update).is_err());

    let update = commands::build_prefs_update(PrefsArgs {
        enabled: Some(false),
        ..Default::default()
    })
    .unwrap();
    commands::cmd_prefs_set(&engine, "asha", update).unwrap();
    assert!(!engine.preferences("asha").unwrap().notifications_enabled);
}

// ========== Notifications ==========

#[tokio::test]
async fn test_cmd_sample_and_list() {
    let engine = setup_engine();
    create_sample(&engine, "asha").await;

    assert!(commands::cmd_notifications_list(&engine, "asha", 20, false, None).is_ok());
    assert!(
        commands::cmd_notifications_list(&engine, "asha", 20, false, Some("smart_transaction"))
            .is_ok()
    );
    assert!(commands::cmd_notifications_list(&engine, "asha", 20, false, Some("nope")).is_err());
    assert!(commands::cmd_notifications_stats(&engine, "asha").is_ok());
}

#[tokio::test]
async fn test_cmd_notifications_read_and_act() {
    let engine = setup_engine();
    let id = create_sample(&engine, "asha").await;

    commands::cmd_notifications_read(&engine, "asha", &id).unwrap();
    let n = engine.db().get_notification(&id).unwrap().unwrap();
    assert!(n.is_read);

    commands::cmd_notifications_act(&engine, "asha", &id, "mark_safe").unwrap();
    let n = engine.db().get_notification(&id).unwrap().unwrap();
    assert_eq!(n.action_taken, Some(NotificationAction::MarkSafe));

    assert!(commands::cmd_notifications_act(&engine, "asha", &id, "explode").is_err());
}

#[tokio::test]
async fn test_cmd_notifications_other_user() {
    let engine = setup_engine();
    let id = create_sample(&engine, "asha").await;

    assert!(commands::cmd_notifications_show(&engine, "asha", &id, true).is_ok());
    assert!(commands::cmd_notifications_show(&engine, "ravi", &id, false).is_err());
    assert!(commands::cmd_notifications_read(&engine, "ravi", &id).is_err());
    assert!(commands::cmd_notifications_show(&engine, "asha", "notif_missing", false).is_err());
}

#[tokio::test]
async fn test_cmd_notifications_read_all() {
    let engine = setup_engine();
    create_sample(&engine, "asha").await;
    create_sample(&engine, "asha").await;

    commands::cmd_notifications_read_all(&engine, "asha").unwrap();
    let stats = engine.db().notification_stats("asha", Utc::now()).unwrap();
    assert_eq!(stats.unread, 0);
    assert_eq!(stats.total, 2);
}

// ========== Finance Commands ==========

#[test]
fn test_cmd_budgets() {
    let db = Database::in_memory().unwrap();

    assert!(commands::cmd_budgets_set(&db, "asha", "Groceries", 0.0).is_err());
    assert!(commands::cmd_budgets_set(&db, "asha", "  ", 100.0).is_err());
    commands::cmd_budgets_set(&db, "asha", "Groceries", 8000.0).unwrap();
    commands::cmd_budgets_set(&db, "asha", "Groceries", 9000.0).unwrap();

    let budgets = db.list_budgets("asha").unwrap();
    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].amount, 9000.0);
    assert!(commands::cmd_budgets_list(&db, "asha").is_ok());
}

#[test]
fn test_cmd_bills() {
    let db = Database::in_memory().unwrap();

    assert!(commands::cmd_bills_add(&db, "asha", "Rent", 25000.0, "June 1st", "rent").is_err());
    commands::cmd_bills_add(&db, "asha", "Rent", 25000.0, "2024-06-01", "rent").unwrap();

    let bills = db.list_bills("asha", true).unwrap();
    assert_eq!(bills.len(), 1);
    let id = bills[0].id;

    assert!(commands::cmd_bills_pay(&db, "ravi", id).is_err());
    commands::cmd_bills_pay(&db, "asha", id).unwrap();
    assert!(db.list_bills("asha", true).unwrap().is_empty());
    assert!(commands::cmd_bills_list(&db, "asha", true).is_ok());
    assert!(commands::cmd_bills_pay(&db, "asha", 9999).is_err());
}

#[tokio::test]
async fn test_cmd_goals_progress() {
    let engine = setup_engine();
    let db = engine.db().clone();

    commands::cmd_goals_add(&db, "asha", "Vacation", 20000.0, 0.0).unwrap();
    let goal_id = db.list_goals("asha").unwrap()[0].id;

    commands::cmd_goals_progress(&engine, "asha", goal_id, 10000.0)
        .await
        .unwrap();
    assert_eq!(db.get_goal(goal_id).unwrap().unwrap().current_amount, 10000.0);

    assert!(commands::cmd_goals_progress(&engine, "ravi", goal_id, 1.0)
        .await
        .is_err());
    assert!(commands::cmd_goals_progress(&engine, "asha", goal_id, -5.0)
        .await
        .is_err());
    assert!(commands::cmd_goals_list(&db, "asha").is_ok());
}

#[test]
fn test_cmd_import() {
    let db = Database::in_memory().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Date,Amount,Merchant,Category").unwrap();
    writeln!(file, "2024-05-01,450.00,Swiggy,Food").unwrap();
    writeln!(file, "2024-05-02,0,Refund,Other").unwrap();
    writeln!(file, "2024-05-03,\"1,200.50\",BigBasket,Groceries").unwrap();
    file.flush().unwrap();

    commands::cmd_import(&db, file.path(), "asha").unwrap();

    let stored = db.recent_transactions("asha", 10, None).unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().any(|t| t.vendor == "BigBasket" && t.amount == 1200.5));
}

#[test]
fn test_cmd_import_missing_file() {
    let db = Database::in_memory().unwrap();
    let result = commands::cmd_import(&db, std::path::Path::new("/nonexistent/history.csv"), "asha");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_sweep() {
    let engine = setup_engine();
    let db = engine.db().clone();
    commands::cmd_bills_add(
        &db,
        "asha",
        "Rent",
        25000.0,
        &Utc::now().date_naive().to_string(),
        "rent",
    )
    .unwrap();

    commands::cmd_sweep(&engine, "asha", false).await.unwrap();
    let stats = db.notification_stats("asha", Utc::now()).unwrap();
    assert_eq!(stats.total, 1);

    // Already reminded today
    commands::cmd_sweep(&engine, "asha", true).await.unwrap();
    let stats = db.notification_stats("asha", Utc::now()).unwrap();
    assert_eq!(stats.total, 1);
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is a long title", 10), "this is...");
    assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
}
