//! Finance data commands (budgets, bills, goals, history import, sweeps)

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use finch_core::models::NewBill;
use finch_core::notify::{format_money, goal_milestone_trigger};
use finch_core::{import_history, Database, EngineConfig, NotificationEngine, Outcome};

use super::{notification_line, truncate};

/// Currency symbol from the engine config
fn currency() -> String {
    EngineConfig::load().unwrap_or_default().content.currency
}

// ========== Import ==========

pub fn cmd_import(db: &Database, file: &Path, user: &str) -> Result<()> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing history for {} from {}...", user, file.display());

    let stats = import_history(db, csv_file, user)?;

    println!();
    println!("✅ Import complete!");
    println!("   Imported: {}", stats.imported);
    if stats.skipped > 0 {
        println!("   Skipped (zero amount): {}", stats.skipped);
    }
    Ok(())
}

// ========== Sweeps ==========

pub async fn cmd_sweep(engine: &NotificationEngine, user: &str, all: bool) -> Result<()> {
    let now = Utc::now();

    if all {
        println!("🧹 Running reminder sweeps for every user...");
        let summary = finch_server::run_sweep_pass(engine, now)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        println!();
        println!("   Users:          {}", summary.users);
        println!("   Triggers:       {}", summary.triggers);
        println!("   Notifications:  {}", summary.created);
        if summary.failed_users > 0 {
            println!("   ⚠️  Failed users: {}", summary.failed_users);
        }
        return Ok(());
    }

    println!("🧹 Running reminder sweeps for {}...", user);
    let outcomes = engine.run_sweeps(user, now).await?;

    if outcomes.is_empty() {
        println!("   Nothing due.");
        return Ok(());
    }

    println!();
    for outcome in &outcomes {
        match outcome {
            Outcome::Created(n) => println!("  {}", notification_line(n)),
            Outcome::Filtered(reason) => println!("  🔕 filtered ({})", reason),
        }
    }
    println!();
    Ok(())
}

// ========== Budgets ==========

pub fn cmd_budgets_list(db: &Database, user: &str) -> Result<()> {
    let cur = currency();
    let budgets = db.list_budgets(user)?;

    if budgets.is_empty() {
        println!("No budgets found. Add one with:");
        println!("  finch budgets set Groceries 8000");
        return Ok(());
    }

    println!();
    println!("💰 Budgets");
    println!("   ─────────────────────────────");
    for b in budgets {
        println!("   {:<24} {}", truncate(&b.category, 24), format_money(&cur, b.amount));
    }
    println!();
    Ok(())
}

pub fn cmd_budgets_set(db: &Database, user: &str, category: &str, amount: f64) -> Result<()> {
    let cur = currency();
    if category.trim().is_empty() {
        anyhow::bail!("Budget category is required");
    }
    db.upsert_budget(user, category.trim(), amount)?;
    println!(
        "✅ Budget for {} set to {}",
        category.trim(),
        format_money(&cur, amount)
    );
    Ok(())
}

// ========== Bills ==========

pub fn cmd_bills_list(db: &Database, user: &str, include_paid: bool) -> Result<()> {
    let cur = currency();
    let bills = db.list_bills(user, !include_paid)?;

    if bills.is_empty() {
        println!("No bills found. Add one with:");
        println!("  finch bills add Rent 25000 --due 2024-06-01 --bill-type rent");
        return Ok(());
    }

    let today = Utc::now().date_naive();

    println!();
    println!("🧾 Bills");
    println!("   ─────────────────────────────");
    for bill in bills {
        let status = if bill.paid_at.is_some() {
            "paid".to_string()
        } else {
            match bill.days_until_due(today) {
                d if d < 0 => format!("{} day(s) overdue", -d),
                0 => "due today".to_string(),
                d => format!("due in {} day(s)", d),
            }
        };
        println!(
            "   #{:<4} {:<20} {:>14}  {}  {}",
            bill.id,
            truncate(&bill.name, 20),
            format_money(&cur, bill.amount),
            bill.due_date,
            status
        );
    }
    println!();
    Ok(())
}

pub fn cmd_bills_add(
    db: &Database,
    user: &str,
    name: &str,
    amount: f64,
    due: &str,
    bill_type: &str,
) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Bill name is required");
    }
    if !amount.is_finite() || amount < 0.0 {
        anyhow::bail!("Bill amount must be a positive number");
    }
    let due_date = NaiveDate::parse_from_str(due, "%Y-%m-%d")
        .with_context(|| format!("Invalid due date (expected YYYY-MM-DD): {}", due))?;

    let id = db.create_bill(&NewBill {
        user_id: user.to_string(),
        name: name.trim().to_string(),
        amount,
        bill_type: bill_type.to_string(),
        due_date,
    })?;
    println!("✅ Added bill #{} ({} due {})", id, name.trim(), due_date);
    Ok(())
}

pub fn cmd_bills_pay(db: &Database, user: &str, id: i64) -> Result<()> {
    let bill = db
        .get_bill(id)?
        .with_context(|| format!("Bill not found: {}", id))?;
    if bill.user_id != user {
        anyhow::bail!("Bill {} belongs to another user", id);
    }
    db.mark_bill_paid(id, Utc::now())?;
    println!("✅ Marked {} as paid", bill.name);
    Ok(())
}

// ========== Goals ==========

pub fn cmd_goals_list(db: &Database, user: &str) -> Result<()> {
    let cur = currency();
    let goals = db.list_goals(user)?;

    if goals.is_empty() {
        println!("No goals found. Add one with:");
        println!("  finch goals add \"Emergency fund\" 100000");
        return Ok(());
    }

    println!();
    println!("🎯 Goals");
    println!("   ─────────────────────────────");
    for goal in goals {
        println!(
            "   #{:<4} {:<24} {} / {} ({:.0}%)",
            goal.id,
            truncate(&goal.name, 24),
            format_money(&cur, goal.current_amount),
            format_money(&cur, goal.target_amount),
            goal.progress_percent()
        );
    }
    println!();
    Ok(())
}

pub fn cmd_goals_add(
    db: &Database,
    user: &str,
    name: &str,
    target: f64,
    current: f64,
) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Goal name is required");
    }
    let id = db.create_goal(user, name.trim(), target, current)?;
    println!("✅ Added goal #{} ({})", id, name.trim());
    Ok(())
}

/// Record progress and run the milestone trigger it reaches
pub async fn cmd_goals_progress(
    engine: &NotificationEngine,
    user: &str,
    id: i64,
    amount: f64,
) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        anyhow::bail!("Amount must not be negative");
    }
    let cur = engine.config().content.currency.clone();
    let db = engine.db();
    let goal = db
        .get_goal(id)?
        .with_context(|| format!("Goal not found: {}", id))?;
    if goal.user_id != user {
        anyhow::bail!("Goal {} belongs to another user", id);
    }

    db.update_goal_progress(id, amount)?;
    let goal = db
        .get_goal(id)?
        .with_context(|| format!("Goal not found: {}", id))?;
    println!(
        "✅ {} is at {:.0}% ({} / {})",
        goal.name,
        goal.progress_percent(),
        format_money(&cur, goal.current_amount),
        format_money(&cur, goal.target_amount)
    );

    if let Some(trigger) = goal_milestone_trigger(&goal, Utc::now()) {
        match engine.process(trigger).await? {
            Outcome::Created(n) => println!("  {}", notification_line(&n)),
            Outcome::Filtered(reason) => println!("  🔕 milestone not notified ({})", reason),
        }
    }
    Ok(())
}
