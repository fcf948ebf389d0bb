//! Trigger and notification inbox commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use finch_core::models::{
    NewTransaction, NotificationAction, NotificationCategory, NotificationFilter,
    NotificationUpdate, TransactionType,
};
use finch_core::notify::{sample_trigger, BillEvent, TransactionEvent};
use finch_core::{Database, NotificationEngine, Outcome, Trigger, TriggerKind};

use super::{notification_line, priority_icon};
use crate::cli::TriggerCommand;

/// Turn `finch trigger ...` arguments into a trigger
///
/// A transaction with `--store` is written to the history first so later
/// triggers see it.
pub fn build_trigger(
    db: &Database,
    user: &str,
    command: TriggerCommand,
    now: DateTime<Utc>,
) -> Result<Trigger> {
    let kind = match command {
        TriggerCommand::Transaction {
            amount,
            vendor,
            category,
            income,
            store,
        } => {
            let transaction_type = if income {
                TransactionType::Income
            } else {
                TransactionType::Expense
            };
            if store {
                let id = db.insert_transaction(&NewTransaction {
                    user_id: user.to_string(),
                    amount: amount.abs(),
                    vendor,
                    category,
                    transaction_type,
                    date: now,
                })?;
                let stored = db
                    .get_transaction(id)?
                    .context("Stored transaction disappeared")?;
                return Ok(Trigger::new(
                    user,
                    TriggerKind::TransactionCreated {
                        transaction: TransactionEvent::from_transaction(&stored),
                    },
                    now,
                )
                .with_dedupe_key(format!("transaction:{}", id)));
            }
            TriggerKind::TransactionCreated {
                transaction: TransactionEvent {
                    id: None,
                    amount: amount.abs(),
                    vendor,
                    category,
                    transaction_type,
                    date: Some(now),
                },
            }
        }
        TriggerCommand::Bill {
            name,
            amount,
            days,
            bill_type,
        } => {
            if days < 0 {
                anyhow::bail!("--days cannot be negative");
            }
            TriggerKind::BillDue {
                bill: BillEvent {
                    id: None,
                    name,
                    amount,
                    bill_type,
                    due_date: Some(now.date_naive() + chrono::Duration::days(days)),
                },
                days_until_due: days,
            }
        }
        TriggerCommand::Budget {
            category,
            spent,
            limit,
        } => {
            if limit <= 0.0 {
                anyhow::bail!("--limit must be positive");
            }
            TriggerKind::BudgetThreshold {
                budget_id: None,
                category,
                percentage: spent / limit,
                spent,
                limit,
            }
        }
        TriggerCommand::Goal { name, milestone } => TriggerKind::GoalMilestone {
            goal_id: None,
            goal_name: name,
            milestone,
        },
        TriggerCommand::Insight {
            title,
            description,
            insight_type,
            savings,
        } => TriggerKind::InsightGenerated {
            insight_type,
            title,
            description,
            potential_savings: savings,
            is_actionable: savings > 0.0,
        },
    };

    Ok(Trigger::new(user, kind, now))
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Created(n) => {
            println!("✅ Notification created: {}", n.id);
            println!();
            println!("   {} {}", priority_icon(n.priority), n.title);
            println!("   {}", n.body);
            println!();
            println!(
                "   Category: {}  Priority: {}  Importance: {:.0}  Relevance: {:.0}",
                n.category, n.priority, n.importance_score, n.relevance_score
            );
            let channels: Vec<String> = n.channels.iter().map(|c| c.to_string()).collect();
            println!("   Channels: {}", channels.join(", "));
        }
        Outcome::Filtered(reason) => {
            println!("🔕 No notification ({})", reason);
        }
    }
}

pub async fn cmd_trigger(
    engine: &NotificationEngine,
    user: &str,
    command: TriggerCommand,
) -> Result<()> {
    let trigger = build_trigger(engine.db(), user, command, Utc::now())?;
    println!("⚡ Running {} trigger for {}...", trigger.trigger_type(), user);

    let outcome = engine.process(trigger).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn cmd_sample(engine: &NotificationEngine, user: &str) -> Result<()> {
    println!("⚡ Running sample transaction for {}...", user);
    let outcome = engine.process(sample_trigger(user, Utc::now())).await?;
    print_outcome(&outcome);
    Ok(())
}

pub fn cmd_notifications_list(
    engine: &NotificationEngine,
    user: &str,
    limit: i64,
    unread_only: bool,
    category: Option<&str>,
) -> Result<()> {
    let category = category
        .map(str::parse::<NotificationCategory>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let filter = NotificationFilter {
        unread_only,
        category,
        limit: limit.clamp(1, 200),
        ..Default::default()
    };
    let notifications = engine.db().list_notifications(user, &filter)?;

    if notifications.is_empty() {
        println!("No notifications. Try:");
        println!("  finch sample");
        return Ok(());
    }

    println!();
    println!("🔔 Notifications for {}", user);
    println!("   ─────────────────────────────");
    for n in &notifications {
        println!("  {}", notification_line(n));
    }
    println!();
    Ok(())
}

/// Fetch a notification the user owns
fn owned(engine: &NotificationEngine, user: &str, id: &str) -> Result<finch_core::models::Notification> {
    let n = engine
        .db()
        .get_notification(id)?
        .filter(|n| !n.is_deleted)
        .with_context(|| format!("Notification not found: {}", id))?;
    if n.user_id != user {
        anyhow::bail!("Notification {} belongs to another user", id);
    }
    Ok(n)
}

pub fn cmd_notifications_show(
    engine: &NotificationEngine,
    user: &str,
    id: &str,
    json: bool,
) -> Result<()> {
    let n = owned(engine, user, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&n)?);
        return Ok(());
    }

    println!();
    println!("{} {}", priority_icon(n.priority), n.title);
    println!("   {}", n.body);
    println!();
    println!("   ID:         {}", n.id);
    println!("   Category:   {}", n.category);
    println!("   Priority:   {}", n.priority);
    println!(
        "   Scores:     importance {:.0}, relevance {:.0}",
        n.importance_score, n.relevance_score
    );
    if let Some(risk) = n.risk_score {
        println!("   Risk:       {:.2}", risk);
    }
    println!("   Created:    {}", n.created_at.format("%Y-%m-%d %H:%M UTC"));
    if !n.rich_content.chips.is_empty() {
        println!("   Tags:       {}", n.rich_content.chips.join(", "));
    }
    for stat in &n.rich_content.stats {
        println!("   {:<11} {}", format!("{}:", stat.label), stat.value);
    }
    let actions: Vec<String> = n.available_actions.iter().map(|a| a.to_string()).collect();
    println!("   Actions:    {}", actions.join(", "));
    if let Some(action) = n.action_taken {
        println!("   Taken:      {}", action);
    }
    println!();
    Ok(())
}

pub fn cmd_notifications_read(engine: &NotificationEngine, user: &str, id: &str) -> Result<()> {
    let n = owned(engine, user, id)?;
    let update = NotificationUpdate {
        is_read: Some(true),
        ..Default::default()
    };
    engine.apply_update(&n, &update, Utc::now())?;
    println!("✅ Marked {} as read", id);
    Ok(())
}

pub fn cmd_notifications_act(
    engine: &NotificationEngine,
    user: &str,
    id: &str,
    action: &str,
) -> Result<()> {
    let action: NotificationAction = action.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let n = owned(engine, user, id)?;
    let update = NotificationUpdate {
        action_taken: Some(action),
        ..Default::default()
    };
    engine.apply_update(&n, &update, Utc::now())?;
    println!("✅ Recorded '{}' on {}", action, id);
    Ok(())
}

pub fn cmd_notifications_read_all(engine: &NotificationEngine, user: &str) -> Result<()> {
    let updated = engine
        .db()
        .mark_all_notifications_read(user, Utc::now())?;
    println!("✅ Marked {} notification(s) as read", updated);
    Ok(())
}

pub fn cmd_notifications_stats(engine: &NotificationEngine, user: &str) -> Result<()> {
    let stats = engine.db().notification_stats(user, Utc::now())?;

    println!();
    println!("📬 Notification Stats for {}", user);
    println!("   ─────────────────────────────");
    println!("   Total:        {}", stats.total);
    println!("   Unread:       {}", stats.unread);
    println!("   Last 24h:     {}", stats.recent_24h);

    if !stats.by_category.is_empty() {
        println!();
        println!("   By category:");
        for (category, count) in &stats.by_category {
            println!("     {:<22} {}", category, count);
        }
    }
    if !stats.by_priority.is_empty() {
        println!();
        println!("   By priority:");
        for (priority, count) in &stats.by_priority {
            println!("     {:<22} {}", priority, count);
        }
    }
    println!();
    Ok(())
}
