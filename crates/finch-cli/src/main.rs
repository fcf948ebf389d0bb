//! Finch CLI - Smart financial notifications
//!
//! Usage:
//!   finch init                         Initialize database
//!   finch import --file history.csv    Import transaction history
//!   finch trigger transaction -a 4999  Run a trigger through the engine
//!   finch sweep --all                  Run reminder sweeps
//!   finch serve --port 3000            Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    // Dependencies stay at their defaults so --verbose shows only finch
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("finch=debug,tower_http=debug")
    } else {
        EnvFilter::new("finch=info,tower_http=info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let user = cli.user.as_str();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt).await,
        Commands::Import { file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, user)
        }
        Commands::Trigger { kind } => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            commands::cmd_trigger(&engine, user, kind).await
        }
        Commands::Sample => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            commands::cmd_sample(&engine, user).await
        }
        Commands::Sweep { all } => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            commands::cmd_sweep(&engine, user, all).await
        }
        Commands::Notifications { action } => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_notifications_list(&engine, user, 20, false, None),
                Some(NotificationsAction::List {
                    limit,
                    unread,
                    category,
                }) => commands::cmd_notifications_list(
                    &engine,
                    user,
                    limit,
                    unread,
                    category.as_deref(),
                ),
                Some(NotificationsAction::Show { id, json }) => {
                    commands::cmd_notifications_show(&engine, user, &id, json)
                }
                Some(NotificationsAction::Read { id }) => {
                    commands::cmd_notifications_read(&engine, user, &id)
                }
                Some(NotificationsAction::Act { id, action }) => {
                    commands::cmd_notifications_act(&engine, user, &id, &action)
                }
                Some(NotificationsAction::ReadAll) => {
                    commands::cmd_notifications_read_all(&engine, user)
                }
                Some(NotificationsAction::Stats) => commands::cmd_notifications_stats(&engine, user),
            }
        }
        Commands::Prefs { action } => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(PrefsAction::Show) => commands::cmd_prefs_show(&engine, user),
                Some(PrefsAction::Set {
                    enabled,
                    quiet_hours,
                    no_quiet_hours,
                    timezone_offset,
                    max_per_hour,
                    max_per_day,
                    high_value_threshold,
                    disable,
                    enable,
                }) => {
                    let update = commands::build_prefs_update(commands::PrefsArgs {
                        enabled,
                        quiet_hours,
                        no_quiet_hours,
                        timezone_offset,
                        max_per_hour,
                        max_per_day,
                        high_value_threshold,
                        disable,
                        enable,
                    })?;
                    commands::cmd_prefs_set(&engine, user, update)
                }
            }
        }
        Commands::Budgets { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(BudgetsAction::List) => commands::cmd_budgets_list(&db, user),
                Some(BudgetsAction::Set { category, amount }) => {
                    commands::cmd_budgets_set(&db, user, &category, amount)
                }
            }
        }
        Commands::Bills { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_bills_list(&db, user, false),
                Some(BillsAction::List { all }) => commands::cmd_bills_list(&db, user, all),
                Some(BillsAction::Add {
                    name,
                    amount,
                    due,
                    bill_type,
                }) => commands::cmd_bills_add(&db, user, &name, amount, &due, &bill_type),
                Some(BillsAction::Pay { id }) => commands::cmd_bills_pay(&db, user, id),
            }
        }
        Commands::Goals { action } => {
            let engine = commands::open_engine(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(GoalsAction::List) => commands::cmd_goals_list(engine.db(), user),
                Some(GoalsAction::Add {
                    name,
                    target,
                    current,
                }) => commands::cmd_goals_add(engine.db(), user, &name, target, current),
                Some(GoalsAction::Progress { id, amount }) => {
                    commands::cmd_goals_progress(&engine, user, id, amount).await
                }
            }
        }
    }
}
