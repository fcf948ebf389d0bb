//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Finch - Smart financial notifications
#[derive(Parser)]
#[command(name = "finch")]
#[command(about = "Decides which financial events deserve a notification", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finch.db", global = true)]
    pub db: PathBuf,

    /// User the command acts for
    #[arg(short, long, default_value = "default", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINCH_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires FINCH_API_KEYS or FINCH_JWT_SECRET.
        #[arg(long)]
        no_auth: bool,
    },

    /// Run a trigger through the notification engine
    Trigger {
        #[command(subcommand)]
        kind: TriggerCommand,
    },

    /// Run the built-in sample transaction trigger
    Sample,

    /// List and manage notifications
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationsAction>,
    },

    /// Show or change notification preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },

    /// Manage monthly budgets
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },

    /// Manage bills
    Bills {
        #[command(subcommand)]
        action: Option<BillsAction>,
    },

    /// Manage savings goals
    Goals {
        #[command(subcommand)]
        action: Option<GoalsAction>,
    },

    /// Run budget, bill, and goal reminder sweeps
    Sweep {
        /// Sweep every user with finance data instead of --user
        #[arg(long)]
        all: bool,
    },

    /// Import transaction history from CSV
    ///
    /// Columns: date, amount, vendor (or merchant/description), category,
    /// and an optional type (expense/income).
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show database, AI backend, and push delivery status
    Status,
}

#[derive(Subcommand)]
pub enum TriggerCommand {
    /// A new transaction
    Transaction {
        /// Amount (always positive)
        #[arg(short, long)]
        amount: f64,

        /// Merchant name
        #[arg(long, default_value = "Unknown")]
        vendor: String,

        /// Spending category
        #[arg(short, long, default_value = "Other")]
        category: String,

        /// Record as income instead of an expense
        #[arg(long)]
        income: bool,

        /// Store the transaction before running the trigger
        #[arg(long)]
        store: bool,
    },

    /// A bill coming due
    Bill {
        /// Bill name
        #[arg(short, long)]
        name: String,

        /// Amount due
        #[arg(short, long)]
        amount: f64,

        /// Days until the due date
        #[arg(long, default_value = "1")]
        days: i64,

        /// Bill type (rent, utility, emi, ...)
        #[arg(long, default_value = "")]
        bill_type: String,
    },

    /// A budget crossing a threshold
    Budget {
        /// Budget category
        #[arg(short, long)]
        category: String,

        /// Amount spent this month
        #[arg(long)]
        spent: f64,

        /// Monthly limit
        #[arg(long)]
        limit: f64,
    },

    /// A savings goal milestone
    Goal {
        /// Goal name
        #[arg(short, long)]
        name: String,

        /// Percent of the target reached
        #[arg(short, long)]
        milestone: f64,
    },

    /// An AI-generated insight
    Insight {
        /// Insight title
        #[arg(short, long)]
        title: String,

        /// Insight text
        #[arg(short, long)]
        description: String,

        /// Insight type (savings_opportunity, spending_pattern, ...)
        #[arg(long, default_value = "spending_pattern")]
        insight_type: String,

        /// Estimated monthly savings
        #[arg(long, default_value = "0")]
        savings: f64,
    },
}

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// List recent notifications
    List {
        /// Maximum number of notifications to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Only this category (e.g. fraud_detection)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show a notification in full
    Show {
        /// Notification ID
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a notification as read
    Read {
        /// Notification ID
        id: String,
    },

    /// Record an action taken on a notification
    Act {
        /// Notification ID
        id: String,

        /// Action (view, dismiss, snooze, mark_safe, pay_now, ...)
        action: String,
    },

    /// Mark every notification as read
    ReadAll,

    /// Show notification counts
    Stats,
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show current preferences
    Show,

    /// Change preferences
    Set {
        /// Turn all notifications on or off
        #[arg(long)]
        enabled: Option<bool>,

        /// Quiet hours as START-END local hours (e.g. 22-7)
        #[arg(long, conflicts_with = "no_quiet_hours")]
        quiet_hours: Option<String>,

        /// Turn quiet hours off
        #[arg(long)]
        no_quiet_hours: bool,

        /// Offset from UTC in minutes (e.g. 330 for IST)
        #[arg(long, allow_hyphen_values = true)]
        timezone_offset: Option<i32>,

        /// Maximum notifications per hour
        #[arg(long)]
        max_per_hour: Option<u32>,

        /// Maximum notifications per day
        #[arg(long)]
        max_per_day: Option<u32>,

        /// Amount above which a transaction is high value
        #[arg(long)]
        high_value_threshold: Option<f64>,

        /// Categories to turn off (comma-separated)
        #[arg(long, value_delimiter = ',')]
        disable: Vec<String>,

        /// Categories to turn back on (comma-separated)
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets
    List,

    /// Create or replace the budget for a category
    Set {
        /// Spending category
        category: String,

        /// Monthly limit
        amount: f64,
    },
}

#[derive(Subcommand)]
pub enum BillsAction {
    /// List bills
    List {
        /// Include paid bills
        #[arg(long)]
        all: bool,
    },

    /// Add a bill
    Add {
        /// Bill name
        name: String,

        /// Amount due
        amount: f64,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,

        /// Bill type (rent, utility, emi, ...)
        #[arg(long, default_value = "")]
        bill_type: String,
    },

    /// Mark a bill as paid
    Pay {
        /// Bill ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum GoalsAction {
    /// List goals
    List,

    /// Add a goal
    Add {
        /// Goal name
        name: String,

        /// Target amount
        target: f64,

        /// Amount saved so far
        #[arg(long, default_value = "0")]
        current: f64,
    },

    /// Record progress on a goal
    Progress {
        /// Goal ID
        id: i64,

        /// Amount saved so far
        amount: f64,
    },
}
