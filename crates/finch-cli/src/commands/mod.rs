//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_engine)
//! - `finance` - Budgets, bills, goals, history import, reminder sweeps
//! - `notifications` - Triggers and the notification inbox
//! - `preferences` - Notification preferences
//! - `serve` - Web server command
//! - `status` - Database, AI backend, and push status

pub mod core;
pub mod finance;
pub mod notifications;
pub mod preferences;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use core::*;
pub use finance::*;
pub use notifications::*;
pub use preferences::*;
pub use serve::*;
pub use status::*;

use finch_core::models::{Notification, Priority};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn priority_icon(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "🔴",
        Priority::High => "🟠",
        Priority::Medium => "🟡",
        Priority::Low => "🔵",
        Priority::Info => "⚪",
    }
}

/// One-line summary used by list output
pub fn notification_line(n: &Notification) -> String {
    let unread = if n.is_read { " " } else { "•" };
    format!(
        "{} {} {} [{}] {}",
        unread,
        priority_icon(n.priority),
        n.id,
        n.category,
        truncate(&n.title, 60)
    )
}
