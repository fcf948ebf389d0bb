//! Notification Engine - deciding what to tell the user, and when
//!
//! A trigger (a new transaction, a budget crossing, a bill coming due) runs
//! through a gate pipeline: preferences, rate limits, context assembly,
//! anomaly detection, importance/relevance scoring, quiet hours, content
//! generation, persistence, and learning.
//!
//! ## Components
//!
//! - **Context Generator** - historical snapshot for a trigger
//! - **Anomaly Detector** - heuristic fraud / unusual-activity checks
//! - **Scorer** - objective importance and priority bands
//! - **Personalizer** - relevance, optimal timing, and learning
//! - **Rate Limiter** - per-user hour/day counters
//! - **Content Generator** - LLM copy with template fallback
//! - **Triggers** - sweeps that turn stored records into triggers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use finch_core::notify::{NotificationEngine, Trigger};
//!
//! let engine = NotificationEngine::new(db, ai, EngineConfig::load()?);
//! match engine.process(trigger).await? {
//!     Outcome::Created(n) => println!("{}", n.title),
//!     Outcome::Filtered(reason) => println!("dropped: {}", reason),
//! }
//! ```

pub mod anomaly;
pub mod content;
pub mod context;
pub mod engine;
pub mod personalization;
pub mod rate_limit;
pub mod scorer;
pub mod triggers;
pub mod types;

pub use anomaly::AnomalyDetector;
pub use content::{Content, ContentGenerator};
pub use context::ContextGenerator;
pub use engine::NotificationEngine;
pub use personalization::Personalizer;
pub use rate_limit::RateLimiter;
pub use scorer::{select_priority, NotificationScorer};
pub use triggers::{bill_sweep, budget_sweep, goal_milestone_trigger, goal_sweep, sample_trigger};
pub use types::{
    AnomalyReport, BillEvent, BudgetStatus, FilterReason, NotificationContext, Outcome,
    SpendingPattern, TimeOfDay, TransactionEvent, Trigger, TriggerKind,
};

/// Format an amount with thousands separators and two decimals
///
/// `format_money("₹", 75000.0)` is `"₹75,000.00"`.
pub fn format_money(symbol: &str, amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}{}.{}", sign, symbol, grouped, frac)
}
