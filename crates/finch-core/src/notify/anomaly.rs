//! Anomaly Detector
//!
//! Five independent heuristics over a transaction and its context:
//! - Amount vs the user's category average (or absolute size)
//! - Time of day
//! - Merchant familiarity
//! - Transaction frequency
//! - Spending pattern and budget state
//!
//! Each fired check adds its weight to the risk score, capped at 1.0.

use chrono::{DateTime, Duration, Utc};

use super::format_money;
use super::types::{AnomalyReport, NotificationContext, TransactionEvent};

const AMOUNT_WEIGHT: f64 = 0.3;
const TIME_WEIGHT: f64 = 0.2;
const MERCHANT_WEIGHT: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.4;
const PATTERN_WEIGHT: f64 = 0.3;

const HIGH_VALUE: f64 = 5000.0;

/// Categories where large payments are routine
const LARGE_PAYMENT_CATEGORIES: &[&str] = &["rent", "loan emi", "investment"];

/// Heuristic fraud / unusual-activity detector
pub struct AnomalyDetector {
    currency: String,
}

impl AnomalyDetector {
    pub fn new(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
        }
    }

    /// Run every check and combine the results
    ///
    /// `local_hour` is the transaction hour in the user's timezone; `now`
    /// anchors the merchant recency check.
    pub fn detect(
        &self,
        tx: &TransactionEvent,
        local_hour: u32,
        now: DateTime<Utc>,
        ctx: &NotificationContext,
    ) -> AnomalyReport {
        let amount = tx.abs_amount();
        let mut risk = 0.0;
        let mut reasons = Vec::new();

        let checks = [
            (self.check_amount(tx, amount, ctx), AMOUNT_WEIGHT),
            (check_time(local_hour, ctx), TIME_WEIGHT),
            (check_merchant(tx, amount, now, ctx), MERCHANT_WEIGHT),
            (check_frequency(ctx), FREQUENCY_WEIGHT),
            (check_pattern(tx, amount, ctx), PATTERN_WEIGHT),
        ];
        for (reason, weight) in checks {
            if let Some(reason) = reason {
                risk += weight;
                reasons.push(reason);
            }
        }

        let risk_score = f64::min(risk, 1.0);
        let is_anomaly = !reasons.is_empty();
        let explanation = if is_anomaly {
            explain(risk_score, &reasons)
        } else {
            String::new()
        };

        AnomalyReport {
            is_anomaly,
            risk_score,
            explanation,
            recommended_action: recommended_action(risk_score).to_string(),
            reasons,
        }
    }

    fn check_amount(
        &self,
        tx: &TransactionEvent,
        amount: f64,
        ctx: &NotificationContext,
    ) -> Option<String> {
        if let Some(avg) = ctx.user_average.filter(|avg| *avg > 0.0) {
            let ratio = amount / avg;
            let multiple = if ratio >= 5.0 {
                Some(5)
            } else if ratio >= 3.0 {
                Some(3)
            } else if ratio >= 2.0 && amount >= HIGH_VALUE {
                Some(2)
            } else {
                None
            };
            if let Some(m) = multiple {
                return Some(format!("{}x your usual {} spending", m, tx.category));
            }
        }

        if amount >= 50_000.0 {
            return Some(format!(
                "Very high amount: {}",
                format_money(&self.currency, amount)
            ));
        }

        let category = tx.category.trim().to_lowercase();
        let routine = LARGE_PAYMENT_CATEGORIES.contains(&category.as_str());
        if amount >= 25_000.0 && !routine {
            return Some(format!("Unusually high amount for {}", tx.category));
        }

        None
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new("₹")
    }
}

fn check_time(local_hour: u32, ctx: &NotificationContext) -> Option<String> {
    if (2..=5).contains(&local_hour) {
        Some(format!("Transaction at {:02}:00 (unusual time)", local_hour))
    } else if ctx.is_unusual_time {
        Some("Transaction at unusual time for you".to_string())
    } else {
        None
    }
}

fn check_merchant(
    tx: &TransactionEvent,
    amount: f64,
    now: DateTime<Utc>,
    ctx: &NotificationContext,
) -> Option<String> {
    if !tx.has_known_vendor() {
        return None;
    }

    let stats = ctx.merchant_history.clone().unwrap_or_default();

    if stats.transaction_count == 0 {
        return (amount >= HIGH_VALUE).then(|| format!("First transaction at {}", tx.vendor));
    }

    if stats.average_amount > 0.0 && amount >= stats.average_amount * 3.0 {
        return Some(format!("3x your usual spending at {}", tx.vendor));
    }

    let last = stats.last_transaction_date?;
    let days = (now - last).num_days();
    (days > 180).then(|| format!("First transaction at {} in {} days", tx.vendor, days))
}

fn check_frequency(ctx: &NotificationContext) -> Option<String> {
    // History is newest first; flip the ten newest into chronological order
    let mut recent: Vec<_> = ctx.transaction_history.iter().take(10).collect();
    recent.reverse();
    if recent.len() < 2 {
        return None;
    }

    let last_five = &recent[recent.len().saturating_sub(5)..];
    let high_value = last_five
        .iter()
        .filter(|t| t.amount.abs() >= HIGH_VALUE)
        .count();
    if high_value >= 3 {
        return Some(format!("{} high-value transactions in short time", high_value));
    }

    if recent.len() >= 5 {
        let latest = recent[recent.len() - 1].date;
        let fifth = recent[recent.len() - 5].date;
        if latest - fifth <= Duration::minutes(10) {
            return Some("Multiple transactions in very short time".to_string());
        }
    }

    None
}

fn check_pattern(tx: &TransactionEvent, amount: f64, ctx: &NotificationContext) -> Option<String> {
    let pattern = &ctx.spending_pattern;

    if pattern.has_data() {
        let usual = pattern
            .usual_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&tx.category));
        if !usual && amount >= HIGH_VALUE {
            return Some(format!("First high-value {} purchase", tx.category));
        }

        let unusual = pattern
            .unusual_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&tx.category));
        if unusual && amount >= 2000.0 {
            return Some(format!("Unusual category for you: {}", tx.category));
        }
    }

    let pct = ctx.budget_status.as_ref()?.percentage_used;
    (pct >= 100.0).then(|| format!("Budget already exceeded ({:.0}%)", pct))
}

fn explain(risk_score: f64, reasons: &[String]) -> String {
    let severity = if risk_score >= 0.7 {
        "High risk detected"
    } else if risk_score >= 0.5 {
        "Moderate risk detected"
    } else {
        "Unusual activity detected"
    };

    let mut text = format!("{}\n\nReasons:", severity);
    for (i, reason) in reasons.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, reason));
    }
    text
}

fn recommended_action(risk_score: f64) -> &'static str {
    if risk_score >= 0.7 {
        "Please verify this transaction immediately. If you didn't make this purchase, report it as fraud."
    } else if risk_score >= 0.5 {
        "Please review this transaction to confirm it's legitimate."
    } else {
        "Please confirm this transaction was intentional."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MerchantStats;
    use crate::models::{Transaction, TransactionType};
    use crate::notify::types::{BudgetStatus, SpendingPattern};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    fn event(amount: f64, vendor: &str, category: &str) -> TransactionEvent {
        TransactionEvent {
            id: None,
            amount,
            vendor: vendor.into(),
            category: category.into(),
            transaction_type: TransactionType::Expense,
            date: Some(now()),
        }
    }

    fn history_entry(amount: f64, minutes_ago: i64) -> Transaction {
        Transaction {
            id: minutes_ago,
            user_id: "u1".into(),
            amount,
            vendor: "Shop".into(),
            category: "Shopping".into(),
            transaction_type: TransactionType::Expense,
            date: now() - Duration::minutes(minutes_ago),
            created_at: now(),
        }
    }

    /// Context where the vendor is familiar and nothing else stands out
    fn quiet_context() -> NotificationContext {
        NotificationContext {
            merchant_history: Some(MerchantStats {
                transaction_count: 4,
                total_spent: 4000.0,
                average_amount: 1000.0,
                last_transaction_date: Some(now() - Duration::days(3)),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_anomaly() {
        let detector = AnomalyDetector::default();
        let report = detector.detect(&event(500.0, "Cafe", "Food"), 13, now(), &quiet_context());
        assert!(!report.is_anomaly);
        assert_eq!(report.risk_score, 0.0);
        assert!(report.reasons.is_empty());
        assert!(report.explanation.is_empty());
    }

    #[test]
    fn test_amount_multiple_of_average() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.user_average = Some(5000.0);
        ctx.merchant_history = Some(MerchantStats {
            transaction_count: 10,
            total_spent: 200_000.0,
            average_amount: 20_000.0,
            last_transaction_date: Some(now()),
        });

        let report = detector.detect(&event(50_000.0, "Croma", "Electronics"), 13, now(), &ctx);
        assert!(report.is_anomaly);
        assert_eq!(report.reasons, vec!["5x your usual Electronics spending"]);
        assert!((report.risk_score - 0.3).abs() < 1e-9);
        assert!(report.explanation.starts_with("Unusual activity detected\n\nReasons:\n1. 5x"));
    }

    #[test]
    fn test_double_average_needs_high_value() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.merchant_history.as_mut().unwrap().average_amount = 10_000.0;
        ctx.user_average = Some(1000.0);
        let report = detector.detect(&event(2500.0, "Cafe", "Food"), 13, now(), &ctx);
        assert!(!report.is_anomaly);

        ctx.user_average = Some(2600.0);
        let report = detector.detect(&event(5200.0, "Cafe", "Food"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["2x your usual Food spending"]);
    }

    #[test]
    fn test_absolute_amount_without_average() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.merchant_history.as_mut().unwrap().average_amount = 100_000.0;

        let report = detector.detect(&event(75_000.0, "Store", "Rent"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Very high amount: ₹75,000.00"]);

        let report = detector.detect(&event(30_000.0, "Landlord", "Rent"), 13, now(), &ctx);
        assert!(!report.is_anomaly);

        let report = detector.detect(&event(30_000.0, "Store", "Travel"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Unusually high amount for Travel"]);
    }

    #[test]
    fn test_absolute_amount_when_ratio_is_ordinary() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.merchant_history.as_mut().unwrap().average_amount = 100_000.0;
        ctx.user_average = Some(30_000.0);

        let report = detector.detect(&event(55_000.0, "Store", "Travel"), 13, now(), &ctx);
        assert!(report.is_anomaly);
        assert_eq!(report.reasons, vec!["Very high amount: ₹55,000.00"]);

        ctx.user_average = Some(20_000.0);
        let report = detector.detect(&event(35_000.0, "Store", "Travel"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Unusually high amount for Travel"]);
    }

    #[test]
    fn test_routine_categories_match_exactly() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.merchant_history.as_mut().unwrap().average_amount = 100_000.0;

        let report = detector.detect(&event(30_000.0, "Landlord", "Loan EMI"), 13, now(), &ctx);
        assert!(!report.is_anomaly);

        let report =
            detector.detect(&event(30_000.0, "Landlord", "Home Rent Deposit"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Unusually high amount for Home Rent Deposit"]);
    }

    #[test]
    fn test_time_checks() {
        let detector = AnomalyDetector::default();
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 3, now(), &quiet_context());
        assert_eq!(report.reasons, vec!["Transaction at 03:00 (unusual time)"]);
        assert!((report.risk_score - 0.2).abs() < 1e-9);

        let mut ctx = quiet_context();
        ctx.is_unusual_time = true;
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 23, now(), &ctx);
        assert_eq!(report.reasons, vec!["Transaction at unusual time for you"]);
    }

    #[test]
    fn test_merchant_checks() {
        let detector = AnomalyDetector::default();
        let empty = NotificationContext::default();

        let report = detector.detect(&event(6000.0, "NewShop", "Food"), 13, now(), &empty);
        assert!(report
            .reasons
            .contains(&"First transaction at NewShop".to_string()));

        // Small first purchases are fine; unknown vendors are never checked
        let report = detector.detect(&event(100.0, "NewShop", "Food"), 13, now(), &empty);
        assert!(!report.is_anomaly);
        let report = detector.detect(&event(6000.0, "Unknown", "Food"), 13, now(), &empty);
        assert!(!report.reasons.iter().any(|r| r.contains("Unknown")));

        let report = detector.detect(&event(3000.0, "Cafe", "Food"), 13, now(), &quiet_context());
        assert_eq!(report.reasons, vec!["3x your usual spending at Cafe"]);

        let mut stale = quiet_context();
        stale.merchant_history.as_mut().unwrap().last_transaction_date =
            Some(now() - Duration::days(200));
        let report = detector.detect(&event(500.0, "Cafe", "Food"), 13, now(), &stale);
        assert_eq!(report.reasons, vec!["First transaction at Cafe in 200 days"]);
    }

    #[test]
    fn test_frequency_high_value_burst() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.transaction_history = vec![
            history_entry(6000.0, 60),
            history_entry(7000.0, 120),
            history_entry(100.0, 180),
            history_entry(8000.0, 240),
        ];
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["3 high-value transactions in short time"]);
        assert!((report.risk_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_rapid_fire() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.transaction_history = (1..=5).map(|i| history_entry(100.0, i)).collect();
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Multiple transactions in very short time"]);

        ctx.transaction_history = (1..=5).map(|i| history_entry(100.0, i * 60)).collect();
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 13, now(), &ctx);
        assert!(!report.is_anomaly);
    }

    #[test]
    fn test_pattern_checks() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.merchant_history.as_mut().unwrap().average_amount = 10_000.0;
        ctx.spending_pattern = SpendingPattern {
            usual_categories: vec!["Food".into(), "Travel".into()],
            unusual_categories: vec!["Travel".into()],
            transaction_count: 12,
            ..Default::default()
        };

        let report = detector.detect(&event(6000.0, "Cafe", "Jewelry"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["First high-value Jewelry purchase"]);

        let report = detector.detect(&event(2500.0, "Cafe", "Travel"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Unusual category for you: Travel"]);
    }

    #[test]
    fn test_budget_exceeded_without_pattern_data() {
        let detector = AnomalyDetector::default();
        let mut ctx = quiet_context();
        ctx.budget_status = Some(BudgetStatus {
            budget_id: 1,
            amount: 1000.0,
            spent: 1200.0,
            percentage_used: 120.0,
            remaining: -200.0,
        });
        let report = detector.detect(&event(100.0, "Cafe", "Food"), 13, now(), &ctx);
        assert_eq!(report.reasons, vec!["Budget already exceeded (120%)"]);
    }

    #[test]
    fn test_risk_is_capped_and_severity() {
        let detector = AnomalyDetector::default();
        let mut ctx = NotificationContext {
            user_average: Some(1000.0),
            ..Default::default()
        };
        ctx.transaction_history = vec![
            history_entry(6000.0, 1),
            history_entry(7000.0, 2),
            history_entry(8000.0, 3),
        ];

        let report = detector.detect(&event(60_000.0, "NewShop", "Jewelry"), 3, now(), &ctx);
        assert!(report.is_anomaly);
        assert_eq!(report.risk_score, 1.0);
        assert!(report.explanation.starts_with("High risk detected"));
        assert!(report.recommended_action.contains("report it as fraud"));
    }
}
