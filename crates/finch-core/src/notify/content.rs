//! Content Generator - notification title, body, and rich content
//!
//! Copy comes from the configured LLM when one is available. Any failure
//! (no backend, unreachable server, unparseable reply) falls back to the
//! built-in templates, so content generation itself never fails.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient, GenerationOptions};
use crate::config::ContentConfig;
use crate::models::{NotificationCategory, RichContent, RichStat};

use super::format_money;
use super::types::{NotificationContext, Trigger, TriggerKind};

/// Generated notification copy
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub title: String,
    pub body: String,
    pub rich_content: RichContent,
}

pub struct ContentGenerator {
    ai: Option<AIClient>,
    config: ContentConfig,
}

impl ContentGenerator {
    pub fn new(ai: Option<AIClient>, config: ContentConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        Self {
            ai: ai.map(|client| client.with_timeout(timeout)),
            config,
        }
    }

    pub fn ai(&self) -> Option<&AIClient> {
        self.ai.as_ref()
    }

    fn money(&self, amount: f64) -> String {
        format_money(&self.config.currency, amount)
    }

    /// Title, body, and rich content for a trigger
    ///
    /// `reasons` are the anomaly reasons when the notification is about
    /// suspicious activity.
    pub async fn generate(
        &self,
        trigger: &Trigger,
        category: NotificationCategory,
        ctx: &NotificationContext,
        reasons: &[String],
    ) -> Content {
        let (title, body) = match self.llm_content(trigger, category, ctx).await {
            Some(generated) => generated,
            None => self.template(trigger, category, ctx, reasons),
        };

        Content {
            title,
            body,
            rich_content: self.rich_content(trigger, category, ctx),
        }
    }

    async fn llm_content(
        &self,
        trigger: &Trigger,
        category: NotificationCategory,
        ctx: &NotificationContext,
    ) -> Option<(String, String)> {
        if !self.config.use_llm {
            return None;
        }
        let ai = self.ai.as_ref()?;

        let details = self.prompt_details(&trigger.kind);
        let user_average = ctx.user_average.map(|avg| self.money(avg));
        let budget_usage = ctx
            .budget_status
            .as_ref()
            .map(|b| format!("{:.0}%", b.percentage_used));
        let recommendations = ctx
            .recommendations
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("category", category.as_str());
        vars.insert("details", &details);
        vars.insert("currency", &self.config.currency);
        if let Some(avg) = &user_average {
            vars.insert("user_average", avg);
        }
        if let Some(usage) = &budget_usage {
            vars.insert("budget_usage", usage);
        }
        if let Some(analysis) = &ctx.analysis {
            vars.insert("analysis", analysis);
        }
        if !recommendations.is_empty() {
            vars.insert("recommendations", &recommendations);
        }

        let options = GenerationOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        match ai.write_notification(&vars, &options).await {
            Ok(generated) => {
                debug!(backend = ai.backend_name(), "Generated notification copy");
                Some((generated.title, generated.body))
            }
            Err(e) => {
                warn!(
                    backend = ai.backend_name(),
                    error = %e,
                    "LLM content generation failed, using template"
                );
                None
            }
        }
    }

    /// Context lines handed to the model
    fn prompt_details(&self, kind: &TriggerKind) -> String {
        let mut lines = Vec::new();
        match kind {
            TriggerKind::TransactionCreated { transaction }
            | TriggerKind::AnomalyDetected { transaction, .. } => {
                lines.push(format!(
                    "- Transaction: {} at {}",
                    self.money(transaction.abs_amount()),
                    transaction.vendor
                ));
                lines.push(format!("- Category: {}", transaction.category));
                lines.push(format!("- Type: {}", transaction.transaction_type));
                lines.push(format!(
                    "- Date: {}",
                    transaction
                        .date
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "Today".to_string())
                ));
                if let TriggerKind::AnomalyDetected { reasons, .. } = kind {
                    if !reasons.is_empty() {
                        lines.push(format!("- Flagged because: {}", reasons.join("; ")));
                    }
                }
            }
            TriggerKind::BudgetThreshold {
                category,
                percentage,
                spent,
                limit,
                ..
            } => {
                lines.push(format!(
                    "- Budget threshold reached: {:.0}%",
                    percentage * 100.0
                ));
                lines.push(format!("- Category: {}", category));
                if *limit > 0.0 {
                    lines.push(format!(
                        "- Spent: {} of {}",
                        self.money(*spent),
                        self.money(*limit)
                    ));
                }
            }
            TriggerKind::BillDue {
                bill,
                days_until_due,
            } => {
                lines.push(format!("- Bill: {}", bill.name));
                lines.push(format!("- Amount: {}", self.money(bill.amount)));
                lines.push(format!("- Due in: {} days", days_until_due));
            }
            TriggerKind::GoalMilestone {
                goal_name,
                milestone,
                ..
            } => {
                lines.push(format!("- Goal: {}", goal_name));
                lines.push(format!("- Progress: {:.0}%", milestone));
            }
            TriggerKind::InsightGenerated {
                title,
                description,
                potential_savings,
                ..
            } => {
                lines.push(format!("- Insight: {}", title));
                lines.push(format!("- Details: {}", description));
                if *potential_savings > 0.0 {
                    lines.push(format!(
                        "- Potential savings: {}",
                        self.money(*potential_savings)
                    ));
                }
            }
            TriggerKind::CashflowPrediction {
                summary,
                projected_balance,
            } => {
                lines.push(format!("- Forecast: {}", summary));
                lines.push(format!(
                    "- Projected balance: {}",
                    self.money(*projected_balance)
                ));
            }
        }
        lines.join("\n")
    }

    /// Template title and body
    pub fn template(
        &self,
        trigger: &Trigger,
        category: NotificationCategory,
        ctx: &NotificationContext,
        reasons: &[String],
    ) -> (String, String) {
        if category == NotificationCategory::FraudDetection {
            let first = reasons
                .first()
                .map(String::as_str)
                .unwrap_or("Please review");
            return (
                "🚨 Unusual Activity".to_string(),
                format!("Unusual transaction detected: {}", first),
            );
        }

        match &trigger.kind {
            TriggerKind::TransactionCreated { transaction } => {
                let amount = self.money(transaction.abs_amount());
                if transaction.is_income() {
                    let body = if transaction.has_known_vendor() {
                        format!("{} received from {}", amount, transaction.vendor)
                    } else {
                        format!("{} received", amount)
                    };
                    ("💰 Money Received".to_string(), body)
                } else {
                    let mut body = format!("{} spent at {}", amount, transaction.vendor);
                    if let Some(budget) = &ctx.budget_status {
                        body.push_str(&format!(
                            "\n📊 Budget: {:.0}% used",
                            budget.percentage_used
                        ));
                    }
                    ("💳 Payment Made".to_string(), body)
                }
            }
            TriggerKind::BudgetThreshold {
                category,
                percentage,
                ..
            } => (
                "📊 Budget Alert".to_string(),
                format!(
                    "You've reached {:.0}% of your {} budget",
                    percentage * 100.0,
                    category
                ),
            ),
            TriggerKind::BillDue {
                bill,
                days_until_due,
            } => {
                let when = match days_until_due {
                    0 => "due today".to_string(),
                    1 => "due in 1 day".to_string(),
                    n => format!("due in {} days", n),
                };
                (
                    "📅 Bill Reminder".to_string(),
                    format!("{} {} ({})", bill.name, when, self.money(bill.amount)),
                )
            }
            TriggerKind::GoalMilestone {
                goal_name,
                milestone,
                ..
            } => (
                "🎯 Goal Milestone!".to_string(),
                format!("You've reached {:.0}% of your {} goal!", milestone, goal_name),
            ),
            TriggerKind::AnomalyDetected { reasons, .. } => (
                "🚨 Unusual Activity".to_string(),
                format!(
                    "Unusual transaction detected: {}",
                    reasons.first().map(String::as_str).unwrap_or("Please review")
                ),
            ),
            TriggerKind::InsightGenerated {
                title, description, ..
            } => (format!("💡 {}", title), description.clone()),
            TriggerKind::CashflowPrediction { summary, .. } => {
                ("🔮 Cashflow Forecast".to_string(), summary.clone())
            }
        }
    }

    /// Icon, chips, and stats shown alongside the text
    pub fn rich_content(
        &self,
        trigger: &Trigger,
        category: NotificationCategory,
        ctx: &NotificationContext,
    ) -> RichContent {
        let mut rich = RichContent {
            category_icon: category.icon().to_string(),
            show_chart: false,
            stats: Vec::new(),
            chips: Vec::new(),
        };

        let TriggerKind::TransactionCreated { transaction } = &trigger.kind else {
            return rich;
        };
        let amount = transaction.abs_amount();

        rich.chips = vec![transaction.category.clone(), self.money(amount)];

        if let Some(budget) = &ctx.budget_status {
            rich.stats.push(RichStat {
                label: "Budget Used".to_string(),
                value: format!("{:.0}%", budget.percentage_used),
                progress: Some(budget.percentage_used / 100.0),
                is_positive: None,
            });
        }

        if let Some(avg) = ctx.user_average.filter(|avg| *avg > 0.0) {
            let comparison = (amount - avg) / avg * 100.0;
            rich.stats.push(RichStat {
                label: "vs Your Average".to_string(),
                value: format!("{:+.0}%", comparison),
                progress: None,
                // Spending less than usual is good news
                is_positive: Some(comparison < 0.0),
            });
        }

        rich
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::TransactionType;
    use crate::notify::types::{BillEvent, BudgetStatus, TransactionEvent};
    use chrono::{TimeZone, Utc};

    fn generator(ai: Option<AIClient>) -> ContentGenerator {
        ContentGenerator::new(ai, EngineConfig::default().content)
    }

    fn trigger(kind: TriggerKind) -> Trigger {
        Trigger::new(
            "u1",
            kind,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    fn tx(amount: f64, vendor: &str, transaction_type: TransactionType) -> Trigger {
        trigger(TriggerKind::TransactionCreated {
            transaction: TransactionEvent {
                id: None,
                amount,
                vendor: vendor.into(),
                category: "Shopping".into(),
                transaction_type,
                date: None,
            },
        })
    }

    fn budget_ctx(pct: f64) -> NotificationContext {
        NotificationContext {
            budget_status: Some(BudgetStatus {
                budget_id: 1,
                amount: 10_000.0,
                spent: pct * 100.0,
                percentage_used: pct,
                remaining: 10_000.0 - pct * 100.0,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_transaction_templates() {
        let gen = generator(None);
        let cat = NotificationCategory::SmartTransaction;

        let (title, body) = gen.template(
            &tx(5000.0, "Croma", TransactionType::Expense),
            cat,
            &budget_ctx(82.0),
            &[],
        );
        assert_eq!(title, "💳 Payment Made");
        assert_eq!(body, "₹5,000.00 spent at Croma\n📊 Budget: 82% used");

        let (title, body) = gen.template(
            &tx(25_000.0, "Acme Corp", TransactionType::Income),
            cat,
            &NotificationContext::default(),
            &[],
        );
        assert_eq!(title, "💰 Money Received");
        assert_eq!(body, "₹25,000.00 received from Acme Corp");

        let (_, body) = gen.template(
            &tx(100.0, "Unknown", TransactionType::Income),
            cat,
            &NotificationContext::default(),
            &[],
        );
        assert_eq!(body, "₹100.00 received");
    }

    #[test]
    fn test_other_templates() {
        let gen = generator(None);
        let ctx = NotificationContext::default();

        let budget = trigger(TriggerKind::BudgetThreshold {
            budget_id: Some(1),
            category: "Food".into(),
            percentage: 0.9,
            spent: 9000.0,
            limit: 10_000.0,
        });
        let (title, body) = gen.template(&budget, NotificationCategory::BudgetAlert, &ctx, &[]);
        assert_eq!(title, "📊 Budget Alert");
        assert_eq!(body, "You've reached 90% of your Food budget");

        let bill = |days| {
            trigger(TriggerKind::BillDue {
                bill: BillEvent {
                    id: None,
                    name: "Electricity".into(),
                    amount: 1500.0,
                    bill_type: "utility".into(),
                    due_date: None,
                },
                days_until_due: days,
            })
        };
        let (title, body) = gen.template(&bill(3), NotificationCategory::BillReminder, &ctx, &[]);
        assert_eq!(title, "📅 Bill Reminder");
        assert_eq!(body, "Electricity due in 3 days (₹1,500.00)");
        let (_, body) = gen.template(&bill(0), NotificationCategory::BillReminder, &ctx, &[]);
        assert_eq!(body, "Electricity due today (₹1,500.00)");

        let goal = trigger(TriggerKind::GoalMilestone {
            goal_id: None,
            goal_name: "Vacation".into(),
            milestone: 50.0,
        });
        let (title, body) = gen.template(&goal, NotificationCategory::GoalProgress, &ctx, &[]);
        assert_eq!(title, "🎯 Goal Milestone!");
        assert_eq!(body, "You've reached 50% of your Vacation goal!");

        let cashflow = trigger(TriggerKind::CashflowPrediction {
            summary: "Tight week ahead".into(),
            projected_balance: -200.0,
        });
        let (title, body) =
            gen.template(&cashflow, NotificationCategory::CashflowPrediction, &ctx, &[]);
        assert_eq!(title, "🔮 Cashflow Forecast");
        assert_eq!(body, "Tight week ahead");
    }

    #[test]
    fn test_fraud_template_uses_first_reason() {
        let gen = generator(None);
        let reasons = vec!["5x your usual Shopping spending".to_string()];
        let (title, body) = gen.template(
            &tx(50_000.0, "Croma", TransactionType::Expense),
            NotificationCategory::FraudDetection,
            &NotificationContext::default(),
            &reasons,
        );
        assert_eq!(title, "🚨 Unusual Activity");
        assert_eq!(
            body,
            "Unusual transaction detected: 5x your usual Shopping spending"
        );

        let (_, body) = gen.template(
            &tx(50_000.0, "Croma", TransactionType::Expense),
            NotificationCategory::FraudDetection,
            &NotificationContext::default(),
            &[],
        );
        assert_eq!(body, "Unusual transaction detected: Please review");
    }

    #[test]
    fn test_rich_content_for_transaction() {
        let gen = generator(None);
        let mut ctx = budget_ctx(45.0);
        ctx.user_average = Some(4000.0);

        let rich = gen.rich_content(
            &tx(5000.0, "Croma", TransactionType::Expense),
            NotificationCategory::SmartTransaction,
            &ctx,
        );
        assert_eq!(rich.category_icon, "💳");
        assert!(!rich.show_chart);
        assert_eq!(rich.chips, vec!["Shopping", "₹5,000.00"]);
        assert_eq!(rich.stats.len(), 2);
        assert_eq!(rich.stats[0].label, "Budget Used");
        assert_eq!(rich.stats[0].value, "45%");
        assert_eq!(rich.stats[0].progress, Some(0.45));
        assert_eq!(rich.stats[1].value, "+25%");
        assert_eq!(rich.stats[1].is_positive, Some(false));
    }

    #[test]
    fn test_rich_content_for_other_triggers() {
        let gen = generator(None);
        let goal = trigger(TriggerKind::GoalMilestone {
            goal_id: None,
            goal_name: "Car".into(),
            milestone: 25.0,
        });
        let rich = gen.rich_content(&goal, NotificationCategory::GoalProgress, &NotificationContext::default());
        assert_eq!(rich.category_icon, "🎯");
        assert!(rich.chips.is_empty());
        assert!(rich.stats.is_empty());
    }

    #[tokio::test]
    async fn test_generate_uses_llm_when_available() {
        let gen = generator(Some(AIClient::mock()));
        let content = gen
            .generate(
                &tx(5000.0, "TestMerchant", TransactionType::Expense),
                NotificationCategory::SmartTransaction,
                &NotificationContext::default(),
                &[],
            )
            .await;
        assert_eq!(content.title, "🤖 smart transaction");
        assert!(content.body.starts_with("Transaction: ₹5,000.00 at TestMerchant"));
        assert_eq!(content.rich_content.chips.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_falls_back_when_llm_fails() {
        let gen = generator(Some(AIClient::Mock(crate::ai::MockBackend::unhealthy())));
        let content = gen
            .generate(
                &tx(5000.0, "TestMerchant", TransactionType::Expense),
                NotificationCategory::SmartTransaction,
                &NotificationContext::default(),
                &[],
            )
            .await;
        assert_eq!(content.title, "💳 Payment Made");
        assert_eq!(content.body, "₹5,000.00 spent at TestMerchant");
    }

    #[tokio::test]
    async fn test_generate_respects_use_llm_flag() {
        let mut config = EngineConfig::default().content;
        config.use_llm = false;
        let gen = ContentGenerator::new(Some(AIClient::mock()), config);
        let content = gen
            .generate(
                &tx(10.0, "Cafe", TransactionType::Expense),
                NotificationCategory::SmartTransaction,
                &NotificationContext::default(),
                &[],
            )
            .await;
        assert_eq!(content.title, "💳 Payment Made");
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = crate::test_utils::MockOllamaServer::start().await;
        let client = AIClient::Ollama(
            crate::ai::OllamaBackend::new(&server.url(), "llama3.2")
                .with_prompts(crate::prompts::PromptLibrary::embedded_only()),
        );
        let gen = generator(Some(client));
        let bill = trigger(TriggerKind::BillDue {
            bill: BillEvent {
                id: None,
                name: "Rent".into(),
                amount: 20_000.0,
                bill_type: "rent".into(),
                due_date: None,
            },
            days_until_due: 1,
        });
        let content = gen
            .generate(&bill, NotificationCategory::BillReminder, &NotificationContext::default(), &[])
            .await;
        assert_eq!(content.title, crate::test_utils::MOCK_TITLE);
        assert!(content.body.contains("bill_reminder"));
    }
}
