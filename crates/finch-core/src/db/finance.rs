//! Transactions, budgets, bills, and goals
//!
//! These records are the raw material the context generator reads from.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{format_datetime, parse_date, parse_datetime, parse_optional_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Bill, Budget, Goal, NewBill, NewTransaction, Transaction, TransactionType};

/// Aggregate of a user's past spending at one vendor
#[derive(Debug, Clone, Default, Serialize)]
pub struct MerchantStats {
    pub transaction_count: i64,
    pub total_spent: f64,
    pub average_amount: f64,
    pub last_transaction_date: Option<DateTime<Utc>>,
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.day0() as i64)
}

/// First day of the month `n` months before the one containing `date`
pub fn months_back(date: NaiveDate, n: u32) -> NaiveDate {
    month_start(date)
        .checked_sub_months(Months::new(n))
        .unwrap_or(NaiveDate::MIN)
}

fn day_bound(date: NaiveDate) -> String {
    format!("{} 00:00:00", date)
}

const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, vendor, category, transaction_type, date, created_at";

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let tx_type: String = row.get(5)?;
    let date: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        vendor: row.get(3)?,
        category: row.get(4)?,
        transaction_type: tx_type.parse().unwrap_or(TransactionType::Expense),
        date: parse_datetime(&date),
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_bill(row: &Row) -> rusqlite::Result<(Bill, String)> {
    let due: String = row.get(5)?;
    let paid_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok((
        Bill {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            bill_type: row.get(4)?,
            due_date: NaiveDate::MIN,
            paid_at: parse_optional_datetime(paid_at),
            created_at: parse_datetime(&created_at),
        },
        due,
    ))
}

fn finish_bill((mut bill, due): (Bill, String)) -> Result<Bill> {
    bill.due_date = parse_date(&due)?;
    Ok(bill)
}

fn row_to_goal(row: &Row) -> rusqlite::Result<Goal> {
    let created_at: String = row.get(6)?;
    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        target_amount: row.get(3)?,
        current_amount: row.get(4)?,
        is_active: row.get(5)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    // ========== Transactions ==========

    /// Insert a transaction, returning its id
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        if !tx.amount.is_finite() {
            return Err(Error::InvalidData("Transaction amount must be finite".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, amount, vendor, category, transaction_type, date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.amount.abs(),
                tx.vendor.trim(),
                tx.category.trim(),
                tx.transaction_type.as_str(),
                format_datetime(&tx.date),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Newest transactions first, optionally skipping one id
    pub fn recent_transactions(
        &self,
        user_id: &str,
        limit: i64,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND (? IS NULL OR id != ?)
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(
                params![user_id, exclude_id, exclude_id, limit],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// All transactions on or after `since`, oldest first
    pub fn transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND date >= ? AND (? IS NULL OR id != ?)
            ORDER BY date ASC, id ASC
            "#,
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(
                params![user_id, format_datetime(&since), exclude_id, exclude_id],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Newest transactions in one category
    pub fn transactions_in_category(
        &self,
        user_id: &str,
        category: &str,
        limit: i64,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND category = ? COLLATE NOCASE AND (? IS NULL OR id != ?)
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
            TRANSACTION_COLUMNS
        ))?;
        let txs = stmt
            .query_map(
                params![user_id, category, exclude_id, exclude_id, limit],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Count, total, average, and last date of expenses at a vendor
    pub fn merchant_stats(
        &self,
        user_id: &str,
        vendor: &str,
        exclude_id: Option<i64>,
    ) -> Result<MerchantStats> {
        let conn = self.conn()?;
        let (count, total, last): (i64, f64, Option<String>) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(amount), 0), MAX(date)
            FROM transactions
            WHERE user_id = ? AND vendor = ? COLLATE NOCASE
              AND transaction_type = 'expense'
              AND (? IS NULL OR id != ?)
            "#,
            params![user_id, vendor, exclude_id, exclude_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(MerchantStats {
            transaction_count: count,
            total_spent: total,
            average_amount: if count > 0 { total / count as f64 } else { 0.0 },
            last_transaction_date: parse_optional_datetime(last),
        })
    }

    /// Total expense in `[start, end)`, optionally limited to one category
    pub fn expense_total_between(
        &self,
        user_id: &str,
        category: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<f64> {
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM transactions
            WHERE user_id = ? AND transaction_type = 'expense'
              AND date >= ? AND date < ?
              AND (? IS NULL OR category = ? COLLATE NOCASE)
            "#,
            params![user_id, day_bound(start), day_bound(end), category, category],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Users that have any stored finance data
    pub fn list_user_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id FROM budgets
            UNION SELECT user_id FROM bills
            UNION SELECT user_id FROM goals
            ORDER BY user_id
            "#,
        )?;
        let users = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(users)
    }

    // ========== Budgets ==========

    /// Create or replace the monthly budget for a category
    pub fn upsert_budget(&self, user_id: &str, category: &str, amount: f64) -> Result<i64> {
        if amount <= 0.0 {
            return Err(Error::InvalidData("Budget amount must be positive".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budgets (user_id, category, amount) VALUES (?, ?, ?)
            ON CONFLICT(user_id, category) DO UPDATE SET amount = excluded.amount
            "#,
            params![user_id, category.trim(), amount],
        )?;
        let id = conn.query_row(
            "SELECT id FROM budgets WHERE user_id = ? AND category = ?",
            params![user_id, category.trim()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_budget(&self, id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let budget = conn
            .query_row(
                "SELECT id, user_id, category, amount, created_at FROM budgets WHERE id = ?",
                params![id],
                |row| {
                    let created_at: String = row.get(4)?;
                    Ok(Budget {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        category: row.get(2)?,
                        amount: row.get(3)?,
                        created_at: parse_datetime(&created_at),
                    })
                },
            )
            .optional()?;
        Ok(budget)
    }

    pub fn budget_for_category(&self, user_id: &str, category: &str) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM budgets WHERE user_id = ? AND category = ? COLLATE NOCASE",
                params![user_id, category],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_budget(id),
            None => Ok(None),
        }
    }

    pub fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, category, amount, created_at
            FROM budgets WHERE user_id = ? ORDER BY category
            "#,
        )?;
        let budgets = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(4)?;
                Ok(Budget {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    category: row.get(2)?,
                    amount: row.get(3)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    /// Number of the `months` calendar months before `today`'s month in which
    /// any budget was exceeded
    pub fn months_over_budget(&self, user_id: &str, today: NaiveDate, months: u32) -> Result<u32> {
        let budgets = self.list_budgets(user_id)?;
        if budgets.is_empty() {
            return Ok(0);
        }

        let mut over = 0;
        for back in 1..=months {
            let start = months_back(today, back);
            let end = months_back(today, back - 1);
            let mut exceeded = false;
            for budget in &budgets {
                let spent =
                    self.expense_total_between(user_id, Some(&budget.category), start, end)?;
                if spent > budget.amount {
                    exceeded = true;
                    break;
                }
            }
            if exceeded {
                over += 1;
            }
        }
        Ok(over)
    }

    // ========== Bills ==========

    pub fn create_bill(&self, bill: &NewBill) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO bills (user_id, name, amount, bill_type, due_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                bill.user_id,
                bill.name.trim(),
                bill.amount,
                bill.bill_type.trim(),
                bill.due_date.to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_bill(&self, id: i64) -> Result<Option<Bill>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT id, user_id, name, amount, bill_type, due_date, paid_at, created_at
                FROM bills WHERE id = ?
                "#,
                params![id],
                row_to_bill,
            )
            .optional()?;
        raw.map(finish_bill).transpose()
    }

    /// Bills for a user ordered by due date
    pub fn list_bills(&self, user_id: &str, unpaid_only: bool) -> Result<Vec<Bill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, amount, bill_type, due_date, paid_at, created_at
            FROM bills
            WHERE user_id = ? AND (? = 0 OR paid_at IS NULL)
            ORDER BY due_date ASC, id ASC
            "#,
        )?;
        let raw = stmt
            .query_map(params![user_id, unpaid_only], row_to_bill)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raw.into_iter().map(finish_bill).collect()
    }

    pub fn mark_bill_paid(&self, id: i64, paid_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE bills SET paid_at = ? WHERE id = ?",
            params![format_datetime(&paid_at), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Bill {} not found", id)));
        }
        Ok(())
    }

    /// Bills that were paid after their due date
    pub fn count_late_bills(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            r#"
            SELECT COUNT(*) FROM bills
            WHERE user_id = ? AND paid_at IS NOT NULL AND date(paid_at) > due_date
            "#,
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ========== Goals ==========

    pub fn create_goal(
        &self,
        user_id: &str,
        name: &str,
        target_amount: f64,
        current_amount: f64,
    ) -> Result<i64> {
        if target_amount <= 0.0 {
            return Err(Error::InvalidData("Goal target must be positive".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO goals (user_id, name, target_amount, current_amount) VALUES (?, ?, ?, ?)",
            params![user_id, name.trim(), target_amount, current_amount],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_goal(&self, id: i64) -> Result<Option<Goal>> {
        let conn = self.conn()?;
        let goal = conn
            .query_row(
                r#"
                SELECT id, user_id, name, target_amount, current_amount, is_active, created_at
                FROM goals WHERE id = ?
                "#,
                params![id],
                row_to_goal,
            )
            .optional()?;
        Ok(goal)
    }

    pub fn list_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, target_amount, current_amount, is_active, created_at
            FROM goals WHERE user_id = ? ORDER BY id
            "#,
        )?;
        let goals = stmt
            .query_map(params![user_id], row_to_goal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(goals)
    }

    pub fn update_goal_progress(&self, id: i64, current_amount: f64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE goals SET current_amount = ? WHERE id = ?",
            params![current_amount, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Goal {} not found", id)));
        }
        Ok(())
    }

    pub fn has_active_goals(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM goals WHERE user_id = ? AND is_active = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
