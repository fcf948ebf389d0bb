//! CSV import of transaction history
//!
//! Seeds the store the context generator reads from. Columns are matched
//! by header name, case-insensitively: `date`, `amount`, `vendor`
//! (or `merchant`/`description`), `category`, and an optional `type`.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionType};

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

struct Columns {
    date: usize,
    amount: usize,
    vendor: Option<usize>,
    category: Option<usize>,
    kind: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        Ok(Self {
            date: find(&["date", "transaction date"])
                .ok_or_else(|| Error::InvalidData("CSV is missing a date column".into()))?,
            amount: find(&["amount"])
                .ok_or_else(|| Error::InvalidData("CSV is missing an amount column".into()))?,
            vendor: find(&["vendor", "merchant", "description"]),
            category: find(&["category"]),
            kind: find(&["type", "transaction_type"]),
        })
    }
}

/// Parse a history CSV into transactions for `user_id`
///
/// Without a type column every row is an expense. Amounts are stored as
/// magnitudes, so `-250` and `250` mean the same thing.
pub fn parse_history<R: Read>(reader: R, user_id: &str) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut transactions = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = i + 2;

        let date = record
            .get(columns.date)
            .ok_or_else(|| Error::InvalidData(format!("Line {}: missing date", line)))
            .and_then(|s| parse_date(s, line))?;
        let amount = record
            .get(columns.amount)
            .ok_or_else(|| Error::InvalidData(format!("Line {}: missing amount", line)))
            .and_then(|s| parse_amount(s, line))?;

        let text = |col: Option<usize>, default: &str| {
            col.and_then(|c| record.get(c))
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let transaction_type = match columns.kind.and_then(|c| record.get(c)) {
            Some(s) if !s.is_empty() => s
                .parse::<TransactionType>()
                .map_err(|e| Error::InvalidData(format!("Line {}: {}", line, e)))?,
            _ => TransactionType::Expense,
        };

        transactions.push(NewTransaction {
            user_id: user_id.to_string(),
            amount: amount.abs(),
            vendor: text(columns.vendor, "Unknown"),
            category: text(columns.category, "Other"),
            transaction_type,
            date,
        });
    }

    debug!(rows = transactions.len(), "Parsed history CSV");
    Ok(transactions)
}

/// Parse and store a history CSV; zero amounts are skipped
pub fn import_history<R: Read>(db: &Database, reader: R, user_id: &str) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    for tx in parse_history(reader, user_id)? {
        if tx.amount == 0.0 {
            stats.skipped += 1;
            continue;
        }
        db.insert_transaction(&tx)?;
        stats.imported += 1;
    }

    info!(
        user = user_id,
        imported = stats.imported,
        skipped = stats.skipped,
        "Imported transaction history"
    );
    Ok(stats)
}

fn parse_date(s: &str, line: usize) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            // Midday keeps the calendar date stable across common offsets
            if let Some(dt) = date.and_hms_opt(12, 0, 0) {
                return Ok(dt.and_utc());
            }
        }
    }

    Err(Error::InvalidData(format!(
        "Line {}: unable to parse date: {}",
        line, s
    )))
}

fn parse_amount(s: &str, line: usize) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['₹', '$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .ok_or_else(|| Error::InvalidData(format!("Line {}: unable to parse amount: {}", line, s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;

    #[test]
    fn test_parse_history() {
        let csv = "Date,Amount,Vendor,Category,Type
2024-05-01,\"₹1,250.00\",Big Bazaar,Groceries,expense
2024-05-02 09:30:00,75000,Acme Corp,Salary,income
05/03/2024,(300),,Food,";

        let txs = parse_history(csv.as_bytes(), "u1").unwrap();
        assert_eq!(txs.len(), 3);

        assert_eq!(txs[0].amount, 1250.0);
        assert_eq!(txs[0].vendor, "Big Bazaar");
        assert_eq!(txs[0].date.day(), 1);
        assert_eq!(txs[0].date.hour(), 12);

        assert_eq!(txs[1].transaction_type, TransactionType::Income);
        assert_eq!(txs[1].date.hour(), 9);

        assert_eq!(txs[2].amount, 300.0);
        assert_eq!(txs[2].vendor, "Unknown");
        assert_eq!(txs[2].transaction_type, TransactionType::Expense);
        assert_eq!(txs[2].user_id, "u1");
    }

    #[test]
    fn test_merchant_header_alias() {
        let csv = "transaction date,amount,merchant\n2024-05-01,10,Cafe\n";
        let txs = parse_history(csv.as_bytes(), "u1").unwrap();
        assert_eq!(txs[0].vendor, "Cafe");
        assert_eq!(txs[0].category, "Other");
    }

    #[test]
    fn test_errors_name_the_line() {
        let missing = parse_history("vendor,amount\nCafe,10\n".as_bytes(), "u1");
        assert!(missing.unwrap_err().to_string().contains("date column"));

        let bad = parse_history("date,amount\n2024-05-01,10\nyesterday,5\n".as_bytes(), "u1");
        assert!(bad.unwrap_err().to_string().contains("Line 3"));
    }

    #[test]
    fn test_import_history_from_file() {
        let db = Database::in_memory().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,amount,vendor,category").unwrap();
        writeln!(file, "2024-05-01,500,Cafe,Food").unwrap();
        writeln!(file, "2024-05-02,0,Cafe,Food").unwrap();

        let reader = std::fs::File::open(file.path()).unwrap();
        let stats = import_history(&db, reader, "u1").unwrap();
        assert_eq!(stats, ImportStats { imported: 1, skipped: 1 });
        assert_eq!(db.recent_transactions("u1", 10, None).unwrap().len(), 1);
    }
}
