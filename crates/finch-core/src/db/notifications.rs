//! Notification storage, listing, and stats

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, parse_optional_datetime, Database};
use crate::error::Result;
use crate::models::{
    Notification, NotificationFilter, NotificationStats, NotificationUpdate, RichContent,
};

const NOTIFICATION_COLUMNS: &str = r#"
    id, user_id, category, priority, title, body, rich_content, trigger_type,
    importance_score, relevance_score, risk_score,
    related_transaction_id, related_budget_id, related_bill_id, related_goal_id,
    channels, available_actions, optimal_delivery_time, dedupe_key,
    is_read, is_archived, is_deleted, is_delivered,
    opened_at, action_taken, action_taken_at, created_at
"#;

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_column<T: std::str::FromStr<Err = String>>(idx: usize, s: &str) -> rusqlite::Result<T> {
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e.to_string()))
}

fn row_to_notification(row: &Row) -> rusqlite::Result<Notification> {
    let category: String = row.get(2)?;
    let priority: String = row.get(3)?;
    let rich_content: String = row.get(6)?;
    let channels: String = row.get(15)?;
    let actions: String = row.get(16)?;
    let action_taken: Option<String> = row.get(24)?;
    let created_at: String = row.get(26)?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: parse_column(2, &category)?,
        priority: parse_column(3, &priority)?,
        title: row.get(4)?,
        body: row.get(5)?,
        rich_content: serde_json::from_str::<RichContent>(&rich_content).unwrap_or_default(),
        trigger_type: row.get(7)?,
        importance_score: row.get(8)?,
        relevance_score: row.get(9)?,
        risk_score: row.get(10)?,
        related_transaction_id: row.get(11)?,
        related_budget_id: row.get(12)?,
        related_bill_id: row.get(13)?,
        related_goal_id: row.get(14)?,
        channels: json_column(15, &channels)?,
        available_actions: json_column(16, &actions)?,
        optimal_delivery_time: parse_optional_datetime(row.get(17)?),
        dedupe_key: row.get(18)?,
        is_read: row.get(19)?,
        is_archived: row.get(20)?,
        is_deleted: row.get(21)?,
        is_delivered: row.get(22)?,
        opened_at: parse_optional_datetime(row.get(23)?),
        action_taken: action_taken
            .as_deref()
            .map(|a| parse_column(24, a))
            .transpose()?,
        action_taken_at: parse_optional_datetime(row.get(25)?),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Store a new notification
    ///
    /// Returns `false` without writing when the user already has a
    /// notification with the same dedupe key.
    pub fn insert_notification(&self, n: &Notification) -> Result<bool> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO notifications (
                id, user_id, category, priority, title, body, rich_content, trigger_type,
                importance_score, relevance_score, risk_score,
                related_transaction_id, related_budget_id, related_bill_id, related_goal_id,
                channels, available_actions, optimal_delivery_time, dedupe_key,
                is_read, is_archived, is_deleted, is_delivered, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, dedupe_key) WHERE dedupe_key IS NOT NULL DO NOTHING
            "#,
            params![
                n.id,
                n.user_id,
                n.category.as_str(),
                n.priority.as_str(),
                n.title,
                n.body,
                serde_json::to_string(&n.rich_content)?,
                n.trigger_type,
                n.importance_score,
                n.relevance_score,
                n.risk_score,
                n.related_transaction_id,
                n.related_budget_id,
                n.related_bill_id,
                n.related_goal_id,
                serde_json::to_string(&n.channels)?,
                serde_json::to_string(&n.available_actions)?,
                n.optimal_delivery_time.as_ref().map(format_datetime),
                n.dedupe_key,
                n.is_read,
                n.is_archived,
                n.is_deleted,
                n.is_delivered,
                format_datetime(&n.created_at),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Fetch a notification by id, including soft-deleted ones
    pub fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let notification = conn
            .query_row(
                &format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS),
                params![id],
                row_to_notification,
            )
            .optional()?;
        Ok(notification)
    }

    /// A user's notifications, newest first, never including deleted ones
    pub fn list_notifications(
        &self,
        user_id: &str,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?".to_string(), "is_deleted = 0".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if filter.unread_only {
            conditions.push("is_read = 0".to_string());
        }
        if let Some(category) = filter.category {
            conditions.push("category = ?".to_string());
            params.push(Box::new(category.as_str()));
        }
        if let Some(priority) = filter.priority {
            conditions.push("priority = ?".to_string());
            params.push(Box::new(priority.as_str()));
        }
        if let Some(since) = filter.since {
            conditions.push("created_at >= ?".to_string());
            params.push(Box::new(format_datetime(&since)));
        }

        let sql = format!(
            r#"
            SELECT {} FROM notifications
            WHERE {}
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
            NOTIFICATION_COLUMNS,
            conditions.join(" AND ")
        );

        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let notifications = stmt
            .query_map(params_refs.as_slice(), row_to_notification)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    /// Apply a partial update; marking read also stamps `opened_at` once
    pub fn update_notification(
        &self,
        id: &str,
        update: &NotificationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        let conn = self.conn()?;
        let now = format_datetime(&now);

        if let Some(is_read) = update.is_read {
            conn.execute(
                r#"
                UPDATE notifications
                SET is_read = ?1,
                    opened_at = CASE WHEN ?1 AND opened_at IS NULL THEN ?2 ELSE opened_at END
                WHERE id = ?3
                "#,
                params![is_read, now, id],
            )?;
        }
        if let Some(is_archived) = update.is_archived {
            conn.execute(
                "UPDATE notifications SET is_archived = ? WHERE id = ?",
                params![is_archived, id],
            )?;
        }
        if let Some(action) = update.action_taken {
            conn.execute(
                "UPDATE notifications SET action_taken = ?, action_taken_at = ? WHERE id = ?",
                params![action.as_str(), now, id],
            )?;
        }

        drop(conn);
        self.get_notification(id)
    }

    pub fn mark_notification_delivered(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE notifications SET is_delivered = 1 WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Soft delete; returns whether a live notification was deleted
    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET is_deleted = 1 WHERE id = ? AND is_deleted = 0",
            params![id],
        )?;
        Ok(updated > 0)
    }

    /// Mark every unread notification read, returning how many changed
    pub fn mark_all_notifications_read(&self, user_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE notifications
            SET is_read = 1, opened_at = COALESCE(opened_at, ?)
            WHERE user_id = ? AND is_read = 0 AND is_deleted = 0
            "#,
            params![format_datetime(&now), user_id],
        )?;
        Ok(updated)
    }

    pub fn notification_stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<NotificationStats> {
        let conn = self.conn()?;

        let (total, unread): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0)
            FROM notifications WHERE user_id = ? AND is_deleted = 0
            "#,
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let recent_24h: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = ? AND is_deleted = 0 AND created_at >= ?
            "#,
            params![user_id, format_datetime(&(now - Duration::hours(24)))],
            |row| row.get(0),
        )?;

        let mut stats = NotificationStats {
            total,
            unread,
            recent_24h,
            ..Default::default()
        };

        for (column, target) in [
            ("category", &mut stats.by_category),
            ("priority", &mut stats.by_priority),
        ] {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {col}, COUNT(*) FROM notifications
                WHERE user_id = ? AND is_deleted = 0
                GROUP BY {col}
                "#,
                col = column
            ))?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            target.extend(rows);
        }

        Ok(stats)
    }

    pub fn dedupe_key_exists(&self, user_id: &str, dedupe_key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND dedupe_key = ?",
            params![user_id, dedupe_key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
