//! Preferences, learned profiles, and interaction records

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{InteractionRecord, NotificationAction, UserPreferences, UserProfile};

/// Interaction rows kept per user
pub const MAX_INTERACTIONS_PER_USER: i64 = 100;

const INTERACTION_COLUMNS: &str = r#"
    notification_id, user_id, category, trigger_type, subject_category,
    importance, relevance, opened, action_taken, dismissed_within_seconds, created_at
"#;

fn row_to_interaction(row: &Row) -> rusqlite::Result<InteractionRecord> {
    let category: String = row.get(2)?;
    let action: Option<String> = row.get(8)?;
    let created_at: String = row.get(10)?;
    Ok(InteractionRecord {
        notification_id: row.get(0)?,
        user_id: row.get(1)?,
        category: category.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        trigger_type: row.get(3)?,
        subject_category: row.get(4)?,
        importance: row.get(5)?,
        relevance: row.get(6)?,
        opened: row.get(7)?,
        action_taken: action.and_then(|a| a.parse().ok()),
        dismissed_within_seconds: row.get(9)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    // ========== Preferences ==========

    /// Stored preferences, or `None` for a user who never saved any
    pub fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM notification_preferences WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => {
                let mut prefs: UserPreferences = serde_json::from_str(&json)?;
                prefs.user_id = user_id.to_string();
                Ok(Some(prefs))
            }
            None => Ok(None),
        }
    }

    pub fn save_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO notification_preferences (user_id, data, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET data = ?2, updated_at = CURRENT_TIMESTAMP
            "#,
            params![prefs.user_id, serde_json::to_string(prefs)?],
        )?;
        Ok(())
    }

    // ========== Profiles ==========

    pub fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM notification_profiles WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|json| serde_json::from_str::<UserProfile>(&json).map_err(Error::from))
            .transpose()
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO notification_profiles (user_id, data, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET data = ?2, updated_at = CURRENT_TIMESTAMP
            "#,
            params![profile.user_id, serde_json::to_string(profile)?],
        )?;
        Ok(())
    }

    // ========== Interactions ==========

    /// Store an interaction record and prune the user's history to the newest
    /// `MAX_INTERACTIONS_PER_USER` rows
    pub fn insert_interaction(&self, record: &InteractionRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO notification_interactions (
                notification_id, user_id, category, trigger_type, subject_category,
                importance, relevance, opened, action_taken, dismissed_within_seconds, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.notification_id,
                record.user_id,
                record.category.as_str(),
                record.trigger_type,
                record.subject_category,
                record.importance,
                record.relevance,
                record.opened,
                record.action_taken.map(|a| a.as_str()),
                record.dismissed_within_seconds,
                format_datetime(&record.created_at),
            ],
        )?;

        conn.execute(
            r#"
            DELETE FROM notification_interactions
            WHERE user_id = ?1 AND id NOT IN (
                SELECT id FROM notification_interactions
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
            )
            "#,
            params![record.user_id, MAX_INTERACTIONS_PER_USER],
        )?;
        Ok(())
    }

    pub fn get_interaction(&self, notification_id: &str) -> Result<Option<InteractionRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM notification_interactions WHERE notification_id = ?",
                    INTERACTION_COLUMNS
                ),
                params![notification_id],
                row_to_interaction,
            )
            .optional()?;
        Ok(record)
    }

    /// Mark an interaction opened and record what the user did
    ///
    /// Returns the updated record, or `None` if it was pruned.
    pub fn record_interaction_action(
        &self,
        notification_id: &str,
        action: NotificationAction,
        at: DateTime<Utc>,
    ) -> Result<Option<InteractionRecord>> {
        let Some(record) = self.get_interaction(notification_id)? else {
            return Ok(None);
        };

        let elapsed = (at - record.created_at).num_milliseconds() as f64 / 1000.0;
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE notification_interactions
            SET opened = 1, action_taken = ?, dismissed_within_seconds = ?
            WHERE notification_id = ?
            "#,
            params![action.as_str(), elapsed.max(0.0), notification_id],
        )?;
        drop(conn);

        self.get_interaction(notification_id)
    }

    /// Mark an interaction opened without an action
    pub fn mark_interaction_opened(&self, notification_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE notification_interactions SET opened = 1 WHERE notification_id = ?",
            params![notification_id],
        )?;
        Ok(())
    }

    /// Newest interactions first
    pub fn recent_interactions(&self, user_id: &str, limit: i64) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM notification_interactions
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            INTERACTION_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![user_id, limit], row_to_interaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
