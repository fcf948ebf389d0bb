//! Push device tokens

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::DeviceToken;

impl Database {
    /// Register a device token; re-registering moves it to `user_id`
    pub fn register_device(&self, user_id: &str, token: &str, platform: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidData("Device token cannot be empty".into()));
        }
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO device_tokens (token, user_id, platform) VALUES (?1, ?2, ?3)
            ON CONFLICT(token) DO UPDATE SET user_id = ?2, platform = ?3
            "#,
            params![token, user_id, platform],
        )?;
        Ok(())
    }

    /// Remove a token; returns whether one was removed
    pub fn unregister_device(&self, user_id: &str, token: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM device_tokens WHERE token = ? AND user_id = ?",
            params![token, user_id],
        )?;
        Ok(removed > 0)
    }

    /// Drop a token the push provider rejected
    pub fn remove_device_token(&self, token: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM device_tokens WHERE token = ?", params![token])?;
        Ok(())
    }

    pub fn list_devices(&self, user_id: &str) -> Result<Vec<DeviceToken>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, token, platform, created_at
            FROM device_tokens WHERE user_id = ?
            ORDER BY created_at, token
            "#,
        )?;
        let devices = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(3)?;
                Ok(DeviceToken {
                    user_id: row.get(0)?,
                    token: row.get(1)?,
                    platform: row.get(2)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(devices)
    }
}
