use rusqlite::{OptionalExtension, params};

use super::Database;
use crate::error::ConsentError;

impl Database {
    // --- Session store ---

    pub fn get_session_value(&self, key: &str) -> Result<Option<String>, ConsentError> {
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM session_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_session_value(&self, key: &str, value: &str) -> Result<(), ConsentError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO session_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub fn delete_session_value(&self, key: &str) -> Result<bool, ConsentError> {
        let conn = self.conn();
        let removed = conn.execute("DELETE FROM session_store WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}
