//! Settings repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Trait for key-value settings storage
pub trait SettingsRepository {
    /// Read a setting, `None` when unset
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a setting, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a setting
    fn remove(&self, key: &str) -> Result<()>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_get_set_remove_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        assert_eq!(repo.get("server_url").unwrap(), None);

        repo.set("server_url", "https://sync.example.com").unwrap();
        assert_eq!(
            repo.get("server_url").unwrap().as_deref(),
            Some("https://sync.example.com")
        );

        repo.set("server_url", "https://other.example.com").unwrap();
        assert_eq!(
            repo.get("server_url").unwrap().as_deref(),
            Some("https://other.example.com")
        );

        repo.remove("server_url").unwrap();
        assert_eq!(repo.get("server_url").unwrap(), None);
    }
}
