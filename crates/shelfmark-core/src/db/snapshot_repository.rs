//! Snapshot row repository implementation

use rusqlite::{params, Connection};

use crate::error::Result;

/// Metadata for a stored snapshot (content excluded from listings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: i64,
    pub created_at: i64,
    pub format: String,
}

/// Trait for snapshot row storage
pub trait SnapshotRepository {
    /// Store a rendered snapshot
    fn insert(&self, created_at: i64, format: &str, content: &str) -> Result<i64>;

    /// List snapshot metadata, newest first
    fn list(&self) -> Result<Vec<SnapshotRecord>>;

    /// Fetch a snapshot's content
    fn content(&self, id: i64) -> Result<Option<String>>;

    /// Delete snapshots created before the cutoff; returns rows removed
    fn delete_older_than(&self, cutoff: i64) -> Result<usize>;

    /// Keep only the newest `keep` snapshots; returns rows removed
    fn delete_beyond_count(&self, keep: usize) -> Result<usize>;
}

/// `SQLite` implementation of `SnapshotRepository`
pub struct SqliteSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSnapshotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn insert(&self, created_at: i64, format: &str, content: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO snapshots (created_at, format, content) VALUES (?, ?, ?)",
            params![created_at, format, content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list(&self) -> Result<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, format FROM snapshots ORDER BY created_at DESC, id DESC",
        )?;
        let records = stmt
            .query_map([], |row| {
                Ok(SnapshotRecord {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    format: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn content(&self, id: i64) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;
        let content = self
            .conn
            .query_row(
                "SELECT content FROM snapshots WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    fn delete_older_than(&self, cutoff: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM snapshots WHERE created_at < ?",
            params![cutoff],
        )?;
        Ok(rows)
    }

    fn delete_beyond_count(&self, keep: usize) -> Result<usize> {
        #[allow(clippy::cast_possible_wrap)]
        let rows = self.conn.execute(
            "DELETE FROM snapshots WHERE id NOT IN (
                 SELECT id FROM snapshots ORDER BY created_at DESC, id DESC LIMIT ?
             )",
            params![keep as i64],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_list_newest_first() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());

        repo.insert(100, "json", "{}").unwrap();
        let newest = repo.insert(200, "html", "<html></html>").unwrap();

        let records = repo.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, newest);
        assert_eq!(records[0].format, "html");

        assert_eq!(repo.content(newest).unwrap().as_deref(), Some("<html></html>"));
    }

    #[test]
    fn test_prune_by_age_and_count() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());

        for created_at in [100, 200, 300, 400] {
            repo.insert(created_at, "json", "{}").unwrap();
        }

        assert_eq!(repo.delete_older_than(250).unwrap(), 2);
        assert_eq!(repo.list().unwrap().len(), 2);

        assert_eq!(repo.delete_beyond_count(1).unwrap(), 1);
        let remaining = repo.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].created_at, 400);
    }
}
