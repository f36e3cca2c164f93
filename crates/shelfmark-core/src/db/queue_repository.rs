//! Pending sync queue repository implementation

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::unix_timestamp_now;

/// A persisted operation awaiting remote replay.
///
/// Entries are replayed in insertion order and removed only on success;
/// there is no automatic terminal-failure state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Row id; doubles as FIFO position
    pub id: i64,
    /// Operation name, e.g. `folder.create`
    pub operation: String,
    /// Serialized wire payload
    pub payload: String,
    /// Enqueue timestamp (Unix seconds)
    pub queued_at: i64,
}

/// Trait for pending sync queue operations
pub trait QueueRepository {
    /// Append an operation to the queue
    fn enqueue(&self, operation: &str, payload: &str) -> Result<QueueEntry>;

    /// All entries in insertion order
    fn list(&self) -> Result<Vec<QueueEntry>>;

    /// Number of queued entries
    fn len(&self) -> Result<usize>;

    /// Whether the queue is empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove a successfully applied entry
    fn remove(&self, id: i64) -> Result<()>;

    /// Drop every entry (manual clear)
    fn clear(&self) -> Result<usize>;
}

/// `SQLite` implementation of `QueueRepository`
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueEntry> {
        Ok(QueueEntry {
            id: row.get(0)?,
            operation: row.get(1)?,
            payload: row.get(2)?,
            queued_at: row.get(3)?,
        })
    }
}

impl QueueRepository for SqliteQueueRepository<'_> {
    fn enqueue(&self, operation: &str, payload: &str) -> Result<QueueEntry> {
        let queued_at = unix_timestamp_now();
        self.conn.execute(
            "INSERT INTO pending_sync_queue (operation, payload, queued_at) VALUES (?, ?, ?)",
            params![operation, payload, queued_at],
        )?;
        Ok(QueueEntry {
            id: self.conn.last_insert_rowid(),
            operation: operation.to_string(),
            payload: payload.to_string(),
            queued_at,
        })
    }

    fn list(&self) -> Result<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, operation, payload, queued_at FROM pending_sync_queue ORDER BY id",
        )?;
        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_sync_queue", [], |row| {
                    row.get(0)
                })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn remove(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_sync_queue WHERE id = ?", params![id])?;
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let rows = self.conn.execute("DELETE FROM pending_sync_queue", [])?;
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
    fn test_enqueue_preserves_insertion_order() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        repo.enqueue("folder.create", "{\"local_id\":1}").unwrap();
        repo.enqueue("link.delete", "{\"id\":2}").unwrap();

        let entries = repo.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, "folder.create");
        assert_eq!(entries[1].operation, "link.delete");
        assert!(entries[0].id < entries[1].id);
    }

    #[test]
    fn test_remove_and_clear() {
        let db = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let entry = repo.enqueue("tag.create", "{}").unwrap();
        repo.enqueue("tag.delete", "{}").unwrap();

        repo.remove(entry.id).unwrap();
        assert_eq!(repo.len().unwrap(), 1);

        assert_eq!(repo.clear().unwrap(), 1);
        assert!(repo.is_empty().unwrap());
    }
}
