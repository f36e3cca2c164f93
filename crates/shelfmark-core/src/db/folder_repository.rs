//! Folder repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::Folder;
use crate::util::unix_timestamp_now;

/// Trait for folder storage operations
pub trait FolderRepository {
    /// Create a new folder
    fn create(&self, name: &str, note: &str, parent_id: Option<i64>) -> Result<Folder>;

    /// Get a folder by local ID
    fn get(&self, id: i64) -> Result<Option<Folder>>;

    /// Get a folder by remote ID
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Folder>>;

    /// List folders, optionally including archived ones
    fn list(&self, include_archived: bool) -> Result<Vec<Folder>>;

    /// List direct children of a parent (`None` = root level)
    fn children_of(&self, parent_id: Option<i64>) -> Result<Vec<Folder>>;

    /// Rename a folder
    fn rename(&self, id: i64, name: &str) -> Result<Folder>;

    /// Replace a folder's note
    fn update_note(&self, id: i64, note: &str) -> Result<Folder>;

    /// Reparent a folder (`None` = move to root)
    fn move_to(&self, id: i64, parent_id: Option<i64>) -> Result<Folder>;

    /// Set or clear the archived flag
    fn set_archived(&self, id: i64, archived: bool) -> Result<Folder>;

    /// Delete a folder (children cascade)
    fn delete(&self, id: i64) -> Result<()>;

    /// Record the server-assigned identifier for a folder
    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()>;

    /// Folders never pushed, or modified after the given watermark
    fn list_unsynced(&self, since: i64) -> Result<Vec<Folder>>;

    /// Apply a pulled remote folder, creating or updating the local row
    fn upsert_remote(
        &self,
        remote_id: i64,
        name: &str,
        note: &str,
        parent_id: Option<i64>,
        is_archived: bool,
        last_modified: i64,
    ) -> Result<Folder>;

    /// Delete the local row mapped to a remote ID, if any
    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool>;
}

/// `SQLite` implementation of `FolderRepository`
pub struct SqliteFolderRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteFolderRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a folder from a database row
    fn parse_folder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Folder> {
        Ok(Folder {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            name: row.get(2)?,
            note: row.get(3)?,
            parent_id: row.get(4)?,
            is_archived: row.get::<_, i32>(5)? != 0,
            last_modified: row.get(6)?,
        })
    }

    /// Reject reparenting that would create a cycle
    fn ensure_no_cycle(&self, id: i64, new_parent: Option<i64>) -> Result<()> {
        let mut cursor = new_parent;
        while let Some(ancestor) = cursor {
            if ancestor == id {
                return Err(Error::InvalidInput(
                    "cannot move a folder into itself or its descendants".into(),
                ));
            }
            cursor = self
                .conn
                .query_row(
                    "SELECT parent_id FROM folders WHERE id = ?",
                    params![ancestor],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
        }
        Ok(())
    }

    fn touch(&self, id: i64, set_clause: &str, value: &dyn rusqlite::ToSql) -> Result<Folder> {
        let now = unix_timestamp_now();
        let sql = format!("UPDATE folders SET {set_clause}, last_modified = ?2 WHERE id = ?3");
        let rows = self.conn.execute(&sql, params![value, now, id])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("folder {id}")));
        }

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {id}")))
    }
}

const FOLDER_COLUMNS: &str = "id, remote_id, name, note, parent_id, is_archived, last_modified";

impl FolderRepository for SqliteFolderRepository<'_> {
    fn create(&self, name: &str, note: &str, parent_id: Option<i64>) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("folder name must not be empty".into()));
        }

        let now = unix_timestamp_now();
        self.conn.execute(
            "INSERT INTO folders (name, note, parent_id, is_archived, last_modified)
             VALUES (?, ?, ?, 0, ?)",
            params![name, note, parent_id, now],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {id}")))
    }

    fn get(&self, id: i64) -> Result<Option<Folder>> {
        let folder = self
            .conn
            .query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"),
                params![id],
                Self::parse_folder,
            )
            .optional()?;
        Ok(folder)
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Folder>> {
        let folder = self
            .conn
            .query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE remote_id = ?"),
                params![remote_id],
                Self::parse_folder,
            )
            .optional()?;
        Ok(folder)
    }

    fn list(&self, include_archived: bool) -> Result<Vec<Folder>> {
        let sql = if include_archived {
            format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY name COLLATE NOCASE")
        } else {
            format!(
                "SELECT {FOLDER_COLUMNS} FROM folders WHERE is_archived = 0
                 ORDER BY name COLLATE NOCASE"
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let folders = stmt
            .query_map([], Self::parse_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    fn children_of(&self, parent_id: Option<i64>) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE parent_id IS ? ORDER BY name COLLATE NOCASE"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let folders = stmt
            .query_map(params![parent_id], Self::parse_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    fn rename(&self, id: i64, name: &str) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("folder name must not be empty".into()));
        }
        self.touch(id, "name = ?1", &name)
    }

    fn update_note(&self, id: i64, note: &str) -> Result<Folder> {
        self.touch(id, "note = ?1", &note)
    }

    fn move_to(&self, id: i64, parent_id: Option<i64>) -> Result<Folder> {
        self.ensure_no_cycle(id, parent_id)?;
        self.touch(id, "parent_id = ?1", &parent_id)
    }

    fn set_archived(&self, id: i64, archived: bool) -> Result<Folder> {
        self.touch(id, "is_archived = ?1", &i32::from(archived))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM folders WHERE id = ?", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("folder {id}")));
        }
        Ok(())
    }

    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE folders SET remote_id = ? WHERE id = ?",
            params![remote_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("folder {id}")));
        }
        Ok(())
    }

    fn list_unsynced(&self, since: i64) -> Result<Vec<Folder>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE remote_id IS NULL OR last_modified > ?
             ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let folders = stmt
            .query_map(params![since], Self::parse_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    fn upsert_remote(
        &self,
        remote_id: i64,
        name: &str,
        note: &str,
        parent_id: Option<i64>,
        is_archived: bool,
        last_modified: i64,
    ) -> Result<Folder> {
        if let Some(existing) = self.get_by_remote_id(remote_id)? {
            self.conn.execute(
                "UPDATE folders SET name = ?, note = ?, parent_id = ?, is_archived = ?,
                 last_modified = ? WHERE id = ?",
                params![
                    name,
                    note,
                    parent_id,
                    i32::from(is_archived),
                    last_modified,
                    existing.id
                ],
            )?;
            return self
                .get(existing.id)?
                .ok_or_else(|| Error::NotFound(format!("folder {}", existing.id)));
        }

        self.conn.execute(
            "INSERT INTO folders (remote_id, name, note, parent_id, is_archived, last_modified)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                remote_id,
                name,
                note,
                parent_id,
                i32::from(is_archived),
                last_modified
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {id}")))
    }

    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM folders WHERE remote_id = ?", params![remote_id])?;
        Ok(rows > 0)
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
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let folder = repo.create("Reading", "long reads", None).unwrap();
        assert_eq!(folder.name, "Reading");
        assert_eq!(folder.remote_id, None);
        assert!(folder.is_root());

        let fetched = repo.get(folder.id).unwrap().unwrap();
        assert_eq!(fetched, folder);
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());
        assert!(repo.create("  ", "", None).is_err());
    }

    #[test]
    fn test_children_and_move() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let root = repo.create("Root", "", None).unwrap();
        let child = repo.create("Child", "", Some(root.id)).unwrap();

        let children = repo.children_of(Some(root.id)).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        let moved = repo.move_to(child.id, None).unwrap();
        assert_eq!(moved.parent_id, None);
        assert!(repo.children_of(Some(root.id)).unwrap().is_empty());
    }

    #[test]
    fn test_move_rejects_cycles() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let a = repo.create("A", "", None).unwrap();
        let b = repo.create("B", "", Some(a.id)).unwrap();
        let c = repo.create("C", "", Some(b.id)).unwrap();

        assert!(repo.move_to(a.id, Some(a.id)).is_err());
        assert!(repo.move_to(a.id, Some(c.id)).is_err());
    }

    #[test]
    fn test_rename_touches_last_modified() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let folder = repo.create("Old", "", None).unwrap();
        let renamed = repo.rename(folder.id, "New").unwrap();
        assert_eq!(renamed.name, "New");
        assert!(renamed.last_modified >= folder.last_modified);
    }

    #[test]
    fn test_archive_excluded_from_default_list() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let keep = repo.create("Keep", "", None).unwrap();
        let archive = repo.create("Archive", "", None).unwrap();
        repo.set_archived(archive.id, true).unwrap();

        let visible = repo.list(false).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, keep.id);

        let all = repo.list(true).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_delete_cascades_to_children() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let root = repo.create("Root", "", None).unwrap();
        let child = repo.create("Child", "", Some(root.id)).unwrap();

        repo.delete(root.id).unwrap();
        assert!(repo.get(child.id).unwrap().is_none());
    }

    #[test]
    fn test_unsynced_listing_and_remote_id() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let folder = repo.create("Reading", "", None).unwrap();
        let unsynced = repo.list_unsynced(i64::MAX).unwrap();
        assert_eq!(unsynced.len(), 1);

        repo.set_remote_id(folder.id, 42).unwrap();
        assert!(repo.list_unsynced(i64::MAX).unwrap().is_empty());
        assert_eq!(
            repo.get_by_remote_id(42).unwrap().map(|folder| folder.id),
            Some(folder.id)
        );
    }

    #[test]
    fn test_upsert_remote_creates_then_updates() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        let created = repo.upsert_remote(9, "From server", "", None, false, 100).unwrap();
        assert_eq!(created.remote_id, Some(9));

        let updated = repo
            .upsert_remote(9, "Renamed on server", "note", None, true, 200)
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Renamed on server");
        assert!(updated.is_archived);
    }

    #[test]
    fn test_delete_by_remote_id() {
        let db = setup();
        let repo = SqliteFolderRepository::new(db.connection());

        repo.upsert_remote(5, "Doomed", "", None, false, 1).unwrap();
        assert!(repo.delete_by_remote_id(5).unwrap());
        assert!(!repo.delete_by_remote_id(5).unwrap());
    }
}
