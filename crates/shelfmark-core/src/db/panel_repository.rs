//! Panel repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Panel, PanelFolder};

/// Trait for panel storage operations
pub trait PanelRepository {
    /// Create a new panel
    fn create(&self, name: &str) -> Result<Panel>;

    /// Get a panel by local ID
    fn get(&self, id: i64) -> Result<Option<Panel>>;

    /// Get a panel by remote ID
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Panel>>;

    /// List all panels
    fn list(&self) -> Result<Vec<Panel>>;

    /// Rename a panel
    fn rename(&self, id: i64, name: &str) -> Result<Panel>;

    /// Delete a panel (pinned folders cascade)
    fn delete(&self, id: i64) -> Result<()>;

    /// Pin a folder onto a panel
    fn add_folder(&self, panel_id: i64, folder_id: i64, position: i64) -> Result<PanelFolder>;

    /// Unpin a panel-folder entry
    fn remove_folder(&self, panel_folder_id: i64) -> Result<()>;

    /// List folders pinned on a panel, in position order
    fn folders_of(&self, panel_id: i64) -> Result<Vec<PanelFolder>>;

    /// List every panel-folder row (snapshot export)
    fn list_all_panel_folders(&self) -> Result<Vec<PanelFolder>>;

    /// Record the server-assigned identifier for a panel
    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()>;

    /// Record the server-assigned identifier for a panel-folder entry
    fn set_panel_folder_remote_id(&self, id: i64, remote_id: i64) -> Result<()>;

    /// Panels never pushed
    fn list_unsynced(&self) -> Result<Vec<Panel>>;

    /// Panel-folder entries never pushed
    fn list_unsynced_panel_folders(&self) -> Result<Vec<PanelFolder>>;

    /// Apply a pulled remote panel
    fn upsert_remote(&self, remote_id: i64, name: &str) -> Result<Panel>;

    /// Apply a pulled remote panel-folder entry (ids already local)
    fn upsert_remote_panel_folder(
        &self,
        remote_id: i64,
        panel_id: i64,
        folder_id: i64,
        position: i64,
    ) -> Result<PanelFolder>;

    /// Delete the local panel mapped to a remote ID, if any
    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool>;

    /// Delete the local panel-folder entry mapped to a remote ID, if any
    fn delete_panel_folder_by_remote_id(&self, remote_id: i64) -> Result<bool>;
}

/// `SQLite` implementation of `PanelRepository`
pub struct SqlitePanelRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePanelRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_panel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Panel> {
        Ok(Panel {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn parse_panel_folder(row: &rusqlite::Row<'_>) -> rusqlite::Result<PanelFolder> {
        Ok(PanelFolder {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            panel_id: row.get(2)?,
            folder_id: row.get(3)?,
            position: row.get(4)?,
        })
    }

    fn get_panel_folder(&self, id: i64) -> Result<Option<PanelFolder>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, remote_id, panel_id, folder_id, position
                 FROM panel_folders WHERE id = ?",
                params![id],
                Self::parse_panel_folder,
            )
            .optional()?;
        Ok(entry)
    }
}

impl PanelRepository for SqlitePanelRepository<'_> {
    fn create(&self, name: &str) -> Result<Panel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("panel name must not be empty".into()));
        }

        self.conn
            .execute("INSERT INTO panels (name) VALUES (?)", params![name])?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("panel {id}")))
    }

    fn get(&self, id: i64) -> Result<Option<Panel>> {
        let panel = self
            .conn
            .query_row(
                "SELECT id, remote_id, name FROM panels WHERE id = ?",
                params![id],
                Self::parse_panel,
            )
            .optional()?;
        Ok(panel)
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Panel>> {
        let panel = self
            .conn
            .query_row(
                "SELECT id, remote_id, name FROM panels WHERE remote_id = ?",
                params![remote_id],
                Self::parse_panel,
            )
            .optional()?;
        Ok(panel)
    }

    fn list(&self) -> Result<Vec<Panel>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, remote_id, name FROM panels ORDER BY name COLLATE NOCASE")?;
        let panels = stmt
            .query_map([], Self::parse_panel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(panels)
    }

    fn rename(&self, id: i64, name: &str) -> Result<Panel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("panel name must not be empty".into()));
        }

        let rows = self
            .conn
            .execute("UPDATE panels SET name = ? WHERE id = ?", params![name, id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("panel {id}")));
        }
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("panel {id}")))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM panels WHERE id = ?", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("panel {id}")));
        }
        Ok(())
    }

    fn add_folder(&self, panel_id: i64, folder_id: i64, position: i64) -> Result<PanelFolder> {
        self.conn.execute(
            "INSERT INTO panel_folders (panel_id, folder_id, position) VALUES (?, ?, ?)",
            params![panel_id, folder_id, position],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_panel_folder(id)?
            .ok_or_else(|| Error::NotFound(format!("panel folder {id}")))
    }

    fn remove_folder(&self, panel_folder_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM panel_folders WHERE id = ?",
            params![panel_folder_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("panel folder {panel_folder_id}")));
        }
        Ok(())
    }

    fn folders_of(&self, panel_id: i64) -> Result<Vec<PanelFolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, remote_id, panel_id, folder_id, position
             FROM panel_folders WHERE panel_id = ? ORDER BY position, id",
        )?;
        let entries = stmt
            .query_map(params![panel_id], Self::parse_panel_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn list_all_panel_folders(&self) -> Result<Vec<PanelFolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, remote_id, panel_id, folder_id, position FROM panel_folders ORDER BY id",
        )?;
        let entries = stmt
            .query_map([], Self::parse_panel_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE panels SET remote_id = ? WHERE id = ?",
            params![remote_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("panel {id}")));
        }
        Ok(())
    }

    fn set_panel_folder_remote_id(&self, id: i64, remote_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE panel_folders SET remote_id = ? WHERE id = ?",
            params![remote_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("panel folder {id}")));
        }
        Ok(())
    }

    fn list_unsynced(&self) -> Result<Vec<Panel>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, remote_id, name FROM panels WHERE remote_id IS NULL ORDER BY id")?;
        let panels = stmt
            .query_map([], Self::parse_panel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(panels)
    }

    fn list_unsynced_panel_folders(&self) -> Result<Vec<PanelFolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, remote_id, panel_id, folder_id, position
             FROM panel_folders WHERE remote_id IS NULL ORDER BY id",
        )?;
        let entries = stmt
            .query_map([], Self::parse_panel_folder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn upsert_remote(&self, remote_id: i64, name: &str) -> Result<Panel> {
        if let Some(existing) = self.get_by_remote_id(remote_id)? {
            self.conn.execute(
                "UPDATE panels SET name = ? WHERE id = ?",
                params![name, existing.id],
            )?;
            return self
                .get(existing.id)?
                .ok_or_else(|| Error::NotFound(format!("panel {}", existing.id)));
        }

        self.conn.execute(
            "INSERT INTO panels (remote_id, name) VALUES (?, ?)",
            params![remote_id, name],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("panel {id}")))
    }

    fn upsert_remote_panel_folder(
        &self,
        remote_id: i64,
        panel_id: i64,
        folder_id: i64,
        position: i64,
    ) -> Result<PanelFolder> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM panel_folders WHERE remote_id = ?",
                params![remote_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE panel_folders SET panel_id = ?, folder_id = ?, position = ? WHERE id = ?",
                params![panel_id, folder_id, position, id],
            )?;
            return self
                .get_panel_folder(id)?
                .ok_or_else(|| Error::NotFound(format!("panel folder {id}")));
        }

        self.conn.execute(
            "INSERT INTO panel_folders (remote_id, panel_id, folder_id, position)
             VALUES (?, ?, ?, ?)",
            params![remote_id, panel_id, folder_id, position],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_panel_folder(id)?
            .ok_or_else(|| Error::NotFound(format!("panel folder {id}")))
    }

    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM panels WHERE remote_id = ?", params![remote_id])?;
        Ok(rows > 0)
    }

    fn delete_panel_folder_by_remote_id(&self, remote_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM panel_folders WHERE remote_id = ?",
            params![remote_id],
        )?;
        Ok(rows > 0)
    }
}
