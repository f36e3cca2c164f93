//! Local↔remote id translation.
//!
//! Rows reference each other by local rowid only; wire payloads reference
//! entities by remote id only. The mapper is the single place the two
//! spaces meet, so a missing mapping is an `Ok(None)` (entity not yet
//! synced), never an error.

use rusqlite::{Connection, OptionalExtension};

use crate::db::{
    FolderRepository, LinkRepository, PanelRepository, SqliteFolderRepository,
    SqliteLinkRepository, SqlitePanelRepository, SqliteTagRepository, TagRepository,
};
use crate::error::Result;

/// Translates ids between the local and remote spaces.
pub struct IdMapper<'a> {
    conn: &'a Connection,
}

impl<'a> IdMapper<'a> {
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Remote id of a local folder, `None` until it has been pushed.
    pub fn remote_folder_id(&self, local_id: i64) -> Result<Option<i64>> {
        Ok(SqliteFolderRepository::new(self.conn)
            .get(local_id)?
            .and_then(|folder| folder.remote_id))
    }

    /// Local id of a pulled folder, `None` when it was never applied.
    pub fn local_folder_id(&self, remote_id: i64) -> Result<Option<i64>> {
        Ok(SqliteFolderRepository::new(self.conn)
            .get_by_remote_id(remote_id)?
            .map(|folder| folder.id))
    }

    pub fn remote_link_id(&self, local_id: i64) -> Result<Option<i64>> {
        Ok(SqliteLinkRepository::new(self.conn)
            .get(local_id)?
            .and_then(|link| link.remote_id))
    }

    pub fn local_link_id(&self, remote_id: i64) -> Result<Option<i64>> {
        Ok(SqliteLinkRepository::new(self.conn)
            .get_by_remote_id(remote_id)?
            .map(|link| link.id))
    }

    pub fn remote_panel_id(&self, local_id: i64) -> Result<Option<i64>> {
        Ok(SqlitePanelRepository::new(self.conn)
            .get(local_id)?
            .and_then(|panel| panel.remote_id))
    }

    pub fn local_panel_id(&self, remote_id: i64) -> Result<Option<i64>> {
        Ok(SqlitePanelRepository::new(self.conn)
            .get_by_remote_id(remote_id)?
            .map(|panel| panel.id))
    }

    pub fn remote_tag_id(&self, local_id: i64) -> Result<Option<i64>> {
        Ok(SqliteTagRepository::new(self.conn)
            .get(local_id)?
            .and_then(|tag| tag.remote_id))
    }

    pub fn local_tag_id(&self, remote_id: i64) -> Result<Option<i64>> {
        Ok(SqliteTagRepository::new(self.conn)
            .get_by_remote_id(remote_id)?
            .map(|tag| tag.id))
    }

    pub fn remote_panel_folder_id(&self, local_id: i64) -> Result<Option<i64>> {
        let remote_id = self
            .conn
            .query_row(
                "SELECT remote_id FROM panel_folders WHERE id = ?",
                rusqlite::params![local_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn unsynced_entities_map_to_none() {
        let db = Database::open_in_memory().unwrap();
        let folders = SqliteFolderRepository::new(db.connection());
        let mapper = IdMapper::new(db.connection());

        let folder = folders.create("Reading", "", None).unwrap();
        assert_eq!(mapper.remote_folder_id(folder.id).unwrap(), None);
        assert_eq!(mapper.local_folder_id(42).unwrap(), None);

        folders.set_remote_id(folder.id, 42).unwrap();
        assert_eq!(mapper.remote_folder_id(folder.id).unwrap(), Some(42));
        assert_eq!(mapper.local_folder_id(42).unwrap(), Some(folder.id));
    }

    #[test]
    fn missing_rows_map_to_none() {
        let db = Database::open_in_memory().unwrap();
        let mapper = IdMapper::new(db.connection());

        assert_eq!(mapper.remote_link_id(99).unwrap(), None);
        assert_eq!(mapper.remote_tag_id(99).unwrap(), None);
        assert_eq!(mapper.remote_panel_folder_id(99).unwrap(), None);
    }
}
