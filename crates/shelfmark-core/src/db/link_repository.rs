//! Link repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Link, LinkDraft, MediaType};
use crate::util::{host_of, unix_timestamp_now};

/// Trait for link storage operations
pub trait LinkRepository {
    /// Save a new link
    fn create(&self, draft: &LinkDraft) -> Result<Link>;

    /// Get a link by local ID
    fn get(&self, id: i64) -> Result<Option<Link>>;

    /// Get a link by remote ID
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Link>>;

    /// List non-archived links, newest first
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Link>>;

    /// List non-archived links in a folder (`None` = unfiled)
    fn list_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Link>>;

    /// List links flagged important
    fn list_important(&self) -> Result<Vec<Link>>;

    /// List archived links
    fn list_archived(&self) -> Result<Vec<Link>>;

    /// List every link regardless of flags (snapshot export)
    fn list_all(&self) -> Result<Vec<Link>>;

    /// Update url/title/note, re-deriving the host
    fn update_content(&self, id: i64, url: &str, title: &str, note: &str) -> Result<Link>;

    /// Move a link into a folder (`None` = unfiled)
    fn move_to_folder(&self, id: i64, folder_id: Option<i64>) -> Result<Link>;

    /// Set or clear the important flag
    fn set_important(&self, id: i64, important: bool) -> Result<Link>;

    /// Set or clear the archived flag
    fn set_archived(&self, id: i64, archived: bool) -> Result<Link>;

    /// Delete a link
    fn delete(&self, id: i64) -> Result<()>;

    /// Move several links into a folder atomically
    fn move_many(&self, ids: &[i64], folder_id: Option<i64>) -> Result<usize>;

    /// Archive or unarchive several links atomically
    fn set_archived_many(&self, ids: &[i64], archived: bool) -> Result<usize>;

    /// Delete several links atomically
    fn delete_many(&self, ids: &[i64]) -> Result<usize>;

    /// Record the server-assigned identifier for a link
    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()>;

    /// Links never pushed, or modified after the given watermark
    fn list_unsynced(&self, since: i64) -> Result<Vec<Link>>;

    /// Apply a pulled remote link, creating or updating the local row
    fn upsert_remote(&self, remote_id: i64, fields: &RemoteLinkFields) -> Result<Link>;

    /// Delete the local row mapped to a remote ID, if any
    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool>;
}

/// Field set applied when upserting a pulled remote link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLinkFields {
    pub url: String,
    pub title: String,
    pub note: String,
    pub host: String,
    pub user_agent: Option<String>,
    pub media_type: MediaType,
    /// Owning folder as a *local* id, already translated by the mapper
    pub folder_id: Option<i64>,
    pub is_important: bool,
    pub is_archived: bool,
    pub last_modified: i64,
}

/// `SQLite` implementation of `LinkRepository`
pub struct SqliteLinkRepository<'a> {
    conn: &'a Connection,
}

const LINK_COLUMNS: &str = "id, remote_id, url, title, note, host, user_agent, media_type, \
                            folder_id, is_important, is_archived, last_modified";

impl<'a> SqliteLinkRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a link from a database row
    pub(crate) fn parse_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<Link> {
        let media_type: String = row.get(7)?;
        Ok(Link {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            note: row.get(4)?,
            host: row.get(5)?,
            user_agent: row.get(6)?,
            media_type: media_type.parse().unwrap_or_default(),
            folder_id: row.get(8)?,
            is_important: row.get::<_, i32>(9)? != 0,
            is_archived: row.get::<_, i32>(10)? != 0,
            last_modified: row.get(11)?,
        })
    }

    fn query_links(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Link>> {
        let mut stmt = self.conn.prepare(sql)?;
        let links = stmt
            .query_map(params, Self::parse_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn touch(&self, id: i64, set_clause: &str, value: &dyn rusqlite::ToSql) -> Result<Link> {
        let now = unix_timestamp_now();
        let sql = format!("UPDATE links SET {set_clause}, last_modified = ?2 WHERE id = ?3");
        let rows = self.conn.execute(&sql, params![value, now, id])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("link {id}")));
        }

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn create(&self, draft: &LinkDraft) -> Result<Link> {
        let url = draft.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("link url must not be empty".into()));
        }

        let host = host_of(url).unwrap_or_default();
        let now = unix_timestamp_now();
        self.conn.execute(
            "INSERT INTO links (url, title, note, host, user_agent, media_type, folder_id,
                                is_important, is_archived, last_modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
            params![
                url,
                draft.title,
                draft.note,
                host,
                draft.user_agent,
                draft.media_type.as_str(),
                draft.folder_id,
                now
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))
    }

    fn get(&self, id: i64) -> Result<Option<Link>> {
        let link = self
            .conn
            .query_row(
                &format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?"),
                params![id],
                Self::parse_link,
            )
            .optional()?;
        Ok(link)
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Link>> {
        let link = self
            .conn
            .query_row(
                &format!("SELECT {LINK_COLUMNS} FROM links WHERE remote_id = ?"),
                params![remote_id],
                Self::parse_link,
            )
            .optional()?;
        Ok(link)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Link>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE is_archived = 0
                 ORDER BY last_modified DESC, id DESC LIMIT ? OFFSET ?"
            ),
            params![limit as i64, offset as i64],
        )
    }

    fn list_by_folder(&self, folder_id: Option<i64>) -> Result<Vec<Link>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE folder_id IS ? AND is_archived = 0
                 ORDER BY last_modified DESC, id DESC"
            ),
            params![folder_id],
        )
    }

    fn list_important(&self) -> Result<Vec<Link>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE is_important = 1 AND is_archived = 0
                 ORDER BY last_modified DESC, id DESC"
            ),
            [],
        )
    }

    fn list_archived(&self) -> Result<Vec<Link>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM links WHERE is_archived = 1
                 ORDER BY last_modified DESC, id DESC"
            ),
            [],
        )
    }

    fn list_all(&self) -> Result<Vec<Link>> {
        self.query_links(
            &format!("SELECT {LINK_COLUMNS} FROM links ORDER BY id"),
            [],
        )
    }

    fn update_content(&self, id: i64, url: &str, title: &str, note: &str) -> Result<Link> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("link url must not be empty".into()));
        }

        let host = host_of(url).unwrap_or_default();
        let now = unix_timestamp_now();
        let rows = self.conn.execute(
            "UPDATE links SET url = ?, title = ?, note = ?, host = ?, last_modified = ?
             WHERE id = ?",
            params![url, title, note, host, now, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("link {id}")));
        }

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))
    }

    fn move_to_folder(&self, id: i64, folder_id: Option<i64>) -> Result<Link> {
        self.touch(id, "folder_id = ?1", &folder_id)
    }

    fn set_important(&self, id: i64, important: bool) -> Result<Link> {
        self.touch(id, "is_important = ?1", &i32::from(important))
    }

    fn set_archived(&self, id: i64, archived: bool) -> Result<Link> {
        self.touch(id, "is_archived = ?1", &i32::from(archived))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM links WHERE id = ?", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("link {id}")));
        }
        Ok(())
    }

    fn move_many(&self, ids: &[i64], folder_id: Option<i64>) -> Result<usize> {
        let now = unix_timestamp_now();
        let tx = self.conn.unchecked_transaction()?;
        let mut moved = 0;
        for id in ids {
            moved += tx.execute(
                "UPDATE links SET folder_id = ?, last_modified = ? WHERE id = ?",
                params![folder_id, now, id],
            )?;
        }
        tx.commit()?;
        Ok(moved)
    }

    fn set_archived_many(&self, ids: &[i64], archived: bool) -> Result<usize> {
        let now = unix_timestamp_now();
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        for id in ids {
            changed += tx.execute(
                "UPDATE links SET is_archived = ?, last_modified = ? WHERE id = ?",
                params![i32::from(archived), now, id],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    fn delete_many(&self, ids: &[i64]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM links WHERE id = ?", params![id])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE links SET remote_id = ? WHERE id = ?",
            params![remote_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("link {id}")));
        }
        Ok(())
    }

    fn list_unsynced(&self, since: i64) -> Result<Vec<Link>> {
        self.query_links(
            &format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE remote_id IS NULL OR last_modified > ?
                 ORDER BY id"
            ),
            params![since],
        )
    }

    fn upsert_remote(&self, remote_id: i64, fields: &RemoteLinkFields) -> Result<Link> {
        if let Some(existing) = self.get_by_remote_id(remote_id)? {
            self.conn.execute(
                "UPDATE links SET url = ?, title = ?, note = ?, host = ?, user_agent = ?,
                 media_type = ?, folder_id = ?, is_important = ?, is_archived = ?,
                 last_modified = ? WHERE id = ?",
                params![
                    fields.url,
                    fields.title,
                    fields.note,
                    fields.host,
                    fields.user_agent,
                    fields.media_type.as_str(),
                    fields.folder_id,
                    i32::from(fields.is_important),
                    i32::from(fields.is_archived),
                    fields.last_modified,
                    existing.id
                ],
            )?;
            return self
                .get(existing.id)?
                .ok_or_else(|| Error::NotFound(format!("link {}", existing.id)));
        }

        self.conn.execute(
            "INSERT INTO links (remote_id, url, title, note, host, user_agent, media_type,
                                folder_id, is_important, is_archived, last_modified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                remote_id,
                fields.url,
                fields.title,
                fields.note,
                fields.host,
                fields.user_agent,
                fields.media_type.as_str(),
                fields.folder_id,
                i32::from(fields.is_important),
                i32::from(fields.is_archived),
                fields.last_modified
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))
    }

    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM links WHERE remote_id = ?", params![remote_id])?;
        Ok(rows > 0)
    }
}
