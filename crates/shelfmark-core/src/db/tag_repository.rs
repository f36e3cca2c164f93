//! Tag repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Link, LinkTag, Tag};
use crate::db::link_repository::SqliteLinkRepository;

/// Trait for tag storage operations
pub trait TagRepository {
    /// Find an existing tag by name (case-insensitive) or create it
    fn get_or_create(&self, name: &str) -> Result<Tag>;

    /// Get a tag by local ID
    fn get(&self, id: i64) -> Result<Option<Tag>>;

    /// Get a tag by remote ID
    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Tag>>;

    /// List all tags with their link counts
    fn list_with_counts(&self) -> Result<Vec<(Tag, usize)>>;

    /// Rename a tag
    fn rename(&self, id: i64, name: &str) -> Result<Tag>;

    /// Delete a tag (associations cascade)
    fn delete(&self, id: i64) -> Result<()>;

    /// Associate a tag with a link (no-op when already attached)
    fn attach(&self, link_id: i64, tag_id: i64) -> Result<()>;

    /// Remove a tag from a link
    fn detach(&self, link_id: i64, tag_id: i64) -> Result<()>;

    /// Tags attached to a link
    fn tags_of(&self, link_id: i64) -> Result<Vec<Tag>>;

    /// Links carrying a tag
    fn links_with(&self, tag_id: i64) -> Result<Vec<Link>>;

    /// Every link-tag association (snapshot export)
    fn list_all_link_tags(&self) -> Result<Vec<LinkTag>>;

    /// Record the server-assigned identifier for a tag
    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()>;

    /// Tags never pushed
    fn list_unsynced(&self) -> Result<Vec<Tag>>;

    /// Apply a pulled remote tag
    fn upsert_remote(&self, remote_id: i64, name: &str) -> Result<Tag>;

    /// Delete the local tag mapped to a remote ID, if any
    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool>;
}

/// `SQLite` implementation of `TagRepository`
pub struct SqliteTagRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTagRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: row.get(0)?,
            remote_id: row.get(1)?,
            name: row.get(2)?,
        })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn get_or_create(&self, name: &str) -> Result<Tag> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::InvalidInput("tag name must not be empty".into()));
        }

        let existing = self
            .conn
            .query_row(
                "SELECT id, remote_id, name FROM tags WHERE name = ? COLLATE NOCASE",
                params![name],
                Self::parse_tag,
            )
            .optional()?;

        if let Some(tag) = existing {
            return Ok(tag);
        }

        self.conn
            .execute("INSERT INTO tags (name) VALUES (?)", params![name])?;
        let id = self.conn.last_insert_rowid();
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("tag {id}")))
    }

    fn get(&self, id: i64) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, remote_id, name FROM tags WHERE id = ?",
                params![id],
                Self::parse_tag,
            )
            .optional()?;
        Ok(tag)
    }

    fn get_by_remote_id(&self, remote_id: i64) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, remote_id, name FROM tags WHERE remote_id = ?",
                params![remote_id],
                Self::parse_tag,
            )
            .optional()?;
        Ok(tag)
    }

    fn list_with_counts(&self) -> Result<Vec<(Tag, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.remote_id, t.name, COUNT(lt.link_id) as count
             FROM tags t
             LEFT JOIN link_tags lt ON t.id = lt.tag_id
             GROUP BY t.id
             ORDER BY count DESC, t.name ASC",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok((Self::parse_tag(row)?, row.get::<_, usize>(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    fn rename(&self, id: i64, name: &str) -> Result<Tag> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::InvalidInput("tag name must not be empty".into()));
        }

        let rows = self
            .conn
            .execute("UPDATE tags SET name = ? WHERE id = ?", params![name, id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("tag {id}")));
        }
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("tag {id}")))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM tags WHERE id = ?", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("tag {id}")));
        }
        Ok(())
    }

    fn attach(&self, link_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO link_tags (link_id, tag_id) VALUES (?, ?)",
            params![link_id, tag_id],
        )?;
        Ok(())
    }

    fn detach(&self, link_id: i64, tag_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM link_tags WHERE link_id = ? AND tag_id = ?",
            params![link_id, tag_id],
        )?;
        Ok(())
    }

    fn tags_of(&self, link_id: i64) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.remote_id, t.name
             FROM tags t
             JOIN link_tags lt ON t.id = lt.tag_id
             WHERE lt.link_id = ?
             ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![link_id], Self::parse_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    fn links_with(&self, tag_id: i64) -> Result<Vec<Link>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.remote_id, l.url, l.title, l.note, l.host, l.user_agent,
                    l.media_type, l.folder_id, l.is_important, l.is_archived, l.last_modified
             FROM links l
             JOIN link_tags lt ON l.id = lt.link_id
             WHERE lt.tag_id = ? AND l.is_archived = 0
             ORDER BY l.last_modified DESC, l.id DESC",
        )?;
        let links = stmt
            .query_map(params![tag_id], SqliteLinkRepository::parse_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn list_all_link_tags(&self) -> Result<Vec<LinkTag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT link_id, tag_id FROM link_tags ORDER BY link_id, tag_id")?;
        let pairs = stmt
            .query_map([], |row| {
                Ok(LinkTag {
                    link_id: row.get(0)?,
                    tag_id: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    fn set_remote_id(&self, id: i64, remote_id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE tags SET remote_id = ? WHERE id = ?",
            params![remote_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("tag {id}")));
        }
        Ok(())
    }

    fn list_unsynced(&self) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, remote_id, name FROM tags WHERE remote_id IS NULL ORDER BY id")?;
        let tags = stmt
            .query_map([], Self::parse_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    fn upsert_remote(&self, remote_id: i64, name: &str) -> Result<Tag> {
        if let Some(existing) = self.get_by_remote_id(remote_id)? {
            self.conn.execute(
                "UPDATE tags SET name = ? WHERE id = ?",
                params![name.to_lowercase(), existing.id],
            )?;
            return self
                .get(existing.id)?
                .ok_or_else(|| Error::NotFound(format!("tag {}", existing.id)));
        }

        // The same tag may already exist locally by name but unsynced;
        // adopt it instead of violating the unique name constraint.
        let tag = self.get_or_create(name)?;
        self.set_remote_id(tag.id, remote_id)?;
        self.get(tag.id)?
            .ok_or_else(|| Error::NotFound(format!("tag {}", tag.id)))
    }

    fn delete_by_remote_id(&self, remote_id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM tags WHERE remote_id = ?", params![remote_id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LinkRepository};
    use crate::models::LinkDraft;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_get_or_create_is_case_insensitive() {
        let db = setup();
        let repo = SqliteTagRepository::new(db.connection());

        let first = repo.get_or_create("Rust").unwrap();
        let second = repo.get_or_create("rust").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "rust");
    }

    #[test]
    fn test_attach_detach_and_queries() {
        let db = setup();
        let links = SqliteLinkRepository::new(db.connection());
        let repo = SqliteTagRepository::new(db.connection());

        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        let tag = repo.get_or_create("reading").unwrap();

        repo.attach(link.id, tag.id).unwrap();
        repo.attach(link.id, tag.id).unwrap(); // idempotent

        assert_eq!(repo.tags_of(link.id).unwrap().len(), 1);
        assert_eq!(repo.links_with(tag.id).unwrap().len(), 1);

        repo.detach(link.id, tag.id).unwrap();
        assert!(repo.tags_of(link.id).unwrap().is_empty());
    }

    #[test]
    fn test_list_with_counts() {
        let db = setup();
        let links = SqliteLinkRepository::new(db.connection());
        let repo = SqliteTagRepository::new(db.connection());

        let a = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        let b = links.create(&LinkDraft::new("https://b.example", "B")).unwrap();
        let rust = repo.get_or_create("rust").unwrap();
        let news = repo.get_or_create("news").unwrap();

        repo.attach(a.id, rust.id).unwrap();
        repo.attach(b.id, rust.id).unwrap();
        repo.attach(a.id, news.id).unwrap();

        let counts = repo.list_with_counts().unwrap();
        assert_eq!(counts[0].0.name, "rust");
        assert_eq!(counts[0].1, 2);
        assert_eq!(counts[1].1, 1);
    }

    #[test]
    fn test_delete_link_cascades_associations() {
        let db = setup();
        let links = SqliteLinkRepository::new(db.connection());
        let repo = SqliteTagRepository::new(db.connection());

        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        let tag = repo.get_or_create("gone").unwrap();
        repo.attach(link.id, tag.id).unwrap();

        links.delete(link.id).unwrap();
        assert!(repo.list_all_link_tags().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_remote_adopts_existing_name() {
        let db = setup();
        let repo = SqliteTagRepository::new(db.connection());

        let local = repo.get_or_create("shared").unwrap();
        assert_eq!(local.remote_id, None);

        let adopted = repo.upsert_remote(11, "shared").unwrap();
        assert_eq!(adopted.id, local.id);
        assert_eq!(adopted.remote_id, Some(11));
    }
}
