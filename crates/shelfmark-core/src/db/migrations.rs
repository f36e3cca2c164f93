//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            name TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            parent_id INTEGER REFERENCES folders(id) ON DELETE CASCADE,
            is_archived INTEGER NOT NULL DEFAULT 0,
            last_modified INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_folders_remote ON folders(remote_id)
            WHERE remote_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            host TEXT NOT NULL DEFAULT '',
            user_agent TEXT,
            media_type TEXT NOT NULL DEFAULT 'url',
            folder_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
            is_important INTEGER NOT NULL DEFAULT 0,
            is_archived INTEGER NOT NULL DEFAULT 0,
            last_modified INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_links_folder ON links(folder_id);
        CREATE INDEX IF NOT EXISTS idx_links_modified ON links(last_modified DESC);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_remote ON links(remote_id)
            WHERE remote_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS panels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            name TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_panels_remote ON panels(remote_id)
            WHERE remote_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS panel_folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            panel_id INTEGER NOT NULL REFERENCES panels(id) ON DELETE CASCADE,
            folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_panel_folders_panel ON panel_folders(panel_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_panel_folders_remote ON panel_folders(remote_id)
            WHERE remote_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_remote ON tags(remote_id)
            WHERE remote_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS link_tags (
            link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (link_id, tag_id)
        );
        CREATE INDEX IF NOT EXISTS idx_link_tags_tag ON link_tags(tag_id);

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: pending sync queue and snapshots
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS pending_sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            queued_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL,
            format TEXT NOT NULL,
            content TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_created ON snapshots(created_at DESC);

        INSERT INTO schema_version (version) VALUES (2);
        COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_creates_queue_table() {
        let conn = setup();
        run(&conn).unwrap();

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = 'pending_sync_queue'
                )",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(exists);
    }
}
