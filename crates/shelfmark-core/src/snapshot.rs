//! Full-dataset snapshots: JSON for round-trips, Netscape bookmark HTML
//! for other browsers and managers.
//!
//! Snapshots are rendered from the complete local dataset (archived rows
//! included), stored in the database for history, and optionally written to
//! a file. JSON snapshots can be imported back, with every id remapped to a
//! fresh local row so an import never collides with existing data.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{
    FolderRepository, LinkRepository, PanelRepository, SnapshotRecord, SnapshotRepository,
    SqliteFolderRepository, SqliteLinkRepository, SqlitePanelRepository,
    SqliteSnapshotRepository, SqliteTagRepository, TagRepository,
};
use crate::error::{Error, Result};
use crate::models::{Folder, Link, LinkDraft, LinkTag, Panel, PanelFolder, Tag};
use crate::util::unix_timestamp_now;

/// Snapshot output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    Json,
    Html,
}

impl SnapshotFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown snapshot format: {other}")),
        }
    }
}

/// Complete dataset as captured at snapshot time.
///
/// Ids are the capturing device's local rowids; they are only meaningful
/// for resolving references inside the same snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub exported_at: i64,
    pub folders: Vec<Folder>,
    pub links: Vec<Link>,
    pub tags: Vec<Tag>,
    pub link_tags: Vec<LinkTag>,
    pub panels: Vec<Panel>,
    pub panel_folders: Vec<PanelFolder>,
}

/// Capture the complete dataset, archived rows included.
pub fn collect_snapshot(conn: &Connection) -> Result<SnapshotData> {
    Ok(SnapshotData {
        exported_at: unix_timestamp_now(),
        folders: SqliteFolderRepository::new(conn).list(true)?,
        links: SqliteLinkRepository::new(conn).list_all()?,
        tags: SqliteTagRepository::new(conn)
            .list_with_counts()?
            .into_iter()
            .map(|(tag, _)| tag)
            .collect(),
        link_tags: SqliteTagRepository::new(conn).list_all_link_tags()?,
        panels: SqlitePanelRepository::new(conn).list()?,
        panel_folders: SqlitePanelRepository::new(conn).list_all_panel_folders()?,
    })
}

/// Render a snapshot as pretty-printed JSON.
pub fn render_json(data: &SnapshotData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Render a snapshot in the Netscape bookmark file format.
///
/// Folders nest as `<H3>`/`<DL>` blocks; unfiled links sit at the top
/// level. Tags ride in the `TAGS` attribute most importers understand.
#[must_use]
pub fn render_html(data: &SnapshotData) -> String {
    let mut output = String::from(
        "<!DOCTYPE NETSCAPE-Bookmark-file-1>\n\
         <!-- This is an automatically generated file. Do not edit. -->\n\
         <META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n\
         <TITLE>Bookmarks</TITLE>\n\
         <H1>Bookmarks</H1>\n\
         <DL><p>\n",
    );
    render_folder_level(&mut output, data, None, 1);
    output.push_str("</DL><p>\n");
    output
}

fn render_folder_level(
    output: &mut String,
    data: &SnapshotData,
    parent_id: Option<i64>,
    depth: usize,
) {
    let indent = "    ".repeat(depth);

    for link in data.links.iter().filter(|link| link.folder_id == parent_id) {
        let tags = tag_names_of(data, link.id).join(",");
        let _ = write!(
            output,
            "{indent}<DT><A HREF=\"{}\" ADD_DATE=\"{}\"",
            escape_html(&link.url),
            link.last_modified
        );
        if !tags.is_empty() {
            let _ = write!(output, " TAGS=\"{}\"", escape_html(&tags));
        }
        let _ = writeln!(output, ">{}</A>", escape_html(&link.title));
    }

    for folder in data
        .folders
        .iter()
        .filter(|folder| folder.parent_id == parent_id)
    {
        let _ = writeln!(
            output,
            "{indent}<DT><H3 ADD_DATE=\"{}\">{}</H3>",
            folder.last_modified,
            escape_html(&folder.name)
        );
        let _ = writeln!(output, "{indent}<DL><p>");
        render_folder_level(output, data, Some(folder.id), depth + 1);
        let _ = writeln!(output, "{indent}</DL><p>");
    }
}

fn tag_names_of(data: &SnapshotData, link_id: i64) -> Vec<String> {
    let mut names: Vec<String> = data
        .link_tags
        .iter()
        .filter(|link_tag| link_tag.link_id == link_id)
        .filter_map(|link_tag| {
            data.tags
                .iter()
                .find(|tag| tag.id == link_tag.tag_id)
                .map(|tag| tag.name.clone())
        })
        .collect();
    names.sort();
    names
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Capture, render, and store a snapshot row; returns its metadata.
pub fn take_snapshot(conn: &Connection, format: SnapshotFormat) -> Result<SnapshotRecord> {
    let data = collect_snapshot(conn)?;
    let content = match format {
        SnapshotFormat::Json => render_json(&data)?,
        SnapshotFormat::Html => render_html(&data),
    };
    let repo = SqliteSnapshotRepository::new(conn);
    let id = repo.insert(data.exported_at, format.as_str(), &content)?;
    Ok(SnapshotRecord {
        id,
        created_at: data.exported_at,
        format: format.as_str().to_string(),
    })
}

/// Write a stored snapshot to a directory; returns the written path.
pub fn write_snapshot_file(conn: &Connection, snapshot_id: i64, dir: &Path) -> Result<PathBuf> {
    let repo = SqliteSnapshotRepository::new(conn);
    let record = repo
        .list()?
        .into_iter()
        .find(|record| record.id == snapshot_id)
        .ok_or_else(|| Error::NotFound(format!("snapshot {snapshot_id}")))?;
    let content = repo
        .content(snapshot_id)?
        .ok_or_else(|| Error::NotFound(format!("snapshot {snapshot_id}")))?;

    let format: SnapshotFormat = record
        .format
        .parse()
        .map_err(Error::InvalidInput)?;
    let path = dir.join(suggested_snapshot_file_name(format, record.created_at));
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Deterministic default file name for snapshot exports.
#[must_use]
pub fn suggested_snapshot_file_name(format: SnapshotFormat, timestamp: i64) -> String {
    format!("shelfmark-snapshot-{timestamp}.{}", format.extension())
}

/// Counts of rows created by a JSON import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub folders: usize,
    pub links: usize,
    pub tags: usize,
    pub panels: usize,
}

/// Import a JSON snapshot, remapping every id to a fresh local row.
///
/// Imported rows are plain local creations: no remote ids are carried
/// over, so a later sync pass pushes them like any other local data.
pub fn import_json(conn: &Connection, content: &str) -> Result<ImportSummary> {
    let data: SnapshotData = serde_json::from_str(content)?;
    let tx = conn.unchecked_transaction()?;
    let mut summary = ImportSummary::default();

    let folders = SqliteFolderRepository::new(conn);
    let mut folder_ids = std::collections::HashMap::new();

    // Parents before children so the remapped parent id always exists
    let mut remaining: Vec<&Folder> = data.folders.iter().collect();
    while !remaining.is_empty() {
        let mut deferred = Vec::new();
        let mut progressed = false;
        for folder in remaining {
            let parent_id = match folder.parent_id {
                Some(old_parent) => match folder_ids.get(&old_parent) {
                    Some(new_parent) => Some(Some(*new_parent)),
                    None => None,
                },
                None => Some(None),
            };
            if let Some(parent_id) = parent_id {
                let created = folders.create(&folder.name, &folder.note, parent_id)?;
                if folder.is_archived {
                    folders.set_archived(created.id, true)?;
                }
                folder_ids.insert(folder.id, created.id);
                summary.folders += 1;
                progressed = true;
            } else {
                deferred.push(folder);
            }
        }
        if !progressed {
            return Err(Error::InvalidInput(
                "snapshot folder hierarchy is inconsistent".to_string(),
            ));
        }
        remaining = deferred;
    }

    let links = SqliteLinkRepository::new(conn);
    let mut link_ids = std::collections::HashMap::new();
    for link in &data.links {
        let draft = LinkDraft {
            url: link.url.clone(),
            title: link.title.clone(),
            note: link.note.clone(),
            user_agent: link.user_agent.clone(),
            media_type: link.media_type,
            folder_id: link.folder_id.and_then(|old| folder_ids.get(&old).copied()),
        };
        let created = links.create(&draft)?;
        if link.is_important {
            links.set_important(created.id, true)?;
        }
        if link.is_archived {
            links.set_archived(created.id, true)?;
        }
        link_ids.insert(link.id, created.id);
        summary.links += 1;
    }

    let tags = SqliteTagRepository::new(conn);
    let mut tag_ids = std::collections::HashMap::new();
    for tag in &data.tags {
        let created = tags.get_or_create(&tag.name)?;
        tag_ids.insert(tag.id, created.id);
        summary.tags += 1;
    }
    for link_tag in &data.link_tags {
        if let (Some(link_id), Some(tag_id)) = (
            link_ids.get(&link_tag.link_id),
            tag_ids.get(&link_tag.tag_id),
        ) {
            tags.attach(*link_id, *tag_id)?;
        }
    }

    let panels = SqlitePanelRepository::new(conn);
    let mut panel_ids = std::collections::HashMap::new();
    for panel in &data.panels {
        let created = panels.create(&panel.name)?;
        panel_ids.insert(panel.id, created.id);
        summary.panels += 1;
    }
    for entry in &data.panel_folders {
        if let (Some(panel_id), Some(folder_id)) = (
            panel_ids.get(&entry.panel_id),
            folder_ids.get(&entry.folder_id),
        ) {
            panels.add_folder(*panel_id, *folder_id, entry.position)?;
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// Prune stored snapshots by age and/or count; returns rows removed.
pub fn prune_snapshots(
    conn: &Connection,
    max_age_seconds: Option<i64>,
    keep_count: Option<usize>,
) -> Result<usize> {
    let repo = SqliteSnapshotRepository::new(conn);
    let mut removed = 0;
    if let Some(max_age) = max_age_seconds {
        let cutoff = unix_timestamp_now().saturating_sub(max_age);
        removed += repo.delete_older_than(cutoff)?;
    }
    if let Some(keep) = keep_count {
        removed += repo.delete_beyond_count(keep)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let folders = SqliteFolderRepository::new(db.connection());
        let links = SqliteLinkRepository::new(db.connection());
        let tags = SqliteTagRepository::new(db.connection());
        let panels = SqlitePanelRepository::new(db.connection());

        let reading = folders.create("Reading", "long reads", None).unwrap();
        let deep = folders.create("Deep Dives", "", Some(reading.id)).unwrap();
        let filed = links
            .create(&LinkDraft::new("https://a.example/post?x=1&y=2", "A <post>").in_folder(deep.id))
            .unwrap();
        links
            .create(&LinkDraft::new("https://b.example", "Unfiled"))
            .unwrap();
        let tag = tags.get_or_create("rust").unwrap();
        tags.attach(filed.id, tag.id).unwrap();
        let panel = panels.create("Home").unwrap();
        panels.add_folder(panel.id, reading.id, 0).unwrap();
        db
    }

    #[test]
    fn json_snapshot_round_trips_through_import() {
        let source = seeded_db();
        let data = collect_snapshot(source.connection()).unwrap();
        let json = render_json(&data).unwrap();

        let target = Database::open_in_memory().unwrap();
        let summary = import_json(target.connection(), &json).unwrap();
        assert_eq!(summary.folders, 2);
        assert_eq!(summary.links, 2);
        assert_eq!(summary.tags, 1);
        assert_eq!(summary.panels, 1);

        let folders = SqliteFolderRepository::new(target.connection());
        let imported = collect_snapshot(target.connection()).unwrap();
        assert_eq!(imported.links.len(), 2);
        assert_eq!(imported.link_tags.len(), 1);

        // Hierarchy survives the id remap
        let deep = imported
            .folders
            .iter()
            .find(|folder| folder.name == "Deep Dives")
            .unwrap();
        let reading = folders.get(deep.parent_id.unwrap()).unwrap().unwrap();
        assert_eq!(reading.name, "Reading");
        // Imported rows are fresh local data, never pre-synced
        assert!(imported.folders.iter().all(|folder| folder.remote_id.is_none()));
    }

    #[test]
    fn html_snapshot_nests_folders_and_escapes_content() {
        let db = seeded_db();
        let data = collect_snapshot(db.connection()).unwrap();
        let html = render_html(&data);

        assert!(html.starts_with("<!DOCTYPE NETSCAPE-Bookmark-file-1>"));
        assert!(html.contains("<DT><H3 ADD_DATE="));
        assert!(html.contains("Deep Dives"));
        assert!(html.contains("A &lt;post&gt;"));
        assert!(html.contains("https://a.example/post?x=1&amp;y=2"));
        assert!(html.contains("TAGS=\"rust\""));
        assert!(html.contains(">Unfiled</A>"));
    }

    #[test]
    fn take_snapshot_stores_a_row() {
        let db = seeded_db();
        let record = take_snapshot(db.connection(), SnapshotFormat::Json).unwrap();
        assert_eq!(record.format, "json");

        let repo = SqliteSnapshotRepository::new(db.connection());
        let content = repo.content(record.id).unwrap().unwrap();
        assert!(content.contains("\"Reading\""));
    }

    #[test]
    fn write_snapshot_file_uses_suggested_name() {
        let db = seeded_db();
        let record = take_snapshot(db.connection(), SnapshotFormat::Html).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot_file(db.connection(), record.id, dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            suggested_snapshot_file_name(SnapshotFormat::Html, record.created_at)
        );
        assert!(std::fs::read_to_string(path).unwrap().contains("<TITLE>Bookmarks</TITLE>"));
    }

    #[test]
    fn prune_respects_age_and_count() {
        let db = seeded_db();
        for _ in 0..3 {
            take_snapshot(db.connection(), SnapshotFormat::Json).unwrap();
        }

        assert_eq!(prune_snapshots(db.connection(), None, Some(1)).unwrap(), 2);
        // A generous age window removes nothing
        assert_eq!(
            prune_snapshots(db.connection(), Some(3600), None).unwrap(),
            0
        );
    }

    #[test]
    fn import_rejects_inconsistent_hierarchy() {
        let db = Database::open_in_memory().unwrap();
        let json = "{\"exported_at\":1,\"folders\":[{\"id\":1,\"remote_id\":null,\
                    \"name\":\"Orphan\",\"note\":\"\",\"parent_id\":99,\
                    \"is_archived\":false,\"last_modified\":1}],\"links\":[],\
                    \"tags\":[],\"link_tags\":[],\"panels\":[],\"panel_folders\":[]}";
        assert!(import_json(db.connection(), json).is_err());
    }
}
