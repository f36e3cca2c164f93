use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use shelfmark_core::config::SyncSettings;
use shelfmark_core::db::{
    Database, FolderRepository, PanelRepository, SqliteFolderRepository, SqlitePanelRepository,
    SqliteSettingsRepository, SqliteTagRepository, TagRepository,
};
use shelfmark_core::models::{Folder, Link, Panel, Tag};
use shelfmark_core::sync::{HttpRemote, Mutation, RemoteStatus};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct LinkListItem {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub host: String,
    pub folder: Option<String>,
    pub tags: Vec<String>,
    pub is_important: bool,
    pub is_archived: bool,
    pub last_modified: i64,
    pub relative_time: String,
    pub synced: bool,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SHELFMARK_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shelfmark")
        .join("shelfmark.db")
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

pub fn load_settings(db: &Database) -> Result<SyncSettings, CliError> {
    let repo = SqliteSettingsRepository::new(db.connection());
    Ok(SyncSettings::load(&repo)?)
}

/// The configured remote, `None` when sync is not set up.
pub fn open_remote(settings: &SyncSettings) -> Result<Option<HttpRemote>, CliError> {
    Ok(HttpRemote::from_settings(settings)?)
}

/// Surface a queued remote leg without failing the command.
pub fn report_remote<T>(mutation: &Mutation<T>) {
    if let RemoteStatus::Queued(reason) = &mutation.remote {
        eprintln!("note: server unreachable, change queued for later sync ({reason})");
    }
}

pub fn folder_by_name(db: &Database, name: &str) -> Result<Folder, CliError> {
    SqliteFolderRepository::new(db.connection())
        .list(true)?
        .into_iter()
        .find(|folder| folder.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::FolderNotFound(name.to_string()))
}

pub fn panel_by_name(db: &Database, name: &str) -> Result<Panel, CliError> {
    SqlitePanelRepository::new(db.connection())
        .list()?
        .into_iter()
        .find(|panel| panel.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::PanelNotFound(name.to_string()))
}

pub fn tag_by_name(db: &Database, name: &str) -> Result<Tag, CliError> {
    SqliteTagRepository::new(db.connection())
        .list_with_counts()?
        .into_iter()
        .map(|(tag, _)| tag)
        .find(|tag| tag.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::TagNotFound(name.to_string()))
}

pub fn normalize_url(url: &str) -> Result<String, CliError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyUrl);
    }
    if !shelfmark_core::util::is_http_url(trimmed) {
        return Err(CliError::InvalidUrl(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn require_ids(ids: &[i64]) -> Result<(), CliError> {
    if ids.is_empty() {
        Err(CliError::EmptyIdList)
    } else {
        Ok(())
    }
}

pub fn link_to_list_item(db: &Database, link: &Link) -> Result<LinkListItem, CliError> {
    let folder = match link.folder_id {
        Some(folder_id) => SqliteFolderRepository::new(db.connection())
            .get(folder_id)?
            .map(|folder| folder.name),
        None => None,
    };
    let mut tags: Vec<String> = SqliteTagRepository::new(db.connection())
        .tags_of(link.id)?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    tags.sort();

    Ok(LinkListItem {
        id: link.id,
        url: link.url.clone(),
        title: link.title.clone(),
        host: link.host.clone(),
        folder,
        tags,
        is_important: link.is_important,
        is_archived: link.is_archived,
        last_modified: link.last_modified,
        relative_time: format_relative_time(link.last_modified, Utc::now().timestamp()),
        synced: link.is_synced(),
    })
}

pub fn format_link_lines(items: &[LinkListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let title = title_preview(&item.title, 40);
            let mut flags = String::new();
            if item.is_important {
                flags.push('!');
            }
            if item.is_archived {
                flags.push('a');
            }
            if !item.synced {
                flags.push('*');
            }
            let tags = item
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            let mut line = format!(
                "{:<5} {:<2} {title:<40}  {:<24}  {}",
                item.id, flags, item.host, item.relative_time
            );
            if let Some(folder) = &item.folder {
                line.push_str(&format!("  /{folder}"));
            }
            if !tags.is_empty() {
                line.push_str("  ");
                line.push_str(&tags);
            }
            line
        })
        .collect()
}

pub fn title_preview(title: &str, max_chars: usize) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: i64, now: i64) -> String {
    let diff = now.saturating_sub(timestamp);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_url_validates_scheme() {
        assert_eq!(
            normalize_url("  https://example.com  ").unwrap(),
            "https://example.com"
        );
        assert!(matches!(normalize_url("   "), Err(CliError::EmptyUrl)));
        assert!(matches!(
            normalize_url("example.com"),
            Err(CliError::InvalidUrl(_))
        ));
    }

    #[test]
    fn format_relative_time_units() {
        let now = 10_000_000;
        assert_eq!(format_relative_time(now - 30, now), "just now");
        assert_eq!(format_relative_time(now - 120, now), "2m ago");
        assert_eq!(format_relative_time(now - 2 * 60 * 60, now), "2h ago");
        assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60, now), "3d ago");
    }

    #[test]
    fn title_preview_truncates_with_ellipsis() {
        let preview = title_preview("This is a very long title that should be shortened", 20);
        assert_eq!(preview, "This is a very lo...");
        assert_eq!(title_preview("short", 20), "short");
    }

    #[test]
    fn folder_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        SqliteFolderRepository::new(db.connection())
            .create("Reading", "", None)
            .unwrap();

        assert_eq!(folder_by_name(&db, "reading").unwrap().name, "Reading");
        assert!(matches!(
            folder_by_name(&db, "missing"),
            Err(CliError::FolderNotFound(_))
        ));
    }
}
