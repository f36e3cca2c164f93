use std::path::Path;

use serde::Serialize;
use shelfmark_core::db::{FolderRepository, SqliteFolderRepository};
use shelfmark_core::models::Folder;
use shelfmark_core::sync::{FolderService, Origin};

use crate::commands::common::{
    folder_by_name, load_settings, open_database, open_remote, report_remote,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct FolderListItem {
    id: i64,
    name: String,
    note: String,
    parent: Option<String>,
    is_archived: bool,
    synced: bool,
}

pub async fn run_add(
    name: &str,
    parent: Option<&str>,
    note: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let parent_id = parent
        .map(|parent_name| folder_by_name(&db, parent_name))
        .transpose()?
        .map(|folder| folder.id);

    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = FolderService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service
        .create(name.trim(), note.trim(), parent_id, Origin::Local)
        .await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub fn run_list(include_archived: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let folders = SqliteFolderRepository::new(db.connection()).list(include_archived)?;

    if as_json {
        let items = folders
            .iter()
            .map(|folder| FolderListItem {
                id: folder.id,
                name: folder.name.clone(),
                note: folder.note.clone(),
                parent: folder.parent_id.and_then(|parent_id| {
                    folders
                        .iter()
                        .find(|candidate| candidate.id == parent_id)
                        .map(|parent| parent.name.clone())
                }),
                is_archived: folder.is_archived,
                synced: folder.is_synced(),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if folders.is_empty() {
        println!("No folders.");
        return Ok(());
    }
    for line in format_folder_tree(&folders) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_rename(name: &str, new_name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let folder = folder_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = FolderService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service
        .rename(folder.id, new_name.trim(), Origin::Local)
        .await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_move(name: &str, parent: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let folder = folder_by_name(&db, name)?;
    let parent_id = parent
        .map(|parent_name| folder_by_name(&db, parent_name))
        .transpose()?
        .map(|parent| parent.id);

    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = FolderService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.move_to(folder.id, parent_id, Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_archive(name: &str, archived: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let folder = folder_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = FolderService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service
        .set_archived(folder.id, archived, Origin::Local)
        .await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_delete(name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let folder = folder_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = FolderService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.delete(folder.id, Origin::Local).await?;
    report_remote(&mutation);
    println!("Deleted '{}'", folder.name);
    Ok(())
}

fn format_folder_tree(folders: &[Folder]) -> Vec<String> {
    let mut lines = Vec::new();
    push_folder_level(&mut lines, folders, None, 0);
    lines
}

fn push_folder_level(
    lines: &mut Vec<String>,
    folders: &[Folder],
    parent_id: Option<i64>,
    depth: usize,
) {
    for folder in folders.iter().filter(|folder| folder.parent_id == parent_id) {
        let indent = "  ".repeat(depth);
        let marker = if folder.is_archived { " (archived)" } else { "" };
        lines.push(format!("{indent}{:<5} {}{marker}", folder.id, folder.name));
        push_folder_level(lines, folders, Some(folder.id), depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use shelfmark_core::db::Database;

    use super::*;

    #[test]
    fn folder_tree_nests_children_under_parents() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteFolderRepository::new(db.connection());
        let reading = repo.create("Reading", "", None).unwrap();
        repo.create("Deep Dives", "", Some(reading.id)).unwrap();
        repo.create("Recipes", "", None).unwrap();

        let lines = format_folder_tree(&repo.list(true).unwrap());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Reading"));
        assert!(lines[1].starts_with("  "));
        assert!(lines[1].contains("Deep Dives"));
        assert!(lines[2].contains("Recipes"));
    }
}
