use std::path::Path;

use serde::Serialize;
use shelfmark_core::db::{
    FolderRepository, PanelRepository, SqliteFolderRepository, SqlitePanelRepository,
};
use shelfmark_core::sync::{Origin, PanelService};

use crate::commands::common::{
    folder_by_name, load_settings, open_database, open_remote, panel_by_name, report_remote,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct PanelListItem {
    id: i64,
    name: String,
    folders: Vec<String>,
    synced: bool,
}

pub async fn run_add(name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = PanelService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.create(name.trim(), Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let panels = SqlitePanelRepository::new(db.connection());
    let folders = SqliteFolderRepository::new(db.connection());

    let mut items = Vec::new();
    for panel in panels.list()? {
        let mut pinned = Vec::new();
        for entry in panels.folders_of(panel.id)? {
            if let Some(folder) = folders.get(entry.folder_id)? {
                pinned.push(folder.name);
            }
        }
        items.push(PanelListItem {
            id: panel.id,
            name: panel.name,
            folders: pinned,
            synced: panel.remote_id.is_some(),
        });
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No panels.");
    } else {
        for item in items {
            println!("{:<5} {}  [{}]", item.id, item.name, item.folders.join(", "));
        }
    }
    Ok(())
}

pub async fn run_rename(name: &str, new_name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let panel = panel_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = PanelService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.rename(panel.id, new_name.trim(), Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_delete(name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let panel = panel_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = PanelService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.delete(panel.id, Origin::Local).await?;
    report_remote(&mutation);
    println!("Deleted '{}'", panel.name);
    Ok(())
}

pub async fn run_pin(
    panel_name: &str,
    folder_name: &str,
    position: i64,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let panel = panel_by_name(&db, panel_name)?;
    let folder = folder_by_name(&db, folder_name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = PanelService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service
        .pin_folder(panel.id, folder.id, position, Origin::Local)
        .await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_unpin(
    panel_name: &str,
    folder_name: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let panel = panel_by_name(&db, panel_name)?;
    let folder = folder_by_name(&db, folder_name)?;
    let panels = SqlitePanelRepository::new(db.connection());
    let entry = panels
        .folders_of(panel.id)?
        .into_iter()
        .find(|entry| entry.folder_id == folder.id)
        .ok_or_else(|| {
            CliError::InvalidValue(format!(
                "'{folder_name}' is not pinned on '{panel_name}'"
            ))
        })?;

    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = PanelService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.unpin_folder(entry.id, Origin::Local).await?;
    report_remote(&mutation);
    println!("Unpinned '{}' from '{}'", folder.name, panel.name);
    Ok(())
}
