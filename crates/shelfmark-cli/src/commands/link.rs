use std::path::Path;

use shelfmark_core::db::{LinkRepository, SqliteLinkRepository};
use shelfmark_core::sync::{LinkService, Origin};

use crate::commands::common::{
    folder_by_name, load_settings, normalize_url, open_database, open_remote, report_remote,
    require_ids,
};
use crate::error::CliError;

pub async fn run_edit(
    id: i64,
    url: Option<&str>,
    title: Option<&str>,
    note: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let existing = SqliteLinkRepository::new(db.connection())
        .get(id)?
        .ok_or(CliError::LinkNotFound(id))?;

    let url = match url {
        Some(url) => normalize_url(url)?,
        None => existing.url,
    };
    let title = title.unwrap_or(&existing.title);
    let note = note.unwrap_or(&existing.note);

    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service
        .update_content(id, &url, title, note, Origin::Local)
        .await?;
    report_remote(&mutation);
    println!("{id}");
    Ok(())
}

pub async fn run_move(
    ids: &[i64],
    folder: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    require_ids(ids)?;
    let db = open_database(db_path)?;
    let folder_id = folder
        .map(|name| folder_by_name(&db, name))
        .transpose()?
        .map(|folder| folder.id);

    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.move_many(ids, folder_id, Origin::Local).await?;
    report_remote(&mutation);
    println!("Moved {} link(s)", mutation.value);
    Ok(())
}

pub async fn run_archive(ids: &[i64], archived: bool, db_path: &Path) -> Result<(), CliError> {
    require_ids(ids)?;
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.set_archived_many(ids, archived, Origin::Local).await?;
    report_remote(&mutation);
    let verb = if archived { "Archived" } else { "Unarchived" };
    println!("{verb} {} link(s)", mutation.value);
    Ok(())
}

pub async fn run_important(id: i64, important: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.set_important(id, important, Origin::Local).await?;
    report_remote(&mutation);
    println!("{id}");
    Ok(())
}

pub async fn run_delete(ids: &[i64], db_path: &Path) -> Result<(), CliError> {
    require_ids(ids)?;
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = LinkService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.delete_many(ids, Origin::Local).await?;
    report_remote(&mutation);
    println!("Deleted {} link(s)", mutation.value);
    Ok(())
}
