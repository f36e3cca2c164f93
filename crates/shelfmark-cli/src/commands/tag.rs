use std::path::Path;

use serde::Serialize;
use shelfmark_core::db::{SqliteTagRepository, TagRepository};
use shelfmark_core::sync::{Origin, TagService};

use crate::commands::common::{
    load_settings, open_database, open_remote, report_remote, tag_by_name,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TagListItem {
    id: i64,
    name: String,
    links: usize,
    synced: bool,
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let items = SqliteTagRepository::new(db.connection())
        .list_with_counts()?
        .into_iter()
        .map(|(tag, links)| TagListItem {
            id: tag.id,
            name: tag.name,
            links,
            synced: tag.remote_id.is_some(),
        })
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No tags.");
    } else {
        for item in items {
            println!("{:<5} #{:<24} {} link(s)", item.id, item.name, item.links);
        }
    }
    Ok(())
}

pub async fn run_attach(link_id: i64, name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = TagService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.attach(link_id, name, Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_detach(link_id: i64, name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let tag = tag_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = TagService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.detach(link_id, tag.id, Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_rename(name: &str, new_name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let tag = tag_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = TagService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.rename(tag.id, new_name, Origin::Local).await?;
    report_remote(&mutation);
    println!("{}", mutation.value.id);
    Ok(())
}

pub async fn run_delete(name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let tag = tag_by_name(&db, name)?;
    let settings = load_settings(&db)?;
    let remote = open_remote(&settings)?;
    let service = TagService::new(db.connection(), &settings, remote.as_ref());
    let mutation = service.delete(tag.id, Origin::Local).await?;
    report_remote(&mutation);
    println!("Deleted #{}", tag.name);
    Ok(())
}
