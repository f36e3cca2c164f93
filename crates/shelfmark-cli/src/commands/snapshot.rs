use std::path::Path;

use serde::Serialize;
use shelfmark_core::db::{SnapshotRepository, SqliteSnapshotRepository};
use shelfmark_core::snapshot::{
    import_json, prune_snapshots, take_snapshot, write_snapshot_file, SnapshotFormat,
};

use crate::cli::SnapshotFormatArg;
use crate::commands::common::open_database;
use crate::error::CliError;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize)]
struct SnapshotListItem {
    id: i64,
    created_at: i64,
    format: String,
}

const fn to_core_format(format: SnapshotFormatArg) -> SnapshotFormat {
    match format {
        SnapshotFormatArg::Json => SnapshotFormat::Json,
        SnapshotFormatArg::Html => SnapshotFormat::Html,
    }
}

pub fn run_take(format: SnapshotFormatArg, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let record = take_snapshot(db.connection(), to_core_format(format))?;
    println!("{}", record.id);
    Ok(())
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let records = SqliteSnapshotRepository::new(db.connection()).list()?;

    if as_json {
        let items = records
            .iter()
            .map(|record| SnapshotListItem {
                id: record.id,
                created_at: record.created_at,
                format: record.format.clone(),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if records.is_empty() {
        println!("No snapshots.");
    } else {
        for record in records {
            println!("{:<5} {:<6} created_at={}", record.id, record.format, record.created_at);
        }
    }
    Ok(())
}

pub fn run_export(id: i64, output: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let dir = output.unwrap_or_else(|| Path::new("."));
    let path = write_snapshot_file(db.connection(), id, dir)?;
    println!("{}", path.display());
    Ok(())
}

pub fn run_import(path: &Path, db_path: &Path) -> Result<(), CliError> {
    let content = std::fs::read_to_string(path)?;
    let db = open_database(db_path)?;
    let summary = import_json(db.connection(), &content)?;
    println!(
        "Imported {} folder(s), {} link(s), {} tag(s), {} panel(s)",
        summary.folders, summary.links, summary.tags, summary.panels
    );
    Ok(())
}

pub fn run_prune(
    max_age_days: Option<i64>,
    keep: Option<usize>,
    db_path: &Path,
) -> Result<(), CliError> {
    if max_age_days.is_none() && keep.is_none() {
        return Err(CliError::InvalidValue(
            "pass --max-age-days and/or --keep".to_string(),
        ));
    }
    let db = open_database(db_path)?;
    let removed = prune_snapshots(
        db.connection(),
        max_age_days.map(|days| days * SECONDS_PER_DAY),
        keep,
    )?;
    println!("Removed {removed} snapshot(s)");
    Ok(())
}
