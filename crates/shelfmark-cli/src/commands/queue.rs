use std::path::Path;

use serde::Serialize;
use shelfmark_core::db::{QueueRepository, SqliteQueueRepository};
use shelfmark_core::sync::QueueDrain;

use crate::commands::common::{load_settings, open_database, open_remote};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct QueueListItem {
    id: i64,
    operation: String,
    queued_at: i64,
}

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let entries = SqliteQueueRepository::new(db.connection()).list()?;

    if as_json {
        let items = entries
            .iter()
            .map(|entry| QueueListItem {
                id: entry.id,
                operation: entry.operation.clone(),
                queued_at: entry.queued_at,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if entries.is_empty() {
        println!("Queue is empty.");
    } else {
        for entry in entries {
            println!("{:<5} {:<24} queued_at={}", entry.id, entry.operation, entry.queued_at);
        }
    }
    Ok(())
}

pub async fn run_drain(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;
    let Some(remote) = open_remote(&settings)? else {
        return Err(CliError::SyncNotConfigured);
    };

    let summary = QueueDrain::new(db.connection(), &remote).drain().await?;
    println!(
        "{} replayed, {} dropped, {} remaining",
        summary.replayed, summary.dropped, summary.remaining
    );
    if let Some(error) = summary.error {
        eprintln!("note: drain stopped early: {error}");
    }
    Ok(())
}

pub fn run_clear(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let removed = SqliteQueueRepository::new(db.connection()).clear()?;
    println!("Dropped {removed} entr(ies)");
    Ok(())
}
