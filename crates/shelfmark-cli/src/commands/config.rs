use std::path::Path;

use shelfmark_core::config::SyncType;
use shelfmark_core::db::SqliteSettingsRepository;

use crate::commands::common::{load_settings, open_database};
use crate::error::CliError;

pub fn run_show(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let settings = load_settings(&db)?;

    println!(
        "server:       {}",
        settings.server_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "token:        {}",
        if settings.auth_token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!("sync type:    {}", settings.sync_type);
    println!("last synced:  {}", settings.last_synced_at);
    println!(
        "client:       {} ({})",
        settings.correlation.client_name, settings.correlation.id
    );
    Ok(())
}

pub fn run_set_server(url: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = load_settings(&db)?;
    settings.set_server_url(Some(url.to_string()))?;
    settings.save(&SqliteSettingsRepository::new(db.connection()))?;
    println!("{}", settings.server_url.as_deref().unwrap_or(""));
    Ok(())
}

pub fn run_set_token(token: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = load_settings(&db)?;
    settings.auth_token = Some(token.trim().to_string());
    settings.save(&SqliteSettingsRepository::new(db.connection()))?;
    println!("Token updated");
    Ok(())
}

pub fn run_set_sync_type(value: &str, db_path: &Path) -> Result<(), CliError> {
    let sync_type: SyncType = value.parse().map_err(CliError::InvalidValue)?;
    let db = open_database(db_path)?;
    let mut settings = load_settings(&db)?;
    settings.sync_type = sync_type;
    settings.save(&SqliteSettingsRepository::new(db.connection()))?;
    println!("{sync_type}");
    Ok(())
}

pub fn run_reset(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = load_settings(&db)?;
    settings.server_url = None;
    settings.auth_token = None;
    settings.save(&SqliteSettingsRepository::new(db.connection()))?;
    println!("Sync disabled");
    Ok(())
}
