use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shelfmark_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No URL provided")]
    EmptyUrl,
    #[error("URL must start with http:// or https://: {0}")]
    InvalidUrl(String),
    #[error("No link ids provided")]
    EmptyIdList,
    #[error("Link not found: {0}")]
    LinkNotFound(i64),
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
    #[error("Panel not found: {0}")]
    PanelNotFound(String),
    #[error("Tag not found: {0}")]
    TagNotFound(String),
    #[error("{0}")]
    InvalidValue(String),
    #[error(
        "Sync is not configured. Run `shelfmark config set-server <URL>` and `shelfmark config set-token <TOKEN>` first."
    )]
    SyncNotConfigured,
}
