//! Database layer for Shelfmark

mod connection;
mod folder_repository;
mod link_repository;
mod migrations;
mod panel_repository;
mod queue_repository;
mod settings_repository;
mod snapshot_repository;
mod tag_repository;

pub use connection::Database;
pub use folder_repository::{FolderRepository, SqliteFolderRepository};
pub use link_repository::{LinkRepository, RemoteLinkFields, SqliteLinkRepository};
pub use panel_repository::{PanelRepository, SqlitePanelRepository};
pub use queue_repository::{QueueEntry, QueueRepository, SqliteQueueRepository};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
pub use snapshot_repository::{SnapshotRecord, SnapshotRepository, SqliteSnapshotRepository};
pub use tag_repository::{SqliteTagRepository, TagRepository};
