//! Replay of queued remote operations.
//!
//! Entries drain oldest-first with their stored wire payloads. A remote
//! failure stops the pass immediately so later entries never overtake an
//! earlier one; the failed entry stays queued for the next pass. Entries
//! whose payload no longer decodes are dropped with an error log, a stuck
//! head would otherwise block the queue forever.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{
    FolderRepository, LinkRepository, PanelRepository, QueueEntry, QueueRepository,
    SqliteFolderRepository, SqliteLinkRepository, SqlitePanelRepository, SqliteQueueRepository,
    SqliteTagRepository, TagRepository,
};
use crate::error::{Error, Result};
use crate::models::Correlation;
use crate::sync::mapping::IdMapper;
use crate::sync::remote::{
    FolderChange, FolderPush, LinkBatch, LinkChange, LinkPush, LinkTagChange, PanelChange,
    PanelFolderPush, PanelPush, Removal, SyncRemote, TagChange, TagPush,
};

/// Queue operation names, persisted alongside the payloads.
pub mod ops {
    pub const FOLDER_CREATE: &str = "folder.create";
    pub const FOLDER_UPDATE: &str = "folder.update";
    pub const FOLDER_DELETE: &str = "folder.delete";
    pub const LINK_CREATE: &str = "link.create";
    pub const LINK_UPDATE: &str = "link.update";
    pub const LINK_DELETE: &str = "link.delete";
    pub const LINK_BATCH: &str = "link.batch";
    pub const PANEL_CREATE: &str = "panel.create";
    pub const PANEL_UPDATE: &str = "panel.update";
    pub const PANEL_DELETE: &str = "panel.delete";
    pub const PANEL_FOLDER_CREATE: &str = "panel_folder.create";
    pub const PANEL_FOLDER_DELETE: &str = "panel_folder.delete";
    pub const TAG_CREATE: &str = "tag.create";
    pub const TAG_UPDATE: &str = "tag.update";
    pub const TAG_DELETE: &str = "tag.delete";
    pub const LINK_TAG_SET: &str = "link_tag.set";
    pub const LINK_TAG_SET_LOCAL: &str = "link_tag.set_local";
}

/// Link-tag association queued before the tag had a server id.
///
/// Carries local ids; replay resolves both through [`IdMapper`] after the
/// earlier queued tag create has recorded its server-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLinkTag {
    pub link_id: i64,
    pub tag_id: i64,
    pub attached: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Entries replayed and removed
    pub replayed: usize,
    /// Undecodable entries dropped
    pub dropped: usize,
    /// Entries still queued after the pass
    pub remaining: usize,
    /// Remote error that stopped the pass, if any
    pub error: Option<String>,
}

impl DrainSummary {
    /// Whether the pass emptied the queue.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0 && self.error.is_none()
    }
}

/// Drains the pending sync queue against a remote.
pub struct QueueDrain<'a, R> {
    conn: &'a Connection,
    remote: &'a R,
}

impl<'a, R: SyncRemote> QueueDrain<'a, R> {
    #[must_use]
    pub const fn new(conn: &'a Connection, remote: &'a R) -> Self {
        Self { conn, remote }
    }

    /// Replay queued entries in insertion order, stopping on the first
    /// remote failure.
    pub async fn drain(&self) -> Result<DrainSummary> {
        let queue = SqliteQueueRepository::new(self.conn);
        let mut summary = DrainSummary::default();

        for entry in queue.list()? {
            match self.replay(&entry).await {
                Ok(()) => {
                    queue.remove(entry.id)?;
                    summary.replayed += 1;
                }
                Err(error) if error.is_remote() => {
                    tracing::warn!(
                        "replay of {} (entry {}) failed, stopping drain: {error}",
                        entry.operation,
                        entry.id
                    );
                    summary.error = Some(error.to_string());
                    break;
                }
                Err(error @ (Error::Serialization(_) | Error::InvalidInput(_))) => {
                    tracing::error!(
                        "dropping undecodable queue entry {} ({}): {error}",
                        entry.id,
                        entry.operation
                    );
                    queue.remove(entry.id)?;
                    summary.dropped += 1;
                }
                Err(error) => return Err(error),
            }
        }

        summary.remaining = queue.len()?;
        Ok(summary)
    }

    async fn replay(&self, entry: &QueueEntry) -> Result<()> {
        match entry.operation.as_str() {
            ops::FOLDER_CREATE => {
                let payload: FolderPush = serde_json::from_str(&entry.payload)?;
                let remote_id = self.remote.create_folder(&payload).await?;
                self.record_remote_id(
                    SqliteFolderRepository::new(self.conn).set_remote_id(payload.local_id, remote_id),
                );
            }
            ops::FOLDER_UPDATE => {
                let payload: FolderChange = serde_json::from_str(&entry.payload)?;
                self.remote.update_folder(&payload).await?;
            }
            ops::FOLDER_DELETE => {
                let payload: Removal = serde_json::from_str(&entry.payload)?;
                self.remote.delete_folder(&payload).await?;
            }
            ops::LINK_CREATE => {
                let payload: LinkPush = serde_json::from_str(&entry.payload)?;
                let remote_id = self.remote.create_link(&payload).await?;
                self.record_remote_id(
                    SqliteLinkRepository::new(self.conn).set_remote_id(payload.local_id, remote_id),
                );
            }
            ops::LINK_UPDATE => {
                let payload: LinkChange = serde_json::from_str(&entry.payload)?;
                self.remote.update_link(&payload).await?;
            }
            ops::LINK_DELETE => {
                let payload: Removal = serde_json::from_str(&entry.payload)?;
                self.remote.delete_link(&payload).await?;
            }
            ops::LINK_BATCH => {
                let payload: LinkBatch = serde_json::from_str(&entry.payload)?;
                self.remote.batch_links(&payload).await?;
            }
            ops::PANEL_CREATE => {
                let payload: PanelPush = serde_json::from_str(&entry.payload)?;
                let remote_id = self.remote.create_panel(&payload).await?;
                self.record_remote_id(
                    SqlitePanelRepository::new(self.conn).set_remote_id(payload.local_id, remote_id),
                );
            }
            ops::PANEL_UPDATE => {
                let payload: PanelChange = serde_json::from_str(&entry.payload)?;
                self.remote.update_panel(&payload).await?;
            }
            ops::PANEL_DELETE => {
                let payload: Removal = serde_json::from_str(&entry.payload)?;
                self.remote.delete_panel(&payload).await?;
            }
            ops::PANEL_FOLDER_CREATE => {
                let payload: PanelFolderPush = serde_json::from_str(&entry.payload)?;
                let remote_id = self.remote.create_panel_folder(&payload).await?;
                self.record_remote_id(
                    SqlitePanelRepository::new(self.conn)
                        .set_panel_folder_remote_id(payload.local_id, remote_id),
                );
            }
            ops::PANEL_FOLDER_DELETE => {
                let payload: Removal = serde_json::from_str(&entry.payload)?;
                self.remote.delete_panel_folder(&payload).await?;
            }
            ops::TAG_CREATE => {
                let payload: TagPush = serde_json::from_str(&entry.payload)?;
                let remote_id = self.remote.create_tag(&payload).await?;
                self.record_remote_id(
                    SqliteTagRepository::new(self.conn).set_remote_id(payload.local_id, remote_id),
                );
            }
            ops::TAG_UPDATE => {
                let payload: TagChange = serde_json::from_str(&entry.payload)?;
                self.remote.update_tag(&payload).await?;
            }
            ops::TAG_DELETE => {
                let payload: Removal = serde_json::from_str(&entry.payload)?;
                self.remote.delete_tag(&payload).await?;
            }
            ops::LINK_TAG_SET => {
                let payload: LinkTagChange = serde_json::from_str(&entry.payload)?;
                self.remote.set_link_tag(&payload).await?;
            }
            ops::LINK_TAG_SET_LOCAL => {
                let payload: PendingLinkTag = serde_json::from_str(&entry.payload)?;
                let mapper = IdMapper::new(self.conn);
                let (Some(link_id), Some(tag_id)) = (
                    mapper.remote_link_id(payload.link_id)?,
                    mapper.remote_tag_id(payload.tag_id)?,
                ) else {
                    // Either side was deleted locally before its create replayed
                    return Err(Error::InvalidInput(format!(
                        "link-tag entry references unsynced link {} or tag {}",
                        payload.link_id, payload.tag_id
                    )));
                };
                let change = LinkTagChange {
                    link_id,
                    tag_id,
                    attached: payload.attached,
                    event_timestamp: payload.event_timestamp,
                    correlation: payload.correlation,
                };
                self.remote.set_link_tag(&change).await?;
            }
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown queue operation: {other}"
                )));
            }
        }
        Ok(())
    }

    /// Record a server-assigned id on the originating row.
    ///
    /// The row may have been deleted locally while the create sat queued;
    /// that is not a replay failure.
    fn record_remote_id(&self, result: Result<()>) {
        match result {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(error) => {
                tracing::error!("failed to record server-assigned id after replay: {error}");
            }
        }
    }
}
