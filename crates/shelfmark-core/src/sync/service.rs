//! Entity services: authoritative local mutation plus a best-effort remote leg.
//!
//! Every operation commits locally first and never rolls back. The remote
//! leg runs only for [`Origin::Local`] mutations when the settings permit
//! pushes; a transport failure degrades to [`RemoteStatus::Queued`] with the
//! wire payload persisted for later replay. Payloads that reference a not-yet
//! synced entity are deferred entirely, the next reconciliation push phase
//! picks the row up in dependency order.

use rusqlite::Connection;
use serde::Serialize;

use crate::config::SyncSettings;
use crate::db::{
    FolderRepository, LinkRepository, PanelRepository, QueueRepository, SqliteFolderRepository,
    SqliteLinkRepository, SqlitePanelRepository, SqliteQueueRepository, SqliteTagRepository,
    TagRepository,
};
use crate::error::{Error, Result};
use crate::models::{Folder, Link, LinkDraft, Panel, PanelFolder, Tag};
use crate::sync::mapping::IdMapper;
use crate::sync::ops;
use crate::sync::queue::PendingLinkTag;
use crate::sync::outcome::{Mutation, Origin, RemoteStatus};
use crate::sync::remote::{
    BatchAction, FolderChange, FolderPush, LinkBatch, LinkChange, LinkPush, LinkTagChange,
    PanelChange, PanelFolderPush, PanelPush, Removal, SyncRemote, TagChange, TagPush,
};
use crate::util::unix_timestamp_now;

/// Persist a failed push for replay and report the soft failure.
fn queue_soft<T: Serialize>(
    conn: &Connection,
    operation: &str,
    payload: &T,
    error: &Error,
) -> RemoteStatus {
    tracing::warn!("remote {operation} failed, queueing for replay: {error}");
    let queue = SqliteQueueRepository::new(conn);
    let result = serde_json::to_string(payload)
        .map_err(Error::from)
        .and_then(|json| queue.enqueue(operation, &json));
    if let Err(queue_error) = result {
        tracing::error!("failed to queue {operation}: {queue_error}");
    }
    RemoteStatus::Queued(error.to_string())
}

/// Drop queued link-tag entries whose pair came apart before the tag synced.
fn purge_pending_associations(
    conn: &Connection,
    link_id: Option<i64>,
    tag_id: i64,
) -> Result<()> {
    let queue = SqliteQueueRepository::new(conn);
    for entry in queue.list()? {
        if entry.operation != ops::LINK_TAG_SET_LOCAL {
            continue;
        }
        let matches = serde_json::from_str::<PendingLinkTag>(&entry.payload)
            .is_ok_and(|pending| {
                pending.tag_id == tag_id
                    && link_id.is_none_or(|link_id| pending.link_id == link_id)
            });
        if matches {
            queue.remove(entry.id)?;
        }
    }
    Ok(())
}

/// Drop queued create replays for a row deleted before it ever synced.
fn purge_queued_creates(conn: &Connection, operation: &str, local_id: i64) -> Result<()> {
    let queue = SqliteQueueRepository::new(conn);
    for entry in queue.list()? {
        if entry.operation != operation {
            continue;
        }
        let matches = serde_json::from_str::<serde_json::Value>(&entry.payload)
            .ok()
            .and_then(|payload| payload.get("local_id").and_then(serde_json::Value::as_i64))
            == Some(local_id);
        if matches {
            queue.remove(entry.id)?;
        }
    }
    Ok(())
}

pub(crate) fn folder_push_payload(
    conn: &Connection,
    settings: &SyncSettings,
    folder: &Folder,
) -> Result<Option<FolderPush>> {
    let parent_folder_id = match folder.parent_id {
        Some(parent) => match IdMapper::new(conn).remote_folder_id(parent)? {
            Some(remote) => Some(remote),
            // Parent not pushed yet; defer to the reconciliation push phase
            None => return Ok(None),
        },
        None => None,
    };
    Ok(Some(FolderPush {
        local_id: folder.id,
        name: folder.name.clone(),
        note: folder.note.clone(),
        parent_folder_id,
        is_archived: folder.is_archived,
        event_timestamp: folder.last_modified,
        correlation: settings.correlation.clone(),
    }))
}

pub(crate) fn folder_change_payload(
    conn: &Connection,
    settings: &SyncSettings,
    folder: &Folder,
) -> Result<Option<FolderChange>> {
    let Some(folder_id) = folder.remote_id else {
        return Ok(None);
    };
    let parent_folder_id = match folder.parent_id {
        Some(parent) => match IdMapper::new(conn).remote_folder_id(parent)? {
            Some(remote) => Some(remote),
            None => return Ok(None),
        },
        None => None,
    };
    Ok(Some(FolderChange {
        folder_id,
        name: folder.name.clone(),
        note: folder.note.clone(),
        parent_folder_id,
        is_archived: folder.is_archived,
        event_timestamp: folder.last_modified,
        correlation: settings.correlation.clone(),
    }))
}

pub(crate) fn link_push_payload(
    conn: &Connection,
    settings: &SyncSettings,
    link: &Link,
) -> Result<Option<LinkPush>> {
    let folder_id = match link.folder_id {
        Some(folder) => match IdMapper::new(conn).remote_folder_id(folder)? {
            Some(remote) => Some(remote),
            None => return Ok(None),
        },
        None => None,
    };
    Ok(Some(LinkPush {
        local_id: link.id,
        url: link.url.clone(),
        title: link.title.clone(),
        note: link.note.clone(),
        host: link.host.clone(),
        user_agent: link.user_agent.clone(),
        media_type: link.media_type,
        folder_id,
        is_important: link.is_important,
        is_archived: link.is_archived,
        event_timestamp: link.last_modified,
        correlation: settings.correlation.clone(),
    }))
}

pub(crate) fn link_change_payload(
    conn: &Connection,
    settings: &SyncSettings,
    link: &Link,
) -> Result<Option<LinkChange>> {
    let Some(link_id) = link.remote_id else {
        return Ok(None);
    };
    let folder_id = match link.folder_id {
        Some(folder) => match IdMapper::new(conn).remote_folder_id(folder)? {
            Some(remote) => Some(remote),
            None => return Ok(None),
        },
        None => None,
    };
    Ok(Some(LinkChange {
        link_id,
        url: link.url.clone(),
        title: link.title.clone(),
        note: link.note.clone(),
        host: link.host.clone(),
        user_agent: link.user_agent.clone(),
        media_type: link.media_type,
        folder_id,
        is_important: link.is_important,
        is_archived: link.is_archived,
        event_timestamp: link.last_modified,
        correlation: settings.correlation.clone(),
    }))
}

pub(crate) fn panel_push_payload(settings: &SyncSettings, panel: &Panel) -> PanelPush {
    PanelPush {
        local_id: panel.id,
        name: panel.name.clone(),
        event_timestamp: unix_timestamp_now(),
        correlation: settings.correlation.clone(),
    }
}

pub(crate) fn panel_folder_push_payload(
    conn: &Connection,
    settings: &SyncSettings,
    entry: &PanelFolder,
) -> Result<Option<PanelFolderPush>> {
    let mapper = IdMapper::new(conn);
    let (Some(panel_id), Some(folder_id)) = (
        mapper.remote_panel_id(entry.panel_id)?,
        mapper.remote_folder_id(entry.folder_id)?,
    ) else {
        return Ok(None);
    };
    Ok(Some(PanelFolderPush {
        local_id: entry.id,
        panel_id,
        folder_id,
        position: entry.position,
        event_timestamp: unix_timestamp_now(),
        correlation: settings.correlation.clone(),
    }))
}

pub(crate) fn tag_push_payload(settings: &SyncSettings, tag: &Tag) -> TagPush {
    TagPush {
        local_id: tag.id,
        name: tag.name.clone(),
        event_timestamp: unix_timestamp_now(),
        correlation: settings.correlation.clone(),
    }
}

fn removal_payload(settings: &SyncSettings, id: i64) -> Removal {
    Removal {
        id,
        event_timestamp: unix_timestamp_now(),
        correlation: settings.correlation.clone(),
    }
}

/// Folder operations with the local-first remote leg.
pub struct FolderService<'a, R> {
    conn: &'a Connection,
    settings: &'a SyncSettings,
    remote: Option<&'a R>,
}

impl<'a, R: SyncRemote> FolderService<'a, R> {
    #[must_use]
    pub const fn new(
        conn: &'a Connection,
        settings: &'a SyncSettings,
        remote: Option<&'a R>,
    ) -> Self {
        Self {
            conn,
            settings,
            remote,
        }
    }

    const fn repo(&self) -> SqliteFolderRepository<'a> {
        SqliteFolderRepository::new(self.conn)
    }

    /// The remote to push to, `None` when this mutation must stay local.
    fn remote_leg(&self, origin: Origin) -> Option<&'a R> {
        (origin.should_push() && self.settings.permits_push())
            .then_some(self.remote)
            .flatten()
    }

    pub async fn create(
        &self,
        name: &str,
        note: &str,
        parent_id: Option<i64>,
        origin: Origin,
    ) -> Result<Mutation<Folder>> {
        let folder = self.repo().create(name, note, parent_id)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(folder));
        };
        let Some(payload) = folder_push_payload(self.conn, self.settings, &folder)? else {
            return Ok(Mutation::local_only(folder));
        };
        match remote.create_folder(&payload).await {
            Ok(remote_id) => {
                self.repo().set_remote_id(folder.id, remote_id)?;
                Ok(Mutation::synced(Folder {
                    remote_id: Some(remote_id),
                    ..folder
                }))
            }
            Err(error) => {
                let status = queue_soft(self.conn, ops::FOLDER_CREATE, &payload, &error);
                Ok(Mutation {
                    value: folder,
                    remote: status,
                })
            }
        }
    }

    pub async fn rename(&self, id: i64, name: &str, origin: Origin) -> Result<Mutation<Folder>> {
        let folder = self.repo().rename(id, name)?;
        self.push_update(folder, origin).await
    }

    pub async fn update_note(
        &self,
        id: i64,
        note: &str,
        origin: Origin,
    ) -> Result<Mutation<Folder>> {
        let folder = self.repo().update_note(id, note)?;
        self.push_update(folder, origin).await
    }

    pub async fn move_to(
        &self,
        id: i64,
        parent_id: Option<i64>,
        origin: Origin,
    ) -> Result<Mutation<Folder>> {
        let folder = self.repo().move_to(id, parent_id)?;
        self.push_update(folder, origin).await
    }

    pub async fn set_archived(
        &self,
        id: i64,
        archived: bool,
        origin: Origin,
    ) -> Result<Mutation<Folder>> {
        let folder = self.repo().set_archived(id, archived)?;
        self.push_update(folder, origin).await
    }

    pub async fn delete(&self, id: i64, origin: Origin) -> Result<Mutation<()>> {
        let folder = self
            .repo()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("folder {id}")))?;
        self.repo().delete(id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(()));
        };
        let Some(remote_id) = folder.remote_id else {
            // Never reached the server; drop any queued create of it
            purge_queued_creates(self.conn, ops::FOLDER_CREATE, id)?;
            return Ok(Mutation::local_only(()));
        };
        let payload = removal_payload(self.settings, remote_id);
        match remote.delete_folder(&payload).await {
            Ok(()) => Ok(Mutation::synced(())),
            Err(error) => Ok(Mutation {
                value: (),
                remote: queue_soft(self.conn, ops::FOLDER_DELETE, &payload, &error),
            }),
        }
    }

    async fn push_update(&self, folder: Folder, origin: Origin) -> Result<Mutation<Folder>> {
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(folder));
        };
        let Some(payload) = folder_change_payload(self.conn, self.settings, &folder)? else {
            return Ok(Mutation::local_only(folder));
        };
        match remote.update_folder(&payload).await {
            Ok(()) => Ok(Mutation::synced(folder)),
            Err(error) => {
                let status = queue_soft(self.conn, ops::FOLDER_UPDATE, &payload, &error);
                Ok(Mutation {
                    value: folder,
                    remote: status,
                })
            }
        }
    }
}

/// Link operations with the local-first remote leg.
pub struct LinkService<'a, R> {
    conn: &'a Connection,
    settings: &'a SyncSettings,
    remote: Option<&'a R>,
}

impl<'a, R: SyncRemote> LinkService<'a, R> {
    #[must_use]
    pub const fn new(
        conn: &'a Connection,
        settings: &'a SyncSettings,
        remote: Option<&'a R>,
    ) -> Self {
        Self {
            conn,
            settings,
            remote,
        }
    }

    const fn repo(&self) -> SqliteLinkRepository<'a> {
        SqliteLinkRepository::new(self.conn)
    }

    fn remote_leg(&self, origin: Origin) -> Option<&'a R> {
        (origin.should_push() && self.settings.permits_push())
            .then_some(self.remote)
            .flatten()
    }

    pub async fn create(&self, draft: &LinkDraft, origin: Origin) -> Result<Mutation<Link>> {
        let link = self.repo().create(draft)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(link));
        };
        let Some(payload) = link_push_payload(self.conn, self.settings, &link)? else {
            return Ok(Mutation::local_only(link));
        };
        match remote.create_link(&payload).await {
            Ok(remote_id) => {
                self.repo().set_remote_id(link.id, remote_id)?;
                Ok(Mutation::synced(Link {
                    remote_id: Some(remote_id),
                    ..link
                }))
            }
            Err(error) => {
                let status = queue_soft(self.conn, ops::LINK_CREATE, &payload, &error);
                Ok(Mutation {
                    value: link,
                    remote: status,
                })
            }
        }
    }

    pub async fn update_content(
        &self,
        id: i64,
        url: &str,
        title: &str,
        note: &str,
        origin: Origin,
    ) -> Result<Mutation<Link>> {
        let link = self.repo().update_content(id, url, title, note)?;
        self.push_update(link, origin).await
    }

    pub async fn move_to_folder(
        &self,
        id: i64,
        folder_id: Option<i64>,
        origin: Origin,
    ) -> Result<Mutation<Link>> {
        let link = self.repo().move_to_folder(id, folder_id)?;
        self.push_update(link, origin).await
    }

    pub async fn set_important(
        &self,
        id: i64,
        important: bool,
        origin: Origin,
    ) -> Result<Mutation<Link>> {
        let link = self.repo().set_important(id, important)?;
        self.push_update(link, origin).await
    }

    pub async fn set_archived(
        &self,
        id: i64,
        archived: bool,
        origin: Origin,
    ) -> Result<Mutation<Link>> {
        let link = self.repo().set_archived(id, archived)?;
        self.push_update(link, origin).await
    }

    pub async fn delete(&self, id: i64, origin: Origin) -> Result<Mutation<()>> {
        let link = self
            .repo()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("link {id}")))?;
        self.repo().delete(id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(()));
        };
        let Some(remote_id) = link.remote_id else {
            purge_queued_creates(self.conn, ops::LINK_CREATE, id)?;
            return Ok(Mutation::local_only(()));
        };
        let payload = removal_payload(self.settings, remote_id);
        match remote.delete_link(&payload).await {
            Ok(()) => Ok(Mutation::synced(())),
            Err(error) => Ok(Mutation {
                value: (),
                remote: queue_soft(self.conn, ops::LINK_DELETE, &payload, &error),
            }),
        }
    }

    pub async fn move_many(
        &self,
        ids: &[i64],
        folder_id: Option<i64>,
        origin: Origin,
    ) -> Result<Mutation<usize>> {
        let moved = self.repo().move_many(ids, folder_id)?;
        let destination = match folder_id {
            Some(folder) => match IdMapper::new(self.conn).remote_folder_id(folder)? {
                Some(remote_folder) => Some(remote_folder),
                // Destination unsynced; defer the whole batch
                None => return Ok(Mutation::local_only(moved)),
            },
            None => None,
        };
        self.push_batch(ids, BatchAction::Move, destination, moved, origin)
            .await
    }

    pub async fn set_archived_many(
        &self,
        ids: &[i64],
        archived: bool,
        origin: Origin,
    ) -> Result<Mutation<usize>> {
        let changed = self.repo().set_archived_many(ids, archived)?;
        let action = if archived {
            BatchAction::Archive
        } else {
            BatchAction::Unarchive
        };
        self.push_batch(ids, action, None, changed, origin).await
    }

    pub async fn delete_many(&self, ids: &[i64], origin: Origin) -> Result<Mutation<usize>> {
        // Collect remote ids before the rows disappear
        let mapper = IdMapper::new(self.conn);
        let mut remote_ids = Vec::new();
        for id in ids {
            match mapper.remote_link_id(*id)? {
                Some(remote_id) => remote_ids.push(remote_id),
                None => purge_queued_creates(self.conn, ops::LINK_CREATE, *id)?,
            }
        }
        let deleted = self.repo().delete_many(ids)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(deleted));
        };
        if remote_ids.is_empty() {
            return Ok(Mutation::local_only(deleted));
        }
        let payload = LinkBatch {
            link_ids: remote_ids,
            action: BatchAction::Delete,
            folder_id: None,
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        match remote.batch_links(&payload).await {
            Ok(()) => Ok(Mutation::synced(deleted)),
            Err(error) => Ok(Mutation {
                value: deleted,
                remote: queue_soft(self.conn, ops::LINK_BATCH, &payload, &error),
            }),
        }
    }

    async fn push_batch(
        &self,
        ids: &[i64],
        action: BatchAction,
        folder_id: Option<i64>,
        local_result: usize,
        origin: Origin,
    ) -> Result<Mutation<usize>> {
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(local_result));
        };
        let mapper = IdMapper::new(self.conn);
        let mut remote_ids = Vec::new();
        for id in ids {
            if let Some(remote_id) = mapper.remote_link_id(*id)? {
                remote_ids.push(remote_id);
            }
        }
        if remote_ids.is_empty() {
            return Ok(Mutation::local_only(local_result));
        }
        let payload = LinkBatch {
            link_ids: remote_ids,
            action,
            folder_id,
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        match remote.batch_links(&payload).await {
            Ok(()) => Ok(Mutation::synced(local_result)),
            Err(error) => Ok(Mutation {
                value: local_result,
                remote: queue_soft(self.conn, ops::LINK_BATCH, &payload, &error),
            }),
        }
    }

    async fn push_update(&self, link: Link, origin: Origin) -> Result<Mutation<Link>> {
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(link));
        };
        let Some(payload) = link_change_payload(self.conn, self.settings, &link)? else {
            return Ok(Mutation::local_only(link));
        };
        match remote.update_link(&payload).await {
            Ok(()) => Ok(Mutation::synced(link)),
            Err(error) => {
                let status = queue_soft(self.conn, ops::LINK_UPDATE, &payload, &error);
                Ok(Mutation {
                    value: link,
                    remote: status,
                })
            }
        }
    }
}

/// Panel and panel-folder operations with the local-first remote leg.
pub struct PanelService<'a, R> {
    conn: &'a Connection,
    settings: &'a SyncSettings,
    remote: Option<&'a R>,
}

impl<'a, R: SyncRemote> PanelService<'a, R> {
    #[must_use]
    pub const fn new(
        conn: &'a Connection,
        settings: &'a SyncSettings,
        remote: Option<&'a R>,
    ) -> Self {
        Self {
            conn,
            settings,
            remote,
        }
    }

    const fn repo(&self) -> SqlitePanelRepository<'a> {
        SqlitePanelRepository::new(self.conn)
    }

    fn remote_leg(&self, origin: Origin) -> Option<&'a R> {
        (origin.should_push() && self.settings.permits_push())
            .then_some(self.remote)
            .flatten()
    }

    pub async fn create(&self, name: &str, origin: Origin) -> Result<Mutation<Panel>> {
        let panel = self.repo().create(name)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(panel));
        };
        let payload = panel_push_payload(self.settings, &panel);
        match remote.create_panel(&payload).await {
            Ok(remote_id) => {
                self.repo().set_remote_id(panel.id, remote_id)?;
                Ok(Mutation::synced(Panel {
                    remote_id: Some(remote_id),
                    ..panel
                }))
            }
            Err(error) => {
                let status = queue_soft(self.conn, ops::PANEL_CREATE, &payload, &error);
                Ok(Mutation {
                    value: panel,
                    remote: status,
                })
            }
        }
    }

    pub async fn rename(&self, id: i64, name: &str, origin: Origin) -> Result<Mutation<Panel>> {
        let panel = self.repo().rename(id, name)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(panel));
        };
        let Some(panel_id) = panel.remote_id else {
            return Ok(Mutation::local_only(panel));
        };
        let payload = PanelChange {
            panel_id,
            name: panel.name.clone(),
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        match remote.update_panel(&payload).await {
            Ok(()) => Ok(Mutation::synced(panel)),
            Err(error) => {
                let status = queue_soft(self.conn, ops::PANEL_UPDATE, &payload, &error);
                Ok(Mutation {
                    value: panel,
                    remote: status,
                })
            }
        }
    }

    pub async fn delete(&self, id: i64, origin: Origin) -> Result<Mutation<()>> {
        let panel = self
            .repo()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("panel {id}")))?;
        self.repo().delete(id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(()));
        };
        let Some(remote_id) = panel.remote_id else {
            purge_queued_creates(self.conn, ops::PANEL_CREATE, id)?;
            return Ok(Mutation::local_only(()));
        };
        let payload = removal_payload(self.settings, remote_id);
        match remote.delete_panel(&payload).await {
            Ok(()) => Ok(Mutation::synced(())),
            Err(error) => Ok(Mutation {
                value: (),
                remote: queue_soft(self.conn, ops::PANEL_DELETE, &payload, &error),
            }),
        }
    }

    pub async fn pin_folder(
        &self,
        panel_id: i64,
        folder_id: i64,
        position: i64,
        origin: Origin,
    ) -> Result<Mutation<PanelFolder>> {
        let entry = self.repo().add_folder(panel_id, folder_id, position)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(entry));
        };
        let Some(payload) = panel_folder_push_payload(self.conn, self.settings, &entry)? else {
            return Ok(Mutation::local_only(entry));
        };
        match remote.create_panel_folder(&payload).await {
            Ok(remote_id) => {
                self.repo().set_panel_folder_remote_id(entry.id, remote_id)?;
                Ok(Mutation::synced(PanelFolder {
                    remote_id: Some(remote_id),
                    ..entry
                }))
            }
            Err(error) => {
                let status = queue_soft(self.conn, ops::PANEL_FOLDER_CREATE, &payload, &error);
                Ok(Mutation {
                    value: entry,
                    remote: status,
                })
            }
        }
    }

    pub async fn unpin_folder(&self, panel_folder_id: i64, origin: Origin) -> Result<Mutation<()>> {
        let remote_id = IdMapper::new(self.conn).remote_panel_folder_id(panel_folder_id)?;
        self.repo().remove_folder(panel_folder_id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(()));
        };
        let Some(remote_id) = remote_id else {
            purge_queued_creates(self.conn, ops::PANEL_FOLDER_CREATE, panel_folder_id)?;
            return Ok(Mutation::local_only(()));
        };
        let payload = removal_payload(self.settings, remote_id);
        match remote.delete_panel_folder(&payload).await {
            Ok(()) => Ok(Mutation::synced(())),
            Err(error) => Ok(Mutation {
                value: (),
                remote: queue_soft(self.conn, ops::PANEL_FOLDER_DELETE, &payload, &error),
            }),
        }
    }
}

/// Tag operations with the local-first remote leg.
pub struct TagService<'a, R> {
    conn: &'a Connection,
    settings: &'a SyncSettings,
    remote: Option<&'a R>,
}

impl<'a, R: SyncRemote> TagService<'a, R> {
    #[must_use]
    pub const fn new(
        conn: &'a Connection,
        settings: &'a SyncSettings,
        remote: Option<&'a R>,
    ) -> Self {
        Self {
            conn,
            settings,
            remote,
        }
    }

    const fn repo(&self) -> SqliteTagRepository<'a> {
        SqliteTagRepository::new(self.conn)
    }

    fn remote_leg(&self, origin: Origin) -> Option<&'a R> {
        (origin.should_push() && self.settings.permits_push())
            .then_some(self.remote)
            .flatten()
    }

    /// Attach a tag by name, creating it when needed.
    pub async fn attach(&self, link_id: i64, name: &str, origin: Origin) -> Result<Mutation<Tag>> {
        let mut tag = self.repo().get_or_create(name)?;
        self.repo().attach(link_id, tag.id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(tag));
        };

        // The tag itself may never have been pushed
        if tag.remote_id.is_none() {
            let payload = tag_push_payload(self.settings, &tag);
            match remote.create_tag(&payload).await {
                Ok(remote_id) => {
                    self.repo().set_remote_id(tag.id, remote_id)?;
                    tag.remote_id = Some(remote_id);
                }
                Err(error) => {
                    let status = queue_soft(self.conn, ops::TAG_CREATE, &payload, &error);
                    self.queue_pending_association(link_id, &tag, true)?;
                    return Ok(Mutation {
                        value: tag,
                        remote: status,
                    });
                }
            }
        }

        self.push_association(remote, link_id, &tag, true).await
    }

    /// Detach a tag from a link.
    pub async fn detach(&self, link_id: i64, tag_id: i64, origin: Origin) -> Result<Mutation<Tag>> {
        let tag = self
            .repo()
            .get(tag_id)?
            .ok_or_else(|| Error::NotFound(format!("tag {tag_id}")))?;
        self.repo().detach(link_id, tag_id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(tag));
        };
        if tag.remote_id.is_none() {
            purge_pending_associations(self.conn, Some(link_id), tag.id)?;
            return Ok(Mutation::local_only(tag));
        }
        self.push_association(remote, link_id, &tag, false).await
    }

    pub async fn rename(&self, id: i64, name: &str, origin: Origin) -> Result<Mutation<Tag>> {
        let tag = self.repo().rename(id, name)?;
        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(tag));
        };
        let Some(tag_id) = tag.remote_id else {
            return Ok(Mutation::local_only(tag));
        };
        let payload = TagChange {
            tag_id,
            name: tag.name.clone(),
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        match remote.update_tag(&payload).await {
            Ok(()) => Ok(Mutation::synced(tag)),
            Err(error) => {
                let status = queue_soft(self.conn, ops::TAG_UPDATE, &payload, &error);
                Ok(Mutation {
                    value: tag,
                    remote: status,
                })
            }
        }
    }

    pub async fn delete(&self, id: i64, origin: Origin) -> Result<Mutation<()>> {
        let tag = self
            .repo()
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("tag {id}")))?;
        self.repo().delete(id)?;

        let Some(remote) = self.remote_leg(origin) else {
            return Ok(Mutation::local_only(()));
        };
        let Some(remote_id) = tag.remote_id else {
            purge_queued_creates(self.conn, ops::TAG_CREATE, id)?;
            purge_pending_associations(self.conn, None, id)?;
            return Ok(Mutation::local_only(()));
        };
        let payload = removal_payload(self.settings, remote_id);
        match remote.delete_tag(&payload).await {
            Ok(()) => Ok(Mutation::synced(())),
            Err(error) => Ok(Mutation {
                value: (),
                remote: queue_soft(self.conn, ops::TAG_DELETE, &payload, &error),
            }),
        }
    }

    /// Queue the association behind a queued tag create.
    ///
    /// Only needed for a link that is already synced: an unsynced link
    /// re-sends its whole tag set when reconciliation first pushes it, but a
    /// synced link gets no later create, so the association must ride the
    /// queue and resolve the tag's server id at replay.
    fn queue_pending_association(&self, link_id: i64, tag: &Tag, attached: bool) -> Result<()> {
        if IdMapper::new(self.conn).remote_link_id(link_id)?.is_none() {
            return Ok(());
        }
        let pending = PendingLinkTag {
            link_id,
            tag_id: tag.id,
            attached,
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        let json = serde_json::to_string(&pending)?;
        SqliteQueueRepository::new(self.conn).enqueue(ops::LINK_TAG_SET_LOCAL, &json)?;
        Ok(())
    }

    async fn push_association(
        &self,
        remote: &R,
        link_id: i64,
        tag: &Tag,
        attached: bool,
    ) -> Result<Mutation<Tag>> {
        let mapper = IdMapper::new(self.conn);
        let (Some(remote_link), Some(remote_tag)) =
            (mapper.remote_link_id(link_id)?, tag.remote_id)
        else {
            // Link not pushed yet; reconciliation carries the association
            return Ok(Mutation::local_only(tag.clone()));
        };
        let payload = LinkTagChange {
            link_id: remote_link,
            tag_id: remote_tag,
            attached,
            event_timestamp: unix_timestamp_now(),
            correlation: self.settings.correlation.clone(),
        };
        match remote.set_link_tag(&payload).await {
            Ok(()) => Ok(Mutation::synced(tag.clone())),
            Err(error) => {
                let status = queue_soft(self.conn, ops::LINK_TAG_SET, &payload, &error);
                Ok(Mutation {
                    value: tag.clone(),
                    remote: status,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncType;
    use crate::db::Database;
    use crate::models::Correlation;
    use crate::sync::testing::FakeRemote;

    fn two_way_settings() -> SyncSettings {
        SyncSettings {
            server_url: Some("https://sync.example.com".to_string()),
            auth_token: Some("token".to_string()),
            sync_type: SyncType::TwoWay,
            last_synced_at: 0,
            correlation: Correlation::from_parts("me".to_string(), "amber-wren".to_string()),
        }
    }

    fn queue_len(conn: &Connection) -> usize {
        SqliteQueueRepository::new(conn).len().unwrap()
    }

    #[tokio::test]
    async fn create_folder_pushes_and_records_remote_id() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let remote = FakeRemote::default();
        let service = FolderService::new(db.connection(), &settings, Some(&remote));

        let mutation = service
            .create("Reading", "", None, Origin::Local)
            .await
            .unwrap();
        assert_eq!(mutation.remote, RemoteStatus::Synced);
        assert!(mutation.value.remote_id.is_some());
        assert_eq!(queue_len(db.connection()), 0);
    }

    #[tokio::test]
    async fn failing_push_keeps_local_row_and_queues_exactly_once() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let remote = FakeRemote::default();
        remote.fail_now();
        let service = FolderService::new(db.connection(), &settings, Some(&remote));

        let mutation = service
            .create("Reading", "", None, Origin::Local)
            .await
            .unwrap();

        // Local row committed regardless of the remote failure
        let stored = SqliteFolderRepository::new(db.connection())
            .get(mutation.value.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Reading");
        assert_eq!(stored.remote_id, None);
        assert!(matches!(mutation.remote, RemoteStatus::Queued(_)));
        assert_eq!(queue_len(db.connection()), 1);
    }

    #[tokio::test]
    async fn pull_only_sync_type_never_pushes_or_queues() {
        let db = Database::open_in_memory().unwrap();
        let settings = SyncSettings {
            sync_type: SyncType::ServerToClient,
            ..two_way_settings()
        };
        let remote = FakeRemote::default();
        let service = FolderService::new(db.connection(), &settings, Some(&remote));

        let mutation = service
            .create("Reading", "", None, Origin::Local)
            .await
            .unwrap();
        assert_eq!(mutation.remote, RemoteStatus::NotAttempted);
        assert!(remote.calls().is_empty());
        assert_eq!(queue_len(db.connection()), 0);
    }

    #[tokio::test]
    async fn echoed_mutations_are_never_pushed_back() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let remote = FakeRemote::default();
        let service = FolderService::new(db.connection(), &settings, Some(&remote));

        let mutation = service
            .create("From peer", "", None, Origin::RemoteEcho)
            .await
            .unwrap();
        assert_eq!(mutation.remote, RemoteStatus::NotAttempted);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn child_of_unsynced_parent_is_deferred() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let remote = FakeRemote::default();
        let service = FolderService::new(db.connection(), &settings, Some(&remote));

        let parent = SqliteFolderRepository::new(db.connection())
            .create("Parent", "", None)
            .unwrap();
        let mutation = service
            .create("Child", "", Some(parent.id), Origin::Local)
            .await
            .unwrap();

        // No call, no queue entry: reconciliation pushes parent-first later
        assert_eq!(mutation.remote, RemoteStatus::NotAttempted);
        assert!(remote.calls().is_empty());
        assert_eq!(queue_len(db.connection()), 0);
    }

    #[tokio::test]
    async fn offline_delete_of_synced_link_queues_removal() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let links = SqliteLinkRepository::new(db.connection());
        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(link.id, 41).unwrap();

        let remote = FakeRemote::default();
        remote.fail_now();
        let service = LinkService::new(db.connection(), &settings, Some(&remote));

        let mutation = service.delete(link.id, Origin::Local).await.unwrap();
        assert!(matches!(mutation.remote, RemoteStatus::Queued(_)));
        assert!(links.get(link.id).unwrap().is_none());

        let entries = SqliteQueueRepository::new(db.connection()).list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, ops::LINK_DELETE);

        // Connectivity returns; the drain replays the delete
        remote.recover();
        let summary = crate::sync::QueueDrain::new(db.connection(), &remote)
            .drain()
            .await
            .unwrap();
        assert!(summary.is_complete());
        assert_eq!(remote.calls().last().map(String::as_str), Some("delete_link"));
    }

    #[tokio::test]
    async fn deleting_never_synced_row_purges_queued_create() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let remote = FakeRemote::default();
        remote.fail_now();
        let service = LinkService::new(db.connection(), &settings, Some(&remote));

        let created = service
            .create(&LinkDraft::new("https://a.example", "A"), Origin::Local)
            .await
            .unwrap();
        assert_eq!(queue_len(db.connection()), 1);

        remote.recover();
        service.delete(created.value.id, Origin::Local).await.unwrap();
        // Nothing left for the server: the create never happened there
        assert_eq!(queue_len(db.connection()), 0);
    }

    #[tokio::test]
    async fn attach_pushes_tag_then_association() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let links = SqliteLinkRepository::new(db.connection());
        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(link.id, 41).unwrap();

        let remote = FakeRemote::default();
        let service = TagService::new(db.connection(), &settings, Some(&remote));

        let mutation = service.attach(link.id, "Rust", Origin::Local).await.unwrap();
        assert_eq!(mutation.remote, RemoteStatus::Synced);
        assert!(mutation.value.remote_id.is_some());
        assert_eq!(
            remote.calls(),
            vec!["create_tag".to_string(), "set_link_tag".to_string()]
        );
    }

    #[tokio::test]
    async fn offline_attach_of_new_tag_to_synced_link_converges_after_drain() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let links = SqliteLinkRepository::new(db.connection());
        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(link.id, 41).unwrap();

        let remote = FakeRemote::default();
        remote.fail_now();
        let service = TagService::new(db.connection(), &settings, Some(&remote));

        let mutation = service.attach(link.id, "rust", Origin::Local).await.unwrap();
        assert!(matches!(mutation.remote, RemoteStatus::Queued(_)));

        // The tag create queues with the association entry behind it
        let entries = SqliteQueueRepository::new(db.connection()).list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, ops::TAG_CREATE);
        assert_eq!(entries[1].operation, ops::LINK_TAG_SET_LOCAL);

        remote.recover();
        let summary = crate::sync::QueueDrain::new(db.connection(), &remote)
            .drain()
            .await
            .unwrap();
        assert!(summary.is_complete());

        let changes = remote.link_tag_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].link_id, 41);
        assert!(changes[0].attached);
        let stored = SqliteTagRepository::new(db.connection())
            .get(mutation.value.id)
            .unwrap()
            .unwrap();
        assert_eq!(Some(changes[0].tag_id), stored.remote_id);
    }

    #[tokio::test]
    async fn offline_attach_to_unsynced_link_defers_association() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let link = SqliteLinkRepository::new(db.connection())
            .create(&LinkDraft::new("https://a.example", "A"))
            .unwrap();

        let remote = FakeRemote::default();
        remote.fail_now();
        let service = TagService::new(db.connection(), &settings, Some(&remote));

        service.attach(link.id, "rust", Origin::Local).await.unwrap();

        // Reconciliation re-sends the tag set when it creates the link, so
        // only the tag create queues
        let entries = SqliteQueueRepository::new(db.connection()).list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, ops::TAG_CREATE);
    }

    #[tokio::test]
    async fn offline_detach_purges_queued_association() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let links = SqliteLinkRepository::new(db.connection());
        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(link.id, 41).unwrap();

        let remote = FakeRemote::default();
        remote.fail_now();
        let service = TagService::new(db.connection(), &settings, Some(&remote));

        let attached = service.attach(link.id, "rust", Origin::Local).await.unwrap();
        assert_eq!(queue_len(db.connection()), 2);

        service
            .detach(link.id, attached.value.id, Origin::Local)
            .await
            .unwrap();

        // Only the tag create remains; the server never sees the association
        let entries = SqliteQueueRepository::new(db.connection()).list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, ops::TAG_CREATE);

        remote.recover();
        crate::sync::QueueDrain::new(db.connection(), &remote)
            .drain()
            .await
            .unwrap();
        assert!(remote.link_tag_changes().is_empty());
    }

    #[tokio::test]
    async fn batch_move_pushes_only_synced_links() {
        let db = Database::open_in_memory().unwrap();
        let settings = two_way_settings();
        let links = SqliteLinkRepository::new(db.connection());
        let synced = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(synced.id, 41).unwrap();
        let unsynced = links.create(&LinkDraft::new("https://b.example", "B")).unwrap();

        let remote = FakeRemote::default();
        let service = LinkService::new(db.connection(), &settings, Some(&remote));

        let mutation = service
            .set_archived_many(&[synced.id, unsynced.id], true, Origin::Local)
            .await
            .unwrap();
        assert_eq!(mutation.value, 2);
        assert_eq!(mutation.remote, RemoteStatus::Synced);

        let batches = remote.link_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].link_ids, vec![41]);
        assert_eq!(batches[0].action, BatchAction::Archive);
    }
}
