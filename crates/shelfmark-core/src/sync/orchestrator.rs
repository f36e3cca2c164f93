//! Full reconciliation passes: push what the server is missing, pull what
//! this device is missing.
//!
//! Push runs in dependency order (folders parent-first, then tags, links,
//! panels, panel pins) so referenced entities always have remote ids before
//! their dependents go out. Pull applies the server change set inside one
//! transaction and advances the watermark only after the commit; any failure
//! aborts the pass with the watermark untouched, so the next pass retries
//! the same window. Applying pulled data is idempotent, at-least-once
//! delivery is safe.

use rusqlite::Connection;

use crate::config::SyncSettings;
use crate::db::{
    FolderRepository, LinkRepository, PanelRepository, RemoteLinkFields, SqliteFolderRepository,
    SqliteLinkRepository, SqlitePanelRepository, SqliteSettingsRepository, SqliteTagRepository,
    TagRepository,
};
use crate::error::Result;
use crate::sync::coordinator::CancelFlag;
use crate::sync::mapping::IdMapper;
use crate::sync::remote::{
    ChangeSet, LinkTagChange, RemoteEvent, RemoteFolder, RemoteLink, RemoteLinkTag,
    RemotePanelFolder, SyncRemote,
};
use crate::sync::service::{
    folder_change_payload, folder_push_payload, link_change_payload, link_push_payload,
    panel_folder_push_payload, panel_push_payload, tag_push_payload,
};
use crate::util::unix_timestamp_now;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Local rows pushed to the server
    pub pushed: usize,
    /// Server changes applied locally
    pub pulled: usize,
    /// Whether the pass stopped early on a cancellation request
    pub cancelled: bool,
}

/// Runs reconciliation passes against a remote.
pub struct SyncOrchestrator<'a, R> {
    conn: &'a Connection,
    settings: &'a mut SyncSettings,
    remote: &'a R,
    cancel: CancelFlag,
}

impl<'a, R: SyncRemote> SyncOrchestrator<'a, R> {
    #[must_use]
    pub fn new(
        conn: &'a Connection,
        settings: &'a mut SyncSettings,
        remote: &'a R,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            conn,
            settings,
            remote,
            cancel,
        }
    }

    /// Run one full pass: push phase, then pull phase.
    pub async fn reconcile(&mut self) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        if self.settings.permits_push() {
            summary.pushed += self.push_folders().await?;
            if self.bail(&mut summary) {
                return Ok(summary);
            }
            summary.pushed += self.push_tags().await?;
            if self.bail(&mut summary) {
                return Ok(summary);
            }
            summary.pushed += self.push_links().await?;
            if self.bail(&mut summary) {
                return Ok(summary);
            }
            summary.pushed += self.push_panels().await?;
            if self.bail(&mut summary) {
                return Ok(summary);
            }
            summary.pushed += self.push_panel_folders().await?;
        }

        if self.bail(&mut summary) {
            return Ok(summary);
        }

        if self.settings.permits_pull() {
            let changes = self.remote.changes_since(self.settings.last_synced_at).await?;
            if self.bail(&mut summary) {
                return Ok(summary);
            }

            let tx = self.conn.unchecked_transaction()?;
            summary.pulled = self.apply_change_set(&changes)?;
            tx.commit()?;

            if changes.timestamp > self.settings.last_synced_at {
                let repo = SqliteSettingsRepository::new(self.conn);
                self.settings.advance_watermark(&repo, changes.timestamp)?;
            }
        }

        Ok(summary)
    }

    /// Apply one server-pushed event; returns `false` for suppressed echoes.
    pub fn apply_remote_event(&self, event: &RemoteEvent) -> Result<bool> {
        if self.settings.correlation.is_own(event.correlation()) {
            tracing::debug!("suppressed echo of our own mutation");
            return Ok(false);
        }

        match event {
            RemoteEvent::FolderUpserted(folder) => {
                self.apply_pulled_folder(folder, true)?;
            }
            RemoteEvent::FolderRemoved(removal) => {
                SqliteFolderRepository::new(self.conn).delete_by_remote_id(removal.id)?;
            }
            RemoteEvent::LinkUpserted(link) => self.apply_pulled_link(link)?,
            RemoteEvent::LinkRemoved(removal) => {
                SqliteLinkRepository::new(self.conn).delete_by_remote_id(removal.id)?;
            }
            RemoteEvent::PanelUpserted(panel) => {
                SqlitePanelRepository::new(self.conn).upsert_remote(panel.id, &panel.name)?;
            }
            RemoteEvent::PanelRemoved(removal) => {
                SqlitePanelRepository::new(self.conn).delete_by_remote_id(removal.id)?;
            }
            RemoteEvent::PanelFolderUpserted(entry) => {
                self.apply_pulled_panel_folder(entry)?;
            }
            RemoteEvent::PanelFolderRemoved(removal) => {
                SqlitePanelRepository::new(self.conn)
                    .delete_panel_folder_by_remote_id(removal.id)?;
            }
            RemoteEvent::TagUpserted(tag) => {
                SqliteTagRepository::new(self.conn).upsert_remote(tag.id, &tag.name)?;
            }
            RemoteEvent::TagRemoved(removal) => {
                SqliteTagRepository::new(self.conn).delete_by_remote_id(removal.id)?;
            }
            RemoteEvent::LinkTagChanged(link_tag) => self.apply_pulled_link_tag(link_tag)?,
        }
        Ok(true)
    }

    fn bail(&self, summary: &mut ReconcileSummary) -> bool {
        if self.cancel.is_cancelled() {
            tracing::info!("sync pass cancelled, watermark untouched");
            summary.cancelled = true;
            return true;
        }
        false
    }

    async fn push_folders(&self) -> Result<usize> {
        let repo = SqliteFolderRepository::new(self.conn);
        let mut remaining = repo.list_unsynced(self.settings.last_synced_at)?;
        let mut pushed = 0;

        // Parents gain remote ids as they go out, unlocking their children
        // on the next round.
        while !remaining.is_empty() {
            let mut deferred = Vec::new();
            let mut progressed = false;
            for folder in remaining {
                if self.push_one_folder(&folder).await? {
                    pushed += 1;
                    progressed = true;
                } else {
                    deferred.push(folder);
                }
            }
            if !progressed {
                tracing::warn!(
                    "{} folders left unpushed, parent chain unresolved",
                    deferred.len()
                );
                break;
            }
            remaining = deferred;
        }
        Ok(pushed)
    }

    async fn push_one_folder(&self, folder: &crate::models::Folder) -> Result<bool> {
        let repo = SqliteFolderRepository::new(self.conn);
        if folder.remote_id.is_none() {
            let Some(payload) = folder_push_payload(self.conn, self.settings, folder)? else {
                return Ok(false);
            };
            let remote_id = self.remote.create_folder(&payload).await?;
            repo.set_remote_id(folder.id, remote_id)?;
        } else {
            let Some(payload) = folder_change_payload(self.conn, self.settings, folder)? else {
                return Ok(false);
            };
            self.remote.update_folder(&payload).await?;
        }
        Ok(true)
    }

    async fn push_tags(&self) -> Result<usize> {
        let repo = SqliteTagRepository::new(self.conn);
        let mut pushed = 0;
        for tag in repo.list_unsynced()? {
            let payload = tag_push_payload(self.settings, &tag);
            let remote_id = self.remote.create_tag(&payload).await?;
            repo.set_remote_id(tag.id, remote_id)?;
            pushed += 1;
        }
        Ok(pushed)
    }

    async fn push_links(&self) -> Result<usize> {
        let repo = SqliteLinkRepository::new(self.conn);
        let tags = SqliteTagRepository::new(self.conn);
        let mut pushed = 0;

        for link in repo.list_unsynced(self.settings.last_synced_at)? {
            let newly_created = link.remote_id.is_none();
            let remote_link_id = if newly_created {
                let Some(payload) = link_push_payload(self.conn, self.settings, &link)? else {
                    tracing::warn!("link {} references an unpushed folder, skipped", link.id);
                    continue;
                };
                let remote_id = self.remote.create_link(&payload).await?;
                repo.set_remote_id(link.id, remote_id)?;
                remote_id
            } else {
                let Some(payload) = link_change_payload(self.conn, self.settings, &link)? else {
                    tracing::warn!("link {} references an unpushed folder, skipped", link.id);
                    continue;
                };
                self.remote.update_link(&payload).await?;
                payload.link_id
            };
            pushed += 1;

            // Associations ride along with a freshly pushed link
            if newly_created {
                for tag in tags.tags_of(link.id)? {
                    let Some(tag_id) = tag.remote_id else { continue };
                    let payload = LinkTagChange {
                        link_id: remote_link_id,
                        tag_id,
                        attached: true,
                        event_timestamp: unix_timestamp_now(),
                        correlation: self.settings.correlation.clone(),
                    };
                    self.remote.set_link_tag(&payload).await?;
                }
            }
        }
        Ok(pushed)
    }

    async fn push_panels(&self) -> Result<usize> {
        let repo = SqlitePanelRepository::new(self.conn);
        let mut pushed = 0;
        for panel in repo.list_unsynced()? {
            let payload = panel_push_payload(self.settings, &panel);
            let remote_id = self.remote.create_panel(&payload).await?;
            repo.set_remote_id(panel.id, remote_id)?;
            pushed += 1;
        }
        Ok(pushed)
    }

    async fn push_panel_folders(&self) -> Result<usize> {
        let repo = SqlitePanelRepository::new(self.conn);
        let mut pushed = 0;
        for entry in repo.list_unsynced_panel_folders()? {
            let Some(payload) = panel_folder_push_payload(self.conn, self.settings, &entry)? else {
                tracing::warn!("panel pin {} references unpushed rows, skipped", entry.id);
                continue;
            };
            let remote_id = self.remote.create_panel_folder(&payload).await?;
            repo.set_panel_folder_remote_id(entry.id, remote_id)?;
            pushed += 1;
        }
        Ok(pushed)
    }

    fn apply_change_set(&self, changes: &ChangeSet) -> Result<usize> {
        let mut applied = 0;

        applied += self.apply_pulled_folders(&changes.folders)?;

        let tags = SqliteTagRepository::new(self.conn);
        for tag in &changes.tags {
            if self.settings.correlation.is_own(&tag.correlation) {
                continue;
            }
            tags.upsert_remote(tag.id, &tag.name)?;
            applied += 1;
        }

        for link in &changes.links {
            if self.settings.correlation.is_own(&link.correlation) {
                continue;
            }
            self.apply_pulled_link(link)?;
            applied += 1;
        }

        for link_tag in &changes.link_tags {
            if self.settings.correlation.is_own(&link_tag.correlation) {
                continue;
            }
            self.apply_pulled_link_tag(link_tag)?;
            applied += 1;
        }

        let panels = SqlitePanelRepository::new(self.conn);
        for panel in &changes.panels {
            if self.settings.correlation.is_own(&panel.correlation) {
                continue;
            }
            panels.upsert_remote(panel.id, &panel.name)?;
            applied += 1;
        }

        for entry in &changes.panel_folders {
            if self.settings.correlation.is_own(&entry.correlation) {
                continue;
            }
            self.apply_pulled_panel_folder(entry)?;
            applied += 1;
        }

        applied += self.apply_tombstones(changes)?;
        Ok(applied)
    }

    fn apply_pulled_folders(&self, folders: &[RemoteFolder]) -> Result<usize> {
        let mut remaining: Vec<&RemoteFolder> = folders
            .iter()
            .filter(|folder| !self.settings.correlation.is_own(&folder.correlation))
            .collect();
        let mut applied = 0;

        while !remaining.is_empty() {
            let mut deferred = Vec::new();
            let mut progressed = false;
            for folder in remaining {
                if self.apply_pulled_folder(folder, false)? {
                    applied += 1;
                    progressed = true;
                } else {
                    deferred.push(folder);
                }
            }
            if !progressed {
                // Parent never arrived; root the stragglers rather than drop them
                for folder in deferred {
                    tracing::warn!(
                        "pulled folder {} has an unknown parent, applying at root",
                        folder.id
                    );
                    self.apply_pulled_folder(folder, true)?;
                    applied += 1;
                }
                break;
            }
            remaining = deferred;
        }
        Ok(applied)
    }

    /// Apply one pulled folder; `force_root` falls back to root placement
    /// when the parent cannot be mapped.
    fn apply_pulled_folder(&self, folder: &RemoteFolder, force_root: bool) -> Result<bool> {
        let repo = SqliteFolderRepository::new(self.conn);
        let parent_id = match folder.parent_folder_id {
            Some(remote_parent) => match IdMapper::new(self.conn).local_folder_id(remote_parent)? {
                Some(local) => Some(local),
                None if force_root => None,
                None => return Ok(false),
            },
            None => None,
        };

        self.warn_on_conflict(
            "folder",
            repo.get_by_remote_id(folder.id)?
                .map(|existing| existing.last_modified),
        );
        repo.upsert_remote(
            folder.id,
            &folder.name,
            &folder.note,
            parent_id,
            folder.is_archived,
            folder.event_timestamp,
        )?;
        Ok(true)
    }

    fn apply_pulled_link(&self, link: &RemoteLink) -> Result<()> {
        let repo = SqliteLinkRepository::new(self.conn);
        let folder_id = match link.folder_id {
            Some(remote_folder) => {
                let local = IdMapper::new(self.conn).local_folder_id(remote_folder)?;
                if local.is_none() {
                    tracing::warn!("pulled link {} has an unknown folder, unfiled", link.id);
                }
                local
            }
            None => None,
        };

        self.warn_on_conflict(
            "link",
            repo.get_by_remote_id(link.id)?
                .map(|existing| existing.last_modified),
        );
        repo.upsert_remote(
            link.id,
            &RemoteLinkFields {
                url: link.url.clone(),
                title: link.title.clone(),
                note: link.note.clone(),
                host: link.host.clone(),
                user_agent: link.user_agent.clone(),
                media_type: link.media_type,
                folder_id,
                is_important: link.is_important,
                is_archived: link.is_archived,
                last_modified: link.event_timestamp,
            },
        )?;
        Ok(())
    }

    fn apply_pulled_link_tag(&self, link_tag: &RemoteLinkTag) -> Result<()> {
        let mapper = IdMapper::new(self.conn);
        let (Some(link_id), Some(tag_id)) = (
            mapper.local_link_id(link_tag.link_id)?,
            mapper.local_tag_id(link_tag.tag_id)?,
        ) else {
            tracing::warn!("pulled tag association references unknown rows, skipped");
            return Ok(());
        };
        let tags = SqliteTagRepository::new(self.conn);
        if link_tag.attached {
            tags.attach(link_id, tag_id)?;
        } else {
            tags.detach(link_id, tag_id)?;
        }
        Ok(())
    }

    fn apply_pulled_panel_folder(&self, entry: &RemotePanelFolder) -> Result<()> {
        let mapper = IdMapper::new(self.conn);
        let (Some(panel_id), Some(folder_id)) = (
            mapper.local_panel_id(entry.panel_id)?,
            mapper.local_folder_id(entry.folder_id)?,
        ) else {
            tracing::warn!("pulled panel pin {} references unknown rows, skipped", entry.id);
            return Ok(());
        };
        SqlitePanelRepository::new(self.conn).upsert_remote_panel_folder(
            entry.id,
            panel_id,
            folder_id,
            entry.position,
        )?;
        Ok(())
    }

    fn apply_tombstones(&self, changes: &ChangeSet) -> Result<usize> {
        let panels = SqlitePanelRepository::new(self.conn);
        let links = SqliteLinkRepository::new(self.conn);
        let tags = SqliteTagRepository::new(self.conn);
        let folders = SqliteFolderRepository::new(self.conn);
        let mut removed = 0;

        for id in &changes.tombstones.panel_folders {
            removed += usize::from(panels.delete_panel_folder_by_remote_id(*id)?);
        }
        for id in &changes.tombstones.links {
            removed += usize::from(links.delete_by_remote_id(*id)?);
        }
        for id in &changes.tombstones.panels {
            removed += usize::from(panels.delete_by_remote_id(*id)?);
        }
        for id in &changes.tombstones.tags {
            removed += usize::from(tags.delete_by_remote_id(*id)?);
        }
        for id in &changes.tombstones.folders {
            removed += usize::from(folders.delete_by_remote_id(*id)?);
        }
        Ok(removed)
    }

    fn warn_on_conflict(&self, kind: &str, existing_last_modified: Option<i64>) {
        if let Some(last_modified) = existing_last_modified {
            if last_modified > self.settings.last_synced_at {
                tracing::warn!(
                    "{kind} modified locally since the last pass, overwriting with server state"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncType;
    use crate::db::Database;
    use crate::models::{Correlation, LinkDraft, MediaType};
    use crate::sync::remote::{RemotePanel, RemoteTag};
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

    fn peer() -> Correlation {
        Correlation::from_parts("peer".to_string(), "dusky-loon".to_string())
    }

    fn remote_folder(id: i64, name: &str, parent: Option<i64>) -> RemoteFolder {
        RemoteFolder {
            id,
            name: name.to_string(),
            note: String::new(),
            parent_folder_id: parent,
            is_archived: false,
            event_timestamp: 500,
            correlation: peer(),
        }
    }

    fn remote_link(id: i64, folder_id: Option<i64>) -> RemoteLink {
        RemoteLink {
            id,
            url: "https://pulled.example".to_string(),
            title: "Pulled".to_string(),
            note: String::new(),
            host: "pulled.example".to_string(),
            user_agent: None,
            media_type: MediaType::Url,
            folder_id,
            is_important: false,
            is_archived: false,
            event_timestamp: 500,
            correlation: peer(),
        }
    }

    #[tokio::test]
    async fn push_phase_orders_folders_parent_first() {
        let db = Database::open_in_memory().unwrap();
        let folders = SqliteFolderRepository::new(db.connection());
        let root = folders.create("Root", "", None).unwrap();
        let child = folders.create("Child", "", Some(root.id)).unwrap();
        let grandchild = folders.create("Grandchild", "", Some(child.id)).unwrap();

        let mut settings = two_way_settings();
        let remote = FakeRemote::default();
        let summary = SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        assert_eq!(summary.pushed, 3);
        for folder in [root.id, child.id, grandchild.id] {
            assert!(folders.get(folder).unwrap().unwrap().remote_id.is_some());
        }

        let pushes = remote.folder_pushes();
        assert_eq!(pushes.len(), 3);
        assert_eq!(pushes[0].name, "Root");
        assert_eq!(pushes[0].parent_folder_id, None);
        assert_eq!(pushes[1].name, "Child");
        assert!(pushes[1].parent_folder_id.is_some());
        assert_eq!(pushes[2].name, "Grandchild");
        assert!(pushes[2].parent_folder_id.is_some());
    }

    #[tokio::test]
    async fn push_phase_updates_rows_modified_after_watermark() {
        let db = Database::open_in_memory().unwrap();
        let folders = SqliteFolderRepository::new(db.connection());
        let folder = folders.create("Reading", "", None).unwrap();
        folders.set_remote_id(folder.id, 40).unwrap();

        let mut settings = two_way_settings();
        let remote = FakeRemote::default();
        SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        assert!(remote.calls().contains(&"update_folder".to_string()));
    }

    #[tokio::test]
    async fn pull_applies_changes_and_advances_watermark() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = two_way_settings();
        let remote = FakeRemote::default();

        let mut changes = ChangeSet {
            timestamp: 900,
            ..ChangeSet::default()
        };
        changes.folders.push(remote_folder(10, "Reading", None));
        changes.folders.push(remote_folder(11, "Deep", Some(10)));
        changes.links.push(remote_link(20, Some(11)));
        changes.tags.push(RemoteTag {
            id: 30,
            name: "rust".to_string(),
            correlation: peer(),
        });
        remote.set_changes(changes);

        let summary = SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        assert_eq!(summary.pulled, 4);
        assert_eq!(settings.last_synced_at, 900);

        let folders = SqliteFolderRepository::new(db.connection());
        let parent = folders.get_by_remote_id(10).unwrap().unwrap();
        let nested = folders.get_by_remote_id(11).unwrap().unwrap();
        assert_eq!(nested.parent_id, Some(parent.id));

        let link = SqliteLinkRepository::new(db.connection())
            .get_by_remote_id(20)
            .unwrap()
            .unwrap();
        assert_eq!(link.folder_id, Some(nested.id));
    }

    #[tokio::test]
    async fn own_correlation_records_are_suppressed() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = two_way_settings();
        let remote = FakeRemote::default();

        let mut echoed = remote_folder(10, "Echo", None);
        echoed.correlation = settings.correlation.clone();
        let changes = ChangeSet {
            timestamp: 900,
            folders: vec![echoed],
            ..ChangeSet::default()
        };
        remote.set_changes(changes);

        let summary = SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        assert_eq!(summary.pulled, 0);
        assert!(SqliteFolderRepository::new(db.connection())
            .get_by_remote_id(10)
            .unwrap()
            .is_none());
        // The watermark still advances: the pass completed
        assert_eq!(settings.last_synced_at, 900);
    }

    #[tokio::test]
    async fn failed_pull_never_advances_watermark() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = two_way_settings();
        let remote = FakeRemote::default();
        remote.fail_now();

        let result = SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await;
        assert!(result.is_err());
        assert_eq!(settings.last_synced_at, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_the_pass_before_pull() {
        let db = Database::open_in_memory().unwrap();
        SqliteFolderRepository::new(db.connection())
            .create("Reading", "", None)
            .unwrap();

        let mut settings = two_way_settings();
        let remote = FakeRemote::default();
        remote.set_changes(ChangeSet {
            timestamp: 900,
            ..ChangeSet::default()
        });

        let cancel = CancelFlag::new();
        cancel.cancel();
        let summary = SyncOrchestrator::new(db.connection(), &mut settings, &remote, cancel)
            .reconcile()
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(settings.last_synced_at, 0);
        assert!(!remote.calls().contains(&"changes_since".to_string()));
    }

    #[tokio::test]
    async fn tombstones_remove_local_rows() {
        let db = Database::open_in_memory().unwrap();
        let folders = SqliteFolderRepository::new(db.connection());
        let links = SqliteLinkRepository::new(db.connection());
        let folder = folders.create("Doomed", "", None).unwrap();
        folders.set_remote_id(folder.id, 10).unwrap();
        let link = links.create(&LinkDraft::new("https://a.example", "A")).unwrap();
        links.set_remote_id(link.id, 20).unwrap();

        let mut settings = two_way_settings();
        // Watermark ahead of the rows so the push phase leaves them alone
        settings.last_synced_at = i64::MAX - 1;
        let remote = FakeRemote::default();
        let mut changes = ChangeSet {
            timestamp: i64::MAX,
            ..ChangeSet::default()
        };
        changes.tombstones.folders.push(10);
        changes.tombstones.links.push(20);
        remote.set_changes(changes);

        let summary = SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        assert_eq!(summary.pulled, 2);
        assert!(folders.get(folder.id).unwrap().is_none());
        assert!(links.get(link.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_events_apply_and_suppress_echoes() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = two_way_settings();
        let remote = FakeRemote::default();
        let orchestrator =
            SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new());

        let applied = orchestrator
            .apply_remote_event(&RemoteEvent::FolderUpserted(remote_folder(10, "Live", None)))
            .unwrap();
        assert!(applied);
        let folders = SqliteFolderRepository::new(db.connection());
        assert!(folders.get_by_remote_id(10).unwrap().is_some());

        let mut echoed = remote_folder(11, "Echo", None);
        echoed.correlation =
            Correlation::from_parts("me".to_string(), "amber-wren".to_string());
        let applied = orchestrator
            .apply_remote_event(&RemoteEvent::FolderUpserted(echoed))
            .unwrap();
        assert!(!applied);
        assert!(folders.get_by_remote_id(11).unwrap().is_none());

        let applied = orchestrator
            .apply_remote_event(&RemoteEvent::FolderRemoved(crate::sync::remote::Removal {
                id: 10,
                event_timestamp: 600,
                correlation: peer(),
            }))
            .unwrap();
        assert!(applied);
        assert!(folders.get_by_remote_id(10).unwrap().is_none());
    }

    #[tokio::test]
    async fn pulled_panel_pins_map_references_to_local_rows() {
        let db = Database::open_in_memory().unwrap();
        let mut settings = two_way_settings();
        let remote = FakeRemote::default();

        let mut changes = ChangeSet {
            timestamp: 900,
            ..ChangeSet::default()
        };
        changes.folders.push(remote_folder(10, "Pinned", None));
        changes.panels.push(RemotePanel {
            id: 50,
            name: "Home".to_string(),
            correlation: peer(),
        });
        changes.panel_folders.push(RemotePanelFolder {
            id: 60,
            panel_id: 50,
            folder_id: 10,
            position: 0,
            correlation: peer(),
        });
        remote.set_changes(changes);

        SyncOrchestrator::new(db.connection(), &mut settings, &remote, CancelFlag::new())
            .reconcile()
            .await
            .unwrap();

        let panels = SqlitePanelRepository::new(db.connection());
        let panel = panels.get_by_remote_id(50).unwrap().unwrap();
        let pins = panels.folders_of(panel.id).unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].remote_id, Some(60));
    }
}
