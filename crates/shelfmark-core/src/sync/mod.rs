//! Local-first synchronization.
//!
//! Local `SQLite` state is authoritative; the server leg of every mutation is
//! best-effort. Failed pushes land in a persisted queue ([`QueueDrain`]
//! replays them), full passes are run by [`SyncOrchestrator`], and
//! [`SyncCoordinator`] makes sure only one pass runs at a time.

mod coordinator;
mod mapping;
mod orchestrator;
mod outcome;
mod queue;
mod remote;
mod service;

pub use coordinator::{CancelFlag, SyncCoordinator};
pub use mapping::IdMapper;
pub use orchestrator::{ReconcileSummary, SyncOrchestrator};
pub use outcome::{Mutation, Origin, RemoteStatus};
pub use queue::{ops, DrainSummary, PendingLinkTag, QueueDrain};
pub use remote::{
    BatchAction, ChangeSet, FolderChange, FolderPush, HttpRemote, LinkBatch, LinkChange, LinkPush,
    LinkTagChange, PanelChange, PanelFolderPush, PanelPush, Removal, RemoteEvent, RemoteFolder,
    RemoteLink, RemoteLinkTag, RemotePanel, RemotePanelFolder, RemoteTag, SyncRemote, TagChange,
    TagPush, Tombstones,
};
pub use service::{FolderService, LinkService, PanelService, TagService};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`SyncRemote`] double for sync tests.

    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use crate::error::{Error, Result};

    use super::remote::{
        ChangeSet, FolderChange, FolderPush, LinkBatch, LinkChange, LinkPush, LinkTagChange,
        PanelChange, PanelFolderPush, PanelPush, Removal, SyncRemote, TagChange, TagPush,
    };

    /// Fake server: records calls, assigns ids, and can simulate outages.
    ///
    /// Mutations are applied before a simulated failure is reported, which
    /// models a lost response; creates dedupe on (correlation, local id)
    /// exactly like the real server, so replay tests exercise idempotency.
    #[derive(Default)]
    pub struct FakeRemote {
        calls: RefCell<Vec<String>>,
        fail_all: Cell<bool>,
        fail_remaining: Cell<u32>,
        next_id: Cell<i64>,
        created: RefCell<HashMap<(&'static str, String, i64), i64>>,
        folder_pushes: RefCell<Vec<FolderPush>>,
        link_batches: RefCell<Vec<LinkBatch>>,
        link_tag_changes: RefCell<Vec<LinkTagChange>>,
        changes: RefCell<ChangeSet>,
    }

    impl FakeRemote {
        /// Fail every call until [`Self::recover`].
        pub fn fail_now(&self) {
            self.fail_all.set(true);
        }

        /// Stop failing.
        pub fn recover(&self) {
            self.fail_all.set(false);
            self.fail_remaining.set(0);
        }

        /// Fail only the next `count` calls.
        pub fn fail_times(&self, count: u32) {
            self.fail_remaining.set(count);
        }

        /// What [`Self::changes_since`] returns.
        pub fn set_changes(&self, changes: ChangeSet) {
            *self.changes.borrow_mut() = changes;
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub fn folder_pushes(&self) -> Vec<FolderPush> {
            self.folder_pushes.borrow().clone()
        }

        pub fn link_batches(&self) -> Vec<LinkBatch> {
            self.link_batches.borrow().clone()
        }

        pub fn link_tag_changes(&self) -> Vec<LinkTagChange> {
            self.link_tag_changes.borrow().clone()
        }

        pub fn created_folder_count(&self) -> usize {
            self.created
                .borrow()
                .keys()
                .filter(|(family, _, _)| *family == "folder")
                .count()
        }

        fn record(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }

        fn maybe_fail(&self) -> Result<()> {
            if self.fail_all.get() {
                return Err(Error::Remote("simulated outage".to_string()));
            }
            let remaining = self.fail_remaining.get();
            if remaining > 0 {
                self.fail_remaining.set(remaining - 1);
                return Err(Error::Remote("simulated outage".to_string()));
            }
            Ok(())
        }

        fn create(&self, family: &'static str, correlation: &str, local_id: i64) -> Result<i64> {
            let mut created = self.created.borrow_mut();
            let assigned = *created
                .entry((family, correlation.to_string(), local_id))
                .or_insert_with(|| {
                    let id = self.next_id.get() + 1000;
                    self.next_id.set(id + 1);
                    id
                });
            drop(created);
            self.maybe_fail()?;
            Ok(assigned)
        }
    }

    impl SyncRemote for FakeRemote {
        async fn create_folder(&self, push: &FolderPush) -> Result<i64> {
            self.record("create_folder");
            self.folder_pushes.borrow_mut().push(push.clone());
            self.create("folder", &push.correlation.id, push.local_id)
        }

        async fn update_folder(&self, _change: &FolderChange) -> Result<()> {
            self.record("update_folder");
            self.maybe_fail()
        }

        async fn delete_folder(&self, _removal: &Removal) -> Result<()> {
            self.record("delete_folder");
            self.maybe_fail()
        }

        async fn create_link(&self, push: &LinkPush) -> Result<i64> {
            self.record("create_link");
            self.create("link", &push.correlation.id, push.local_id)
        }

        async fn update_link(&self, _change: &LinkChange) -> Result<()> {
            self.record("update_link");
            self.maybe_fail()
        }

        async fn delete_link(&self, _removal: &Removal) -> Result<()> {
            self.record("delete_link");
            self.maybe_fail()
        }

        async fn batch_links(&self, batch: &LinkBatch) -> Result<()> {
            self.record("batch_links");
            self.link_batches.borrow_mut().push(batch.clone());
            self.maybe_fail()
        }

        async fn create_panel(&self, push: &PanelPush) -> Result<i64> {
            self.record("create_panel");
            self.create("panel", &push.correlation.id, push.local_id)
        }

        async fn update_panel(&self, _change: &PanelChange) -> Result<()> {
            self.record("update_panel");
            self.maybe_fail()
        }

        async fn delete_panel(&self, _removal: &Removal) -> Result<()> {
            self.record("delete_panel");
            self.maybe_fail()
        }

        async fn create_panel_folder(&self, push: &PanelFolderPush) -> Result<i64> {
            self.record("create_panel_folder");
            self.create("panel_folder", &push.correlation.id, push.local_id)
        }

        async fn delete_panel_folder(&self, _removal: &Removal) -> Result<()> {
            self.record("delete_panel_folder");
            self.maybe_fail()
        }

        async fn create_tag(&self, push: &TagPush) -> Result<i64> {
            self.record("create_tag");
            self.create("tag", &push.correlation.id, push.local_id)
        }

        async fn update_tag(&self, _change: &TagChange) -> Result<()> {
            self.record("update_tag");
            self.maybe_fail()
        }

        async fn delete_tag(&self, _removal: &Removal) -> Result<()> {
            self.record("delete_tag");
            self.maybe_fail()
        }

        async fn set_link_tag(&self, change: &LinkTagChange) -> Result<()> {
            self.record("set_link_tag");
            self.link_tag_changes.borrow_mut().push(change.clone());
            self.maybe_fail()
        }

        async fn changes_since(&self, _since: i64) -> Result<ChangeSet> {
            self.record("changes_since");
            self.maybe_fail()?;
            Ok(self.changes.borrow().clone())
        }
    }
}
