//! Serialization of sync passes.
//!
//! Queue drains and reconciliation passes must never interleave: both walk
//! shared watermark and queue state. The coordinator hands out one slot at a
//! time; callers run their whole pass inside [`SyncCoordinator::run`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for a running sync pass.
///
/// Checked between phases, never mid-write: a cancelled pass leaves the
/// database consistent and the watermark untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the current pass.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before a new pass.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Hands out the single sync slot.
#[derive(Debug, Default)]
pub struct SyncCoordinator {
    slot: tokio::sync::Mutex<()>,
    cancel: CancelFlag,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag checked by passes running under this coordinator.
    #[must_use]
    pub const fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Request cancellation of the pass currently holding the slot.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run a pass holding the sync slot; concurrent callers wait their turn.
    pub async fn run<F, T>(&self, pass: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = self.slot.lock().await;
        self.cancel.reset();
        pass.await
    }
}
