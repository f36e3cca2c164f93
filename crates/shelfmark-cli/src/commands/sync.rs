use std::path::Path;

use shelfmark_core::sync::{QueueDrain, SyncCoordinator, SyncOrchestrator};

use crate::commands::common::{load_settings, open_database, open_remote};
use crate::error::CliError;

pub async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let mut settings = load_settings(&db)?;
    let Some(remote) = open_remote(&settings)? else {
        return Err(CliError::SyncNotConfigured);
    };

    let coordinator = SyncCoordinator::new();
    let cancel = coordinator.cancel_flag().clone();
    let summary = coordinator
        .run(async {
            // Replay stranded operations before the full pass
            let drained = QueueDrain::new(db.connection(), &remote).drain().await?;
            if drained.replayed > 0 || drained.dropped > 0 {
                println!(
                    "Queue: {} replayed, {} dropped, {} remaining",
                    drained.replayed, drained.dropped, drained.remaining
                );
            }
            // Queued entries must land before any further pushes
            if let Some(error) = drained.error {
                return Err(shelfmark_core::Error::Remote(format!(
                    "queue replay stopped with {} entries remaining: {error}",
                    drained.remaining
                )));
            }

            SyncOrchestrator::new(db.connection(), &mut settings, &remote, cancel)
                .reconcile()
                .await
        })
        .await?;

    println!(
        "Sync completed: {} pushed, {} pulled",
        summary.pushed, summary.pulled
    );
    Ok(())
}
