//! Folder model

use serde::{Deserialize, Serialize};

/// A folder in the bookmark hierarchy.
///
/// Carries the dual identity every syncable entity has: `id` is the local
/// rowid and authoritative for on-device relationships, `remote_id` is the
/// server-assigned identifier and `None` until the folder has been synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Local identifier (SQLite rowid)
    pub id: i64,
    /// Server-assigned identifier, absent until synced
    pub remote_id: Option<i64>,
    /// Folder name
    pub name: String,
    /// Free-form note
    pub note: String,
    /// Parent folder local id; `None` means root
    pub parent_id: Option<i64>,
    /// Archived flag (soft classification, not deletion)
    pub is_archived: bool,
    /// Last modification timestamp (Unix seconds)
    pub last_modified: i64,
}

impl Folder {
    /// Whether this folder has been pushed to the server at least once.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Whether this folder sits at the root of the hierarchy.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
