//! Panel models

use serde::{Deserialize, Serialize};

/// A user-defined dashboard referencing a set of folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    /// Local identifier (SQLite rowid)
    pub id: i64,
    /// Server-assigned identifier, absent until synced
    pub remote_id: Option<i64>,
    /// Panel name
    pub name: String,
}

/// A folder pinned onto a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelFolder {
    /// Local identifier (SQLite rowid)
    pub id: i64,
    /// Server-assigned identifier, absent until synced
    pub remote_id: Option<i64>,
    /// Owning panel local id
    pub panel_id: i64,
    /// Referenced folder local id
    pub folder_id: i64,
    /// Ordering position within the panel
    pub position: i64,
}
