//! Tag models

use serde::{Deserialize, Serialize};

/// A tag for organizing links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Local identifier (SQLite rowid)
    pub id: i64,
    /// Server-assigned identifier, absent until synced
    pub remote_id: Option<i64>,
    /// Tag name (stored lowercase, unique case-insensitively)
    pub name: String,
}

/// Link-tag association row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTag {
    /// Local link id
    pub link_id: i64,
    /// Local tag id
    pub tag_id: i64,
}
