//! Link model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Media classification of a saved link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Regular web page
    #[default]
    Url,
    /// Direct image link
    Image,
    /// Direct video link
    Video,
    /// Document (PDF and similar)
    Document,
}

impl MediaType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(Self::Url),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "document" => Ok(Self::Document),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// A saved link.
///
/// Soft-classified via `is_important` / `is_archived` flags rather than
/// moved or deleted; `folder_id` is a nullable local foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Local identifier (SQLite rowid)
    pub id: i64,
    /// Server-assigned identifier, absent until synced
    pub remote_id: Option<i64>,
    /// Target URL
    pub url: String,
    /// Display title
    pub title: String,
    /// Free-form note
    pub note: String,
    /// Host extracted from the URL at save time
    pub host: String,
    /// User agent to fetch the page with, when the default won't do
    pub user_agent: Option<String>,
    /// Media classification
    pub media_type: MediaType,
    /// Owning folder local id; `None` means unfiled
    pub folder_id: Option<i64>,
    /// Marked-important flag
    pub is_important: bool,
    /// Archived flag
    pub is_archived: bool,
    /// Last modification timestamp (Unix seconds)
    pub last_modified: i64,
}

impl Link {
    /// Whether this link has been pushed to the server at least once.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Fields for creating a new link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDraft {
    pub url: String,
    pub title: String,
    pub note: String,
    pub user_agent: Option<String>,
    pub media_type: MediaType,
    pub folder_id: Option<i64>,
}

impl LinkDraft {
    /// Create a draft for a plain URL save.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Place the link in a folder.
    #[must_use]
    pub const fn in_folder(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_round_trips_through_str() {
        for media_type in [
            MediaType::Url,
            MediaType::Image,
            MediaType::Video,
            MediaType::Document,
        ] {
            assert_eq!(media_type.as_str().parse::<MediaType>(), Ok(media_type));
        }
        assert!("podcast".parse::<MediaType>().is_err());
    }

    #[test]
    fn draft_builder_sets_folder() {
        let draft = LinkDraft::new("https://example.com", "Example").in_folder(7);
        assert_eq!(draft.folder_id, Some(7));
        assert_eq!(draft.media_type, MediaType::Url);
    }
}
