//! Wire types and the remote server seam.
//!
//! Every outbound payload carries the event timestamp and the sender's
//! correlation; create payloads additionally carry the originating local id
//! so the server can deduplicate queue replays of the same mutation.
//! Entity references inside payloads are always *remote* ids.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Correlation, MediaType};
use crate::util::{compact_text, normalize_text_option};

/// New folder announced to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPush {
    /// Originating local id, used by the server to dedupe replays
    pub local_id: i64,
    pub name: String,
    pub note: String,
    /// Parent folder remote id, when the parent has been pushed
    pub parent_folder_id: Option<i64>,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Full-state update of an already-synced folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderChange {
    /// Remote id of the folder being changed
    pub folder_id: i64,
    pub name: String,
    pub note: String,
    pub parent_folder_id: Option<i64>,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Deletion of an already-synced entity, by remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub id: i64,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// New link announced to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPush {
    pub local_id: i64,
    pub url: String,
    pub title: String,
    pub note: String,
    pub host: String,
    pub user_agent: Option<String>,
    pub media_type: MediaType,
    /// Owning folder remote id, when the folder has been pushed
    pub folder_id: Option<i64>,
    pub is_important: bool,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Full-state update of an already-synced link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkChange {
    pub link_id: i64,
    pub url: String,
    pub title: String,
    pub note: String,
    pub host: String,
    pub user_agent: Option<String>,
    pub media_type: MediaType,
    pub folder_id: Option<i64>,
    pub is_important: bool,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Action applied to a batch of links in one server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Move,
    Archive,
    Unarchive,
    Delete,
}

/// Multi-link operation, sent as a single call instead of N updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBatch {
    /// Remote ids of the affected links
    pub link_ids: Vec<i64>,
    pub action: BatchAction,
    /// Destination folder remote id, only meaningful for `Move`
    pub folder_id: Option<i64>,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPush {
    pub local_id: i64,
    pub name: String,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelChange {
    pub panel_id: i64,
    pub name: String,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelFolderPush {
    pub local_id: i64,
    /// Remote id of the owning panel
    pub panel_id: i64,
    /// Remote id of the pinned folder
    pub folder_id: i64,
    pub position: i64,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPush {
    pub local_id: i64,
    pub name: String,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagChange {
    pub tag_id: i64,
    pub name: String,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Attach or detach a tag on a link, both sides by remote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTagChange {
    pub link_id: i64,
    pub tag_id: i64,
    pub attached: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

/// Folder state pulled from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: i64,
    pub name: String,
    pub note: String,
    pub parent_folder_id: Option<i64>,
    pub is_archived: bool,
    pub event_timestamp: i64,
    /// Correlation of the client that produced this state
    pub correlation: Correlation,
}

/// Link state pulled from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub note: String,
    pub host: String,
    pub user_agent: Option<String>,
    pub media_type: MediaType,
    pub folder_id: Option<i64>,
    pub is_important: bool,
    pub is_archived: bool,
    pub event_timestamp: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePanel {
    pub id: i64,
    pub name: String,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePanelFolder {
    pub id: i64,
    pub panel_id: i64,
    pub folder_id: i64,
    pub position: i64,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: i64,
    pub name: String,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLinkTag {
    pub link_id: i64,
    pub tag_id: i64,
    pub attached: bool,
    pub correlation: Correlation,
}

/// Remote ids of entities deleted on the server since the watermark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstones {
    #[serde(default)]
    pub folders: Vec<i64>,
    #[serde(default)]
    pub links: Vec<i64>,
    #[serde(default)]
    pub panels: Vec<i64>,
    #[serde(default)]
    pub panel_folders: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
}

/// Everything that changed on the server since a watermark.
///
/// `timestamp` is the server's clock at collection time and becomes the
/// next watermark once the whole set has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub timestamp: i64,
    #[serde(default)]
    pub folders: Vec<RemoteFolder>,
    #[serde(default)]
    pub tags: Vec<RemoteTag>,
    #[serde(default)]
    pub links: Vec<RemoteLink>,
    #[serde(default)]
    pub link_tags: Vec<RemoteLinkTag>,
    #[serde(default)]
    pub panels: Vec<RemotePanel>,
    #[serde(default)]
    pub panel_folders: Vec<RemotePanelFolder>,
    #[serde(default)]
    pub tombstones: Tombstones,
}

impl ChangeSet {
    /// Whether the set carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
            && self.tags.is_empty()
            && self.links.is_empty()
            && self.link_tags.is_empty()
            && self.panels.is_empty()
            && self.panel_folders.is_empty()
            && self.tombstones.folders.is_empty()
            && self.tombstones.links.is_empty()
            && self.tombstones.panels.is_empty()
            && self.tombstones.panel_folders.is_empty()
            && self.tombstones.tags.is_empty()
    }
}

/// A single server-pushed notification about another client's mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEvent {
    FolderUpserted(RemoteFolder),
    FolderRemoved(Removal),
    LinkUpserted(RemoteLink),
    LinkRemoved(Removal),
    PanelUpserted(RemotePanel),
    PanelRemoved(Removal),
    PanelFolderUpserted(RemotePanelFolder),
    PanelFolderRemoved(Removal),
    TagUpserted(RemoteTag),
    TagRemoved(Removal),
    LinkTagChanged(RemoteLinkTag),
}

impl RemoteEvent {
    /// Correlation of the client that caused the event.
    #[must_use]
    pub const fn correlation(&self) -> &Correlation {
        match self {
            Self::FolderUpserted(folder) => &folder.correlation,
            Self::LinkUpserted(link) => &link.correlation,
            Self::PanelUpserted(panel) => &panel.correlation,
            Self::PanelFolderUpserted(entry) => &entry.correlation,
            Self::TagUpserted(tag) => &tag.correlation,
            Self::LinkTagChanged(link_tag) => &link_tag.correlation,
            Self::FolderRemoved(removal)
            | Self::LinkRemoved(removal)
            | Self::PanelRemoved(removal)
            | Self::PanelFolderRemoved(removal)
            | Self::TagRemoved(removal) => &removal.correlation,
        }
    }
}

/// Remote server operations, one method per wire call.
///
/// Create calls return the server-assigned id. Implementations must be
/// idempotent for create replays carrying the same correlation and
/// `local_id`, returning the previously assigned id.
#[allow(async_fn_in_trait)]
pub trait SyncRemote {
    async fn create_folder(&self, push: &FolderPush) -> Result<i64>;
    async fn update_folder(&self, change: &FolderChange) -> Result<()>;
    async fn delete_folder(&self, removal: &Removal) -> Result<()>;

    async fn create_link(&self, push: &LinkPush) -> Result<i64>;
    async fn update_link(&self, change: &LinkChange) -> Result<()>;
    async fn delete_link(&self, removal: &Removal) -> Result<()>;
    async fn batch_links(&self, batch: &LinkBatch) -> Result<()>;

    async fn create_panel(&self, push: &PanelPush) -> Result<i64>;
    async fn update_panel(&self, change: &PanelChange) -> Result<()>;
    async fn delete_panel(&self, removal: &Removal) -> Result<()>;

    async fn create_panel_folder(&self, push: &PanelFolderPush) -> Result<i64>;
    async fn delete_panel_folder(&self, removal: &Removal) -> Result<()>;

    async fn create_tag(&self, push: &TagPush) -> Result<i64>;
    async fn update_tag(&self, change: &TagChange) -> Result<()>;
    async fn delete_tag(&self, removal: &Removal) -> Result<()>;
    async fn set_link_tag(&self, change: &LinkTagChange) -> Result<()>;

    /// Everything that changed on the server after `since`.
    async fn changes_since(&self, since: i64) -> Result<ChangeSet>;
}

/// HTTP implementation of [`SyncRemote`] against the companion server.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            token: token.into(),
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Build a remote from loaded settings, `None` when sync is unconfigured.
    pub fn from_settings(settings: &crate::config::SyncSettings) -> Result<Option<Self>> {
        match (&settings.server_url, &settings.auth_token) {
            (Some(url), Some(token)) => Ok(Some(Self::new(url.clone(), token.clone())?)),
            _ => Ok(None),
        }
    }

    async fn post_body<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }
        Ok(response)
    }

    async fn post_unit<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        self.post_body(path, body).await?;
        Ok(())
    }

    async fn post_created<T: Serialize>(&self, path: &str, body: &T) -> Result<i64> {
        let response = self.post_body(path, body).await?;
        let created = response
            .json::<CreatedResponse>()
            .await
            .map_err(|error| Error::RemoteDecode(error.to_string()))?;
        Ok(created.id)
    }
}

impl SyncRemote for HttpRemote {
    async fn create_folder(&self, push: &FolderPush) -> Result<i64> {
        self.post_created("/v1/folders", push).await
    }

    async fn update_folder(&self, change: &FolderChange) -> Result<()> {
        self.post_unit("/v1/folders/update", change).await
    }

    async fn delete_folder(&self, removal: &Removal) -> Result<()> {
        self.post_unit("/v1/folders/delete", removal).await
    }

    async fn create_link(&self, push: &LinkPush) -> Result<i64> {
        self.post_created("/v1/links", push).await
    }

    async fn update_link(&self, change: &LinkChange) -> Result<()> {
        self.post_unit("/v1/links/update", change).await
    }

    async fn delete_link(&self, removal: &Removal) -> Result<()> {
        self.post_unit("/v1/links/delete", removal).await
    }

    async fn batch_links(&self, batch: &LinkBatch) -> Result<()> {
        self.post_unit("/v1/links/batch", batch).await
    }

    async fn create_panel(&self, push: &PanelPush) -> Result<i64> {
        self.post_created("/v1/panels", push).await
    }

    async fn update_panel(&self, change: &PanelChange) -> Result<()> {
        self.post_unit("/v1/panels/update", change).await
    }

    async fn delete_panel(&self, removal: &Removal) -> Result<()> {
        self.post_unit("/v1/panels/delete", removal).await
    }

    async fn create_panel_folder(&self, push: &PanelFolderPush) -> Result<i64> {
        self.post_created("/v1/panel-folders", push).await
    }

    async fn delete_panel_folder(&self, removal: &Removal) -> Result<()> {
        self.post_unit("/v1/panel-folders/delete", removal).await
    }

    async fn create_tag(&self, push: &TagPush) -> Result<i64> {
        self.post_created("/v1/tags", push).await
    }

    async fn update_tag(&self, change: &TagChange) -> Result<()> {
        self.post_unit("/v1/tags/update", change).await
    }

    async fn delete_tag(&self, removal: &Removal) -> Result<()> {
        self.post_unit("/v1/tags/delete", removal).await
    }

    async fn set_link_tag(&self, change: &LinkTagChange) -> Result<()> {
        self.post_unit("/v1/link-tags", change).await
    }

    async fn changes_since(&self, since: i64) -> Result<ChangeSet> {
        let response = self
            .client
            .get(format!("{}/v1/changes", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(&[("since", since)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }

        response
            .json::<ChangeSet>()
            .await
            .map_err(|error| Error::RemoteDecode(error.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    // Bodies can be whole HTML error pages
    let compacted = compact_text(body);
    if compacted.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compacted, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("server url must not be empty".to_string()))?;
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server url must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlation() -> Correlation {
        Correlation::from_parts("id".to_string(), "amber-wren".to_string())
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("sync.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url("https://sync.example.com/".to_string()).unwrap(),
            "https://sync.example.com"
        );
    }

    #[test]
    fn parse_api_error_prefers_structured_message() {
        let parsed = parse_api_error(
            StatusCode::CONFLICT,
            "{\"message\": \"duplicate folder\"}",
        );
        assert_eq!(parsed, "duplicate folder (409)");

        let fallback = parse_api_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(fallback, "HTTP 502");
    }

    #[test]
    fn parse_api_error_compacts_long_bodies() {
        let body = "x".repeat(500);
        let parsed = parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(parsed, format!("{} (500)", "x".repeat(180)));
    }

    #[test]
    fn http_remote_debug_redacts_token() {
        let remote = HttpRemote::new("https://sync.example.com", "secret").unwrap();
        let debug = format!("{remote:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn remote_event_exposes_sender_correlation() {
        let event = RemoteEvent::FolderRemoved(Removal {
            id: 7,
            event_timestamp: 100,
            correlation: correlation(),
        });
        assert_eq!(event.correlation().id, "id");
    }

    #[test]
    fn change_set_emptiness() {
        let mut set = ChangeSet::default();
        assert!(set.is_empty());

        set.tombstones.links.push(3);
        assert!(!set.is_empty());
    }

    #[test]
    fn change_set_tolerates_sparse_payloads() {
        let set: ChangeSet = serde_json::from_str("{\"timestamp\": 42}").unwrap();
        assert_eq!(set.timestamp, 42);
        assert!(set.is_empty());
    }
}
