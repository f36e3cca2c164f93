//! Sync configuration with an explicit load/save lifecycle.
//!
//! All sync state that used to live in process-wide preferences is carried
//! by an explicitly constructed `SyncSettings` value persisted through the
//! settings repository.

use std::fmt;
use std::str::FromStr;

use crate::db::SettingsRepository;
use crate::error::{Error, Result};
use crate::models::Correlation;
use crate::util::{is_http_url, normalize_text_option};

const KEY_SERVER_URL: &str = "sync.server_url";
const KEY_AUTH_TOKEN: &str = "sync.auth_token";
const KEY_SYNC_TYPE: &str = "sync.type";
const KEY_LAST_SYNCED: &str = "sync.last_synced_at";
const KEY_CORRELATION_ID: &str = "sync.correlation_id";
const KEY_CORRELATION_NAME: &str = "sync.correlation_name";

/// Direction(s) reconciliation is allowed to move data in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncType {
    /// Push local mutations to the server, never pull
    ClientToServer,
    /// Pull server changes, never push
    ServerToClient,
    /// Both directions
    #[default]
    TwoWay,
}

impl SyncType {
    /// Whether client→server pushes are allowed.
    #[must_use]
    pub const fn permits_push(self) -> bool {
        matches!(self, Self::ClientToServer | Self::TwoWay)
    }

    /// Whether server→client pulls are allowed.
    #[must_use]
    pub const fn permits_pull(self) -> bool {
        matches!(self, Self::ServerToClient | Self::TwoWay)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientToServer => "client-to-server",
            Self::ServerToClient => "server-to-client",
            Self::TwoWay => "two-way",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client-to-server" => Ok(Self::ClientToServer),
            "server-to-client" => Ok(Self::ServerToClient),
            "two-way" => Ok(Self::TwoWay),
            other => Err(format!("unknown sync type: {other}")),
        }
    }
}

/// Sync configuration and state for one installation.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Companion sync server base URL
    pub server_url: Option<String>,
    /// Bearer token for the sync server
    pub auth_token: Option<String>,
    /// Allowed sync direction(s)
    pub sync_type: SyncType,
    /// Server timestamp of the last fully applied reconciliation pass
    pub last_synced_at: i64,
    /// This installation's correlation identity
    pub correlation: Correlation,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("server_url", &self.server_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_type", &self.sync_type)
            .field("last_synced_at", &self.last_synced_at)
            .field("correlation", &self.correlation)
            .finish()
    }
}

impl SyncSettings {
    /// Load settings, generating and persisting a correlation on first run.
    ///
    /// If persisting the fresh correlation fails, a warning is logged and the
    /// session continues with the unpersisted identity: echo suppression
    /// degrades until the next successful save, but nothing is corrupted.
    pub fn load(repo: &impl SettingsRepository) -> Result<Self> {
        let server_url = normalize_text_option(repo.get(KEY_SERVER_URL)?);
        let auth_token = normalize_text_option(repo.get(KEY_AUTH_TOKEN)?);
        let sync_type = repo
            .get(KEY_SYNC_TYPE)?
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let last_synced_at = repo
            .get(KEY_LAST_SYNCED)?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        let correlation = match (
            normalize_text_option(repo.get(KEY_CORRELATION_ID)?),
            normalize_text_option(repo.get(KEY_CORRELATION_NAME)?),
        ) {
            (Some(id), Some(client_name)) => Correlation::from_parts(id, client_name),
            _ => {
                let fresh = Correlation::generate();
                if let Err(error) = persist_correlation(repo, &fresh) {
                    tracing::warn!(
                        "failed to persist correlation, echo suppression degraded: {error}"
                    );
                }
                fresh
            }
        };

        Ok(Self {
            server_url,
            auth_token,
            sync_type,
            last_synced_at,
            correlation,
        })
    }

    /// Persist all settings.
    pub fn save(&self, repo: &impl SettingsRepository) -> Result<()> {
        match &self.server_url {
            Some(url) => repo.set(KEY_SERVER_URL, url)?,
            None => repo.remove(KEY_SERVER_URL)?,
        }
        match &self.auth_token {
            Some(token) => repo.set(KEY_AUTH_TOKEN, token)?,
            None => repo.remove(KEY_AUTH_TOKEN)?,
        }
        repo.set(KEY_SYNC_TYPE, self.sync_type.as_str())?;
        repo.set(KEY_LAST_SYNCED, &self.last_synced_at.to_string())?;
        persist_correlation(repo, &self.correlation)?;
        Ok(())
    }

    /// Set and validate the server URL (`None` disables sync).
    pub fn set_server_url(&mut self, url: Option<String>) -> Result<()> {
        match normalize_text_option(url) {
            Some(url) if !is_http_url(&url) => Err(Error::InvalidInput(
                "server url must include http:// or https://".into(),
            )),
            normalized => {
                self.server_url = normalized.map(|url| url.trim_end_matches('/').to_string());
                Ok(())
            }
        }
    }

    /// Whether a server is configured at all.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.auth_token.is_some()
    }

    /// Whether local mutations should be pushed to the server.
    #[must_use]
    pub const fn permits_push(&self) -> bool {
        self.is_configured() && self.sync_type.permits_push()
    }

    /// Whether server changes should be pulled.
    #[must_use]
    pub const fn permits_pull(&self) -> bool {
        self.is_configured() && self.sync_type.permits_pull()
    }

    /// Advance and persist the reconciliation watermark.
    ///
    /// Called only after every pulled change of a pass has been durably
    /// applied; a failed pass leaves the watermark untouched so the next
    /// pass retries the same window.
    pub fn advance_watermark(
        &mut self,
        repo: &impl SettingsRepository,
        timestamp: i64,
    ) -> Result<()> {
        repo.set(KEY_LAST_SYNCED, &timestamp.to_string())?;
        self.last_synced_at = timestamp;
        Ok(())
    }
}

fn persist_correlation(repo: &impl SettingsRepository, correlation: &Correlation) -> Result<()> {
    repo.set(KEY_CORRELATION_ID, &correlation.id)?;
    repo.set(KEY_CORRELATION_NAME, &correlation.client_name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteSettingsRepository};

    #[test]
    fn sync_type_directions() {
        assert!(SyncType::TwoWay.permits_push());
        assert!(SyncType::TwoWay.permits_pull());
        assert!(SyncType::ClientToServer.permits_push());
        assert!(!SyncType::ClientToServer.permits_pull());
        assert!(!SyncType::ServerToClient.permits_push());
        assert!(SyncType::ServerToClient.permits_pull());
    }

    #[test]
    fn sync_type_round_trips_through_str() {
        for sync_type in [
            SyncType::ClientToServer,
            SyncType::ServerToClient,
            SyncType::TwoWay,
        ] {
            assert_eq!(sync_type.as_str().parse::<SyncType>(), Ok(sync_type));
        }
        assert!("sideways".parse::<SyncType>().is_err());
    }

    #[test]
    fn load_generates_and_persists_correlation_once() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let first = SyncSettings::load(&repo).unwrap();
        let second = SyncSettings::load(&repo).unwrap();
        assert_eq!(first.correlation, second.correlation);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let mut settings = SyncSettings::load(&repo).unwrap();
        settings
            .set_server_url(Some("https://sync.example.com/".to_string()))
            .unwrap();
        settings.auth_token = Some("token".to_string());
        settings.sync_type = SyncType::ClientToServer;
        settings.last_synced_at = 12345;
        settings.save(&repo).unwrap();

        let loaded = SyncSettings::load(&repo).unwrap();
        assert_eq!(loaded.server_url.as_deref(), Some("https://sync.example.com"));
        assert_eq!(loaded.auth_token.as_deref(), Some("token"));
        assert_eq!(loaded.sync_type, SyncType::ClientToServer);
        assert_eq!(loaded.last_synced_at, 12345);
        assert_eq!(loaded.correlation, settings.correlation);
    }

    #[test]
    fn unconfigured_settings_permit_nothing() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let settings = SyncSettings::load(&repo).unwrap();
        assert!(!settings.is_configured());
        assert!(!settings.permits_push());
        assert!(!settings.permits_pull());
    }

    #[test]
    fn set_server_url_validates_scheme() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let mut settings = SyncSettings::load(&repo).unwrap();
        assert!(settings
            .set_server_url(Some("sync.example.com".to_string()))
            .is_err());
        settings.set_server_url(None).unwrap();
        assert_eq!(settings.server_url, None);
    }

    #[test]
    fn advance_watermark_persists() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let mut settings = SyncSettings::load(&repo).unwrap();
        settings.advance_watermark(&repo, 999).unwrap();

        let reloaded = SyncSettings::load(&repo).unwrap();
        assert_eq!(reloaded.last_synced_at, 999);
    }

    #[test]
    fn debug_redacts_auth_token() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSettingsRepository::new(db.connection());

        let mut settings = SyncSettings::load(&repo).unwrap();
        settings.auth_token = Some("secret".to_string());
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
