//! Per-installation correlation identity

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity stamped on every outbound mutation so a client can recognize
/// its own writes echoing back from the server.
///
/// This is distributed actor identity, not an ownership lock: two devices
/// on the same account carry different correlations, and echo suppression
/// only compares `id` for equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Random identifier, generated once per installation
    pub id: String,
    /// Human-readable name derived from the identifier
    pub client_name: String,
}

impl Correlation {
    /// Generate a fresh correlation with a derived client name.
    #[must_use]
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        let client_name = derive_client_name(&uuid);
        Self {
            id: uuid.to_string(),
            client_name,
        }
    }

    /// Rebuild a correlation from persisted parts.
    #[must_use]
    pub const fn from_parts(id: String, client_name: String) -> Self {
        Self { id, client_name }
    }

    /// Whether `other` was produced by this installation.
    #[must_use]
    pub fn is_own(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.client_name, self.id)
    }
}

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "dusky", "eager", "fleet", "gentle", "hazel", "ivory", "jolly",
    "keen", "lucid", "mellow", "nimble", "opal", "plucky", "quiet", "rustic", "sable", "tidy",
    "umber", "vivid", "wry", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "alder", "bittern", "crane", "dipper", "egret", "finch", "grebe", "heron", "ibis", "jay",
    "kite", "loon", "merlin", "nuthatch", "osprey", "plover", "quail", "raven", "swift", "tern",
    "umbrette", "vireo", "wren", "xenops", "yaffle",
];

/// Derive a stable adjective-noun name from the uuid bytes.
///
/// Deterministic per id so the same installation always reports the same
/// client name without storing a second value.
fn derive_client_name(uuid: &Uuid) -> String {
    let bytes = uuid.as_bytes();
    let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
    let noun = NOUNS[bytes[1] as usize % NOUNS.len()];
    format!("{adjective}-{noun}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_unique_ids() {
        let a = Correlation::generate();
        let b = Correlation::generate();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn client_name_is_deterministic_per_id() {
        let uuid = Uuid::now_v7();
        assert_eq!(derive_client_name(&uuid), derive_client_name(&uuid));
    }

    #[test]
    fn is_own_compares_id_only() {
        let a = Correlation::generate();
        let renamed = Correlation::from_parts(a.id.clone(), "other-name".to_string());
        assert!(a.is_own(&renamed));

        let b = Correlation::generate();
        assert!(!a.is_own(&b));
    }

    #[test]
    fn client_name_has_adjective_noun_shape() {
        let correlation = Correlation::generate();
        assert_eq!(correlation.client_name.split('-').count(), 2);
    }
}
