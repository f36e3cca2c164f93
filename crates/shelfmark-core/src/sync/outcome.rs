//! Mutation origin and composite operation outcomes

/// Where a mutation came from.
///
/// Replaces the boolean the repositories used to thread through every call:
/// a mutation applied because the server echoed another device's write must
/// never be pushed back, or the two clients ping-pong forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Initiated on this device; eligible for remote propagation
    Local,
    /// Applied from a server notification; never re-pushed
    RemoteEcho,
}

impl Origin {
    /// Whether this origin allows a client→server push.
    #[must_use]
    pub const fn should_push(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Outcome of the best-effort remote leg of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Push disabled, echo origin, or nothing for the server to see
    NotAttempted,
    /// The server accepted the mutation
    Synced,
    /// The remote call failed; the operation was queued for retry
    Queued(String),
}

impl RemoteStatus {
    /// Whether the remote leg is known to have landed.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// A committed local mutation plus its remote substatus.
///
/// The local value is authoritative: remote failure never rolls it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<T> {
    /// Result of the local mutation
    pub value: T,
    /// What happened on the remote leg
    pub remote: RemoteStatus,
}

impl<T> Mutation<T> {
    /// Local mutation with no remote leg attempted.
    pub const fn local_only(value: T) -> Self {
        Self {
            value,
            remote: RemoteStatus::NotAttempted,
        }
    }

    /// Local mutation whose push landed.
    pub const fn synced(value: T) -> Self {
        Self {
            value,
            remote: RemoteStatus::Synced,
        }
    }

    /// Local mutation whose push failed and was queued.
    pub const fn queued(value: T, error: String) -> Self {
        Self {
            value,
            remote: RemoteStatus::Queued(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_gates_pushes() {
        assert!(Origin::Local.should_push());
        assert!(!Origin::RemoteEcho.should_push());
    }

    #[test]
    fn queued_status_is_not_synced() {
        let mutation = Mutation::queued(1, "connection refused".to_string());
        assert!(!mutation.remote.is_synced());
        assert_eq!(mutation.value, 1);
    }
}
