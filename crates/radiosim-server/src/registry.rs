//! Live session registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use radiosim_core::{Frequency, SessionId};
use tracing::debug;

use crate::session::Session;

/// The set of live sessions, keyed by identity.
///
/// One lock guards every mutation and every snapshot. Callers never hold
/// it across I/O: [`snapshot`](Self::snapshot) clones the `Arc`s out.
pub struct ClientRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Add a session. Returns `false` (and leaves the registry unchanged)
    /// if a session with the same id is already present.
    pub fn register(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(session.id()) {
            return false;
        }
        let _ = sessions.insert(session.id().clone(), session);
        debug!(live = sessions.len(), "session registered");
        true
    }

    /// Remove a session by id.
    pub fn unregister(&self, id: &SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write();
        let removed = sessions.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, live = sessions.len(), "session unregistered");
        }
        removed
    }

    /// Point-in-time copy of the live sessions, in unspecified order.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Snapshot restricted to sessions tuned to exactly `frequency`.
    ///
    /// Frequencies are read after the lock is released; a session that
    /// retunes concurrently may land on either side.
    pub fn tuned_to(&self, frequency: Frequency) -> Vec<Arc<Session>> {
        let mut sessions = self.snapshot();
        sessions.retain(|s| s.frequency() == frequency);
        sessions
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::test_support::{active_session, loopback_session};

    #[tokio::test]
    async fn register_and_unregister() {
        let registry = ClientRegistry::new();
        let (s1, _c1) = active_session(&registry, 120.255).await;
        let (s2, _c2) = active_session(&registry, 121.1).await;
        assert_eq!(registry.len(), 2);

        let removed = registry.unregister(s1.id()).unwrap();
        assert_eq!(removed.id(), s1.id());
        assert_eq!(registry.len(), 1);

        let _ = registry.unregister(s2.id());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_register_rejected() {
        let registry = ClientRegistry::new();
        let (session, _reader, _client) = loopback_session(Duration::from_millis(250)).await;
        assert!(registry.register(session.clone()));
        assert!(!registry.register(session));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn unregister_unknown_is_none() {
        let registry = ClientRegistry::new();
        assert!(registry.unregister(&SessionId::new()).is_none());
    }

    #[tokio::test]
    async fn snapshot_is_detached() {
        let registry = ClientRegistry::new();
        let (s1, _c1) = active_session(&registry, 120.255).await;
        let snapshot = registry.snapshot();
        let _ = registry.unregister(s1.id());
        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn tuned_to_filters_by_frequency() {
        let registry = ClientRegistry::new();
        let (_a, _ca) = active_session(&registry, 120.255).await;
        let (_b, _cb) = active_session(&registry, 120.255).await;
        let (c, _cc) = active_session(&registry, 121.1).await;

        assert_eq!(registry.tuned_to(Frequency::new(120.255)).len(), 2);
        let on_121 = registry.tuned_to(Frequency::new(121.1));
        assert_eq!(on_121.len(), 1);
        assert_eq!(on_121[0].id(), c.id());
        assert!(registry.tuned_to(Frequency::new(128.75)).is_empty());

        let _ = c.tune(Frequency::new(120.255));
        assert_eq!(registry.tuned_to(Frequency::new(120.255)).len(), 3);
    }

    #[test]
    fn default_is_empty() {
        assert!(ClientRegistry::default().is_empty());
    }
}
