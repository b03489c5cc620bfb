use dashmap::DashMap;
use tokio::sync::mpsc;

use streamcast_core::ids::SessionId;

/// One live client connection. The id is server-generated; the sender
/// feeds the connection's outbound write loop.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub tx: mpsc::Sender<String>,
}

/// The live sessions of one tenant. Mutated by connection lifecycle
/// events, read by the poller through point-in-time snapshots.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    max_send_queue: usize,
}

impl SessionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_send_queue,
        }
    }

    /// Create a session with a fresh id and outbound queue, and add it.
    pub fn register(&self) -> (Session, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let session = Session { id: SessionId::new(), tx };
        self.sessions.insert(session.id.clone(), session.clone());
        (session, rx)
    }

    /// Remove a session. Unknown ids are a no-op; disconnect notifications
    /// can arrive more than once. Returns whether a session was removed.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Point-in-time copy of the current members, order irrelevant.
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let registry = SessionRegistry::new(8);
        assert_eq!(registry.count(), 0);

        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_eq!(registry.count(), 2);
        assert_ne!(a.id, b.id);

        registry.remove(&a.id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let registry = SessionRegistry::new(8);
        let (s, _rx) = registry.register();

        registry.remove(&SessionId::new());
        assert_eq!(registry.count(), 1);

        // Duplicate disconnect for the same session
        registry.remove(&s.id);
        registry.remove(&s.id);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let registry = SessionRegistry::new(8);
        let (_a, _rx_a) = registry.register();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);

        // Mutations after the snapshot don't affect it
        let (_b, _rx_b) = registry.register();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.count(), 2);
    }

    #[tokio::test]
    async fn registered_session_receives_via_tx() {
        let registry = SessionRegistry::new(8);
        let (session, mut rx) = registry.register();
        session.tx.try_send("hello".into()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }
}
