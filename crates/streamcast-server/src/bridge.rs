use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::mpsc;

use streamcast_core::config::{BridgeConfig, TenantDescriptor};
use streamcast_core::ids::{SessionId, TenantId};
use streamcast_stream::{CursorManager, StreamApi};

use crate::emitter::BroadcastEmitter;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_SESSIONS_ACTIVE};
use crate::poller::Poller;
use crate::session::{Session, SessionRegistry};

/// One tenant's bridge: cursor manager, session registry, poller, and
/// emitter wired together. Lives for the whole process; only its poller
/// starts and stops. The connect/disconnect hooks here are the only
/// poller start/stop triggers in the system.
pub struct TenantBridge {
    descriptor: TenantDescriptor,
    registry: Arc<SessionRegistry>,
    poller: Arc<Poller>,
    // Serializes the registry mutation + count check + poller start/stop
    // sequence. Without it a disconnect landing between another session's
    // register and start could stop the poller with a live session behind.
    lifecycle: parking_lot::Mutex<()>,
}

impl TenantBridge {
    pub fn new(descriptor: TenantDescriptor, config: &BridgeConfig, api: Arc<dyn StreamApi>) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.max_send_queue));
        let cursors = Arc::new(CursorManager::new(
            descriptor.tenant.clone(),
            descriptor.stream_id.clone(),
            Arc::clone(&api),
        ));
        let emitter = Arc::new(BroadcastEmitter::new(descriptor.tenant.clone()));
        let poller = Arc::new(Poller::new(
            descriptor.tenant.clone(),
            config.poll_interval,
            api,
            cursors,
            Arc::clone(&registry),
            emitter,
        ));

        Self { descriptor, registry, poller, lifecycle: parking_lot::Mutex::new(()) }
    }

    /// Register a new client connection. Starts the poller on the empty ->
    /// non-empty transition.
    pub fn on_connect(&self) -> (Session, mpsc::Receiver<String>) {
        let _guard = self.lifecycle.lock();
        let (session, rx) = self.registry.register();
        let count = self.registry.count();
        tracing::info!(
            tenant = %self.tenant(),
            session_id = %session.id,
            sessions = count,
            "Client connected"
        );
        counter!(WS_CONNECTIONS_TOTAL, "tenant" => self.tenant().to_string()).increment(1);
        gauge!(WS_SESSIONS_ACTIVE, "tenant" => self.tenant().to_string()).increment(1.0);

        self.poller.start();
        (session, rx)
    }

    /// Remove a client connection. Stops the poller when the registry
    /// empties; an in-flight cycle still completes on its own.
    pub fn on_disconnect(&self, session_id: &SessionId) {
        let _guard = self.lifecycle.lock();
        let removed = self.registry.remove(session_id);
        let count = self.registry.count();
        if removed {
            tracing::info!(
                tenant = %self.tenant(),
                session_id = %session_id,
                sessions = count,
                "Client disconnected"
            );
            counter!(WS_DISCONNECTIONS_TOTAL, "tenant" => self.tenant().to_string()).increment(1);
            gauge!(WS_SESSIONS_ACTIVE, "tenant" => self.tenant().to_string()).decrement(1.0);
        }

        if count == 0 {
            self.poller.stop();
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.descriptor.tenant
    }

    pub fn descriptor(&self) -> &TenantDescriptor {
        &self.descriptor
    }

    pub fn session_count(&self) -> usize {
        self.registry.count()
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use streamcast_stream::MockStreamApi;

    fn bridge(api: Arc<MockStreamApi>) -> TenantBridge {
        let descriptor = TenantDescriptor {
            tenant: TenantId::from_raw("TEST"),
            stream_id: "stream-a".into(),
            service_route: "/route/test".into(),
            port: 0,
        };
        let config = BridgeConfig {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        };
        TenantBridge::new(descriptor, &config, api)
    }

    #[tokio::test]
    async fn poller_follows_registry_transitions() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let bridge = bridge(Arc::clone(&api));
        assert!(!bridge.poller_running());

        let (a, _rx_a) = bridge.on_connect();
        assert!(bridge.poller_running());

        let (b, _rx_b) = bridge.on_connect();
        assert_eq!(bridge.session_count(), 2);

        // 2 -> 1 keeps the poller running
        bridge.on_disconnect(&a.id);
        assert!(bridge.poller_running());

        // 1 -> 0 stops it
        bridge.on_disconnect(&b.id);
        assert!(!bridge.poller_running());
    }

    #[tokio::test]
    async fn no_sessions_means_no_backend_traffic() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let bridge = bridge(Arc::clone(&api));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(api.create_calls(), 0);
        assert_eq!(api.fetch_calls(), 0);
        assert!(!bridge.poller_running());
    }

    #[tokio::test]
    async fn reconnect_after_drain_restarts_polling() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let bridge = bridge(Arc::clone(&api));

        let (a, _rx_a) = bridge.on_connect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        bridge.on_disconnect(&a.id);
        let fetches_when_stopped = api.fetch_calls();

        let (_b, _rx_b) = bridge.on_connect();
        assert!(bridge.poller_running());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(api.fetch_calls() > fetches_when_stopped);
        // The cursor from the first run is reused, not recreated
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_disconnect_is_harmless() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let bridge = bridge(api);

        let (a, _rx_a) = bridge.on_connect();
        bridge.on_disconnect(&a.id);
        bridge.on_disconnect(&a.id);
        assert_eq!(bridge.session_count(), 0);
        assert!(!bridge.poller_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_keeps_poller_state_consistent() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let bridge = Arc::new(bridge(api));

        // Connect/disconnect storm across tasks. Whenever a task holds a
        // live session, the poller must be observed running; a disconnect
        // racing another session's connect must never strand it stopped.
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let bridge = Arc::clone(&bridge);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let (s, _rx) = bridge.on_connect();
                    assert!(bridge.poller_running(), "poller stopped with a live session");
                    tokio::task::yield_now().await;
                    assert!(bridge.poller_running(), "poller stopped with a live session");
                    bridge.on_disconnect(&s.id);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(bridge.session_count(), 0);
        assert!(!bridge.poller_running());
    }
}
