use metrics::counter;
use serde::Serialize;

use streamcast_core::ids::TenantId;
use streamcast_core::records::OutboundMessage;

use crate::metrics::{BROADCAST_DROPS_TOTAL, BROADCAST_MESSAGES_TOTAL};
use crate::session::Session;

/// Wire envelope pushed to clients over the WebSocket.
#[derive(Serialize)]
struct PushEvent<'a> {
    event: &'static str,
    data: &'a OutboundMessage,
}

/// Fans a decoded batch out to a session snapshot. Delivery failures are
/// per-session diagnostics, never errors back to the poller.
pub struct BroadcastEmitter {
    tenant: TenantId,
}

impl BroadcastEmitter {
    pub fn new(tenant: TenantId) -> Self {
        Self { tenant }
    }

    /// Deliver every message to every session in the snapshot. Messages go
    /// out in batch order, so each session sees them in fetch order.
    pub fn broadcast(&self, snapshot: &[Session], messages: &[OutboundMessage]) {
        if snapshot.is_empty() || messages.is_empty() {
            return;
        }

        let mut delivered = 0u64;
        let mut failed = 0u64;

        for message in messages {
            let envelope = PushEvent { event: "message", data: message };
            let json = match serde_json::to_string(&envelope) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(tenant = %self.tenant, error = %e, "Failed to serialize push event");
                    continue;
                }
            };

            for session in snapshot {
                match session.tx.try_send(json.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        failed += 1;
                        tracing::debug!(
                            tenant = %self.tenant,
                            session_id = %session.id,
                            error = %e,
                            "Dropped message for session"
                        );
                    }
                }
            }
        }

        counter!(BROADCAST_MESSAGES_TOTAL, "tenant" => self.tenant.to_string()).increment(delivered);
        if failed > 0 {
            counter!(BROADCAST_DROPS_TOTAL, "tenant" => self.tenant.to_string()).increment(failed);
            tracing::warn!(tenant = %self.tenant, failed, "Some sessions missed this batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;

    fn emitter() -> BroadcastEmitter {
        BroadcastEmitter::new(TenantId::from_raw("TEST"))
    }

    fn messages(n: usize) -> Vec<OutboundMessage> {
        (0..n)
            .map(|i| OutboundMessage { key: format!("k{i}"), value: format!("v{i}") })
            .collect()
    }

    #[tokio::test]
    async fn delivers_to_every_session_in_snapshot() {
        let registry = SessionRegistry::new(8);
        let (_a, mut rx_a) = registry.register();
        let (_b, mut rx_b) = registry.register();

        emitter().broadcast(&registry.snapshot(), &messages(1));

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a, got_b);
        assert!(got_a.contains(r#""event":"message""#));
        assert!(got_a.contains(r#""key":"k0""#));
    }

    #[tokio::test]
    async fn preserves_fetch_order_per_session() {
        let registry = SessionRegistry::new(8);
        let (_s, mut rx) = registry.register();

        emitter().broadcast(&registry.snapshot(), &messages(3));

        for i in 0..3 {
            let got = rx.recv().await.unwrap();
            assert!(got.contains(&format!(r#""key":"k{i}""#)), "out of order at {i}: {got}");
        }
    }

    #[tokio::test]
    async fn one_dead_session_does_not_block_others() {
        let registry = SessionRegistry::new(8);
        let (_dead, rx_dead) = registry.register();
        let (_live, mut rx_live) = registry.register();
        drop(rx_dead); // closed connection

        emitter().broadcast(&registry.snapshot(), &messages(2));

        assert!(rx_live.recv().await.is_some());
        assert!(rx_live.recv().await.is_some());
    }

    #[test]
    fn empty_snapshot_is_noop() {
        emitter().broadcast(&[], &messages(2));
    }

    #[test]
    fn empty_batch_is_noop() {
        let registry = SessionRegistry::new(8);
        let (_s, mut rx) = registry.register();
        emitter().broadcast(&registry.snapshot(), &[]);
        assert!(rx.try_recv().is_err());
    }
}
