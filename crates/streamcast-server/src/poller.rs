use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use streamcast_core::ids::TenantId;
use streamcast_core::records::decode_batch;
use streamcast_stream::{CursorManager, StreamApi};

use crate::emitter::BroadcastEmitter;
use crate::metrics::{
    POLL_CURSOR_ERRORS_TOTAL, POLL_CYCLES_TOTAL, POLL_FETCH_ERRORS_TOTAL,
    POLL_TICKS_DROPPED_TOTAL,
};
use crate::session::SessionRegistry;

struct Ticker {
    cancel: CancellationToken,
    _task: tokio::task::JoinHandle<()>,
}

struct IdleOnDrop(Arc<AtomicBool>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-tenant polling loop. Stopped until the first session arrives,
/// then ticks on a fixed interval; each admitted tick runs one
/// ensure-cursor -> fetch -> broadcast cycle. At most one cycle is in
/// flight at a time; extra ticks are dropped, not queued.
pub struct Poller {
    tenant: TenantId,
    poll_interval: Duration,
    api: Arc<dyn StreamApi>,
    cursors: Arc<CursorManager>,
    registry: Arc<SessionRegistry>,
    emitter: Arc<BroadcastEmitter>,
    in_flight: Arc<AtomicBool>,
    ticker: Mutex<Option<Ticker>>,
}

impl Poller {
    pub fn new(
        tenant: TenantId,
        poll_interval: Duration,
        api: Arc<dyn StreamApi>,
        cursors: Arc<CursorManager>,
        registry: Arc<SessionRegistry>,
        emitter: Arc<BroadcastEmitter>,
    ) -> Self {
        Self {
            tenant,
            poll_interval,
            api,
            cursors,
            registry,
            emitter,
            in_flight: Arc::new(AtomicBool::new(false)),
            ticker: Mutex::new(None),
        }
    }

    /// Start the tick loop. Idempotent; a running ticker is left alone.
    /// The first cycle runs immediately, subsequent ones on the interval.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }

        tracing::info!(tenant = %self.tenant, interval = ?self.poll_interval, "Starting poller");
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let poller = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = interval.tick() => poller.admit_tick(),
                }
            }
        });

        *ticker = Some(Ticker { cancel, _task: task });
    }

    /// Cancel the tick loop. An in-flight cycle is not aborted; it runs to
    /// completion and its broadcast no-ops against the empty snapshot.
    pub fn stop(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            tracing::info!(tenant = %self.tenant, "Stopping poller");
            ticker.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }

    /// Admit or drop one tick. A tick that arrives while the previous
    /// cycle is still in flight is dropped outright.
    fn admit_tick(self: &Arc<Self>) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(tenant = %self.tenant, "Previous cycle still in flight, dropping tick");
            counter!(POLL_TICKS_DROPPED_TOTAL, "tenant" => self.tenant.to_string()).increment(1);
            return;
        }

        let poller = Arc::clone(self);
        tokio::spawn(async move {
            // Whatever happens inside the cycle, the state returns to idle.
            let _idle = IdleOnDrop(Arc::clone(&poller.in_flight));
            poller.run_cycle().await;
        });
    }

    /// One poll cycle. Every failure path ends the cycle and leaves the
    /// poller idle; the fixed interval is the only retry mechanism.
    async fn run_cycle(&self) {
        counter!(POLL_CYCLES_TOTAL, "tenant" => self.tenant.to_string()).increment(1);

        let cursor = match self.cursors.ensure().await {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::warn!(
                    tenant = %self.tenant,
                    error = %e,
                    kind = e.error_kind(),
                    "Cursor create failed, will retry next tick"
                );
                counter!(POLL_CURSOR_ERRORS_TOTAL, "tenant" => self.tenant.to_string()).increment(1);
                return;
            }
        };

        let fetched = match self.api.fetch_messages(self.cursors.stream_id(), &cursor).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(
                    tenant = %self.tenant,
                    error = %e,
                    kind = e.error_kind(),
                    "Fetch failed, discarding cursor"
                );
                if e.invalidates_cursor() {
                    self.cursors.invalidate().await;
                }
                counter!(POLL_FETCH_ERRORS_TOTAL, "tenant" => self.tenant.to_string()).increment(1);
                return;
            }
        };

        if let Some(next) = fetched.next_cursor {
            self.cursors.store(next).await;
        }

        let messages = decode_batch(&fetched.records);
        if messages.is_empty() {
            return;
        }

        tracing::info!(tenant = %self.tenant, count = messages.len(), "Retrieved messages");
        let snapshot = self.registry.snapshot();
        self.emitter.broadcast(&snapshot, &messages);
    }
}
