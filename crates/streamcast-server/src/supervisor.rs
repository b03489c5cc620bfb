use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use streamcast_core::config::{BackendConfig, BridgeConfig, TenantDescriptor};
use streamcast_core::errors::BridgeError;
use streamcast_stream::{StreamApi, StreamClient};

use crate::bridge::TenantBridge;
use crate::server::{ListenerHandle, start_listener};

/// Owns every tenant bridge and its listener. Startup is all-or-nothing:
/// any bind failure aborts the whole process rather than serving a
/// partial roster.
pub struct BridgeSupervisor {
    bridges: Vec<Arc<TenantBridge>>,
    listeners: Vec<ListenerHandle>,
}

impl std::fmt::Debug for BridgeSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSupervisor")
            .field("bridges", &self.bridges.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl BridgeSupervisor {
    /// Build one bridge and listener per roster entry against the real
    /// stream backend.
    pub async fn start(
        roster: Vec<TenantDescriptor>,
        config: BridgeConfig,
        backend: BackendConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, BridgeError> {
        Self::start_with(roster, config, metrics, |descriptor| {
            Arc::new(StreamClient::new(&backend, descriptor.service_route.clone())) as Arc<dyn StreamApi>
        })
        .await
    }

    /// Same as `start`, but the backend client per tenant comes from the
    /// given factory. Tests plug scripted mocks in here.
    pub async fn start_with(
        roster: Vec<TenantDescriptor>,
        config: BridgeConfig,
        metrics: Option<PrometheusHandle>,
        api_for: impl Fn(&TenantDescriptor) -> Arc<dyn StreamApi>,
    ) -> Result<Self, BridgeError> {
        if roster.is_empty() {
            tracing::warn!("Roster is empty, nothing to serve");
        }

        let mut bridges = Vec::with_capacity(roster.len());
        let mut listeners = Vec::with_capacity(roster.len());

        for descriptor in roster {
            let api = api_for(&descriptor);
            let bridge = Arc::new(TenantBridge::new(descriptor, &config, api));
            let listener = start_listener(Arc::clone(&bridge), &config, metrics.clone()).await?;
            bridges.push(bridge);
            listeners.push(listener);
        }

        tracing::info!(tenants = bridges.len(), "All tenant bridges started");
        Ok(Self { bridges, listeners })
    }

    pub fn bridges(&self) -> &[Arc<TenantBridge>] {
        &self.bridges
    }

    /// Bound ports, in roster order. Differs from the descriptors only
    /// when a descriptor asked for port 0.
    pub fn ports(&self) -> Vec<u16> {
        self.listeners.iter().map(|l| l.port).collect()
    }
}
