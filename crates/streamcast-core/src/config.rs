use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

/// One roster entry: a tenant and where its stream and listener live.
/// Field names follow the roster service's JSON. Immutable after load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TenantDescriptor {
    #[serde(rename = "demozone")]
    pub tenant: TenantId,
    #[serde(rename = "streamid")]
    pub stream_id: String,
    /// Routing hint forwarded to the stream backend on every request.
    #[serde(rename = "serviceuri")]
    pub service_route: String,
    #[serde(rename = "websocketport")]
    pub port: u16,
}

/// Tunables for the per-tenant polling and WebSocket behavior.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Fixed interval between poll ticks. The only backoff in the system.
    pub poll_interval: Duration,
    /// Transport-level ping cadence for connected clients.
    pub ping_interval: Duration,
    /// A client that misses pongs for this long is considered dead.
    pub ping_timeout: Duration,
    /// Capacity of each session's outbound send queue.
    pub max_send_queue: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            max_send_queue: 256,
        }
    }
}

/// Connection settings for the stream backend.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}
