use std::time::Duration;

use secrecy::SecretString;
use streamcast_core::config::{BackendConfig, BridgeConfig};
use streamcast_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() {
    init_telemetry(&TelemetryConfig {
        json_output: std::env::var("STREAMCAST_LOG_JSON").is_ok(),
        ..Default::default()
    });
    let prometheus = streamcast_server::metrics::install_recorder();

    tracing::info!("Starting streamcast bridge");

    let roster_url =
        std::env::var("STREAMCAST_ROSTER_URL").expect("STREAMCAST_ROSTER_URL must be set");
    let backend_url =
        std::env::var("STREAMCAST_BACKEND_URL").expect("STREAMCAST_BACKEND_URL must be set");
    let username = std::env::var("STREAMCAST_BACKEND_USERNAME")
        .expect("STREAMCAST_BACKEND_USERNAME must be set");
    let password = std::env::var("STREAMCAST_BACKEND_PASSWORD")
        .expect("STREAMCAST_BACKEND_PASSWORD must be set");

    let mut bridge_config = BridgeConfig::default();
    if let Ok(ms) = std::env::var("STREAMCAST_POLL_INTERVAL_MS") {
        let ms: u64 = ms.parse().expect("STREAMCAST_POLL_INTERVAL_MS must be an integer");
        bridge_config.poll_interval = Duration::from_millis(ms);
    }

    let backend = BackendConfig::new(backend_url, username, SecretString::from(password));

    // Roster failure is fatal; the process never serves a partial tenant set.
    let roster = streamcast_stream::fetch_roster(&roster_url)
        .await
        .expect("Failed to fetch tenant roster");

    let supervisor = streamcast_server::BridgeSupervisor::start(
        roster,
        bridge_config,
        backend,
        Some(prometheus),
    )
    .await
    .expect("Failed to start tenant bridges");

    tracing::info!(tenants = supervisor.bridges().len(), "streamcast ready");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
