use std::time::Duration;

use serde::Deserialize;

use streamcast_core::config::TenantDescriptor;
use streamcast_core::errors::BridgeError;

const ROSTER_PATH: &str = "/streaming/setup";
const ROSTER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct RosterResponse {
    items: Vec<TenantDescriptor>,
}

/// Fetch the tenant roster from the configuration service. Any failure
/// here is fatal at startup; the process never serves a partial tenant set.
pub async fn fetch_roster(base_url: &str) -> Result<Vec<TenantDescriptor>, BridgeError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), ROSTER_PATH);

    let http = reqwest::Client::builder()
        .connect_timeout(ROSTER_TIMEOUT)
        .timeout(ROSTER_TIMEOUT)
        .build()
        .map_err(|e| BridgeError::RosterFetch(e.to_string()))?;

    let resp = http
        .get(&url)
        .header("accept", "application/json")
        .send()
        .await
        .map_err(|e| BridgeError::RosterFetch(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(BridgeError::RosterFetch(format!("status {status}")));
    }

    let roster: RosterResponse = resp
        .json()
        .await
        .map_err(|e| BridgeError::RosterFetch(format!("body: {e}")))?;

    tracing::info!(tenants = roster.items.len(), "Roster loaded");
    Ok(roster.items)
}
