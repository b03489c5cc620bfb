use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use streamcast_core::config::BackendConfig;
use streamcast_core::errors::BridgeError;
use streamcast_core::records::StreamRecord;

/// Response header carrying the continuation token on a successful fetch.
const NEXT_CURSOR_HEADER: &str = "opc-next-cursor";
/// Request header carrying the tenant's service routing hint.
const SERVICE_ROUTE_HEADER: &str = "x-service-route";

/// Result of one `fetch_messages` call. Zero records is a valid outcome.
#[derive(Clone, Debug, Default)]
pub struct FetchResult {
    pub records: Vec<StreamRecord>,
    pub next_cursor: Option<String>,
}

/// Boundary to the stream backend. One implementation talks REST; tests
/// use a scripted mock.
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Create a cursor at the tail of partition "0". Never replays history.
    async fn create_cursor(&self, stream_id: &str) -> Result<String, BridgeError>;

    /// Fetch the next batch of records for a cursor. A non-success status
    /// means the cursor is no longer valid; classifying what to do about
    /// that is the caller's job.
    async fn fetch_messages(&self, stream_id: &str, cursor: &str) -> Result<FetchResult, BridgeError>;
}

#[derive(Deserialize)]
struct CursorResponse {
    value: String,
}

/// REST client for the stream backend. One instance per tenant, since the
/// service routing header differs per tenant. No automatic retry; every
/// failure is reported exactly once per call.
pub struct StreamClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: secrecy::SecretString,
    service_route: String,
}

impl StreamClient {
    pub fn new(config: &BackendConfig, service_route: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.request_timeout)
                .build()
                .expect("failed to build HTTP client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            service_route: service_route.into(),
        }
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(SERVICE_ROUTE_HEADER, &self.service_route)
            .header("accept", "application/json")
    }

    fn transport_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(e.to_string())
        } else {
            BridgeError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl StreamApi for StreamClient {
    async fn create_cursor(&self, stream_id: &str) -> Result<String, BridgeError> {
        let url = format!("{}/streams/{}/cursors", self.base_url, stream_id);
        let body = serde_json::json!({ "partition": "0", "type": "LATEST" });

        let resp = self
            .request(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::CursorCreate { status: status.as_u16(), body });
        }

        let cursor: CursorResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::InvalidResponse(format!("cursor body: {e}")))?;
        Ok(cursor.value)
    }

    async fn fetch_messages(&self, stream_id: &str, cursor: &str) -> Result<FetchResult, BridgeError> {
        let url = format!("{}/streams/{}/messages", self.base_url, stream_id);

        let resp = self
            .request(self.http.get(&url))
            .query(&[("cursor", cursor)])
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::CursorRejected { status: status.as_u16(), body });
        }

        let next_cursor = resp
            .headers()
            .get(NEXT_CURSOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let records: Vec<StreamRecord> = resp
            .json()
            .await
            .map_err(|e| BridgeError::InvalidResponse(format!("records body: {e}")))?;

        Ok(FetchResult { records, next_cursor })
    }
}
