use std::sync::Arc;

use tokio::sync::Mutex;

use streamcast_core::errors::BridgeError;
use streamcast_core::ids::TenantId;

use crate::client::StreamApi;

/// Owns the single cursor token for one tenant. At most one cursor exists
/// per tenant at any time; creation is lazy and every create/fetch failure
/// clears it so the next cycle starts fresh.
pub struct CursorManager {
    tenant: TenantId,
    stream_id: String,
    api: Arc<dyn StreamApi>,
    cursor: Mutex<Option<String>>,
}

impl CursorManager {
    pub fn new(tenant: TenantId, stream_id: impl Into<String>, api: Arc<dyn StreamApi>) -> Self {
        Self {
            tenant,
            stream_id: stream_id.into(),
            api,
            cursor: Mutex::new(None),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Return the held cursor, creating one at the stream tail if none is
    /// held. On a failed create the cursor stays unset and the error goes
    /// back to the caller; the caller must not retry within the same cycle.
    pub async fn ensure(&self) -> Result<String, BridgeError> {
        let mut cursor = self.cursor.lock().await;
        if let Some(token) = cursor.as_ref() {
            return Ok(token.clone());
        }

        tracing::debug!(tenant = %self.tenant, "No cursor held, creating one");
        let token = self.api.create_cursor(&self.stream_id).await?;
        tracing::debug!(tenant = %self.tenant, "Cursor created");
        *cursor = Some(token.clone());
        Ok(token)
    }

    /// Replace the held cursor with a continuation token from a fetch.
    pub async fn store(&self, token: String) {
        *self.cursor.lock().await = Some(token);
    }

    /// Drop the held cursor unconditionally. The next `ensure` call will
    /// create a fresh one at the stream tail.
    pub async fn invalidate(&self) {
        let mut cursor = self.cursor.lock().await;
        if cursor.take().is_some() {
            tracing::debug!(tenant = %self.tenant, "Cursor invalidated");
        }
    }

    /// Whether a cursor is currently held. Diagnostic only.
    pub async fn is_held(&self) -> bool {
        self.cursor.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockStreamApi};
    use streamcast_core::errors::BridgeError;

    fn manager(api: Arc<MockStreamApi>) -> CursorManager {
        CursorManager::new(TenantId::from_raw("TEST"), "stream-a", api)
    }

    #[tokio::test]
    async fn ensure_creates_once_then_reuses() {
        let api = Arc::new(MockStreamApi::new(vec![MockResponse::Cursor("tok-1".into())]));
        let mgr = manager(Arc::clone(&api));

        assert_eq!(mgr.ensure().await.unwrap(), "tok-1");
        assert_eq!(mgr.ensure().await.unwrap(), "tok-1");
        assert_eq!(api.create_calls(), 1, "second ensure must not hit the network");
    }

    #[tokio::test]
    async fn failed_create_leaves_cursor_unset() {
        let api = Arc::new(MockStreamApi::new(vec![
            MockResponse::Error(BridgeError::CursorCreate { status: 503, body: String::new() }),
            MockResponse::Cursor("tok-2".into()),
        ]));
        let mgr = manager(Arc::clone(&api));

        assert!(mgr.ensure().await.is_err());
        assert!(!mgr.is_held().await);

        // Next cycle creates fresh
        assert_eq!(mgr.ensure().await.unwrap(), "tok-2");
        assert_eq!(api.create_calls(), 2);
    }

    #[tokio::test]
    async fn store_replaces_held_cursor() {
        let api = Arc::new(MockStreamApi::new(vec![MockResponse::Cursor("tok-1".into())]));
        let mgr = manager(api);

        mgr.ensure().await.unwrap();
        mgr.store("tok-9".into()).await;
        assert_eq!(mgr.ensure().await.unwrap(), "tok-9");
    }

    #[tokio::test]
    async fn invalidate_forces_recreate() {
        let api = Arc::new(MockStreamApi::new(vec![
            MockResponse::Cursor("tok-1".into()),
            MockResponse::Cursor("tok-2".into()),
        ]));
        let mgr = manager(Arc::clone(&api));

        assert_eq!(mgr.ensure().await.unwrap(), "tok-1");
        mgr.invalidate().await;
        assert!(!mgr.is_held().await);
        assert_eq!(mgr.ensure().await.unwrap(), "tok-2");
        assert_eq!(api.create_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_without_cursor_is_noop() {
        let api = Arc::new(MockStreamApi::new(vec![]));
        let mgr = manager(api);
        mgr.invalidate().await;
        assert!(!mgr.is_held().await);
    }
}
