/// Typed error hierarchy for bridge operations.
/// Classifies errors as fatal (abort startup) or recoverable per poll cycle.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BridgeError {
    // Fatal — startup must abort, no tenant is partially served
    #[error("roster fetch failed: {0}")]
    RosterFetch(String),
    #[error("failed to bind listener on port {port}: {reason}")]
    ListenerBind { port: u16, reason: String },

    // Recoverable — handled within one poll cycle, next tick retries
    #[error("cursor create failed with status {status}")]
    CursorCreate { status: u16, body: String },
    #[error("cursor rejected by backend with status {status}")]
    CursorRejected { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("record decode failed: {0}")]
    Decode(String),
}

impl BridgeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RosterFetch(_) | Self::ListenerBind { .. })
    }

    /// Whether a held cursor might be stale after this error and must be
    /// discarded before the next cycle.
    pub fn invalidates_cursor(&self) -> bool {
        matches!(
            self,
            Self::CursorRejected { .. } | Self::Network(_) | Self::Timeout(_) | Self::InvalidResponse(_)
        )
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::RosterFetch(_) => "roster_fetch",
            Self::ListenerBind { .. } => "listener_bind",
            Self::CursorCreate { .. } => "cursor_create",
            Self::CursorRejected { .. } => "cursor_rejected",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Decode(_) => "decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(BridgeError::RosterFetch("500".into()).is_fatal());
        assert!(BridgeError::ListenerBind { port: 8080, reason: "in use".into() }.is_fatal());
        assert!(!BridgeError::Network("reset".into()).is_fatal());
        assert!(!BridgeError::CursorCreate { status: 503, body: String::new() }.is_fatal());
    }

    #[test]
    fn cursor_invalidation_classification() {
        assert!(BridgeError::CursorRejected { status: 400, body: String::new() }.invalidates_cursor());
        assert!(BridgeError::Network("reset".into()).invalidates_cursor());
        assert!(BridgeError::Timeout("10s".into()).invalidates_cursor());
        // A failed create never stored a cursor, so there is nothing to clear
        assert!(!BridgeError::CursorCreate { status: 503, body: String::new() }.invalidates_cursor());
        assert!(!BridgeError::Decode("bad base64".into()).invalidates_cursor());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(BridgeError::Network("x".into()).error_kind(), "network");
        assert_eq!(
            BridgeError::CursorRejected { status: 400, body: String::new() }.error_kind(),
            "cursor_rejected"
        );
        assert_eq!(BridgeError::RosterFetch("x".into()).error_kind(), "roster_fetch");
    }
}
