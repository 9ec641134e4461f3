//! Error taxonomy shared between the fetcher, the bot session and the
//! HTTP facade.
//!
//! Chat-originated errors are reported back into the originating channel
//! and never crash the process; on the HTTP facade a fetch failure of
//! any kind surfaces as a server-side error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of a history fetch or one of its collaborators.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FetchError {
    /// Missing or malformed required input (channel id, date string).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier does not resolve, or resolves to a non-text channel.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// Remote summarizer or CDN call failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Gateway session is not ready yet; resolved by waiting, not failing.
    #[error("session not ready")]
    SessionNotReady,
}

impl FetchError {
    /// Transient errors resolve themselves by waiting and are never
    /// reported to chat users.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SessionNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_not_ready_is_transient() {
        assert!(FetchError::SessionNotReady.is_transient());
        assert!(!FetchError::InvalidArgument("x".into()).is_transient());
        assert!(!FetchError::ChannelNotFound("1".into()).is_transient());
        assert!(!FetchError::Upstream("boom".into()).is_transient());
    }

    #[test]
    fn test_display_includes_detail() {
        let e = FetchError::ChannelNotFound("12345".into());
        assert_eq!(e.to_string(), "channel not found: 12345");
    }

    #[test]
    fn test_serde_tagged_shape() {
        let e = FetchError::InvalidArgument("bad date".into());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "invalid_argument");
        assert_eq!(json["detail"], "bad date");
    }
}
