//! Remote summarizer client.
//!
//! Proxies conversation payloads to the locally hosted summarization
//! service over plain HTTP. A single failed call propagates to the
//! caller; there is no retry.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use summarizer_types::FetchError;
use tracing::debug;

/// Summarizer endpoint configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub base_url: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// HTTP client for the summarization service.
#[derive(Clone)]
pub struct SummarizerClient {
    client: Client,
    config: SummarizerConfig,
}

impl SummarizerClient {
    pub fn new(config: SummarizerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Submit a batch of conversation turns and return the summary text.
    pub async fn summarize<T: Serialize + Sync>(
        &self,
        messages: &[T],
        channel_id: u64,
        thread_id: Option<u64>,
    ) -> Result<String, FetchError> {
        let url = format!("{}/summarize", self.config.base_url.trim_end_matches('/'));
        let request = SummarizeRequest {
            messages,
            channel_id: channel_id.to_string(),
            thread_id: thread_id.map(|id| id.to_string()),
        };

        debug!("Requesting summary from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("summarizer request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Upstream(format!(
                "summarizer returned {status}: {body}"
            )));
        }

        let parsed: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(format!("summarizer response malformed: {e}")))?;

        Ok(parsed.message)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest<'a, T: Serialize> {
    messages: &'a [T],
    channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use summarizer_types::ContextEntry;

    #[test]
    fn test_request_wire_shape() {
        let messages = vec![ContextEntry {
            username: "alice".to_string(),
            message: "hello".to_string(),
        }];
        let req = SummarizeRequest {
            messages: &messages,
            channel_id: "123".to_string(),
            thread_id: Some("456".to_string()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["channelId"], "123");
        assert_eq!(json["threadId"], "456");
        assert_eq!(json["messages"][0]["username"], "alice");
    }

    #[test]
    fn test_request_omits_missing_thread() {
        let messages: Vec<ContextEntry> = vec![];
        let req = SummarizeRequest {
            messages: &messages,
            channel_id: "123".to_string(),
            thread_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("threadId").is_none());
    }

    #[test]
    fn test_response_parse() {
        let parsed: SummarizeResponse =
            serde_json::from_str(r#"{"message":"the summary"}"#).unwrap();
        assert_eq!(parsed.message, "the summary");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let cfg = SummarizerConfig {
            base_url: "http://localhost:8000/".to_string(),
        };
        let url = format!("{}/summarize", cfg.base_url.trim_end_matches('/'));
        assert_eq!(url, "http://localhost:8000/summarize");
    }
}
