//! HTTP facade: channel history, image proxy and health endpoints.
//!
//! Serves independently of the gateway session; history requests go
//! through the injected provider and fail with a JSON error body when
//! the fetch does.

#[path = "server_tests.rs"]
mod server_tests;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use summarizer_types::{AnnotatedMessage, FetchError};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::fetcher::HistoryProvider;

/// CDN hosts the image proxy is allowed to download from.
pub const ALLOWED_CDN_HOSTS: [&str; 2] = ["cdn.discordapp.com", "media.discordapp.net"];

/// Download of a single CDN resource: raw bytes plus the reported
/// content type.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), FetchError>;
}

/// Downloads CDN resources using the bot's bearer credential, so
/// access-restricted attachments resolve too.
pub struct BotCdnDownloader {
    client: reqwest::Client,
    bot_token: String,
}

impl BotCdnDownloader {
    pub fn new(bot_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token,
        }
    }
}

#[async_trait]
impl MediaDownloader for BotCdnDownloader {
    async fn download(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|e| FetchError::Upstream(format!("image download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FetchError::Upstream(format!(
                "image download returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Upstream(format!("image download failed: {e}")))?;

        Ok((bytes.to_vec(), content_type))
    }
}

/// Shared application state for the facade
#[derive(Clone)]
pub struct AppState {
    pub start_time: SystemTime,
    pub bot_username: Arc<RwLock<Option<String>>>,
    pub history: Arc<dyn HistoryProvider>,
    pub downloader: Arc<dyn MediaDownloader>,
}

impl AppState {
    pub fn new(history: Arc<dyn HistoryProvider>, downloader: Arc<dyn MediaDownloader>) -> Self {
        Self {
            start_time: SystemTime::now(),
            bot_username: Arc::new(RwLock::new(None)),
            history,
            downloader,
        }
    }

    pub async fn set_bot_username(&self, username: String) {
        let mut guard = self.bot_username.write().await;
        *guard = Some(username);
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub bot_username: Option<String>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryQuery {
    pub channel_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageProxyRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageProxyResponse {
    pub base64: String,
    pub content_type: Option<String>,
    pub original_url: String,
}

pub(crate) fn is_allowed_cdn(url: &Url) -> bool {
    matches!(url.host_str(), Some(host) if ALLOWED_CDN_HOSTS.contains(&host))
}

async fn root_handler() -> &'static str {
    "Channel summarizer bot is running"
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();
    let bot_username = state.bot_username.read().await.clone();

    (
        StatusCode::OK,
        Json(HealthStatus {
            status: "ok".to_string(),
            bot_username,
            uptime_secs: uptime,
        }),
    )
}

async fn live_handler() -> StatusCode {
    StatusCode::OK
}

pub(crate) async fn history_handler(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<AnnotatedMessage>>, (StatusCode, Json<ErrorBody>)> {
    let (Some(channel_id), Some(start), Some(end)) =
        (params.channel_id, params.start_date, params.end_date)
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "parameters: channelId, startDate, endDate".to_string(),
            }),
        ));
    };

    match state.history.fetch_history(&channel_id, &start, &end).await {
        Ok(messages) => {
            info!("Fetched {} messages", messages.len());
            Ok(Json(messages))
        }
        // Any fetch failure, bad input included, reports as a server
        // error; 400 is reserved for missing query parameters.
        Err(err) => {
            error!("Error fetching messages: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to fetch messages".to_string(),
                }),
            ))
        }
    }
}

pub(crate) async fn image_proxy_handler(
    State(state): State<AppState>,
    Json(request): Json<ImageProxyRequest>,
) -> Result<Json<ImageProxyResponse>, (StatusCode, Json<ErrorBody>)> {
    let Some(raw_url) = request.url else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Missing required parameter: url in request body".to_string(),
            }),
        ));
    };

    let not_cdn = || {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "URL must be from Discord's CDN".to_string(),
            }),
        )
    };
    let url = Url::parse(&raw_url).map_err(|_| not_cdn())?;
    if !is_allowed_cdn(&url) {
        return Err(not_cdn());
    }

    info!("Downloading image from: {}", url);

    match state.downloader.download(&url).await {
        Ok((bytes, content_type)) => Ok(Json(ImageProxyResponse {
            base64: BASE64.encode(&bytes),
            content_type,
            original_url: raw_url,
        })),
        Err(err) => {
            error!("Error downloading image: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to download image".to_string(),
                }),
            ))
        }
    }
}

/// Create the facade router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/live", get(live_handler))
        .route("/history", get(history_handler))
        .route("/image-proxy", post(image_proxy_handler))
        .with_state(state)
}

/// Start the facade server
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("HTTP facade listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
