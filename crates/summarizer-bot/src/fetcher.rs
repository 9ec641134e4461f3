//! Time-windowed channel history fetcher.
//!
//! Paginates backward through a channel's history in pages of up to 100
//! messages (newest first), annotating every message that falls inside
//! the requested window. History arrives in non-increasing timestamp
//! order, so the first message older than the window start proves no
//! further eligible messages remain and ends the whole fetch.
//!
//! The page source and the user lookup are injected so the loop can be
//! exercised against a synthetic history.

#[path = "fetcher_tests.rs"]
mod fetcher_tests;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::GetMessages;
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType};
use serenity::model::id::{ChannelId, MessageId, UserId};
use summarizer_types::{
    AnnotatedMessage, AttachmentInfo, FetchError, FetchWindow, FetchedMessage,
};
use tracing::debug;

use crate::mentions::resolve_mentions;

/// Page size used for history pagination. Discord caps this at 100.
pub const PAGE_SIZE: u8 = 100;

/// One page of raw history, newest first, strictly before the cursor.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn page_before(&self, before: Option<u64>) -> Result<Vec<FetchedMessage>, FetchError>;
}

/// Windowed history fetch as exposed to the HTTP facade.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(
        &self,
        channel_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<AnnotatedMessage>, FetchError>;
}

/// Annotate one raw message: resolve mention tokens and pull out the
/// URLs of image attachments.
pub fn annotate<F>(msg: &FetchedMessage, lookup: F) -> AnnotatedMessage
where
    F: Fn(u64) -> Option<String>,
{
    AnnotatedMessage {
        id: msg.id,
        username: msg.username.clone(),
        message: resolve_mentions(&msg.content, lookup),
        images: msg
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| a.url.clone())
            .collect(),
    }
}

/// Collect every message within `window`, preserving discovery order
/// (pages newest to oldest, each page newest first). Terminates on an
/// empty page or on the first message older than the window start.
pub async fn fetch_window(
    source: &dyn HistorySource,
    lookup: &(dyn Fn(u64) -> Option<String> + Send + Sync),
    window: &FetchWindow,
) -> Result<Vec<AnnotatedMessage>, FetchError> {
    let mut collected = Vec::new();
    let mut before: Option<u64> = None;

    loop {
        let page = source.page_before(before).await?;
        if page.is_empty() {
            return Ok(collected);
        }

        for msg in &page {
            if msg.timestamp < window.start {
                return Ok(collected);
            }
            if window.contains(msg.timestamp) {
                collected.push(annotate(msg, lookup));
            }
        }

        before = page.last().map(|m| m.id);
    }
}

/// Production fetcher backed by the serenity HTTP client and user cache.
pub struct MessageFetcher {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl MessageFetcher {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    /// Fetch and annotate all messages of `channel_id` whose creation
    /// timestamps fall within `[start, end]`.
    pub async fn fetch(
        &self,
        channel_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<AnnotatedMessage>, FetchError> {
        let trimmed = channel_id.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidArgument(
                "channel id is required".to_string(),
            ));
        }
        let raw: u64 = trimmed.parse().map_err(|_| {
            FetchError::InvalidArgument(format!("invalid channel id: {trimmed:?}"))
        })?;
        if raw == 0 {
            return Err(FetchError::InvalidArgument(
                "channel id must be non-zero".to_string(),
            ));
        }
        let window = FetchWindow::parse(start, end)?;

        let channel_id = ChannelId::new(raw);
        let channel = channel_id
            .to_channel(&self.http)
            .await
            .map_err(|_| FetchError::ChannelNotFound(trimmed.to_string()))?;
        if !is_text_capable(&channel) {
            return Err(FetchError::ChannelNotFound(format!(
                "{trimmed} is not a text channel"
            )));
        }

        self.fetch_in(channel_id, &window).await
    }

    /// Fetch a window from an already-validated text channel.
    pub async fn fetch_in(
        &self,
        channel_id: ChannelId,
        window: &FetchWindow,
    ) -> Result<Vec<AnnotatedMessage>, FetchError> {
        debug!(
            "Fetching history for channel {} within [{}, {}]",
            channel_id, window.start, window.end
        );

        let source = SerenityHistory {
            http: self.http.clone(),
            channel_id,
        };
        let cache = self.cache.clone();
        let lookup = move |id: u64| {
            if id == 0 {
                return None;
            }
            cache
                .user(UserId::new(id))
                .map(|u| u.global_name.clone().unwrap_or_else(|| u.name.clone()))
        };

        fetch_window(&source, &lookup, window).await
    }
}

#[async_trait]
impl HistoryProvider for MessageFetcher {
    async fn fetch_history(
        &self,
        channel_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<AnnotatedMessage>, FetchError> {
        self.fetch(channel_id, start, end).await
    }
}

fn is_text_capable(channel: &Channel) -> bool {
    match channel {
        Channel::Guild(ch) => matches!(
            ch.kind,
            ChannelType::Text
                | ChannelType::News
                | ChannelType::PublicThread
                | ChannelType::PrivateThread
                | ChannelType::NewsThread
        ),
        Channel::Private(_) => true,
        _ => false,
    }
}

/// Convert a serenity timestamp to `chrono` at whole-second precision.
pub(crate) fn timestamp_utc(ts: serenity::model::Timestamp) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts.unix_timestamp(), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

struct SerenityHistory {
    http: Arc<Http>,
    channel_id: ChannelId,
}

#[async_trait]
impl HistorySource for SerenityHistory {
    async fn page_before(&self, before: Option<u64>) -> Result<Vec<FetchedMessage>, FetchError> {
        let mut request = GetMessages::new().limit(PAGE_SIZE);
        if let Some(id) = before {
            request = request.before(MessageId::new(id));
        }

        let page = self
            .channel_id
            .messages(&self.http, request)
            .await
            .map_err(|e| FetchError::Upstream(format!("history page fetch failed: {e}")))?;

        Ok(page
            .into_iter()
            .map(|m| FetchedMessage {
                id: m.id.get(),
                author_id: m.author.id.get(),
                username: m
                    .author
                    .global_name
                    .clone()
                    .unwrap_or_else(|| m.author.name.clone()),
                content: m.content,
                timestamp: timestamp_utc(m.timestamp),
                attachments: m
                    .attachments
                    .into_iter()
                    .map(|a| AttachmentInfo {
                        filename: a.filename,
                        url: a.url,
                        content_type: a.content_type,
                    })
                    .collect(),
            })
            .collect())
    }
}
