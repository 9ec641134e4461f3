//! Core domain types for fetching and annotating channel history

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// File extensions treated as images when classifying attachments.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Inclusive time window over message creation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parse a window from externally supplied date strings: RFC 3339
    /// instants, or bare dates read as midnight UTC.
    ///
    /// An unparseable bound is an input error for the whole request.
    pub fn parse(start: &str, end: &str) -> Result<Self, FetchError> {
        let start = parse_instant(start)
            .ok_or_else(|| FetchError::InvalidArgument(format!("invalid start date: {start:?}")))?;
        let end = parse_instant(end)
            .ok_or_else(|| FetchError::InvalidArgument(format!("invalid end date: {end:?}")))?;
        Ok(Self { start, end })
    }

    /// Whether `ts` falls within `[start, end]`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(instant) = s.parse::<DateTime<Utc>>() {
        return Some(instant);
    }
    s.parse::<NaiveDate>()
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Message attachment as reported by the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentInfo {
    pub filename: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl AttachmentInfo {
    /// Whether this attachment is an image, judged by content type first
    /// and filename extension as a fallback.
    pub fn is_image(&self) -> bool {
        if let Some(ct) = &self.content_type {
            if ct.starts_with("image/") {
                return true;
            }
        }
        match self.filename.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            }
            None => false,
        }
    }
}

/// Raw message as pulled from a channel history page, before annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedMessage {
    pub id: u64,
    pub author_id: u64,
    pub username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
}

/// Message copy with mentions rewritten to display names and image
/// attachment URLs extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedMessage {
    pub id: u64,
    pub username: String,
    pub message: String,
    pub images: Vec<String>,
}

/// One conversation turn kept in the bounded context buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextEntry {
    pub username: String,
    pub message: String,
}
