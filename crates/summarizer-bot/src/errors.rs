//! Non-fatal error reporting back into Discord.
//!
//! Chat-originated failures are logged and answered with a templated
//! apology in the originating channel or thread; the process never
//! crashes over them. Transient errors are only logged.

use serenity::http::Http;
use serenity::model::id::ChannelId;
use summarizer_types::FetchError;
use tracing::{error, warn};

/// Longest reason text carried into an apology reply, keeping the whole
/// message safely under Discord's 2000-character limit.
pub const APOLOGY_REASON_LIMIT: usize = 1800;

/// Build the user-facing apology for a failed request.
pub fn apology(err: &FetchError) -> String {
    let detail = err.to_string();
    let reason = truncate(&detail, APOLOGY_REASON_LIMIT);
    format!("Sorry, I can't do that right now... reason: {reason}\nPlease ask me again.")
}

/// Log the failure and post the apology into the originating channel.
pub async fn report_to_channel(http: &Http, channel_id: ChannelId, err: &FetchError) {
    if err.is_transient() {
        warn!("Transient failure on channel {}: {}", channel_id, err);
        return;
    }

    warn!("Request failed on channel {}: {}", channel_id, err);
    if let Err(e) = channel_id.say(http, apology(err)).await {
        error!("Failed to deliver error reply to {}: {}", channel_id, e);
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
