//! Serenity event handler implementation

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serenity::async_trait;
use serenity::builder::CreateThread;
use serenity::model::channel::{AutoArchiveDuration, Channel, ChannelType, Message};
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, MessageId};
use serenity::prelude::*;
use summarizer_types::{ContextEntry, FetchError, FetchWindow, SessionHandle, SessionState};
use tracing::{debug, error, info, warn};

use crate::config::DiscordConfig;
use crate::context::ContextBuffer;
use crate::errors::report_to_channel;
use crate::fetcher::MessageFetcher;
use crate::server::AppState;
use crate::summarize::SummarizerClient;

/// Longest message prefix carried into a thread title.
const THREAD_TITLE_LEN: usize = 50;

/// Shared bot state, stored in serenity's TypeMap.
pub struct Bot {
    pub config: DiscordConfig,
    pub session: SessionHandle,
    pub context: ContextBuffer,
    pub summarizer: SummarizerClient,
    pub app_state: AppState,
}

impl TypeMapKey for Bot {
    type Value = Arc<Bot>;
}

pub struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let bot = {
            let data = ctx.data.read().await;
            match data.get::<Bot>() {
                Some(b) => b.clone(),
                None => {
                    error!("Bot state not found in context data");
                    return;
                }
            }
        };

        bot.session.set(SessionState::Ready);
        bot.app_state.set_bot_username(ready.user.name.clone()).await;

        if bot.config.startup_greeting {
            if let Some(channel) = bot.config.default_channel_id.filter(|id| *id != 0) {
                let channel = ChannelId::new(channel);
                if let Err(e) = channel
                    .say(&ctx.http, "Hello, I'm ready to summarize!")
                    .await
                {
                    warn!("Failed to post startup greeting: {}", e);
                }
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages, our own included
        if msg.author.bot {
            return;
        }

        let bot = {
            let data = ctx.data.read().await;
            match data.get::<Bot>() {
                Some(b) => b.clone(),
                None => {
                    error!("Bot state not found in context data");
                    return;
                }
            }
        };

        let me = ctx.cache.current_user().id.get();

        // Replies inside a thread the bot started
        if let Some(parent_id) = bot_thread_parent(&ctx, &msg).await {
            if !bot.config.thread_auto_reply {
                return;
            }
            debug!("Message in bot thread {}: {}", msg.channel_id, msg.content);
            if let Err(err) = handle_thread_reply(&ctx, &bot, &msg, parent_id).await {
                report_to_channel(&ctx.http, msg.channel_id, &err).await;
            }
            return;
        }

        // Not in one of our threads: react to mentions only
        let mention_ids: Vec<u64> = msg.mentions.iter().map(|u| u.id.get()).collect();
        let replied_author = msg.referenced_message.as_deref().map(|m| m.author.id.get());
        if !mentions_bot(
            &bot.config.bot_mention_id,
            &msg.content,
            &mention_ids,
            replied_author,
            me,
        ) {
            return;
        }

        if let Err(err) = handle_mention(&ctx, &bot, &msg).await {
            report_to_channel(&ctx.http, msg.channel_id, &err).await;
        }
    }
}

/// If `msg` was posted in a thread whose starter message the bot
/// authored, return the parent channel id.
async fn bot_thread_parent(ctx: &Context, msg: &Message) -> Option<ChannelId> {
    let channel = match msg.channel(ctx).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Failed to resolve channel {}: {}", msg.channel_id, e);
            return None;
        }
    };

    let Channel::Guild(thread) = channel else {
        return None;
    };
    if !matches!(
        thread.kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    ) {
        return None;
    }
    let parent_id = thread.parent_id?;

    let me = ctx.cache.current_user().id;
    // A thread shares its id with its starter message.
    match parent_id
        .message(&ctx.http, MessageId::new(thread.id.get()))
        .await
    {
        Ok(starter) if starter.author.id == me => Some(parent_id),
        Ok(_) => None,
        // Starter deleted or inaccessible; treat as not ours.
        Err(_) => None,
    }
}

/// Whether the message addresses the bot: raw mention-id token in the
/// text, a mention of the bot user, or a reply to one of its messages.
fn mentions_bot(
    bot_mention_id: &str,
    content: &str,
    mention_ids: &[u64],
    replied_author: Option<u64>,
    me: u64,
) -> bool {
    (!bot_mention_id.is_empty() && content.contains(bot_mention_id))
        || mention_ids.contains(&me)
        || replied_author == Some(me)
}

/// Mention flow: open a thread on the triggering message, fetch the
/// requested window of channel history and post the remote summary.
async fn handle_mention(ctx: &Context, bot: &Bot, msg: &Message) -> Result<(), FetchError> {
    bot.session.wait_ready().await?;

    if let Err(e) = msg.channel_id.broadcast_typing(&ctx.http).await {
        debug!("Failed to broadcast typing indicator: {}", e);
    }

    let me = ctx.cache.current_user().id.get();
    let title = thread_title(&msg.content, me);
    let thread = msg
        .channel_id
        .create_thread_from_message(
            &ctx.http,
            msg.id,
            CreateThread::new(title).auto_archive_duration(AutoArchiveDuration::OneDay),
        )
        .await
        .map_err(|e| FetchError::Upstream(format!("thread creation failed: {e}")))?;

    thread
        .id
        .say(&ctx.http, "Starting a summary in this thread!")
        .await
        .map_err(|e| FetchError::Upstream(format!("thread reply failed: {e}")))?;

    let window = window_from_text(&msg.content, Utc::now());
    let fetcher = MessageFetcher::new(ctx.http.clone(), ctx.cache.clone());
    let messages = fetcher.fetch_in(msg.channel_id, &window).await?;
    info!(
        "Summarizing {} messages from channel {}",
        messages.len(),
        msg.channel_id
    );

    let summary = bot
        .summarizer
        .summarize(&messages, msg.channel_id.get(), Some(thread.id.get()))
        .await?;

    thread
        .id
        .say(&ctx.http, summary.as_str())
        .await
        .map_err(|e| FetchError::Upstream(format!("thread reply failed: {e}")))?;

    Ok(())
}

/// Auto-reply flow inside a bot-started thread: record the turn, send
/// the accumulated context to the summarizer and post its answer.
async fn handle_thread_reply(
    ctx: &Context,
    bot: &Bot,
    msg: &Message,
    parent_id: ChannelId,
) -> Result<(), FetchError> {
    bot.session.wait_ready().await?;

    if let Err(e) = msg.channel_id.broadcast_typing(&ctx.http).await {
        debug!("Failed to broadcast typing indicator: {}", e);
    }

    let username = msg
        .author
        .global_name
        .clone()
        .unwrap_or_else(|| msg.author.name.clone());
    bot.context
        .push(ContextEntry {
            username,
            message: msg.content.clone(),
        })
        .await;

    let turns = bot.context.snapshot().await;
    let reply = bot
        .summarizer
        .summarize(&turns, parent_id.get(), Some(msg.channel_id.get()))
        .await?;

    msg.channel_id
        .say(&ctx.http, reply.as_str())
        .await
        .map_err(|e| FetchError::Upstream(format!("thread reply failed: {e}")))?;

    // Keep our own answer in the context for the next turn.
    bot.context
        .push(ContextEntry {
            username: "assistant".to_string(),
            message: reply,
        })
        .await;

    Ok(())
}

/// Thread title from the triggering message: mention tokens stripped,
/// first 50 characters, ellipsis when truncated.
fn thread_title(content: &str, bot_id: u64) -> String {
    let stripped = content
        .replace(&format!("<@{bot_id}>"), "")
        .replace(&format!("<@!{bot_id}>"), "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return "Summary".to_string();
    }

    let head: String = trimmed.chars().take(THREAD_TITLE_LEN).collect();
    let mut title = format!("Summary: {}", head.trim_end());
    if trimmed.chars().count() > THREAD_TITLE_LEN {
        title.push_str("...");
    }
    title
}

/// Window requested by a triggering message: the first two RFC 3339
/// instants found in the text, else the trailing 24 hours.
fn window_from_text(content: &str, now: DateTime<Utc>) -> FetchWindow {
    let mut instants = content
        .split_whitespace()
        .filter_map(|token| token.parse::<DateTime<Utc>>().ok());

    match (instants.next(), instants.next()) {
        (Some(a), Some(b)) if a <= b => FetchWindow::new(a, b),
        (Some(a), Some(b)) => FetchWindow::new(b, a),
        _ => FetchWindow::new(now - Duration::hours(24), now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_bot_by_raw_token() {
        assert!(mentions_bot("<@99>", "hey <@99> summarize", &[], None, 99));
        assert!(!mentions_bot("<@99>", "no mention here", &[], None, 99));
    }

    #[test]
    fn test_mentions_bot_by_mention_set() {
        assert!(mentions_bot("", "anything", &[1, 99], None, 99));
        assert!(!mentions_bot("", "anything", &[1, 2], None, 99));
    }

    #[test]
    fn test_mentions_bot_by_reply() {
        assert!(mentions_bot("", "anything", &[], Some(99), 99));
        assert!(!mentions_bot("", "anything", &[], Some(7), 99));
        assert!(!mentions_bot("", "anything", &[], None, 99));
    }

    #[test]
    fn test_empty_mention_token_never_matches() {
        assert!(!mentions_bot("", "any text at all", &[], None, 99));
    }

    #[test]
    fn test_thread_title_strips_mention_and_truncates() {
        let content = format!("<@42> {}", "a".repeat(80));
        let title = thread_title(&content, 42);
        assert!(title.starts_with("Summary: aaa"));
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), "Summary: ".len() + 50 + 3);
    }

    #[test]
    fn test_thread_title_short_content_untouched() {
        let title = thread_title("<@!42> last night", 42);
        assert_eq!(title, "Summary: last night");
    }

    #[test]
    fn test_thread_title_mention_only_falls_back() {
        assert_eq!(thread_title("<@42>", 42), "Summary");
        assert_eq!(thread_title("", 42), "Summary");
    }

    #[test]
    fn test_window_from_text_with_two_instants() {
        let now = Utc::now();
        let w = window_from_text(
            "summarize 2025-04-13T00:00:00Z 2025-04-14T00:00:00Z please",
            now,
        );
        assert_eq!(w.start, "2025-04-13T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(w.end, "2025-04-14T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_window_from_text_orders_instants() {
        let now = Utc::now();
        let w = window_from_text("2025-04-14T00:00:00Z 2025-04-13T00:00:00Z", now);
        assert!(w.start <= w.end);
        assert_eq!(w.start, "2025-04-13T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_window_from_text_defaults_to_last_day() {
        let now = "2025-04-14T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let w = window_from_text("summarize today please", now);
        assert_eq!(w.end, now);
        assert_eq!(w.start, now - Duration::hours(24));
    }
}
