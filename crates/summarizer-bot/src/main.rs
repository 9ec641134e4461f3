//! Discord channel summarizer bot
//!
//! Connects to the Discord gateway, answers mentions by opening summary
//! threads backed by a remote summarization service, and exposes channel
//! history plus an image proxy over a small HTTP facade.

mod config;
mod context;
mod errors;
mod fetcher;
mod handlers;
mod mentions;
mod server;
mod summarize;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use summarizer_types::{SessionHandle, SessionState};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::context::ContextBuffer;
use crate::fetcher::MessageFetcher;
use crate::handlers::{Bot, Handler};
use crate::server::{AppState, BotCdnDownloader};
use crate::summarize::{SummarizerClient, SummarizerConfig};

/// Channel summarizer bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/summarizer-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Summarizer base URL (overrides config file)
    #[arg(long, env = "SUMMARIZER_URL")]
    summarizer_url: Option<String>,

    /// HTTP facade port (overrides config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "summarizer_bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting channel summarizer bot");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };

    if let Some(bot_token) = args.bot_token {
        config.discord.bot_token = bot_token;
    }
    if let Some(url) = args.summarizer_url {
        config.summarizer.base_url = url;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    let session = SessionHandle::new();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(Handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    // The facade shares serenity's HTTP client and user cache with the bot.
    let fetcher = Arc::new(MessageFetcher::new(
        client.http.clone(),
        client.cache.clone(),
    ));
    let downloader = Arc::new(BotCdnDownloader::new(config.discord.bot_token.clone()));
    let app_state = AppState::new(fetcher, downloader);

    let bot = Arc::new(Bot {
        config: config.discord.clone(),
        session: session.clone(),
        context: ContextBuffer::new(config.discord.context_capacity),
        summarizer: SummarizerClient::new(SummarizerConfig {
            base_url: config.summarizer.base_url.clone(),
        }),
        app_state: app_state.clone(),
    });

    {
        let mut data = client.data.write().await;
        data.insert::<Bot>(bot);
    }

    // Start the HTTP facade
    let facade_state = app_state.clone();
    let port = config.http.port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server(facade_state, port).await {
            error!("HTTP facade error: {}", e);
        }
    });

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");
    session.set(SessionState::Connecting);

    // A failed gateway login degrades the process instead of killing it:
    // the HTTP facade keeps serving until a shutdown signal arrives.
    if let Err(e) = client.start().await {
        error!("Discord client error: {}", e);
        session.set(SessionState::Failed);
        info!("Continuing in degraded mode (HTTP facade only)");
        tokio::signal::ctrl_c().await.ok();
    }

    info!("Summarizer bot stopped");
    Ok(())
}
