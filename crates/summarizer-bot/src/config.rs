//! Configuration management for summarizer-bot

#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub summarizer: SummarizerSection,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Discord bot specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    /// Channel the startup greeting is posted to
    #[serde(default)]
    pub default_channel_id: Option<u64>,
    /// Raw mention token the bot also answers to, e.g. `<@1234>`
    #[serde(default)]
    pub bot_mention_id: String,
    /// Post a greeting to the default channel once the session is ready
    #[serde(default)]
    pub startup_greeting: bool,
    /// Reply automatically inside threads the bot created
    #[serde(default = "default_true")]
    pub thread_auto_reply: bool,
    /// Capacity of the thread conversation context buffer
    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
}

/// Remote summarization service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerSection {
    #[serde(default = "default_summarizer_url")]
    pub base_url: String,
}

impl Default for SummarizerSection {
    fn default() -> Self {
        Self {
            base_url: default_summarizer_url(),
        }
    }
}

/// HTTP facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
        }
    }
}

/// Environment access, injectable for tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnv)
    }

    /// Load configuration from an injected environment
    pub fn from_env_with(env: &dyn ReadEnv) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .context("DISCORD_BOT_TOKEN not set")?;

        let default_channel_id = env.var("CHANNEL_ID").and_then(|v| v.parse::<u64>().ok());

        let bot_mention_id = env.var("BOT_MENTION_ID").unwrap_or_default();

        let startup_greeting = parse_bool(env.var("STARTUP_GREETING"), false);
        let thread_auto_reply = parse_bool(env.var("THREAD_AUTO_REPLY"), true);

        let context_capacity = env
            .var("CONTEXT_CAPACITY")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(default_context_capacity);

        let base_url = env
            .var("SUMMARIZER_URL")
            .unwrap_or_else(default_summarizer_url);

        let port = env
            .var("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or_else(default_http_port);

        Ok(Config {
            discord: DiscordConfig {
                bot_token,
                default_channel_id,
                bot_mention_id,
                startup_greeting,
                thread_auto_reply,
                context_capacity,
            },
            summarizer: SummarizerSection { base_url },
            http: HttpConfig { port },
        })
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => v.to_lowercase() == "true",
        None => default,
    }
}

fn default_bot_token() -> String {
    std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default()
}

fn default_true() -> bool {
    true
}

fn default_context_capacity() -> usize {
    20
}

fn default_summarizer_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_http_port() -> u16 {
    3000
}
