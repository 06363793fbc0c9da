//! Transport config: token, API URL, log path and polling limits.
//! Loaded from BOT_TOKEN, TELEGRAM_API_URL / TELOXIDE_API_URL, LOG_FILE, POLL_TIMEOUT_SECS,
//! POLL_MAX_BACKOFF_SECS and MAX_CONCURRENT_UPDATES.

use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;
pub const DEFAULT_POLL_MAX_BACKOFF_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_UPDATES: usize = 16;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub telegram_api_url: Option<String>,
    pub log_file: Option<String>,
    /// Long-poll timeout passed to getUpdates.
    pub poll_timeout_secs: u32,
    /// Upper bound of the wait between failed getUpdates calls.
    pub poll_max_backoff_secs: u64,
    pub max_concurrent_updates: usize,
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} is not a valid number: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl TelegramConfig {
    /// Loads from environment variables. `token` overrides BOT_TOKEN if provided.
    pub fn from_env(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?,
        };
        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .or_else(|_| env::var("TELOXIDE_API_URL"))
            .ok();
        let log_file = env::var("LOG_FILE").ok();
        Ok(Self {
            bot_token,
            telegram_api_url,
            log_file,
            poll_timeout_secs: parse_or("POLL_TIMEOUT_SECS", DEFAULT_POLL_TIMEOUT_SECS)?,
            poll_max_backoff_secs: parse_or("POLL_MAX_BACKOFF_SECS", DEFAULT_POLL_MAX_BACKOFF_SECS)?,
            max_concurrent_updates: parse_or(
                "MAX_CONCURRENT_UPDATES",
                DEFAULT_MAX_CONCURRENT_UPDATES,
            )?,
        })
    }

    /// Builds from the given token, everything else default.
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            telegram_api_url: None,
            log_file: None,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            poll_max_backoff_secs: DEFAULT_POLL_MAX_BACKOFF_SECS,
            max_concurrent_updates: DEFAULT_MAX_CONCURRENT_UPDATES,
        }
    }

    /// Validate config (e.g. telegram_api_url must be valid URL if set).
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN is empty");
        }
        if let Some(ref url_str) = self.telegram_api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                    url_str
                );
            }
        }
        if self.max_concurrent_updates == 0 {
            anyhow::bail!("MAX_CONCURRENT_UPDATES must be at least 1");
        }
        Ok(())
    }

    pub fn poll_max_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_max_backoff_secs.max(1))
    }

    /// teloxide Bot pointed at the configured API URL, if any.
    pub fn build_bot(&self) -> Result<teloxide::Bot> {
        let bot = teloxide::Bot::new(&self.bot_token);
        match &self.telegram_api_url {
            Some(url) => Ok(bot.set_api_url(reqwest::Url::parse(url)?)),
            None => Ok(bot),
        }
    }
}
