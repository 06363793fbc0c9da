//! Long-polling loop: getUpdates with offset tracking, exponential backoff on errors, and
//! dispatch of every update on a bounded worker pool, in order per chat.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use handler_chain::{ChatGate, HandlerChain, UpdateWorkerPool};
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use tracing::{error, info, instrument, warn};

use crate::adapters::TelegramUpdateWrapper;
use crate::config::TelegramConfig;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Wait between failed polls: starts at one second, doubles up to `max`, resets on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(max: Duration) -> Self {
        Self {
            current: INITIAL_BACKOFF.min(max),
            max,
        }
    }

    /// Delay to wait now; the following one is doubled.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = INITIAL_BACKOFF.min(self.max);
    }
}

/// Polls until Ctrl-C. Updates are converted to the core model and handed to the chain;
/// updates that fail to convert are logged and skipped.
#[instrument(skip(bot, chain, config))]
pub async fn run_polling(bot: teloxide::Bot, chain: HandlerChain, config: &TelegramConfig) -> Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = ?me.user.username, "Bot identity resolved"),
        Err(e) => warn!(error = %e, "getMe failed, continuing"),
    }

    let mut offset: i32 = 0;
    let mut backoff = Backoff::new(config.poll_max_backoff());
    // Separate from the chain's pool, which non-blocking handlers draw from.
    let updates_pool = UpdateWorkerPool::new(config.max_concurrent_updates);
    let gate = ChatGate::new();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(timeout_secs = config.poll_timeout_secs, "step: polling started");
    loop {
        let poll = bot
            .get_updates()
            .offset(offset)
            .timeout(config.poll_timeout_secs);

        let updates = tokio::select! {
            _ = &mut shutdown => {
                info!("step: shutdown requested");
                break;
            }
            result = poll.send() => result,
        };

        let updates = match updates {
            Ok(updates) => {
                backoff.reset();
                updates
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!(error = %e, delay_secs = delay.as_secs(), "getUpdates failed, backing off");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };

        for raw in updates {
            offset = offset.max(raw.id.0 as i32 + 1);
            let update = match TelegramUpdateWrapper(&raw).to_core() {
                Ok(update) => Arc::new(update),
                Err(e) => {
                    warn!(update_id = raw.id.0, error = %e, "Skipping update that failed to convert");
                    continue;
                }
            };
            chain.spawn_update(update, &updates_pool, &gate).await;
        }
    }

    updates_pool.wait_idle().await;
    chain.pool().wait_idle().await;
    info!("step: polling stopped");
    Ok(())
}
