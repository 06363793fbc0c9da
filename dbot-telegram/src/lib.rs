//! # dbot-telegram
//!
//! Telegram transport layer: update conversion, [`dbot_core::Bot`] implementation, env config and
//! the long-polling runner. Handles only Telegram connectivity; routing lives in handler-chain.

mod adapters;
mod bot_adapter;
mod config;
mod runner;

pub use adapters::{update_from_json, TelegramUpdateWrapper};
pub use bot_adapter::TelegramBotAdapter;
pub use config::{
    TelegramConfig, DEFAULT_MAX_CONCURRENT_UPDATES, DEFAULT_POLL_MAX_BACKOFF_SECS,
    DEFAULT_POLL_TIMEOUT_SECS,
};
pub use runner::{run_polling, Backoff};
