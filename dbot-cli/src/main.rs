//! dbot: run the demo bot against Telegram, or route one message offline.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dbot_cli::{build_demo_chain, text_update, Cli, Commands, PrintBot};
use dbot_core::init_tracing;
use dbot_telegram::{run_polling, TelegramBotAdapter, TelegramConfig};
use handler_chain::UpdateWorkerPool;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => run(token).await,
        Commands::Route {
            text,
            chat_id,
            user_id,
        } => route(&text, chat_id, user_id).await,
    }
}

async fn run(token: Option<String>) -> Result<()> {
    let config = TelegramConfig::from_env(token)?;
    config.validate()?;
    init_tracing(config.log_file.as_deref())?;

    let bot = config.build_bot().context("failed to build Telegram bot")?;
    let chain = build_demo_chain(Arc::new(TelegramBotAdapter::new(bot.clone())))?
        .with_pool(UpdateWorkerPool::new(config.max_concurrent_updates));
    info!(handlers = chain.handler_count(), "Demo chain ready");

    run_polling(bot, chain, &config).await
}

async fn route(text: &str, chat_id: i64, user_id: i64) -> Result<()> {
    let chain = build_demo_chain(Arc::new(PrintBot))?;
    let outcome = chain
        .process_update(Arc::new(text_update(chat_id, user_id, text)))
        .await;
    chain.pool().wait_idle().await;

    println!("handlers: {:?}", outcome.handlers);
    println!("response: {:?}", outcome.response);
    if outcome.dropped {
        println!("dropped by middleware");
    }
    Ok(())
}
