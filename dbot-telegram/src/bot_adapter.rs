//! Wraps teloxide::Bot and implements [`dbot_core::Bot`]. Production code sends messages via
//! Telegram; tests can substitute another Bot impl.

use async_trait::async_trait;
use dbot_core::{AnswerCallbackOptions, Bot as CoreBot, DbotError, ParseMode, Result, SendMessageOptions};
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ChatId, MessageId, ReplyParameters, ThreadId};

/// Thin wrapper around teloxide::Bot that implements dbot-core's Bot trait.
#[derive(Clone)]
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

fn bot_error(e: impl std::fmt::Display) -> DbotError {
    DbotError::Bot(e.to_string())
}

/// Bot API message ids fit in 32 bits.
fn message_id(id: i64) -> Result<MessageId> {
    i32::try_from(id)
        .map(MessageId)
        .map_err(|_| DbotError::Bot(format!("message id out of range: {}", id)))
}

#[allow(deprecated)]
fn parse_mode(mode: ParseMode) -> teloxide::types::ParseMode {
    match mode {
        ParseMode::Html => teloxide::types::ParseMode::Html,
        ParseMode::MarkdownV2 => teloxide::types::ParseMode::MarkdownV2,
        ParseMode::Markdown => teloxide::types::ParseMode::Markdown,
    }
}

impl TelegramBotAdapter {
    /// Creates an adapter from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: &SendMessageOptions,
    ) -> Result<i64> {
        let mut request = self.bot.send_message(ChatId(chat_id), text.to_string());
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if options.disable_notification {
            request = request.disable_notification(true);
        }
        if let Some(reply_to) = options.reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(message_id(reply_to)?));
        }
        if let Some(thread) = options.message_thread_id {
            request = request.message_thread_id(ThreadId(message_id(thread)?));
        }
        let sent = request.await.map_err(bot_error)?;
        Ok(i64::from(sent.id.0))
    }

    async fn edit_message(&self, chat_id: i64, message: i64, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(chat_id), message_id(message)?, text)
            .await
            .map_err(bot_error)?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        query_id: &str,
        options: &AnswerCallbackOptions,
    ) -> Result<()> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = &options.text {
            request = request.text(text.clone());
        }
        if options.show_alert {
            request = request.show_alert(true);
        }
        if let Some(url) = &options.url {
            request = request.url(reqwest::Url::parse(url).map_err(bot_error)?);
        }
        if let Some(secs) = options.cache_time_secs {
            request = request.cache_time(secs);
        }
        request.await.map_err(bot_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_range() {
        assert_eq!(message_id(42).unwrap(), MessageId(42));
        assert!(message_id(i64::MAX).is_err());
    }
}
