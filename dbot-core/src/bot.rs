//! Bot abstraction for the few outbound calls a callback needs.
//!
//! [`Bot`] is transport-agnostic; dbot-telegram implements it via teloxide. Each operation takes
//! one options struct instead of a long list of optional parameters.

use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    MarkdownV2,
    Markdown,
}

/// Optional parameters of [`Bot::send_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageOptions {
    pub parse_mode: Option<ParseMode>,
    pub disable_notification: bool,
    pub reply_to_message_id: Option<i64>,
    pub message_thread_id: Option<i64>,
}

impl SendMessageOptions {
    /// Options that reply to `message`, staying in its forum topic if it has one.
    pub fn reply_to(message: &Message) -> Self {
        Self {
            reply_to_message_id: Some(message.message_id),
            message_thread_id: message.message_thread_id.filter(|_| message.is_topic_message),
            ..Self::default()
        }
    }
}

/// Optional parameters of [`Bot::answer_callback_query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerCallbackOptions {
    pub text: Option<String>,
    pub show_alert: bool,
    pub url: Option<String>,
    pub cache_time_secs: Option<u32>,
}

/// Outbound operations available to callbacks.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message and returns the id of the sent message.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: &SendMessageOptions,
    ) -> Result<i64>;

    /// Replies to `message` in its chat.
    async fn reply_to(&self, message: &Message, text: &str) -> Result<i64> {
        self.send_message(message.chat.id, text, &SendMessageOptions::reply_to(message))
            .await
    }

    /// Replaces the text of an already-sent message.
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;

    async fn answer_callback_query(
        &self,
        query_id: &str,
        options: &AnswerCallbackOptions,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chat, ChatType};

    #[test]
    fn test_reply_options_keep_topic_only_for_topic_messages() {
        let chat = Chat {
            id: 1,
            kind: ChatType::Supergroup,
            title: None,
            username: None,
            is_forum: true,
        };
        let mut message = Message::text(42, chat, "hi");
        message.message_thread_id = Some(7);

        let options = SendMessageOptions::reply_to(&message);
        assert_eq!(options.reply_to_message_id, Some(42));
        assert_eq!(options.message_thread_id, None);

        message.is_topic_message = true;
        let options = SendMessageOptions::reply_to(&message);
        assert_eq!(options.message_thread_id, Some(7));
    }
}
