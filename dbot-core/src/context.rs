//! Per-update execution context handed to every callback.

use std::sync::Arc;

use crate::bot::{Bot, SendMessageOptions};
use crate::error::{DbotError, HandlerError, Result};
use crate::matching::{DataValue, FilterData, MatchResult, RegexMatch, ARGS_KEY, MATCHES_KEY};
use crate::types::{MessageEntity, Update};

/// Fixed context every callback receives. Fields a callback does not need are ignored.
///
/// `args` and `matches` are lifted out of the handler's match data; every other key stays
/// available in `data`.
#[derive(Clone, Default)]
pub struct CallbackContext {
    pub bot: Option<Arc<dyn Bot>>,
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Positional command arguments.
    pub args: Vec<String>,
    /// Regex matches from pattern handlers and regex filters.
    pub matches: Vec<RegexMatch>,
    pub data: FilterData,
    /// Set only for error hooks.
    pub error: Option<Arc<DbotError>>,
}

impl std::fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackContext")
            .field("has_bot", &self.bot.is_some())
            .field("chat_id", &self.chat_id)
            .field("user_id", &self.user_id)
            .field("args", &self.args)
            .field("matches", &self.matches)
            .field("data", &self.data)
            .field("error", &self.error)
            .finish()
    }
}

impl CallbackContext {
    pub fn from_update(update: &Update, bot: Option<Arc<dyn Bot>>) -> Self {
        Self {
            bot,
            chat_id: update.effective_chat().map(|c| c.id),
            user_id: update.effective_user().map(|u| u.id),
            ..Self::default()
        }
    }

    /// Merges the data of a successful match into this context.
    pub fn apply_match(&mut self, result: MatchResult) {
        for (key, values) in result.into_data() {
            match key.as_str() {
                ARGS_KEY => self.args.extend(values.into_iter().filter_map(|v| match v {
                    DataValue::Text(text) => Some(text),
                    _ => None,
                })),
                MATCHES_KEY => self.matches.extend(values.into_iter().filter_map(|v| match v {
                    DataValue::Match(m) => Some(m),
                    _ => None,
                })),
                _ => self.data.entry(key).or_default().extend(values),
            }
        }
    }

    /// Entities reported by entity filters.
    pub fn entities(&self) -> Vec<&MessageEntity> {
        self.data
            .values()
            .flatten()
            .filter_map(|v| match v {
                DataValue::Entity(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Sends `text` to the update's chat. Fails when no bot is attached or the update has no chat.
    pub async fn reply(&self, text: &str) -> Result<i64> {
        let bot = self
            .bot
            .as_ref()
            .ok_or_else(|| DbotError::Bot("no bot attached to context".to_string()))?;
        let chat_id = self.chat_id.ok_or(HandlerError::NoChat)?;
        bot.send_message(chat_id, text, &SendMessageOptions::default())
            .await
    }
}
