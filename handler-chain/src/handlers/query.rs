//! Callback query and inline query handlers, optionally gated on a pattern.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{
    CallbackContext, ChatType, ConfigError, DataValue, Handler, HandlerResponse, MatchResult,
    RegexMatch, Result, Update, MATCHES_KEY,
};
use regex::Regex;

use crate::callback::Callback;

/// What the query's data (or inline query text) must look like.
#[derive(Clone)]
pub enum Pattern {
    /// Every query matches, with or without data.
    Any,
    /// Must match at the start of the text; the match is reported under `matches`.
    Regex(Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Pattern {
    pub fn regex(pattern: &str) -> std::result::Result<Self, ConfigError> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|e| ConfigError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    /// `None` text only matches [`Pattern::Any`].
    pub fn check(&self, text: Option<&str>) -> MatchResult {
        match (self, text) {
            (Pattern::Any, _) => MatchResult::Match,
            (_, None) => MatchResult::NoMatch,
            (Pattern::Regex(regex), Some(text)) => {
                let found = regex
                    .captures(text)
                    .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
                    .and_then(|c| RegexMatch::from_captures(regex, &c));
                match found {
                    Some(m) => MatchResult::single(MATCHES_KEY, vec![DataValue::Match(m)]),
                    None => MatchResult::NoMatch,
                }
            }
            (Pattern::Predicate(f), Some(text)) => f(text).into(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Pattern::Any => "*".to_string(),
            Pattern::Regex(regex) => regex.as_str().to_string(),
            Pattern::Predicate(_) => "<predicate>".to_string(),
        }
    }
}

/// Handles callback queries from inline keyboard buttons.
pub struct CallbackQueryHandler {
    name: String,
    pattern: Pattern,
    callback: Callback,
    block: bool,
}

impl CallbackQueryHandler {
    pub fn new(pattern: Pattern, callback: Callback) -> Self {
        Self {
            name: format!("CallbackQueryHandler({})", pattern.describe()),
            pattern,
            callback,
            block: true,
        }
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }
}

#[async_trait]
impl Handler for CallbackQueryHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        match update.callback_query() {
            Some(query) => self.pattern.check(query.data.as_deref()),
            None => MatchResult::NoMatch,
        }
    }

    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        self.callback.call(update, ctx).await
    }

    fn blocking(&self) -> bool {
        self.block
    }
}

/// Handles inline queries, optionally restricted to the chat types they were sent from.
pub struct InlineQueryHandler {
    name: String,
    pattern: Pattern,
    chat_types: Option<Vec<ChatType>>,
    callback: Callback,
    block: bool,
}

impl InlineQueryHandler {
    pub fn new(pattern: Pattern, callback: Callback) -> Self {
        Self {
            name: format!("InlineQueryHandler({})", pattern.describe()),
            pattern,
            chat_types: None,
            callback,
            block: true,
        }
    }

    /// Queries without a chat type are rejected once this is set.
    pub fn chat_types(mut self, chat_types: Vec<ChatType>) -> Self {
        self.chat_types = Some(chat_types);
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }
}

#[async_trait]
impl Handler for InlineQueryHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        let Some(query) = update.inline_query() else {
            return MatchResult::NoMatch;
        };
        if let Some(allowed) = &self.chat_types {
            if !query.chat_type.is_some_and(|t| allowed.contains(&t)) {
                return MatchResult::NoMatch;
            }
        }
        self.pattern.check(Some(&query.query))
    }

    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        self.callback.call(update, ctx).await
    }

    fn blocking(&self) -> bool {
        self.block
    }
}
