//! Message reaction handler.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{
    CallbackContext, ConfigError, Handler, HandlerResponse, MatchResult, Result, Update,
    UpdatePayload,
};
use filters::AllowList;

use crate::callback::Callback;

/// Which reaction updates to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactionKind {
    /// Reactions changed by a known user or actor chat.
    Updated,
    /// Anonymous reaction counters.
    Count,
    #[default]
    Any,
}

/// Options of [`MessageReactionHandler::new`]. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default)]
pub struct ReactionHandlerOptions {
    pub kind: ReactionKind,
    pub chat_ids: Vec<i64>,
    pub chat_usernames: Vec<String>,
    pub user_ids: Vec<i64>,
    pub user_usernames: Vec<String>,
}

pub struct MessageReactionHandler {
    kind: ReactionKind,
    chats: Option<AllowList>,
    users: Option<AllowList>,
    callback: Callback,
    block: bool,
}

impl MessageReactionHandler {
    /// Fails when a user restriction is combined with a kind that includes anonymous
    /// reactions, or when ids and usernames are both given for chats or for users.
    pub fn new(
        options: ReactionHandlerOptions,
        callback: Callback,
    ) -> std::result::Result<Self, ConfigError> {
        let restricts_users = !options.user_ids.is_empty() || !options.user_usernames.is_empty();
        if restricts_users && options.kind != ReactionKind::Updated {
            return Err(ConfigError::AnonymousReactionUserFilter);
        }
        let chats = if options.chat_ids.is_empty() && options.chat_usernames.is_empty() {
            None
        } else {
            Some(AllowList::new(
                options.chat_ids,
                options.chat_usernames,
                false,
            )?)
        };
        let users = if restricts_users {
            Some(AllowList::new(
                options.user_ids,
                options.user_usernames,
                false,
            )?)
        } else {
            None
        };
        Ok(Self {
            kind: options.kind,
            chats,
            users,
            callback,
            block: true,
        })
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }
}

#[async_trait]
impl Handler for MessageReactionHandler {
    fn name(&self) -> &str {
        "MessageReactionHandler"
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        let kind_ok = match (&update.payload, self.kind) {
            (UpdatePayload::MessageReaction(_), ReactionKind::Updated | ReactionKind::Any) => true,
            (UpdatePayload::MessageReactionCount(_), ReactionKind::Count | ReactionKind::Any) => {
                true
            }
            _ => false,
        };
        if !kind_ok {
            return MatchResult::NoMatch;
        }
        if let Some(chats) = &self.chats {
            if !chats.allows_chat(update.effective_chat()) {
                return MatchResult::NoMatch;
            }
        }
        if let Some(users) = &self.users {
            if !users.allows_user(update.effective_user()) {
                return MatchResult::NoMatch;
            }
        }
        MatchResult::Match
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
