//! Conversation handler driven by named states.
//!
//! A conversation is keyed by chat, user, or both. Without a current state only entry points
//! are considered; with one, the handlers of that state and then the fallbacks are. A callback
//! moves the conversation with [`HandlerResponse::State`] and ends it with
//! [`HandlerResponse::End`].
//!
//! The inner handler chosen by `check_update` is recorded in the match data and reused by
//! `handle_update`. With a timeout configured, expired conversations are swept from the map
//! at most once per timeout period, on any update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    CallbackContext, ConfigError, DataValue, Handler, HandlerResponse, MatchResult, Result,
    Update,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// `(chat_id, user_id)`; a part is `None` when the conversation is not keyed on it.
pub type ConversationKey = (Option<i64>, Option<i64>);

#[derive(Debug, Clone)]
struct ActiveState {
    state: String,
    last_active: Instant,
}

/// Position of an inner handler.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selected {
    Entry(usize),
    State(String, usize),
    Fallback(usize),
}

impl Selected {
    fn encode(&self) -> String {
        match self {
            Selected::Entry(index) => format!("entry/{}", index),
            Selected::State(state, index) => format!("state/{}/{}", index, state),
            Selected::Fallback(index) => format!("fallback/{}", index),
        }
    }

    fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '/');
        let kind = parts.next()?;
        let index = parts.next()?.parse().ok()?;
        match (kind, parts.next()) {
            ("entry", None) => Some(Selected::Entry(index)),
            ("fallback", None) => Some(Selected::Fallback(index)),
            ("state", Some(state)) => Some(Selected::State(state.to_string(), index)),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Conversations {
    by_key: HashMap<ConversationKey, ActiveState>,
    last_sweep: Option<Instant>,
}

/// Builder for [`ConversationHandler`].
pub struct ConversationBuilder {
    name: String,
    entry_points: Vec<Arc<dyn Handler>>,
    states: HashMap<String, Vec<Arc<dyn Handler>>>,
    fallbacks: Vec<Arc<dyn Handler>>,
    allow_reentry: bool,
    per_chat: bool,
    per_user: bool,
    conversation_timeout: Option<Duration>,
    block: bool,
}

impl ConversationBuilder {
    pub fn entry_point(mut self, handler: Arc<dyn Handler>) -> Self {
        self.entry_points.push(handler);
        self
    }

    /// Appends `handler` to the handlers of `state`.
    pub fn state(mut self, state: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.states.entry(state.into()).or_default().push(handler);
        self
    }

    pub fn fallback(mut self, handler: Arc<dyn Handler>) -> Self {
        self.fallbacks.push(handler);
        self
    }

    /// Lets entry points restart a running conversation.
    pub fn allow_reentry(mut self, allow: bool) -> Self {
        self.allow_reentry = allow;
        self
    }

    pub fn per_chat(mut self, per_chat: bool) -> Self {
        self.per_chat = per_chat;
        self
    }

    pub fn per_user(mut self, per_user: bool) -> Self {
        self.per_user = per_user;
        self
    }

    /// Conversations idle for longer than `timeout` are treated as ended.
    pub fn conversation_timeout(mut self, timeout: Duration) -> Self {
        self.conversation_timeout = Some(timeout);
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn build(self) -> std::result::Result<ConversationHandler, ConfigError> {
        if !self.per_chat && !self.per_user {
            return Err(ConfigError::InvalidConversationKey);
        }
        if self.entry_points.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "conversation `{}` has no entry points",
                self.name
            )));
        }
        Ok(ConversationHandler {
            entry_points: self.entry_points,
            states: self.states,
            fallbacks: self.fallbacks,
            allow_reentry: self.allow_reentry,
            per_chat: self.per_chat,
            per_user: self.per_user,
            conversation_timeout: self.conversation_timeout,
            block: self.block,
            selection_key: format!("conversation.{}", self.name),
            name: self.name,
            conversations: Mutex::new(Conversations::default()),
        })
    }
}

pub struct ConversationHandler {
    name: String,
    entry_points: Vec<Arc<dyn Handler>>,
    states: HashMap<String, Vec<Arc<dyn Handler>>>,
    fallbacks: Vec<Arc<dyn Handler>>,
    allow_reentry: bool,
    per_chat: bool,
    per_user: bool,
    conversation_timeout: Option<Duration>,
    block: bool,
    /// Match-data key under which `check_update` records the selected inner handler.
    selection_key: String,
    conversations: Mutex<Conversations>,
}

impl ConversationHandler {
    /// Starts a builder keyed per chat and per user.
    pub fn builder(name: impl Into<String>) -> ConversationBuilder {
        ConversationBuilder {
            name: name.into(),
            entry_points: Vec::new(),
            states: HashMap::new(),
            fallbacks: Vec::new(),
            allow_reentry: false,
            per_chat: true,
            per_user: true,
            conversation_timeout: None,
            block: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Conversations> {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` when the update lacks the chat or user this handler is keyed on.
    pub fn key_for(&self, update: &Update) -> Option<ConversationKey> {
        let chat = if self.per_chat {
            Some(update.effective_chat()?.id)
        } else {
            None
        };
        let user = if self.per_user {
            Some(update.effective_user()?.id)
        } else {
            None
        };
        Some((chat, user))
    }

    fn is_expired(&self, active: &ActiveState) -> bool {
        self.conversation_timeout
            .is_some_and(|timeout| active.last_active.elapsed() > timeout)
    }

    /// Current state of a conversation, ignoring expired ones.
    pub fn current_state(&self, key: &ConversationKey) -> Option<String> {
        self.lock()
            .by_key
            .get(key)
            .filter(|active| !self.is_expired(active))
            .map(|active| active.state.clone())
    }

    /// Number of stored conversations, including expired ones not yet swept.
    pub fn active_conversations(&self) -> usize {
        self.lock().by_key.len()
    }

    /// Removes every expired conversation and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut conversations = self.lock();
        self.sweep(&mut conversations)
    }

    fn sweep(&self, conversations: &mut Conversations) -> usize {
        conversations.last_sweep = Some(Instant::now());
        let before = conversations.by_key.len();
        conversations
            .by_key
            .retain(|_, active| !self.is_expired(active));
        let evicted = before - conversations.by_key.len();
        if evicted > 0 {
            info!(conversation = %self.name, evicted, "step: expired conversations evicted");
        }
        evicted
    }

    /// Sweeps when the last sweep is older than the timeout.
    fn sweep_if_due(&self) {
        let Some(timeout) = self.conversation_timeout else {
            return;
        };
        let mut conversations = self.lock();
        let due = conversations
            .last_sweep
            .map_or(true, |last| last.elapsed() >= timeout);
        if due {
            self.sweep(&mut conversations);
        }
    }

    /// Candidate handlers in selection order.
    fn candidates(&self, state: Option<&str>) -> Vec<(Selected, &Arc<dyn Handler>)> {
        let entries = self
            .entry_points
            .iter()
            .enumerate()
            .map(|(i, h)| (Selected::Entry(i), h));
        let Some(state) = state else {
            return entries.collect();
        };
        let mut candidates = Vec::new();
        if self.allow_reentry {
            candidates.extend(entries);
        }
        if let Some(handlers) = self.states.get(state) {
            candidates.extend(
                handlers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (Selected::State(state.to_string(), i), h)),
            );
        }
        candidates.extend(
            self.fallbacks
                .iter()
                .enumerate()
                .map(|(i, h)| (Selected::Fallback(i), h)),
        );
        candidates
    }

    fn resolve(&self, selected: &Selected) -> Option<&Arc<dyn Handler>> {
        match selected {
            Selected::Entry(i) => self.entry_points.get(*i),
            Selected::State(state, i) => self.states.get(state)?.get(*i),
            Selected::Fallback(i) => self.fallbacks.get(*i),
        }
    }

    fn select(&self, update: &Update) -> Option<(Selected, &Arc<dyn Handler>, MatchResult)> {
        let key = self.key_for(update)?;
        let state = self.current_state(&key);
        self.candidates(state.as_deref())
            .into_iter()
            .find_map(|(selected, handler)| {
                let check = handler.check_update(update);
                check.is_match().then_some((selected, handler, check))
            })
    }

    /// The handler recorded by `check_update`, removing the record from `ctx`.
    fn take_selected(&self, ctx: &mut CallbackContext) -> Option<&Arc<dyn Handler>> {
        let recorded = ctx.data.remove(&self.selection_key)?;
        let selected = recorded.iter().find_map(|value| match value {
            DataValue::Text(raw) => Selected::decode(raw),
            _ => None,
        })?;
        self.resolve(&selected)
    }

    fn apply_response(&self, key: ConversationKey, response: &HandlerResponse) {
        let mut guard = self.lock();
        let conversations = &mut guard.by_key;
        match response {
            HandlerResponse::State(next) => {
                if !self.states.contains_key(next) {
                    warn!(conversation = %self.name, state = %next, "moved to a state without handlers");
                }
                info!(conversation = %self.name, ?key, state = %next, "step: conversation state changed");
                conversations.insert(
                    key,
                    ActiveState {
                        state: next.clone(),
                        last_active: Instant::now(),
                    },
                );
            }
            HandlerResponse::End => {
                info!(conversation = %self.name, ?key, "step: conversation ended");
                conversations.remove(&key);
            }
            _ => {
                if let Some(active) = conversations.get_mut(&key) {
                    if self.is_expired(active) {
                        conversations.remove(&key);
                    } else {
                        active.last_active = Instant::now();
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Handler for ConversationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        self.sweep_if_due();
        match self.select(update) {
            Some((selected, _, check)) => check.merge(MatchResult::single(
                &self.selection_key,
                vec![DataValue::Text(selected.encode())],
            )),
            None => MatchResult::NoMatch,
        }
    }

    async fn handle_update(
        &self,
        update: Arc<Update>,
        mut ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        let Some(key) = self.key_for(&update) else {
            return Ok(HandlerResponse::Continue);
        };
        let handler = match self.take_selected(&mut ctx) {
            Some(handler) => handler,
            None => match self.select(&update) {
                // Called without a preceding check: select now and use its data.
                Some((_, handler, check)) => {
                    ctx.apply_match(check);
                    handler
                }
                None => {
                    debug!(conversation = %self.name, "no handler matches");
                    return Ok(HandlerResponse::Continue);
                }
            },
        };
        {
            let mut conversations = self.lock();
            if conversations.by_key.get(&key).is_some_and(|a| self.is_expired(a)) {
                info!(conversation = %self.name, ?key, "step: conversation timed out");
                conversations.by_key.remove(&key);
            }
        }
        debug!(conversation = %self.name, handler = %handler.name(), "step: conversation handler selected");
        let response = handler.handle_update(update, ctx).await?;
        self.apply_response(key, &response);
        Ok(response)
    }

    fn blocking(&self) -> bool {
        self.block
    }
}
