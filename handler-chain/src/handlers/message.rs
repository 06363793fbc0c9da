//! Filter-driven message handler.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{CallbackContext, Handler, HandlerResponse, MatchResult, Result, Update};
use filters::{message, Filter};

use crate::callback::Callback;

/// Runs the callback for every update its filter accepts.
pub struct MessageHandler {
    name: String,
    filter: Filter,
    callback: Callback,
    block: bool,
}

impl MessageHandler {
    pub fn new(filter: Filter, callback: Callback) -> Self {
        Self {
            name: format!("MessageHandler({})", filter),
            filter,
            callback,
            block: true,
        }
    }

    /// Accepts every message-bearing update.
    pub fn all(callback: Callback) -> Self {
        Self::new(message::all(), callback)
    }

    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Handler for MessageHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        self.filter.evaluate(update)
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
