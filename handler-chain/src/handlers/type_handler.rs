//! Update-kind handler.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{CallbackContext, Handler, HandlerResponse, MatchResult, Result, Update, UpdateKind};

use crate::callback::Callback;

/// Routes by update kind alone, e.g. every callback query or every chat boost.
pub struct TypeHandler {
    name: String,
    kinds: Vec<UpdateKind>,
    callback: Callback,
    block: bool,
}

impl TypeHandler {
    pub fn new(kinds: Vec<UpdateKind>, callback: Callback) -> Self {
        Self {
            name: format!("TypeHandler({:?})", kinds),
            kinds,
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
impl Handler for TypeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        self.kinds.contains(&update.kind()).into()
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
