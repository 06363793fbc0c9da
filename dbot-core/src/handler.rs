//! Handler and middleware traits used by the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallbackContext;
use crate::error::Result;
use crate::matching::MatchResult;
use crate::types::Update;

/// Result of a callback, interpreted by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandlerResponse {
    /// Let later handler groups see the update.
    #[default]
    Continue,
    /// Stop processing this update; later groups are skipped.
    Stop,
    /// Send the text to the update's chat, then stop like [`HandlerResponse::Stop`].
    Reply(String),
    /// Inside a conversation: move to the named state. Elsewhere: same as `Continue`.
    State(String),
    /// Inside a conversation: end it. Elsewhere: same as `Continue`.
    End,
}

impl HandlerResponse {
    /// True if later handler groups must not run.
    pub fn stops_dispatch(&self) -> bool {
        matches!(self, HandlerResponse::Stop | HandlerResponse::Reply(_))
    }
}

/// A match predicate paired with a callback.
///
/// `check_update` must be cheap, synchronous and free of shared side effects: the
/// dispatcher may call it concurrently for different updates.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Decides whether this handler wants the update, returning any extracted data.
    fn check_update(&self, update: &Update) -> MatchResult;

    /// Runs the callback. `ctx` already carries the data of the successful check.
    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse>;

    /// Blocking handlers are awaited before the next handler group runs; non-blocking
    /// ones are spawned and their response is ignored.
    fn blocking(&self) -> bool {
        true
    }
}

/// Hooks around the whole dispatch of one update.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before any handler. Return false to drop the update.
    async fn before(&self, _update: &Update) -> Result<bool> {
        Ok(true)
    }

    /// Runs after dispatch (reverse registration order) with the final response.
    async fn after(&self, _update: &Update, _response: &HandlerResponse) -> Result<()> {
        Ok(())
    }
}
