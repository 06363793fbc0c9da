//! Update dispatcher.
//!
//! Handlers live in numbered groups. Groups run in ascending order; inside a group the first
//! handler (in registration order) whose check matches is the only one that runs. A callback
//! returning Stop or Reply ends dispatch for the update. Middleware `before` runs first (in
//! order) and can drop the update; middleware `after` runs last, in reverse order.

use std::collections::BTreeMap;
use std::sync::Arc;

use dbot_core::{
    Bot, CallbackContext, DbotError, Handler, HandlerError, HandlerResponse, Middleware,
    SendMessageOptions, Update,
};
use tracing::{debug, error, info, instrument, warn};

use crate::callback::Callback;
use crate::gate::ChatGate;
use crate::pool::UpdateWorkerPool;

pub const DEFAULT_GROUP: i32 = 0;

/// What happened to one update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Names of the handlers that were selected, in execution order.
    pub handlers: Vec<String>,
    /// The response that ended dispatch, or Continue.
    pub response: HandlerResponse,
    /// True if a middleware dropped the update before any handler ran.
    pub dropped: bool,
}

/// Ordered handler groups plus middleware, error hooks, bot handle and worker pool.
#[derive(Clone)]
pub struct HandlerChain {
    middleware: Vec<Arc<dyn Middleware>>,
    groups: BTreeMap<i32, Vec<Arc<dyn Handler>>>,
    error_handlers: Vec<Callback>,
    bot: Option<Arc<dyn Bot>>,
    pool: UpdateWorkerPool,
}

impl HandlerChain {
    /// Creates an empty chain (no middleware, no handlers, no bot).
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            groups: BTreeMap::new(),
            error_handlers: Vec::new(),
            bot: None,
            pool: UpdateWorkerPool::default(),
        }
    }

    /// Appends a middleware (before in order, after in reverse).
    pub fn add_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Appends a handler to the default group.
    pub fn add_handler(self, handler: Arc<dyn Handler>) -> Self {
        self.add_handler_to_group(handler, DEFAULT_GROUP)
    }

    pub fn add_handler_to_group(mut self, handler: Arc<dyn Handler>, group: i32) -> Self {
        self.groups.entry(group).or_default().push(handler);
        self
    }

    /// Registers a hook for errors raised by callbacks, middleware or replies.
    /// The hook's context has `error` set.
    pub fn add_error_handler(mut self, hook: Callback) -> Self {
        self.error_handlers.push(hook);
        self
    }

    pub fn with_bot(mut self, bot: Arc<dyn Bot>) -> Self {
        self.bot = Some(bot);
        self
    }

    /// Uses `pool` for non-blocking callbacks instead of a private default pool.
    pub fn with_pool(mut self, pool: UpdateWorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &UpdateWorkerPool {
        &self.pool
    }

    pub fn handler_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Dispatches one update. Callback failures are routed to the error hooks and never
    /// returned, so one failing handler cannot stop the update loop.
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    pub async fn process_update(&self, update: Arc<Update>) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        info!(
            kind = update.kind().key(),
            chat_id = ?update.effective_chat().map(|c| c.id),
            "step: dispatch started"
        );

        for (index, mw) in self.middleware.iter().enumerate() {
            match mw.before(&update).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(middleware = index, "step: middleware before returned false, update dropped");
                    outcome.dropped = true;
                    outcome.response = HandlerResponse::Stop;
                    return outcome;
                }
                Err(e) => {
                    warn!(middleware = index, error = %e, "step: middleware before failed, update dropped");
                    self.dispatch_error(update.clone(), e).await;
                    outcome.dropped = true;
                    outcome.response = HandlerResponse::Stop;
                    return outcome;
                }
            }
        }

        'groups: for (group, handlers) in &self.groups {
            let selected = handlers.iter().find_map(|h| {
                let check = h.check_update(&update);
                check.is_match().then_some((h, check))
            });
            let Some((handler, check)) = selected else {
                continue;
            };

            let handler_name = handler.name().to_string();
            debug!(group, handler = %handler_name, blocking = handler.blocking(), "step: handler selected");
            outcome.handlers.push(handler_name.clone());

            let mut ctx = CallbackContext::from_update(&update, self.bot.clone());
            ctx.apply_match(check);

            if !handler.blocking() {
                let chain = self.clone();
                let handler = handler.clone();
                let update = update.clone();
                self.pool
                    .spawn(async move {
                        let task = tokio::spawn({
                            let update = update.clone();
                            async move { handler.handle_update(update, ctx).await }
                        });
                        let result = match task.await {
                            Ok(result) => result,
                            Err(e) => Err(HandlerError::Join(e.to_string()).into()),
                        };
                        chain.finish_callback(&update, &handler_name, result).await;
                    })
                    .await;
                continue;
            }

            let result = handler.handle_update(update.clone(), ctx).await;
            if let Some(response) = self.finish_callback(&update, &handler_name, result).await {
                if response.stops_dispatch() {
                    info!(group, handler = %handler_name, "step: dispatch stopped by handler");
                    outcome.response = response;
                    break 'groups;
                }
            }
        }

        for mw in self.middleware.iter().rev() {
            if let Err(e) = mw.after(&update, &outcome.response).await {
                self.dispatch_error(update.clone(), e).await;
            }
        }

        info!(handlers = outcome.handlers.len(), "step: dispatch finished");
        outcome
    }

    /// Dispatches `update` on `pool` once the earlier updates of its chat are done.
    /// The chat's turn is reserved before this returns, so calling it in arrival order keeps
    /// per-chat order while other chats run concurrently.
    pub async fn spawn_update(&self, update: Arc<Update>, pool: &UpdateWorkerPool, gate: &ChatGate) {
        let turn = gate.enter(update.effective_chat().map(|c| c.id));
        let chain = self.clone();
        pool.spawn(async move {
            let _turn = turn.wait().await;
            chain.process_update(update).await;
        })
        .await;
    }

    /// Sends a Reply, routes errors. Returns the response on success.
    async fn finish_callback(
        &self,
        update: &Arc<Update>,
        handler_name: &str,
        result: dbot_core::Result<HandlerResponse>,
    ) -> Option<HandlerResponse> {
        match result {
            Ok(response) => {
                debug!(handler = %handler_name, response = ?response, "step: handler done");
                if let HandlerResponse::Reply(text) = &response {
                    if let Err(e) = self.send_reply(update, text).await {
                        self.dispatch_error(update.clone(), e).await;
                    }
                }
                Some(response)
            }
            Err(e) => {
                warn!(handler = %handler_name, error = %e, "step: handler failed");
                self.dispatch_error(update.clone(), e).await;
                None
            }
        }
    }

    async fn send_reply(&self, update: &Update, text: &str) -> dbot_core::Result<()> {
        let Some(bot) = &self.bot else {
            debug!("reply dropped: no bot attached to chain");
            return Ok(());
        };
        let chat_id = update.effective_chat().ok_or(HandlerError::NoChat)?.id;
        let options = match update.effective_message() {
            Some(message) => SendMessageOptions::reply_to(message),
            None => SendMessageOptions::default(),
        };
        bot.send_message(chat_id, text, &options).await?;
        Ok(())
    }

    /// Hands `err` to every error hook, or logs it when there is none.
    pub async fn dispatch_error(&self, update: Arc<Update>, err: DbotError) {
        if self.error_handlers.is_empty() {
            error!(update_id = update.update_id, error = %err, "No error handlers are registered, logging exception");
            return;
        }
        let err = Arc::new(err);
        for hook in &self.error_handlers {
            let mut ctx = CallbackContext::from_update(&update, self.bot.clone());
            ctx.error = Some(err.clone());
            if let Err(hook_err) = hook.call(update.clone(), ctx).await {
                error!(
                    update_id = update.update_id,
                    error = %err,
                    hook_error = %hook_err,
                    "Error hook failed"
                );
            }
        }
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}
