//! Suspend/resume conversations: one long-running task per chat.
//!
//! An update matching the entry filter starts the conversation body for its chat
//! (NotStarted to Running). While the body runs, every update for that chat is queued to it
//! and read with [`ConversationHandle::next_update`]. When the body returns the chat is back
//! to NotStarted. A body that waits longer than the idle timeout gets `None`.
//! [`EasyConversationHandler::evict_idle`] drops slots idle for longer than the timeout and
//! aborts their bodies; it also runs on its own, at most once per timeout period, whenever an
//! update is checked.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{CallbackContext, Handler, HandlerResponse, MatchResult, Result, Update};
use filters::Filter;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

type BodyFuture = Pin<Box<dyn Future<Output = Result<HandlerResponse>> + Send>>;
type Body = Arc<dyn Fn(Arc<Update>, ConversationHandle, CallbackContext) -> BodyFuture + Send + Sync>;

/// Receiving side of a running conversation.
pub struct ConversationHandle {
    chat_id: i64,
    receiver: mpsc::UnboundedReceiver<Arc<Update>>,
    idle_timeout: Duration,
}

impl ConversationHandle {
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Waits for the next update of this chat. `None` after the idle timeout or once the
    /// slot was evicted.
    pub async fn next_update(&mut self) -> Option<Arc<Update>> {
        match tokio::time::timeout(self.idle_timeout, self.receiver.recv()).await {
            Ok(update) => update,
            Err(_) => {
                debug!(chat_id = self.chat_id, "conversation idle timeout");
                None
            }
        }
    }
}

struct Slot {
    sender: mpsc::UnboundedSender<Arc<Update>>,
    last_activity: Instant,
    generation: u64,
    task: AbortHandle,
}

#[derive(Default)]
struct Slots {
    by_chat: HashMap<i64, Slot>,
    next_generation: u64,
    last_sweep: Option<Instant>,
}

pub struct EasyConversationHandler {
    name: String,
    entry: Filter,
    body: Body,
    idle_timeout: Duration,
    slots: Arc<Mutex<Slots>>,
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EasyConversationHandler {
    /// `body` receives the entry update, a handle for the following updates of the same chat
    /// and the entry update's context.
    pub fn new<F, Fut>(entry: Filter, body: F) -> Self
    where
        F: Fn(Arc<Update>, ConversationHandle, CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResponse>> + Send + 'static,
    {
        Self {
            name: format!("EasyConversationHandler({})", entry),
            entry,
            body: Arc::new(move |update, handle, ctx| Box::pin(body(update, handle, ctx))),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn is_running(&self, chat_id: i64) -> bool {
        lock(&self.slots)
            .by_chat
            .get(&chat_id)
            .is_some_and(|slot| !slot.sender.is_closed())
    }

    pub fn running_conversations(&self) -> usize {
        lock(&self.slots).by_chat.len()
    }

    /// Drops every slot whose body ended or that was idle for longer than the idle timeout,
    /// aborting the bodies still running. Returns how many slots were dropped.
    pub fn evict_idle(&self) -> usize {
        let mut slots = lock(&self.slots);
        self.sweep(&mut slots)
    }

    fn sweep(&self, slots: &mut Slots) -> usize {
        slots.last_sweep = Some(Instant::now());
        let timeout = self.idle_timeout;
        let before = slots.by_chat.len();
        slots.by_chat.retain(|chat_id, slot| {
            let keep = !slot.sender.is_closed() && slot.last_activity.elapsed() <= timeout;
            if !keep && !slot.task.is_finished() {
                debug!(chat_id, "aborting idle conversation body");
                slot.task.abort();
            }
            keep
        });
        let evicted = before - slots.by_chat.len();
        if evicted > 0 {
            info!(evicted, "step: idle conversations evicted");
        }
        evicted
    }

    fn sweep_if_due(&self) {
        let mut slots = lock(&self.slots);
        let due = slots
            .last_sweep
            .map_or(true, |last| last.elapsed() >= self.idle_timeout);
        if due {
            self.sweep(&mut slots);
        }
    }

    fn start(&self, chat_id: i64, update: Arc<Update>, ctx: CallbackContext) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = ConversationHandle {
            chat_id,
            receiver,
            idle_timeout: self.idle_timeout,
        };
        let body = self.body.clone();
        let task_slots = self.slots.clone();

        // Held across the spawn so the body cannot finish before its slot exists.
        let mut slots = lock(&self.slots);
        slots.next_generation += 1;
        let generation = slots.next_generation;
        let task = tokio::spawn(async move {
            if let Err(e) = body(update, handle, ctx).await {
                error!(chat_id, error = %e, "conversation body failed");
            }
            let mut slots = lock(&task_slots);
            if slots
                .by_chat
                .get(&chat_id)
                .is_some_and(|slot| slot.generation == generation)
            {
                slots.by_chat.remove(&chat_id);
            }
            info!(chat_id, "step: conversation finished");
        });
        slots.by_chat.insert(
            chat_id,
            Slot {
                sender,
                last_activity: Instant::now(),
                generation,
                task: task.abort_handle(),
            },
        );
        info!(chat_id, "step: conversation started");
    }

    /// Queues `update` to the running body of its chat. Gives the update back when no body
    /// is receiving.
    fn deliver(&self, chat_id: i64, update: Arc<Update>) -> Option<Arc<Update>> {
        let mut slots = lock(&self.slots);
        let slot = slots.by_chat.get_mut(&chat_id)?;
        match slot.sender.send(update) {
            Ok(()) => {
                slot.last_activity = Instant::now();
                None
            }
            Err(mpsc::error::SendError(update)) => {
                slots.by_chat.remove(&chat_id);
                Some(update)
            }
        }
    }
}

#[async_trait]
impl Handler for EasyConversationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_update(&self, update: &Update) -> MatchResult {
        self.sweep_if_due();
        let Some(chat) = update.effective_chat() else {
            return MatchResult::NoMatch;
        };
        if self.is_running(chat.id) {
            return MatchResult::Match;
        }
        self.entry.evaluate(update)
    }

    #[instrument(skip(self, update, ctx), fields(update_id = update.update_id))]
    async fn handle_update(
        &self,
        update: Arc<Update>,
        ctx: CallbackContext,
    ) -> Result<HandlerResponse> {
        let Some(chat_id) = update.effective_chat().map(|c| c.id) else {
            return Ok(HandlerResponse::Continue);
        };
        let Some(update) = self.deliver(chat_id, update) else {
            debug!(chat_id, "step: update queued to running conversation");
            return Ok(HandlerResponse::Stop);
        };
        if !self.entry.evaluate(&update).is_match() {
            return Ok(HandlerResponse::Continue);
        }
        self.start(chat_id, update, ctx);
        Ok(HandlerResponse::Stop)
    }
}
