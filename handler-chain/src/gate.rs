//! Per-chat ordering for concurrently dispatched updates.
//!
//! A [`ChatTurn`] is taken synchronously, in arrival order, before the update is spawned. Each
//! turn waits for the previous turn of the same chat to be released, so updates of one chat
//! run one after another while different chats run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

struct Tail {
    ticket: u64,
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Tails {
    by_chat: HashMap<i64, Tail>,
    next_ticket: u64,
}

/// Queue of turns per chat id. Clones share the same queues.
#[derive(Clone, Default)]
pub struct ChatGate {
    tails: Arc<Mutex<Tails>>,
}

fn lock(tails: &Mutex<Tails>) -> MutexGuard<'_, Tails> {
    tails.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next turn of `chat_id`. Updates without a chat get a turn that never waits.
    pub fn enter(&self, chat_id: Option<i64>) -> ChatTurn {
        let Some(chat_id) = chat_id else {
            return ChatTurn {
                previous: None,
                release: None,
            };
        };
        let (sender, done) = oneshot::channel();
        let mut tails = lock(&self.tails);
        tails.next_ticket += 1;
        let ticket = tails.next_ticket;
        let previous = tails
            .by_chat
            .insert(chat_id, Tail { ticket, done })
            .map(|tail| tail.done);
        ChatTurn {
            previous,
            release: Some(Release {
                chat_id,
                ticket,
                _done: sender,
                tails: self.tails.clone(),
            }),
        }
    }

    /// Chats with a turn queued or running.
    pub fn active_chats(&self) -> usize {
        lock(&self.tails).by_chat.len()
    }
}

/// A reserved place in a chat's queue.
pub struct ChatTurn {
    previous: Option<oneshot::Receiver<()>>,
    release: Option<Release>,
}

impl ChatTurn {
    /// Waits until every earlier turn of the chat was released. The returned guard releases
    /// this turn when dropped.
    pub async fn wait(self) -> ChatTurnGuard {
        if let Some(previous) = self.previous {
            // An error only means the previous turn is gone, which releases it as well.
            let _ = previous.await;
        }
        ChatTurnGuard {
            _release: self.release,
        }
    }
}

/// Holds the chat's turn until dropped.
pub struct ChatTurnGuard {
    _release: Option<Release>,
}

struct Release {
    chat_id: i64,
    ticket: u64,
    _done: oneshot::Sender<()>,
    tails: Arc<Mutex<Tails>>,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut tails = lock(&self.tails);
        if tails
            .by_chat
            .get(&self.chat_id)
            .is_some_and(|tail| tail.ticket == self.ticket)
        {
            tails.by_chat.remove(&self.chat_id);
            debug!(chat_id = self.chat_id, "chat queue drained");
        }
    }
}
