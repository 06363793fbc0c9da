//! # Handler chain
//!
//! Handlers and the dispatcher that selects them. Each handler pairs a match check (usually a
//! [`filters::Filter`]) with an async [`Callback`]. [`HandlerChain`] runs middleware `before` in
//! order, then per handler group the first matching handler, then middleware `after` in reverse
//! order. Stop or Reply from a callback skips the remaining groups.

mod callback;
mod chain;
mod gate;
pub mod handlers;
mod pool;

pub use callback::{Callback, CallbackFuture};
pub use chain::{DispatchOutcome, HandlerChain, DEFAULT_GROUP};
pub use gate::{ChatGate, ChatTurn, ChatTurnGuard};
pub use handlers::*;
pub use pool::UpdateWorkerPool;
