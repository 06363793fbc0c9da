//! # conversation
//!
//! Multi-step dialogs on top of [`handler_chain`]:
//!
//! - [`ConversationHandler`]: named states, each with its own handlers, moved by
//!   [`dbot_core::HandlerResponse::State`] and ended by [`dbot_core::HandlerResponse::End`].
//! - [`EasyConversationHandler`]: one async body per chat that pulls the chat's next updates
//!   itself, with idle-timeout eviction.

mod easy;
mod state_machine;

pub use easy::{ConversationHandle, EasyConversationHandler, DEFAULT_IDLE_TIMEOUT};
pub use state_machine::{ConversationBuilder, ConversationHandler, ConversationKey};
