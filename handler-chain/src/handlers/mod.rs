//! Concrete [`dbot_core::Handler`] implementations.

mod command;
mod message;
mod query;
mod reaction;
mod type_handler;

pub use command::{CommandHandler, HasArgs, PrefixHandler};
pub use message::MessageHandler;
pub use query::{CallbackQueryHandler, InlineQueryHandler, Pattern};
pub use reaction::{MessageReactionHandler, ReactionHandlerOptions, ReactionKind};
pub use type_handler::TypeHandler;
