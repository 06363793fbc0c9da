//! # dbot-core
//!
//! Core types and traits of the dispatch framework: the [`Update`] model, [`MatchResult`] and
//! filter data, [`CallbackContext`], the [`Handler`], [`Middleware`] and [`Bot`] traits, errors,
//! and tracing initialization. Transport-agnostic; used by filters, handler-chain and dbot-telegram.

pub mod bot;
pub mod context;
pub mod error;
pub mod handler;
pub mod logger;
pub mod matching;
pub mod types;

pub use bot::{AnswerCallbackOptions, Bot, ParseMode, SendMessageOptions};
pub use context::CallbackContext;
pub use error::{ConfigError, DbotError, HandlerError, Result};
pub use handler::{Handler, HandlerResponse, Middleware};
pub use logger::init_tracing;
pub use matching::{
    DataValue, FilterData, MatchResult, RegexMatch, ARGS_KEY, ENTITIES_KEY, MATCHES_KEY,
};
pub use types::{
    CallbackQuery, Chat, ChatBoostUpdated, ChatType, Contact, FileRef, InlineQuery, Location,
    Message, MessageEntity, MessageEntityKind, MessageReactionCountUpdated,
    MessageReactionUpdated, Poll, ReactionCount, ReactionType, Update, UpdateKind, UpdatePayload,
    User,
};
