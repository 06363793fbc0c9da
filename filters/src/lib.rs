//! # filters
//!
//! Composable predicates over updates. A [`Filter`] is an expression tree of leaf predicates
//! combined with and/or/xor/not; evaluating it yields a [`dbot_core::MatchResult`], where data
//! filters (regex, entities) attach extracted data that survives composition.
//!
//! Message filters live in [`message`], update-kind filters in [`update_type`] and
//! chat/user allow-lists in [`allow_list`].

pub mod allow_list;
mod filter;
pub mod message;
mod predicate;
pub mod update_type;

pub use allow_list::{AllowList, AllowListFilter, AllowListTarget};
pub use filter::Filter;
pub use message::{Attachment, ChatTypes, MentionTarget};
pub use predicate::{MessagePredicate, MessageScoped, UpdatePredicate};
