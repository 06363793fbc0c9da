//! Leaf predicate traits and their adapters.

use dbot_core::{MatchResult, Message, Update};

/// A leaf filter over the whole update.
pub trait UpdatePredicate: Send + Sync {
    /// Name shown in the filter's `Display` output.
    fn name(&self) -> String;

    fn check(&self, update: &Update) -> MatchResult;

    /// True if a match may carry data.
    fn is_data_filter(&self) -> bool {
        false
    }
}

/// A leaf filter over the message of a message-bearing update.
///
/// Wrapped in [`MessageScoped`], it only runs when [`Update::message_payload`] is present;
/// every other update is `NoMatch`.
pub trait MessagePredicate: Send + Sync {
    fn name(&self) -> String;

    fn check_message(&self, message: &Message) -> MatchResult;

    fn is_data_filter(&self) -> bool {
        false
    }
}

/// Lifts a [`MessagePredicate`] to an [`UpdatePredicate`] gated on a message payload.
pub struct MessageScoped<P>(pub P);

impl<P: MessagePredicate> UpdatePredicate for MessageScoped<P> {
    fn name(&self) -> String {
        self.0.name()
    }

    fn check(&self, update: &Update) -> MatchResult {
        match update.message_payload() {
            Some(message) => self.0.check_message(message),
            None => MatchResult::NoMatch,
        }
    }

    fn is_data_filter(&self) -> bool {
        self.0.is_data_filter()
    }
}

/// Boolean closure over a message.
pub(crate) struct MessageFn<F> {
    pub(crate) name: String,
    pub(crate) f: F,
}

impl<F> MessagePredicate for MessageFn<F>
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn check_message(&self, message: &Message) -> MatchResult {
        (self.f)(message).into()
    }
}

/// Boolean closure over an update.
pub(crate) struct UpdateFn<F> {
    pub(crate) name: String,
    pub(crate) f: F,
}

impl<F> UpdatePredicate for UpdateFn<F>
where
    F: Fn(&Update) -> bool + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn check(&self, update: &Update) -> MatchResult {
        (self.f)(update).into()
    }
}
