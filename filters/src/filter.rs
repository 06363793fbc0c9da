//! Filter expression tree and its evaluator.
//!
//! Combinators short-circuit like boolean `&&`/`||`: the right operand is not evaluated once
//! the left one decides the result. For `Or` this means data the right operand would have
//! produced is dropped when the left operand already matched.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

use dbot_core::{MatchResult, Message, Update};

use crate::predicate::{MessageFn, MessagePredicate, MessageScoped, UpdateFn, UpdatePredicate};

/// A composable predicate over an [`Update`].
#[derive(Clone)]
pub enum Filter {
    Leaf(Arc<dyn UpdatePredicate>),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Xor(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Update-scoped leaf.
    pub fn update<P: UpdatePredicate + 'static>(predicate: P) -> Self {
        Filter::Leaf(Arc::new(predicate))
    }

    /// Message-scoped leaf; non-message updates never match.
    pub fn message<P: MessagePredicate + 'static>(predicate: P) -> Self {
        Filter::Leaf(Arc::new(MessageScoped(predicate)))
    }

    pub fn message_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Filter::message(MessageFn {
            name: name.into(),
            f,
        })
    }

    pub fn update_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        Filter::update(UpdateFn {
            name: name.into(),
            f,
        })
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    pub fn xor(self, other: Filter) -> Self {
        Filter::Xor(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    pub fn evaluate(&self, update: &Update) -> MatchResult {
        match self {
            Filter::Leaf(predicate) => predicate.check(update),
            Filter::And(left, right) => {
                and_then(|| left.evaluate(update), || right.evaluate(update))
            }
            Filter::Or(left, right) => or_else(|| left.evaluate(update), || right.evaluate(update)),
            // (a and not b) or (not a and b)
            Filter::Xor(left, right) => or_else(
                || and_then(|| left.evaluate(update), || invert(right.evaluate(update))),
                || and_then(|| invert(left.evaluate(update)), || right.evaluate(update)),
            ),
            Filter::Not(inner) => invert(inner.evaluate(update)),
        }
    }

    /// True if a match of this expression may carry data. A negation never does.
    pub fn is_data_filter(&self) -> bool {
        match self {
            Filter::Leaf(predicate) => predicate.is_data_filter(),
            Filter::And(left, right) | Filter::Or(left, right) | Filter::Xor(left, right) => {
                left.is_data_filter() || right.is_data_filter()
            }
            Filter::Not(_) => false,
        }
    }
}

fn and_then(
    left: impl FnOnce() -> MatchResult,
    right: impl FnOnce() -> MatchResult,
) -> MatchResult {
    let left = left();
    if !left.is_match() {
        return MatchResult::NoMatch;
    }
    let right = right();
    if !right.is_match() {
        return MatchResult::NoMatch;
    }
    left.merge(right)
}

fn or_else(left: impl FnOnce() -> MatchResult, right: impl FnOnce() -> MatchResult) -> MatchResult {
    let left = left();
    if left.is_match() {
        return left;
    }
    right()
}

fn invert(result: MatchResult) -> MatchResult {
    (!result.is_match()).into()
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Leaf(predicate) => write!(f, "{}", predicate.name()),
            Filter::And(left, right) => write!(f, "<{} and {}>", left, right),
            Filter::Or(left, right) => write!(f, "<{} or {}>", left, right),
            Filter::Xor(left, right) => write!(f, "<{} xor {}>", left, right),
            Filter::Not(inner) => write!(f, "<inverted {}>", inner),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self)
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.or(rhs)
    }
}

impl BitXor for Filter {
    type Output = Filter;

    fn bitxor(self, rhs: Filter) -> Filter {
        self.xor(rhs)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        self.negate()
    }
}
