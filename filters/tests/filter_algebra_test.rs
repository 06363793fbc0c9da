//! Integration tests for [`filters::Filter`] combinators.
//!
//! Covers: short-circuit of and/or (right operand not evaluated), negation, data merging under
//! and, and data loss under or when the data filter is the short-circuited operand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dbot_core::{
    Chat, ChatType, DataValue, MatchResult, Message, Update, UpdatePayload, MATCHES_KEY,
};
use filters::{message, Filter, UpdatePredicate};

fn text_update(text: &str) -> Update {
    let chat = Chat {
        id: 1,
        kind: ChatType::Private,
        title: None,
        username: None,
        is_forum: false,
    };
    Update::new(7, UpdatePayload::Message(Message::text(1, chat, text)))
}

/// Leaf that returns a fixed result and counts how often it was evaluated.
struct Spy {
    result: MatchResult,
    calls: Arc<AtomicUsize>,
}

impl UpdatePredicate for Spy {
    fn name(&self) -> String {
        "spy".to_string()
    }

    fn check(&self, _update: &Update) -> MatchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn spy(result: MatchResult) -> (Filter, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let filter = Filter::update(Spy {
        result,
        calls: calls.clone(),
    });
    (filter, calls)
}

fn all_results() -> Vec<MatchResult> {
    vec![
        MatchResult::NoMatch,
        MatchResult::Match,
        MatchResult::single("k", vec![DataValue::Text("v".to_string())]),
    ]
}

/// **Test: and(a, b) is NoMatch when a is NoMatch, and b is never evaluated.**
#[test]
fn test_and_short_circuits_on_left_no_match() {
    for right in all_results() {
        let (a, _) = spy(MatchResult::NoMatch);
        let (b, b_calls) = spy(right);
        let update = text_update("x");

        assert_eq!((a & b).evaluate(&update), MatchResult::NoMatch);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }
}

/// **Test: or(a, b) returns a's result when a matches, without evaluating b.**
#[test]
fn test_or_returns_left_match_without_evaluating_right() {
    for left in all_results().into_iter().filter(MatchResult::is_match) {
        for right in all_results() {
            let (a, _) = spy(left.clone());
            let (b, b_calls) = spy(right);
            let update = text_update("x");

            assert_eq!((a | b).evaluate(&update), left);
            assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        }
    }
}

/// **Test: not(a) is Match exactly when a is NoMatch, and never carries data.**
#[test]
fn test_not_inverts_and_drops_data() {
    for inner in all_results() {
        let (a, _) = spy(inner.clone());
        let expected = if inner.is_match() {
            MatchResult::NoMatch
        } else {
            MatchResult::Match
        };
        assert_eq!((!a).evaluate(&text_update("x")), expected);
    }
}

/// **Test: and merges data from both sides, concatenating lists of shared keys.**
#[test]
fn test_and_merges_data_of_both_sides() {
    let filter = message::regex(r"\d+").unwrap() & message::regex("[a-z]+").unwrap();
    let result = filter.evaluate(&text_update("abc 123"));
    let matches = &result.data().unwrap()[MATCHES_KEY];
    let texts: Vec<&str> = matches
        .iter()
        .map(|v| match v {
            DataValue::Match(m) => m.text.as_str(),
            _ => "",
        })
        .collect();
    assert_eq!(texts, vec!["123", "abc"]);
}

/// **Test: a matching regex keeps its data through or with a non-matching filter,
/// but loses it when placed second after a matching operand.**
#[test]
fn test_or_data_survives_first_and_is_dropped_second() {
    let update = text_update("ticket 42");
    let regex = message::regex(r"\d+").unwrap();
    let never = Filter::message_fn("never", |_| false);
    let always = message::all();

    let first = regex.clone() | never.clone();
    assert!(first.evaluate(&update).data().is_some());

    let after_no_match = never | regex.clone();
    assert!(after_no_match.evaluate(&update).data().is_some());

    let dropped = always | regex;
    assert_eq!(dropped.evaluate(&update), MatchResult::Match);
}

/// **Test: xor keeps the data of the single matching side.**
#[test]
fn test_xor_keeps_data_of_matching_side() {
    let update = text_update("id 9");
    let regex = message::regex(r"\d").unwrap();
    let never = Filter::message_fn("never", |_| false);

    let result = (regex.clone() ^ never).evaluate(&update);
    assert!(result.data().is_some());

    let both = (regex ^ message::text()).evaluate(&update);
    assert_eq!(both, MatchResult::NoMatch);
}
