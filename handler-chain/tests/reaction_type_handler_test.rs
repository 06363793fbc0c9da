//! Tests for [`handler_chain::MessageReactionHandler`] and [`handler_chain::TypeHandler`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dbot_core::{ConfigError, Handler, HandlerResponse, Update, UpdateKind};
use handler_chain::{
    Callback, HandlerChain, MessageReactionHandler, ReactionHandlerOptions, ReactionKind,
    TypeHandler,
};
use serde_json::json;

fn noop() -> Callback {
    Callback::new(|_, _| async { Ok(HandlerResponse::Continue) })
}

fn reaction(user_id: i64) -> Update {
    serde_json::from_value(json!({
        "update_id": 1,
        "message_reaction": {
            "chat": {"id": -100, "type": "supergroup", "title": "G"},
            "message_id": 3,
            "user": {"id": user_id, "is_bot": false, "first_name": "U"},
            "date": 1700000000,
            "old_reaction": [],
            "new_reaction": [{"type": "emoji", "emoji": "👍"}]
        }
    }))
    .unwrap()
}

fn reaction_count() -> Update {
    serde_json::from_value(json!({
        "update_id": 2,
        "message_reaction_count": {
            "chat": {"id": -100, "type": "supergroup", "title": "G"},
            "message_id": 3,
            "date": 1700000000,
            "reactions": [{"type": {"type": "emoji", "emoji": "👍"}, "total_count": 4}]
        }
    }))
    .unwrap()
}

/// **Test: Reaction kind selects updated vs. anonymous count updates.**
#[test]
fn test_reaction_kind_selection() {
    let updated = MessageReactionHandler::new(
        ReactionHandlerOptions {
            kind: ReactionKind::Updated,
            ..ReactionHandlerOptions::default()
        },
        noop(),
    )
    .unwrap();
    let any = MessageReactionHandler::new(ReactionHandlerOptions::default(), noop()).unwrap();

    assert!(updated.check_update(&reaction(7)).is_match());
    assert!(!updated.check_update(&reaction_count()).is_match());
    assert!(any.check_update(&reaction(7)).is_match());
    assert!(any.check_update(&reaction_count()).is_match());
}

/// **Test: User restriction is applied to reaction updates.**
#[test]
fn test_reaction_user_restriction() {
    let handler = MessageReactionHandler::new(
        ReactionHandlerOptions {
            kind: ReactionKind::Updated,
            user_ids: vec![7],
            ..ReactionHandlerOptions::default()
        },
        noop(),
    )
    .unwrap();

    assert!(handler.check_update(&reaction(7)).is_match());
    assert!(!handler.check_update(&reaction(8)).is_match());
}

/// **Test: A user restriction cannot be combined with anonymous counts.**
///
/// Setup: user_ids set, kind Any (includes counts).
/// Expected: construction fails.
#[test]
fn test_reaction_user_restriction_rejects_anonymous_kind() {
    let result = MessageReactionHandler::new(
        ReactionHandlerOptions {
            user_ids: vec![7],
            ..ReactionHandlerOptions::default()
        },
        noop(),
    );
    assert!(matches!(
        result,
        Err(ConfigError::AnonymousReactionUserFilter)
    ));
}

/// **Test: TypeHandler routes by update kind and runs through the chain.**
#[tokio::test]
async fn test_type_handler_in_chain() {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let chain = HandlerChain::new().add_handler(Arc::new(TypeHandler::new(
        vec![UpdateKind::MessageReactionCount],
        Callback::new(move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerResponse::Stop)
            }
        }),
    )));

    let outcome = chain.process_update(Arc::new(reaction_count())).await;
    assert_eq!(outcome.response, HandlerResponse::Stop);

    let outcome = chain.process_update(Arc::new(reaction(7))).await;
    assert!(outcome.handlers.is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
