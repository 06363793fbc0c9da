//! Integration tests for [`handler_chain::HandlerChain`].
//!
//! Covers: first-match selection inside a group, group ordering and Stop, Reply being sent through
//! the bot, error hooks, non-blocking handlers and middleware before/after order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    AnswerCallbackOptions, Bot, Chat, ChatType, DbotError, HandlerError, HandlerResponse, Message,
    Middleware, SendMessageOptions, Update, UpdatePayload,
};
use filters::message;
use handler_chain::{
    Callback, ChatGate, CommandHandler, HandlerChain, MessageHandler, UpdateWorkerPool,
};

fn text_update(text: &str) -> Arc<Update> {
    let chat = Chat {
        id: 456,
        kind: ChatType::Private,
        title: None,
        username: None,
        is_forum: false,
    };
    Arc::new(Update::new(
        1,
        UpdatePayload::Message(Message::text(10, chat, text)),
    ))
}

/// Callback that counts invocations and returns `response`.
fn counting(count: Arc<AtomicUsize>, response: HandlerResponse) -> Callback {
    Callback::new(move |_, _| {
        let count = count.clone();
        let response = response.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(response)
        }
    })
}

/// Bot that records every sent message.
#[derive(Default)]
struct MockBot {
    sent: Mutex<Vec<(i64, String, SendMessageOptions)>>,
}

#[async_trait]
impl Bot for MockBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        options: &SendMessageOptions,
    ) -> dbot_core::Result<i64> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text.to_string(), options.clone()));
        Ok(sent.len() as i64)
    }

    async fn edit_message(&self, _chat_id: i64, _message_id: i64, _text: &str) -> dbot_core::Result<()> {
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        _query_id: &str,
        _options: &AnswerCallbackOptions,
    ) -> dbot_core::Result<()> {
        Ok(())
    }
}

/// **Test: Inside one group only the first matching handler runs.**
///
/// **Setup:** Group 0 holds `CommandHandler(["help"])` then a catch-all `MessageHandler`.
/// **Action:** Dispatch "/help" and then "hello".
/// **Expected:** "/help" runs only the command callback; "hello" runs only the catch-all.
#[tokio::test]
async fn test_first_match_in_group() {
    let help_count = Arc::new(AtomicUsize::new(0));
    let all_count = Arc::new(AtomicUsize::new(0));

    let chain = HandlerChain::new()
        .add_handler(Arc::new(
            CommandHandler::new(["help"], counting(help_count.clone(), HandlerResponse::Continue))
                .unwrap(),
        ))
        .add_handler(Arc::new(MessageHandler::all(counting(
            all_count.clone(),
            HandlerResponse::Continue,
        ))));

    let outcome = chain.process_update(text_update("/help")).await;
    assert_eq!(outcome.handlers.len(), 1);
    assert_eq!(help_count.load(Ordering::SeqCst), 1);
    assert_eq!(all_count.load(Ordering::SeqCst), 0);

    chain.process_update(text_update("hello")).await;
    assert_eq!(help_count.load(Ordering::SeqCst), 1);
    assert_eq!(all_count.load(Ordering::SeqCst), 1);
}

/// **Test: Groups run in ascending order; Stop skips later groups.**
///
/// **Setup:** Catch-all handlers in groups 5, -1 and 10; group 5 returns Stop.
/// **Action:** Dispatch "hi".
/// **Expected:** Handlers of groups -1 and 5 ran in that order; group 10 did not; response is Stop.
#[tokio::test]
async fn test_groups_in_order_and_stop() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let record = |label: &'static str, response: HandlerResponse| {
        let order = order.clone();
        Callback::new(move |_, _| {
            let order = order.clone();
            let response = response.clone();
            async move {
                order.lock().unwrap().push(label);
                Ok(response)
            }
        })
    };

    let chain = HandlerChain::new()
        .add_handler_to_group(
            Arc::new(MessageHandler::all(record("five", HandlerResponse::Stop))),
            5,
        )
        .add_handler_to_group(
            Arc::new(MessageHandler::all(record("minus_one", HandlerResponse::Continue))),
            -1,
        )
        .add_handler_to_group(
            Arc::new(MessageHandler::all(record("ten", HandlerResponse::Continue))),
            10,
        );

    let outcome = chain.process_update(text_update("hi")).await;

    assert_eq!(*order.lock().unwrap(), vec!["minus_one", "five"]);
    assert_eq!(outcome.response, HandlerResponse::Stop);
    assert_eq!(outcome.handlers.len(), 2);
}

/// **Test: Reply is sent through the bot as a reply to the update's message.**
///
/// **Setup:** Chain with a MockBot and a handler returning Reply("pong"), plus a later group.
/// **Action:** Dispatch "ping".
/// **Expected:** One message "pong" to chat 456 replying to message 10; later group skipped.
#[tokio::test]
async fn test_reply_is_sent_and_stops() {
    let bot = Arc::new(MockBot::default());
    let later = Arc::new(AtomicUsize::new(0));

    let chain = HandlerChain::new()
        .with_bot(bot.clone())
        .add_handler(Arc::new(MessageHandler::new(
            message::text_in(["ping"]),
            Callback::new(|_, _| async { Ok(HandlerResponse::Reply("pong".to_string())) }),
        )))
        .add_handler_to_group(
            Arc::new(MessageHandler::all(counting(later.clone(), HandlerResponse::Continue))),
            1,
        );

    let outcome = chain.process_update(text_update("ping")).await;

    assert_eq!(outcome.response, HandlerResponse::Reply("pong".to_string()));
    assert_eq!(later.load(Ordering::SeqCst), 0);
    let sent = bot.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 456);
    assert_eq!(sent[0].1, "pong");
    assert_eq!(sent[0].2.reply_to_message_id, Some(10));
}

/// **Test: A failing callback goes to the error hook and dispatch continues.**
///
/// **Setup:** Group 0 callback returns `HandlerError::NoText`; group 1 counts; one error hook.
/// **Action:** Dispatch "x".
/// **Expected:** Hook called once with `ctx.error` set; group 1 still ran.
#[tokio::test]
async fn test_error_hook_receives_callback_error() {
    let hook_count = Arc::new(AtomicUsize::new(0));
    let later = Arc::new(AtomicUsize::new(0));

    let hook = {
        let hook_count = hook_count.clone();
        Callback::new(move |_, ctx| {
            let hook_count = hook_count.clone();
            async move {
                assert!(matches!(
                    ctx.error.as_deref(),
                    Some(DbotError::Handler(HandlerError::NoText))
                ));
                hook_count.fetch_add(1, Ordering::SeqCst);
                Ok(HandlerResponse::Continue)
            }
        })
    };

    let chain = HandlerChain::new()
        .add_error_handler(hook)
        .add_handler(Arc::new(MessageHandler::all(Callback::new(|_, _| async {
            Err(HandlerError::NoText.into())
        }))))
        .add_handler_to_group(
            Arc::new(MessageHandler::all(counting(later.clone(), HandlerResponse::Continue))),
            1,
        );

    chain.process_update(text_update("x")).await;

    assert_eq!(hook_count.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 1);
}

/// **Test: Non-blocking handlers are spawned and their response does not stop dispatch.**
///
/// **Setup:** Group 0 non-blocking handler returning Stop; group 1 counts. Shared pool.
/// **Action:** Dispatch "x", wait for the pool to drain.
/// **Expected:** Both callbacks ran once.
#[tokio::test]
async fn test_non_blocking_handler_runs_on_pool() {
    let pool = UpdateWorkerPool::new(4);
    let spawned = Arc::new(AtomicUsize::new(0));
    let later = Arc::new(AtomicUsize::new(0));

    let chain = HandlerChain::new()
        .with_pool(pool.clone())
        .add_handler(Arc::new(
            MessageHandler::all(counting(spawned.clone(), HandlerResponse::Stop)).block(false),
        ))
        .add_handler_to_group(
            Arc::new(MessageHandler::all(counting(later.clone(), HandlerResponse::Continue))),
            1,
        );

    let outcome = chain.process_update(text_update("x")).await;
    pool.wait_idle().await;

    assert_eq!(outcome.response, HandlerResponse::Continue);
    assert_eq!(spawned.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 1);
}

/// **Test: A panicking non-blocking callback is reported to the error hooks.**
///
/// **Setup:** Non-blocking handler whose callback panics; error hook counting Join errors.
/// **Action:** Dispatch "x", wait for the pool to drain.
/// **Expected:** Hook saw one `HandlerError::Join`.
#[tokio::test]
async fn test_non_blocking_panic_reaches_error_hook() {
    let pool = UpdateWorkerPool::new(2);
    let joins = Arc::new(AtomicUsize::new(0));
    let hook = {
        let joins = joins.clone();
        Callback::new(move |_, ctx| {
            let joins = joins.clone();
            async move {
                if matches!(
                    ctx.error.as_deref(),
                    Some(DbotError::Handler(HandlerError::Join(_)))
                ) {
                    joins.fetch_add(1, Ordering::SeqCst);
                }
                Ok(HandlerResponse::Continue)
            }
        })
    };

    let chain = HandlerChain::new()
        .with_pool(pool.clone())
        .add_error_handler(hook)
        .add_handler(Arc::new(
            MessageHandler::all(Callback::new(|update, _| async move {
                if update.update_id > 0 {
                    panic!("callback blew up");
                }
                Ok(HandlerResponse::Continue)
            }))
            .block(false),
        ));

    chain.process_update(text_update("x")).await;
    pool.wait_idle().await;

    assert_eq!(joins.load(Ordering::SeqCst), 1);
}

/// **Test: spawn_update keeps the order of one chat's updates.**
///
/// **Setup:** Catch-all that sleeps 30 ms on "first", then records the text.
/// **Action:** spawn_update "first" then "second" for the same chat on a 4-slot pool.
/// **Expected:** Recorded order is first, second.
#[tokio::test]
async fn test_spawn_update_keeps_chat_order() {
    let pool = UpdateWorkerPool::new(4);
    let gate = ChatGate::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let chain = HandlerChain::new().add_handler(Arc::new(MessageHandler::all(Callback::new(
        move |update, _| {
            let recorder = recorder.clone();
            async move {
                let text = update
                    .effective_message()
                    .and_then(|m| m.text.clone())
                    .unwrap_or_default();
                if text == "first" {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                }
                recorder.lock().unwrap().push(text);
                Ok(HandlerResponse::Continue)
            }
        },
    ))));

    chain.spawn_update(text_update("first"), &pool, &gate).await;
    chain.spawn_update(text_update("second"), &pool, &gate).await;
    pool.wait_idle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["first".to_string(), "second".to_string()]);
    assert_eq!(gate.active_chats(), 0);
}

/// Middleware that records before/after calls with its label.
struct RecordingMiddleware {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    allow: bool,
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn before(&self, _update: &Update) -> dbot_core::Result<bool> {
        self.log.lock().unwrap().push(format!("before:{}", self.label));
        Ok(self.allow)
    }

    async fn after(&self, _update: &Update, _response: &HandlerResponse) -> dbot_core::Result<()> {
        self.log.lock().unwrap().push(format!("after:{}", self.label));
        Ok(())
    }
}

/// **Test: Middleware before runs first→last, after runs last→first.**
///
/// **Setup:** Middleware a and b, one catch-all handler.
/// **Action:** Dispatch "x".
/// **Expected:** Log is before:a, before:b, after:b, after:a; handler ran.
#[tokio::test]
async fn test_middleware_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicUsize::new(0));

    let chain = HandlerChain::new()
        .add_middleware(Arc::new(RecordingMiddleware {
            label: "a",
            log: log.clone(),
            allow: true,
        }))
        .add_middleware(Arc::new(RecordingMiddleware {
            label: "b",
            log: log.clone(),
            allow: true,
        }))
        .add_handler(Arc::new(MessageHandler::all(counting(
            handled.clone(),
            HandlerResponse::Continue,
        ))));

    chain.process_update(text_update("x")).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["before:a", "before:b", "after:b", "after:a"]
    );
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

/// **Test: Middleware before returning false drops the update.**
///
/// **Setup:** One rejecting middleware, one catch-all handler.
/// **Action:** Dispatch "x".
/// **Expected:** Outcome is dropped with Stop; handler not run; after not run.
#[tokio::test]
async fn test_middleware_drops_update() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicUsize::new(0));

    let chain = HandlerChain::new()
        .add_middleware(Arc::new(RecordingMiddleware {
            label: "gate",
            log: log.clone(),
            allow: false,
        }))
        .add_handler(Arc::new(MessageHandler::all(counting(
            handled.clone(),
            HandlerResponse::Continue,
        ))));

    let outcome = chain.process_update(text_update("x")).await;

    assert!(outcome.dropped);
    assert_eq!(outcome.response, HandlerResponse::Stop);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock().unwrap(), vec!["before:gate"]);
}

/// **Test: Command arguments reach the callback context.**
///
/// **Setup:** `CommandHandler(["echo"])` whose callback replies with the joined args.
/// **Action:** Dispatch "/echo a b" with a MockBot attached.
/// **Expected:** Bot received "a b".
#[tokio::test]
async fn test_callback_receives_args() {
    let bot = Arc::new(MockBot::default());
    let chain = HandlerChain::new().with_bot(bot.clone()).add_handler(Arc::new(
        CommandHandler::new(
            ["echo"],
            Callback::new(|_, ctx| async move { Ok(HandlerResponse::Reply(ctx.args.join(" "))) }),
        )
        .unwrap(),
    ));

    chain.process_update(text_update("/echo a b")).await;

    assert_eq!(bot.sent.lock().unwrap()[0].1, "a b");
}
