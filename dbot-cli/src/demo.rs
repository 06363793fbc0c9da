//! Demo handler set used by both `dbot run` and `dbot route`.

use std::sync::Arc;

use async_trait::async_trait;
use conversation::ConversationHandler;
use dbot_core::{
    AnswerCallbackOptions, Bot, Chat, ChatType, HandlerResponse, Message, SendMessageOptions,
    Update, UpdatePayload, User,
};
use filters::message;
use handler_chain::{
    Callback, CallbackQueryHandler, CommandHandler, HandlerChain, HasArgs, MessageHandler,
    Pattern, PrefixHandler,
};
use middleware::LoggingMiddleware;
use tracing::error;

const HELP: &str = "/start, /help, /echo <text>, !ping, 2 + 3, /feedback";

fn reply(text: &'static str) -> Callback {
    Callback::new(move |_, _| async move { Ok(HandlerResponse::Reply(text.to_string())) })
}

fn feedback_conversation() -> anyhow::Result<ConversationHandler> {
    let conversation = ConversationHandler::builder("feedback")
        .entry_point(Arc::new(CommandHandler::new(
            ["feedback"],
            Callback::new(|_, ctx| async move {
                ctx.reply("What would you like to tell us? /cancel to stop.").await?;
                Ok(HandlerResponse::State("waiting".to_string()))
            }),
        )?))
        .state(
            "waiting",
            Arc::new(MessageHandler::new(
                message::text() & !message::text_in(["/cancel"]),
                Callback::new(|_, ctx| async move {
                    ctx.reply("Thanks, noted.").await?;
                    Ok(HandlerResponse::End)
                }),
            )),
        )
        .fallback(Arc::new(CommandHandler::new(
            ["cancel"],
            Callback::new(|_, ctx| async move {
                ctx.reply("Cancelled.").await?;
                Ok(HandlerResponse::End)
            }),
        )?))
        .build()?;
    Ok(conversation)
}

/// Builds the demo chain. Configuration errors surface here, before any update is read.
pub fn build_demo_chain(bot: Arc<dyn Bot>) -> anyhow::Result<HandlerChain> {
    let sum = message::regex(r"^\s*(-?\d+)\s*\+\s*(-?\d+)\s*$")?;

    let chain = HandlerChain::new()
        .with_bot(bot)
        .add_middleware(Arc::new(LoggingMiddleware))
        .add_error_handler(Callback::new(|update, ctx| async move {
            error!(
                update_id = update.update_id,
                error = ?ctx.error.as_deref().map(ToString::to_string),
                "Demo handler failed"
            );
            Ok(HandlerResponse::Continue)
        }))
        .add_handler(Arc::new(feedback_conversation()?))
        .add_handler(Arc::new(CommandHandler::new(
            ["start"],
            reply("Hi! Send /help to see what I can do."),
        )?))
        .add_handler(Arc::new(CommandHandler::new(["help"], reply(HELP))?))
        .add_handler(Arc::new(
            CommandHandler::new(
                ["echo"],
                Callback::new(|_, ctx| async move { Ok(HandlerResponse::Reply(ctx.args.join(" "))) }),
            )?
            .has_args(HasArgs::Some),
        ))
        .add_handler(Arc::new(PrefixHandler::new(["!", "#"], ["ping"], reply("pong"))?))
        .add_handler(Arc::new(MessageHandler::new(
            sum,
            Callback::new(|_, ctx| async move {
                let total: i64 = ctx
                    .matches
                    .first()
                    .map(|m| {
                        [m.group(1), m.group(2)]
                            .into_iter()
                            .flatten()
                            .filter_map(|g| g.parse::<i64>().ok())
                            .sum()
                    })
                    .unwrap_or(0);
                Ok(HandlerResponse::Reply(total.to_string()))
            }),
        )))
        .add_handler(Arc::new(CallbackQueryHandler::new(
            Pattern::regex(r"page:(\d+)")?,
            Callback::new(|update, ctx| async move {
                if let (Some(bot), Some(query)) = (&ctx.bot, update.callback_query()) {
                    let options = AnswerCallbackOptions {
                        text: ctx.matches.first().map(|m| format!("Opening {}", m.text)),
                        ..AnswerCallbackOptions::default()
                    };
                    bot.answer_callback_query(&query.id, &options).await?;
                }
                Ok(HandlerResponse::Stop)
            }),
        )))
        .add_handler(Arc::new(MessageHandler::new(
            message::text(),
            reply("I did not understand that. Try /help."),
        )));
    Ok(chain)
}

/// Text message update from a private chat, for offline routing.
pub fn text_update(chat_id: i64, user_id: i64, text: &str) -> Update {
    let chat = Chat {
        id: chat_id,
        kind: ChatType::Private,
        title: None,
        username: None,
        is_forum: false,
    };
    let mut message = Message::text(1, chat, text);
    message.from = Some(User {
        id: user_id,
        is_bot: false,
        first_name: "cli".to_string(),
        last_name: None,
        username: None,
        language_code: None,
    });
    Update::new(1, UpdatePayload::Message(message))
}

/// Bot that prints outgoing messages instead of sending them.
pub struct PrintBot;

#[async_trait]
impl Bot for PrintBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        _options: &SendMessageOptions,
    ) -> dbot_core::Result<i64> {
        println!("-> chat {}: {}", chat_id, text);
        Ok(0)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> dbot_core::Result<()> {
        println!("-> chat {} edit {}: {}", chat_id, message_id, text);
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        query_id: &str,
        options: &AnswerCallbackOptions,
    ) -> dbot_core::Result<()> {
        println!("-> callback {}: {:?}", query_id, options.text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn route(chain: &HandlerChain, text: &str) -> HandlerResponse {
        chain
            .process_update(Arc::new(text_update(1, 1, text)))
            .await
            .response
    }

    #[tokio::test]
    async fn test_demo_routes() {
        let chain = build_demo_chain(Arc::new(PrintBot)).unwrap();

        assert_eq!(
            route(&chain, "/echo a  b").await,
            HandlerResponse::Reply("a b".to_string())
        );
        assert_eq!(route(&chain, "!PING").await, HandlerResponse::Reply("pong".to_string()));
        assert_eq!(route(&chain, "2 + 40").await, HandlerResponse::Reply("42".to_string()));
        assert_eq!(
            route(&chain, "/help").await,
            HandlerResponse::Reply(HELP.to_string())
        );
        assert_eq!(
            route(&chain, "hello").await,
            HandlerResponse::Reply("I did not understand that. Try /help.".to_string())
        );
    }

    #[tokio::test]
    async fn test_demo_feedback_conversation_consumes_text() {
        let chain = build_demo_chain(Arc::new(PrintBot)).unwrap();

        let started = chain
            .process_update(Arc::new(text_update(1, 1, "/feedback")))
            .await;
        assert_eq!(started.handlers, vec!["feedback".to_string()]);

        let answered = chain
            .process_update(Arc::new(text_update(1, 1, "great bot")))
            .await;
        assert_eq!(answered.handlers, vec!["feedback".to_string()]);
        // State changes do not end dispatch.
        assert_eq!(answered.response, HandlerResponse::Continue);

        // Conversation over: plain text falls through to the catch-all again.
        assert_eq!(
            route(&chain, "great bot").await,
            HandlerResponse::Reply("I did not understand that. Try /help.".to_string())
        );
    }
}
