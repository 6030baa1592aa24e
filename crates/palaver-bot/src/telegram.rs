//! Telegram transport: inbound dispatch and the outbound responder.
//!
//! Commands are handled here directly; plain text messages are converted to
//! transport-neutral events and handed to the orchestrator, which talks back
//! through [`TelegramResponder`].

use std::sync::Arc;

use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ReplyParameters};
use teloxide::utils::command::BotCommands;

use palaver_core::transport::Responder;
use palaver_types::error::TransportError;
use palaver_types::event::InboundMessage;

use crate::state::AppState;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show this help")]
    Help,
    #[command(description = "start talking to the bot")]
    Start,
    #[command(description = "start a fresh conversation")]
    New,
}

/// Run the long-polling dispatcher until shutdown (ctrl-c).
pub async fn run(bot: Bot, state: Arc<AppState>) {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    match cmd {
        Command::Help | Command::Start => {
            bot.send_message(chat_id, &state.messages.help).await?;
        }
        Command::New => {
            let text = match state.orchestrator.reset(chat_id.0).await {
                Ok(()) => &state.messages.new_chat_created,
                Err(err) => {
                    tracing::error!(
                        conversation_id = chat_id.0,
                        error = %err,
                        "Unable to reset conversation"
                    );
                    &state.messages.new_chat_error
                }
            };
            bot.send_message(chat_id, text).await?;
        }
    }
    Ok(())
}

async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    let event = InboundMessage {
        conversation_id: msg.chat.id.0,
        sender_id: msg
            .from
            .as_ref()
            .map(|user| user.id.0 as i64)
            .unwrap_or(msg.chat.id.0),
        is_private: msg.chat.is_private(),
        text: text.to_string(),
        message_id: msg.id.0,
        timestamp: msg.date.timestamp(),
    };

    // Replies and notices go out through the responder; the outcome is
    // only interesting for tracing here.
    let outcome = state.orchestrator.handle(&event, &state.cancel).await;
    tracing::debug!(conversation_id = event.conversation_id, ?outcome, "Turn finished");
    Ok(())
}

/// Outbound half of the Telegram transport.
#[derive(Clone)]
pub struct TelegramResponder {
    bot: Bot,
}

impl TelegramResponder {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Responder for TelegramResponder {
    async fn send(
        &self,
        conversation_id: i64,
        text: &str,
        in_reply_to: Option<i32>,
    ) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(conversation_id), text);
        if let Some(message_id) = in_reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        request
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(())
    }
}
