//! User-facing bot: the transport for the conversation engine.

use std::sync::Arc;

use ragbot_ai::AiProvider;
use ragbot_core::{messages, ChatEngine, Outgoing, UserEvent};
use ragbot_store::ConversationStore;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Voice};
use tracing::{debug, info, warn};

use crate::error::Result;

const CALLBACK_CALL_MANAGER: &str = "CALL_MANAGER";
const CALLBACK_CONFIRM_YES: &str = "CONFIRM_YES";
const CALLBACK_CONFIRM_NO: &str = "CONFIRM_NO";

/// Voice notes arrive as OGG/OPUS.
const VOICE_FORMAT: &str = "ogg";

pub struct UserBot {
    bot: Bot,
    engine: Arc<ChatEngine>,
    conversations: Arc<dyn ConversationStore>,
    ai: Arc<dyn AiProvider>,
}

impl UserBot {
    pub fn new(
        token: &str,
        engine: Arc<ChatEngine>,
        conversations: Arc<dyn ConversationStore>,
        ai: Arc<dyn AiProvider>,
    ) -> Self {
        Self {
            bot: Bot::new(token),
            engine,
            conversations,
            ai,
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("User bot started");

        let this_for_callbacks = Arc::clone(&self);
        let this_for_messages = Arc::clone(&self);

        let handler = dptree::entry()
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: teloxide::types::CallbackQuery| {
                    let this = Arc::clone(&this_for_callbacks);
                    async move { this.handle_callback(bot, q).await }
                },
            ))
            .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let this = Arc::clone(&this_for_messages);
                async move { this.handle_message(bot, msg).await }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;
    }

    async fn handle_callback(
        &self,
        bot: Bot,
        q: teloxide::types::CallbackQuery,
    ) -> ResponseResult<()> {
        // Ack immediately so Telegram clears the button spinner.
        bot.answer_callback_query(q.id.clone()).await?;

        let Some(msg) = q.message else {
            return Ok(());
        };
        let chat_id = msg.chat().id;
        let username = q.from.username.clone().unwrap_or_default();

        let event = match q.data.as_deref() {
            Some(CALLBACK_CALL_MANAGER) => UserEvent::CallManager,
            Some(CALLBACK_CONFIRM_YES) => UserEvent::ConfirmYes,
            Some(CALLBACK_CONFIRM_NO) => UserEvent::ConfirmNo,
            other => {
                debug!(data = ?other, "Unknown callback data");
                return Ok(());
            }
        };

        self.process(&bot, chat_id, &username, event).await;
        Ok(())
    }

    async fn handle_message(&self, bot: Bot, msg: Message) -> ResponseResult<()> {
        let chat_id = msg.chat.id;
        let username = msg
            .from
            .as_ref()
            .and_then(|u| u.username.clone())
            .unwrap_or_default();

        let event = if let Some(text) = msg.text() {
            UserEvent::Text(text.to_string())
        } else if let Some(voice) = msg.voice() {
            match self.transcribe_voice(&bot, voice).await {
                Ok(text) if !text.trim().is_empty() => UserEvent::Text(text),
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(chat_id = %chat_id, error = %e, "Voice transcription failed");
                    bot.send_message(chat_id, messages::USER_ERROR).await?;
                    return Ok(());
                }
            }
        } else {
            return Ok(());
        };

        self.process(&bot, chat_id, &username, event).await;
        Ok(())
    }

    /// Feed one event to the engine and render the resulting actions.
    /// Failures are logged; the dispatcher must survive any update.
    async fn process(&self, bot: &Bot, chat_id: ChatId, username: &str, event: UserEvent) {
        if let Err(e) = self.conversations.ensure_session(chat_id.0, username).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to ensure session");
            return;
        }

        let actions = match self.engine.handle(chat_id.0, event).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Engine failed to process update");
                return;
            }
        };

        for action in actions {
            if let Err(e) = self.send(bot, chat_id, action).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to send reply");
            }
        }
    }

    async fn send(&self, bot: &Bot, chat_id: ChatId, action: Outgoing) -> Result<()> {
        match action {
            Outgoing::Reply(text) => {
                bot.send_message(chat_id, text).await?;
            }
            Outgoing::OfferCallback => {
                let keyboard = InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::callback(
                        messages::CALL_MANAGER_BUTTON,
                        CALLBACK_CALL_MANAGER,
                    ),
                ]]);
                bot.send_message(chat_id, messages::CALL_MANAGER_PROMPT)
                    .reply_markup(keyboard)
                    .await?;
            }
            Outgoing::ConfirmContact { name, phone } => {
                let keyboard = InlineKeyboardMarkup::new(vec![vec![
                    InlineKeyboardButton::callback(messages::CONFIRM_YES_BUTTON, CALLBACK_CONFIRM_YES),
                    InlineKeyboardButton::callback(messages::CONFIRM_NO_BUTTON, CALLBACK_CONFIRM_NO),
                ]]);
                bot.send_message(chat_id, messages::confirm_contact_text(&name, &phone))
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        Ok(())
    }

    async fn transcribe_voice(&self, bot: &Bot, voice: &Voice) -> Result<String> {
        let file = bot.get_file(voice.file.id.clone()).await?;
        let mut audio = Vec::new();
        bot.download_file(&file.path, &mut audio).await?;
        debug!(bytes = audio.len(), "Voice note downloaded");
        Ok(self.ai.transcribe(&audio, VOICE_FORMAT).await?)
    }
}
