//! Operator notification bot.

use async_trait::async_trait;
use ragbot_core::Notifier;
use teloxide::prelude::*;
use tracing::{info, warn};

const MSG_CHAT_ID: &str = "Ваш CHAT ID";
const MSG_NOTIFY_ONLY: &str =
    "Этот бот только для получения уведомлений. Доступная команда: /chatId";

/// Broadcast-only bot for the operator channel. Incoming traffic is
/// ignored except for `/chatId` self-identification.
pub struct NotifyBot {
    bot: Bot,
    chats: Vec<i64>,
}

impl NotifyBot {
    pub fn new(token: &str, chats: Vec<i64>) -> Self {
        Self {
            bot: Bot::new(token),
            chats,
        }
    }

    /// Run the inbound dispatcher. Only needed for `/chatId`; sending
    /// works without it.
    pub async fn run(&self) {
        info!("Notification bot started");
        let allowed = self.chats.clone();

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let allowed = allowed.clone();
            async move {
                if !allowed.contains(&msg.chat.id.0) {
                    return respond(());
                }
                if let Some(text) = msg.text() {
                    let text = text.trim();
                    if text == "/chatId" || text == "/start" {
                        bot.send_message(msg.chat.id, format!("{}: {}", MSG_CHAT_ID, msg.chat.id.0))
                            .await?;
                    } else if text.starts_with('/') {
                        bot.send_message(msg.chat.id, MSG_NOTIFY_ONLY).await?;
                    }
                }
                respond(())
            }
        });

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;
    }
}

#[async_trait]
impl Notifier for NotifyBot {
    async fn notify(&self, text: &str) {
        for &chat_id in &self.chats {
            if let Err(e) = self.bot.send_message(ChatId(chat_id), text).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to deliver operator notification");
            }
        }
    }
}

/// Fallback for an unconfigured notification bot: messages land in
/// the log instead of a chat.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        warn!(message = %text, "Operator notification (no notification bot configured)");
    }
}
