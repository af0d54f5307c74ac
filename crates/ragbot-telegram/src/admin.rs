//! Knowledge-base administration bot.
//!
//! Commands manage individual chunks; any other text becomes a new
//! chunk with source "admin". Mutating commands require the chat to
//! be on the admin allow-list.

use std::sync::Arc;

use ragbot_store::{ChunkStore, StoreError};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

pub const ADMIN_SOURCE: &str = "admin";

const MSG_HELP: &str = "Команды администратора:\n\
/help — эта справка\n\
/myid — получить свой chat_id\n\
/delete <id> — удалить фрагмент по ID\n\
/update <id> <текст> — обновить фрагмент по ID\n\n\
Все остальное будет интерпретировано как запись в базу знаний";
const MSG_INVALID_ID: &str = "Неверный ID";
const MSG_UPDATE_USAGE: &str = "Использование: /update <id> <новый текст>";
const MSG_ADDED: &str = "Добавлено";
const MSG_EXISTS: &str = "Уже существует";

/// Admin bot commands.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub enum AdminCommand {
    #[command(description = "эта справка")]
    Help,
    #[command(description = "получить свой chat_id")]
    Myid,
    #[command(description = "удалить фрагмент по ID")]
    Delete(String),
    #[command(description = "обновить фрагмент по ID")]
    Update(String),
}

pub struct AdminBot {
    bot: Bot,
    store: Arc<dyn ChunkStore>,
    allowed: Vec<i64>,
}

impl AdminBot {
    pub fn new(token: &str, store: Arc<dyn ChunkStore>, allowed: Vec<i64>) -> Self {
        Self {
            bot: Bot::new(token),
            store,
            allowed,
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("Admin bot started");

        let this_for_commands = Arc::clone(&self);
        let this_for_text = Arc::clone(&self);

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<AdminCommand>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: AdminCommand| {
                        let this = Arc::clone(&this_for_commands);
                        async move { this.handle_command(bot, msg, cmd).await }
                    }),
            )
            .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let this = Arc::clone(&this_for_text);
                async move { this.handle_text(bot, msg).await }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;
    }

    fn is_admin(&self, chat_id: i64) -> bool {
        self.allowed.contains(&chat_id)
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: AdminCommand,
    ) -> ResponseResult<()> {
        let chat_id = msg.chat.id;
        // /myid and /help work for everyone so new admins can find
        // their chat id before being allow-listed.
        let reply = match cmd {
            AdminCommand::Myid => format!("Ваш CHAT ID: {}", chat_id.0),
            AdminCommand::Help => MSG_HELP.to_string(),
            AdminCommand::Delete(arg) => {
                if !self.is_admin(chat_id.0) {
                    return Ok(());
                }
                delete_reply(self.store.as_ref(), &arg).await
            }
            AdminCommand::Update(arg) => {
                if !self.is_admin(chat_id.0) {
                    return Ok(());
                }
                update_reply(self.store.as_ref(), &arg).await
            }
        };
        bot.send_message(chat_id, reply).await?;
        Ok(())
    }

    async fn handle_text(&self, bot: Bot, msg: Message) -> ResponseResult<()> {
        let chat_id = msg.chat.id;
        if !self.is_admin(chat_id.0) {
            return Ok(());
        }
        let Some(text) = msg.text() else {
            return Ok(());
        };
        let reply = add_reply(self.store.as_ref(), text).await;
        bot.send_message(chat_id, reply).await?;
        Ok(())
    }
}

async fn delete_reply(store: &dyn ChunkStore, arg: &str) -> String {
    let Ok(id) = arg.trim().parse::<i64>() else {
        return MSG_INVALID_ID.to_string();
    };
    match store.delete_chunk(id).await {
        Ok(content) => {
            info!(chunk_id = id, "Chunk deleted by admin");
            format!("Удалён фрагмент {id}: {content}")
        }
        Err(e @ StoreError::ChunkNotFound(_)) => format!("Ошибка удаления: {e}"),
        Err(e) => {
            warn!(chunk_id = id, error = %e, "Chunk delete failed");
            format!("Ошибка удаления: {e}")
        }
    }
}

async fn update_reply(store: &dyn ChunkStore, arg: &str) -> String {
    let Some((id_part, content)) = arg.trim().split_once(' ') else {
        return MSG_UPDATE_USAGE.to_string();
    };
    let Ok(id) = id_part.parse::<i64>() else {
        return MSG_INVALID_ID.to_string();
    };
    match store.update_chunk(id, content.trim()).await {
        Ok(()) => {
            info!(chunk_id = id, "Chunk updated by admin");
            format!("Обновлён фрагмент {id}")
        }
        Err(e) => format!("Ошибка обновления: {e}"),
    }
}

async fn add_reply(store: &dyn ChunkStore, text: &str) -> String {
    let content = text.trim();
    if content.is_empty() {
        return MSG_INVALID_ID.to_string();
    }
    match store.add_chunk(content, ADMIN_SOURCE).await {
        Ok(Some(id)) => {
            info!(chunk_id = id, "Chunk added by admin");
            MSG_ADDED.to_string()
        }
        Ok(None) => MSG_EXISTS.to_string(),
        Err(e) => {
            warn!(error = %e, "Chunk insert failed");
            format!("Ошибка добавления: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_store::MemStore;

    #[tokio::test]
    async fn delete_of_missing_chunk_reports_not_found() {
        let store = MemStore::new();
        let reply = delete_reply(&store, "7").await;
        assert!(reply.starts_with("Ошибка удаления:"));
        assert!(reply.contains('7'));
    }

    #[tokio::test]
    async fn delete_returns_removed_content() {
        let store = MemStore::new();
        store.add_chunk("фрагмент", ADMIN_SOURCE).await.unwrap();
        let reply = delete_reply(&store, "1").await;
        assert_eq!(reply, "Удалён фрагмент 1: фрагмент");
        assert_eq!(store.unprocessed_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let store = MemStore::new();
        assert_eq!(delete_reply(&store, "abc").await, MSG_INVALID_ID);
        assert_eq!(update_reply(&store, "abc текст").await, MSG_INVALID_ID);
        assert_eq!(update_reply(&store, "7").await, MSG_UPDATE_USAGE);
    }

    #[tokio::test]
    async fn update_resets_chunk_for_reindexing() {
        let store = MemStore::new();
        store.add_chunk("старый текст", ADMIN_SOURCE).await.unwrap();
        store.set_chunk_embedding(1, &[0.1, 0.2]).await.unwrap();

        let reply = update_reply(&store, "1 новый текст").await;
        assert_eq!(reply, "Обновлён фрагмент 1");

        let chunk = store.chunk(1).await.unwrap();
        assert_eq!(chunk.content, "новый текст");
        assert!(chunk.embedding.is_none());
    }

    #[tokio::test]
    async fn plain_text_becomes_chunk_with_dedup() {
        let store = MemStore::new();
        assert_eq!(add_reply(&store, "  запись  ").await, MSG_ADDED);
        assert_eq!(add_reply(&store, "запись").await, MSG_EXISTS);
        assert_eq!(store.unprocessed_count().await, 1);
    }
}
