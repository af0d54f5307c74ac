//! Retrieval-augmented answer composer.
//!
//! One question becomes one prompt: preamble, recent history, nearest
//! knowledge fragments, then the question itself. Both the embedding
//! and the generation step are fatal here; the engine decides what the
//! user sees when they fail.

use std::sync::Arc;

use ragbot_ai::AiProvider;
use ragbot_models::{HistoryItem, Role};
use ragbot_store::{ChunkStore, ConversationStore};

use crate::error::Result;
use crate::messages;

/// How many recent turns feed the prompt.
pub const HISTORY_WINDOW: i64 = 20;
/// How many knowledge fragments feed the prompt.
pub const TOP_FRAGMENTS: i64 = 5;

pub struct Composer {
    conversations: Arc<dyn ConversationStore>,
    chunks: Arc<dyn ChunkStore>,
    ai: Arc<dyn AiProvider>,
    preamble: String,
}

impl Composer {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        chunks: Arc<dyn ChunkStore>,
        ai: Arc<dyn AiProvider>,
        preamble: String,
    ) -> Self {
        Self {
            conversations,
            chunks,
            ai,
            preamble,
        }
    }

    /// Answer `question` for `chat_id`. Chat id 0 is the stateless
    /// mode used by the HTTP surface: no history block at all.
    pub async fn answer(&self, chat_id: i64, question: &str) -> Result<String> {
        let history = if chat_id != 0 {
            Some(self.conversations.history(chat_id, HISTORY_WINDOW).await?)
        } else {
            None
        };

        let embedding = self.ai.embed(question).await?;
        let fragments = self.chunks.nearest_chunks(&embedding, TOP_FRAGMENTS).await?;

        let prompt = build_prompt(&self.preamble, history.as_deref(), &fragments, question);
        Ok(self.ai.generate(&prompt).await?)
    }
}

/// Assemble the full generation prompt. `history` is `None` in
/// stateless mode; an empty slice still renders the history header.
pub fn build_prompt(
    preamble: &str,
    history: Option<&[HistoryItem]>,
    fragments: &[String],
    question: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(preamble);
    prompt.push('\n');

    if let Some(history) = history {
        prompt.push_str(messages::PROMPT_HISTORY_HEADER);
        for item in history {
            let prefix = match item.role {
                Role::User => messages::PROMPT_USER_PREFIX,
                Role::Assistant => messages::PROMPT_ASSISTANT_PREFIX,
            };
            prompt.push_str(prefix);
            prompt.push_str(&item.content);
            prompt.push('\n');
        }
    }
    prompt.push('\n');

    prompt.push_str(messages::PROMPT_FRAGMENTS_HEADER);
    for fragment in fragments {
        prompt.push_str(fragment);
        prompt.push('\n');
    }
    prompt.push_str(messages::PROMPT_FRAGMENTS_FOOTER);

    prompt.push_str("Вопрос: ");
    prompt.push_str(question);
    prompt.push_str("\nОтвет:\n");
    prompt
}

/// Render history the way digest prompts expect it, one prefixed line
/// per turn.
pub fn render_history(history: &[HistoryItem]) -> String {
    let mut out = String::new();
    for item in history {
        let prefix = match item.role {
            Role::User => messages::PROMPT_USER_PREFIX,
            Role::Assistant => messages::PROMPT_ASSISTANT_PREFIX,
        };
        out.push_str(prefix);
        out.push_str(&item.content);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_all_blocks_in_order() {
        let history = vec![
            HistoryItem::new(Role::User, "привет"),
            HistoryItem::new(Role::Assistant, "здравствуйте"),
        ];
        let fragments = vec!["Класс Сальса: по вторникам".to_string()];
        let prompt = build_prompt("Ты помощник школы танцев.", Some(&history), &fragments, "когда сальса?");

        let history_pos = prompt.find("История беседы:").unwrap();
        let fragments_pos = prompt.find("Используй фрагменты базы знаний:").unwrap();
        let question_pos = prompt.find("Вопрос: когда сальса?").unwrap();

        assert!(prompt.starts_with("Ты помощник школы танцев.\n"));
        assert!(history_pos < fragments_pos);
        assert!(fragments_pos < question_pos);
        assert!(prompt.contains("Пользователь: привет\n"));
        assert!(prompt.contains("Помощник: здравствуйте\n"));
        assert!(prompt.contains("Класс Сальса: по вторникам\n"));
        assert!(prompt.ends_with("\nОтвет:\n"));
    }

    #[test]
    fn stateless_prompt_has_no_history_block() {
        let prompt = build_prompt("", None, &[], "вопрос");
        assert!(!prompt.contains("История беседы:"));
        assert!(prompt.contains("Используй фрагменты базы знаний:"));
    }

    #[test]
    fn empty_history_still_renders_header() {
        let prompt = build_prompt("", Some(&[]), &[], "вопрос");
        assert!(prompt.contains("История беседы:"));
    }
}
