//! User-facing texts, history markers and prompt scaffolding.
//!
//! The bot talks to a Russian-speaking audience, so all texts are
//! Russian. Synthetic history markers are wrapped in `**` so they are
//! easy to tell apart from real user messages in transcripts.

pub const CALL_MANAGER_BUTTON: &str = "Хочу, чтобы мне перезвонили";
pub const CALL_MANAGER_PROMPT: &str =
    "Чтобы продолжить общение с нашим менеджером, нажмите кнопку:";
pub const CONFIRM_YES_BUTTON: &str = "Да";
pub const CONFIRM_NO_BUTTON: &str = "Нет";
pub const ASK_NAME: &str = "Как к вам можно обращаться?";
pub const ASK_PHONE: &str = "Напишите ваш телефон для связи";
pub const MANAGER_WILL_CALL: &str = "Наш менеджер свяжется с вами в ближайшее время";
pub const USER_ERROR: &str =
    "Возникла ошибка. Пожалуйста, попробуйте повторить ваш запрос позднее.";

pub const HISTORY_CALL_REQUESTED: &str = "** хочет, чтобы ему перезвонили **";
pub const HISTORY_CONFIRM_YES: &str = "** подтвердил контактные данные **";
pub const HISTORY_CONFIRM_NO: &str = "** опроверг контактные данные **";

pub const PROMPT_USER_PREFIX: &str = "Пользователь: ";
pub const PROMPT_ASSISTANT_PREFIX: &str = "Помощник: ";
pub const PROMPT_HISTORY_HEADER: &str = "История беседы:\n";
pub const PROMPT_FRAGMENTS_HEADER: &str = "Используй фрагменты базы знаний:\n---\n";
pub const PROMPT_FRAGMENTS_FOOTER: &str = "---\n";

pub fn confirm_contact_text(name: &str, phone: &str) -> String {
    format!("Мы нашли ваши контактные данные: {name}, {phone}. Всё верно?")
}

pub fn operator_error_text(error: &str) -> String {
    format!("Возникла ошибка: {error}")
}

/// Operator notification block sent once per finalized lead.
pub fn lead_block(name: &str, phone: &str, summary: &str, link: &str) -> String {
    format!("{name} ({phone}): {summary}\n\n{link}")
}

pub fn summarize_prompt(history: &str) -> String {
    format!("Суммаризируй диалог пользователя в двух предложениях:\n{history}\nРезюме:")
}

pub fn title_prompt(history: &str) -> String {
    format!("Придумай короткий заголовок этого диалога, не длиннее пяти слов:\n{history}\nЗаголовок:")
}

pub fn interest_prompt(history: &str) -> String {
    format!(
        "Определи одним-двумя словами, какое направление занятий интересует пользователя:\n{history}\nИнтерес:"
    )
}
