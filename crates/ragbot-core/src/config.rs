//! Engine settings.

use std::env;

/// Tunable texts and trigger lists for the conversation engine.
///
/// Everything has a working default so the bot can start from a bare
/// environment; production overrides come from env vars.
#[derive(Debug, Clone)]
pub struct Settings {
    /// System preamble prepended to every generation prompt.
    pub preamble: String,
    /// Public base URL used to build shareable transcript links.
    pub base_url: String,
    /// Words in a user message that trigger the callback offer.
    pub trigger_words: Vec<String>,
    /// Phrases in a generated answer that replace it with the
    /// callback offer.
    pub answer_trigger_words: Vec<String>,
}

const DEFAULT_TRIGGER_WORDS: &str = "позвать,позови,менеджер,оператор";
const DEFAULT_ANSWER_TRIGGER_WORDS: &str =
    "заказать звонок,позвать менеджера,вам перезвонил,оператор";

impl Settings {
    pub fn from_env() -> Self {
        Self {
            preamble: env::var("PREAMBLE").unwrap_or_default(),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "localhost:8080".to_string()),
            trigger_words: split_words(
                &env::var("CALL_MANAGER_TRIGGER_WORDS")
                    .unwrap_or_else(|_| DEFAULT_TRIGGER_WORDS.to_string()),
            ),
            answer_trigger_words: split_words(
                &env::var("CALL_MANAGER_TRIGGER_WORDS_IN_ANSWER")
                    .unwrap_or_else(|_| DEFAULT_ANSWER_TRIGGER_WORDS.to_string()),
            ),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preamble: String::new(),
            base_url: "localhost:8080".to_string(),
            trigger_words: split_words(DEFAULT_TRIGGER_WORDS),
            answer_trigger_words: split_words(DEFAULT_ANSWER_TRIGGER_WORDS),
        }
    }
}

fn split_words(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_trigger_words_are_present() {
        let settings = Settings::default();
        assert!(settings.trigger_words.contains(&"менеджер".to_string()));
        assert!(settings
            .answer_trigger_words
            .contains(&"позвать менеджера".to_string()));
    }

    #[test]
    fn split_words_trims_and_skips_empty() {
        assert_eq!(split_words(" a , ,b,"), vec!["a", "b"]);
    }
}
