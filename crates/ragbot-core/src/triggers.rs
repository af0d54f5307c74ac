//! Trigger word matching.

/// Case-insensitive substring check of `text` against a word list.
pub fn contains_any(text: &str, words: &[String]) -> bool {
    let text = text.to_lowercase();
    words
        .iter()
        .filter(|w| !w.is_empty())
        .any(|w| text.contains(&w.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> Vec<String> {
        vec!["менеджер".to_string(), "позвать".to_string()]
    }

    #[test]
    fn matches_substring_case_insensitively() {
        assert!(contains_any("Позовите МЕНЕДЖЕРА, пожалуйста", &words()));
        assert!(contains_any("хочу позвать кого-нибудь", &words()));
    }

    #[test]
    fn no_match_for_unrelated_text() {
        assert!(!contains_any("сколько стоит абонемент?", &words()));
    }

    #[test]
    fn empty_words_never_match() {
        assert!(!contains_any("что угодно", &[String::new()]));
        assert!(!contains_any("что угодно", &[]));
    }
}
