//! Deterministic tag and branch derivation.
//!
//! All matching runs over an ordered rule list, so the same session
//! always produces the same tag sequence.

/// One keyword rule: when `keyword` occurs in the lowercased summary,
/// all of `tags` are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub keyword: String,
    pub tags: Vec<String>,
}

/// One branch rule: when `name` occurs in the lowercased summary, the
/// branch custom field gets `enum_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRule {
    pub name: String,
    pub enum_id: i64,
}

/// Tag attached to every lead created by the bot.
pub const BOT_TAG: &str = "RAG Бот";

/// Derive the dynamic tag list for a lead.
///
/// Order is fixed: interest tag, keyword-rule tags in rule order,
/// returning/new client marker, bot tag.
pub fn derive_tags(
    interest: &str,
    summary: &str,
    returning_client: bool,
    rules: &[KeywordRule],
) -> Vec<String> {
    let mut tags = Vec::new();

    if !interest.is_empty() {
        tags.push(format!("Интерес: {interest}"));
    }

    let summary = summary.to_lowercase();
    for rule in rules {
        if summary.contains(&rule.keyword) {
            tags.extend(rule.tags.iter().cloned());
        }
    }

    tags.push(if returning_client {
        "Повторный клиент".to_string()
    } else {
        "Новый клиент".to_string()
    });
    tags.push(BOT_TAG.to_string());

    tags
}

/// Derive branch enum ids by case-insensitive substring match over
/// the summary, in rule order.
pub fn derive_branches(summary: &str, rules: &[BranchRule]) -> Vec<i64> {
    let summary = summary.to_lowercase();
    rules
        .iter()
        .filter(|rule| summary.contains(&rule.name.to_lowercase()))
        .map(|rule| rule.enum_id)
        .collect()
}
