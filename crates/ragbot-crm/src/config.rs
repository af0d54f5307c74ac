//! Environment-driven CRM configuration.

use std::env;

use crate::tags::{BranchRule, KeywordRule};

/// amoCRM connection and field-mapping settings.
///
/// Field ids are account-specific, so every one of them comes from the
/// environment and defaults to zero, which disables that field in the
/// lead payload.
#[derive(Debug, Clone, Default)]
pub struct AmoConfig {
    pub domain: String,
    pub access_token: String,
    pub source_field_id: i64,
    pub source_field_value_id: i64,
    pub summary_field_id: i64,
    pub chat_link_field_id: i64,
    pub interest_field_id: i64,
    pub branch_field_id: i64,
    /// Ordered branch matching rules, `AMO_BRANCH_FIELD_VALUES_MAP`
    /// as `name:enum_id,name:enum_id`.
    pub branch_rules: Vec<BranchRule>,
    /// Ordered keyword tagging rules, `AMO_KEYWORD_TAGS_MAP` as
    /// `keyword:TagA|TagB,keyword:TagC`.
    pub keyword_rules: Vec<KeywordRule>,
    /// Static tags attached to every lead, `AMO_LEAD_TAGS` comma list.
    pub static_tags: Vec<String>,
    pub dynamic_tags_enabled: bool,
}

impl AmoConfig {
    /// Read the configuration from the environment. Never fails;
    /// missing domain or token makes [`is_enabled`](Self::is_enabled)
    /// false and the integration becomes a no-op.
    pub fn from_env() -> Self {
        Self {
            domain: env_string("AMO_DOMAIN"),
            access_token: env_string("AMO_ACCESS_TOKEN"),
            source_field_id: env_i64("AMO_SOURCE_FIELD_ID"),
            source_field_value_id: env_i64("AMO_SOURCE_FIELD_VALUE_ID"),
            summary_field_id: env_i64("AMO_SUMMARY_FIELD_ID"),
            chat_link_field_id: env_i64("AMO_CHAT_LINK_FIELD_ID"),
            interest_field_id: env_i64("AMO_INTEREST_FIELD_ID"),
            branch_field_id: env_i64("AMO_BRANCH_FIELD_ID"),
            branch_rules: parse_branch_rules(&env_string("AMO_BRANCH_FIELD_VALUES_MAP")),
            keyword_rules: parse_keyword_rules(&env_string("AMO_KEYWORD_TAGS_MAP")),
            static_tags: parse_list(&env_string("AMO_LEAD_TAGS")),
            dynamic_tags_enabled: env::var("AMO_DYNAMIC_TAGS_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// The integration is active only with both a domain and a token.
    pub fn is_enabled(&self) -> bool {
        !self.domain.is_empty() && !self.access_token.is_empty()
    }
}

fn env_string(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn env_i64(key: &str) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Parse `name:enum_id,name:enum_id`. Malformed entries are skipped.
pub fn parse_branch_rules(raw: &str) -> Vec<BranchRule> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, id) = entry.split_once(':')?;
            let name = name.trim();
            let enum_id = id.trim().parse().ok()?;
            if name.is_empty() {
                return None;
            }
            Some(BranchRule {
                name: name.to_string(),
                enum_id,
            })
        })
        .collect()
}

/// Parse `keyword:TagA|TagB,keyword:TagC`. Malformed entries are
/// skipped; rule order follows the source string.
pub fn parse_keyword_rules(raw: &str) -> Vec<KeywordRule> {
    raw.split(',')
        .filter_map(|entry| {
            let (keyword, tags) = entry.split_once(':')?;
            let keyword = keyword.trim().to_lowercase();
            let tags: Vec<String> = tags
                .split('|')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if keyword.is_empty() || tags.is_empty() {
                return None;
            }
            Some(KeywordRule { keyword, tags })
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
