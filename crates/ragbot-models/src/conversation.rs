//! Conversation session, history and contact-collection types.

use serde::{Deserialize, Serialize};

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Database/wire representation ("user" / "assistant").
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown history role: {}", other)),
        }
    }
}

/// One turn of a conversation. Append-only, chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
}

impl HistoryItem {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Durable per-chat session record.
///
/// `id` is the opaque shareable link token, immutable once created.
/// `name`/`phone` are only ever written by the contact-collection flow;
/// `crm_contact_id`, once set, is reused for subsequent leads unless the
/// user declines a proposed contact match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub chat_id: i64,
    pub username: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub summary: Option<String>,
    pub title: Option<String>,
    pub interest: Option<String>,
    pub crm_contact_id: Option<i64>,
}

impl SessionInfo {
    /// True when both name and phone have been collected and are non-empty.
    pub fn has_contact(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
            && self.phone.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Current step of an in-progress contact-collection sub-dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStage {
    /// Next inbound text is taken as the user's name.
    AwaitingName,
    /// Next inbound text is taken as the user's phone.
    AwaitingPhone,
    /// Waiting for an explicit yes/no on previously stored contact data.
    AwaitingConfirmation,
}

/// Transient in-memory contact-collection state for one chat.
///
/// Absence of a state means no contact flow is in progress and free-form
/// Q&A applies.
#[derive(Debug, Clone)]
pub struct ContactState {
    pub stage: ContactStage,
    /// Name collected so far (set when advancing past `AwaitingName`).
    pub name: Option<String>,
}

impl ContactState {
    pub fn new(stage: ContactStage) -> Self {
        Self { stage, name: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("tool".parse::<Role>().is_err());
        assert_eq!(Role::User.as_str(), "user");
    }

    #[test]
    fn has_contact_requires_both_fields_non_empty() {
        let mut info = SessionInfo::default();
        assert!(!info.has_contact());

        info.name = Some("Анна".to_string());
        assert!(!info.has_contact());

        info.phone = Some(String::new());
        assert!(!info.has_contact());

        info.phone = Some("+7 900 000-00-00".to_string());
        assert!(info.has_contact());
    }
}
