//! Transient per-chat contact-collection state.

use std::collections::HashMap;
use std::sync::Arc;

use ragbot_models::{ContactStage, ContactState};
use tokio::sync::Mutex;

/// In-memory map of chats currently inside the contact flow.
///
/// State is transient: a restart drops it and the chat falls back to
/// free-form Q&A, which is acceptable because every collected value is
/// persisted as soon as it arrives. Events for one chat are not
/// serialized against each other; two near-simultaneous messages from
/// the same user may interleave reads of this map.
#[derive(Clone, Default)]
pub struct ContactFlow {
    states: Arc<Mutex<HashMap<i64, ContactState>>>,
}

impl ContactFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stage(&self, chat_id: i64) -> Option<ContactStage> {
        self.states.lock().await.get(&chat_id).map(|s| s.stage)
    }

    /// Put the chat into `stage`, discarding any previous state.
    pub async fn begin(&self, chat_id: i64, stage: ContactStage) {
        self.states
            .lock()
            .await
            .insert(chat_id, ContactState::new(stage));
    }

    /// Record the collected name and advance to the phone stage.
    pub async fn advance_to_phone(&self, chat_id: i64, name: &str) {
        let mut states = self.states.lock().await;
        let state = states
            .entry(chat_id)
            .or_insert_with(|| ContactState::new(ContactStage::AwaitingPhone));
        state.stage = ContactStage::AwaitingPhone;
        state.name = Some(name.to_string());
    }

    pub async fn clear(&self, chat_id: i64) {
        self.states.lock().await.remove(&chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_advance_clear() {
        let flow = ContactFlow::new();
        assert_eq!(flow.stage(1).await, None);

        flow.begin(1, ContactStage::AwaitingName).await;
        assert_eq!(flow.stage(1).await, Some(ContactStage::AwaitingName));

        flow.advance_to_phone(1, "Анна").await;
        assert_eq!(flow.stage(1).await, Some(ContactStage::AwaitingPhone));

        flow.clear(1).await;
        assert_eq!(flow.stage(1).await, None);
    }

    #[tokio::test]
    async fn chats_are_independent() {
        let flow = ContactFlow::new();
        flow.begin(1, ContactStage::AwaitingConfirmation).await;
        assert_eq!(flow.stage(2).await, None);
    }
}
