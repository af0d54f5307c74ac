//! Per-chat conversation state machine.

use std::sync::Arc;

use ragbot_ai::AiProvider;
use ragbot_crm::CrmApi;
use ragbot_models::{ContactStage, Role};
use ragbot_store::{ChunkStore, ConversationStore};
use tracing::{debug, warn};

use crate::composer::{self, Composer, HISTORY_WINDOW};
use crate::config::Settings;
use crate::error::Result;
use crate::flow::ContactFlow;
use crate::lead::LeadFinalizer;
use crate::messages;
use crate::notify::Notifier;
use crate::triggers;

/// One inbound event from the transport. Voice notes are transcribed
/// upstream and arrive here as `Text`.
#[derive(Debug, Clone)]
pub enum UserEvent {
    Text(String),
    CallManager,
    ConfirmYes,
    ConfirmNo,
}

/// What the transport should send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Reply(String),
    /// Inline-button prompt offering to call the manager.
    OfferCallback,
    /// Yes/No prompt showing previously collected contact data.
    ConfirmContact { name: String, phone: String },
}

/// Records one inbound event: the user message is appended to history
/// exactly once, every delivered reply exactly once.
struct Turn<'a> {
    conversations: &'a dyn ConversationStore,
    chat_id: i64,
    user_recorded: bool,
    actions: Vec<Outgoing>,
}

impl<'a> Turn<'a> {
    fn new(conversations: &'a dyn ConversationStore, chat_id: i64) -> Self {
        Self {
            conversations,
            chat_id,
            user_recorded: false,
            actions: Vec::new(),
        }
    }

    /// Append the user-side text for this event. Later calls are
    /// ignored so no branch can double-log it.
    async fn user(&mut self, text: &str) -> Result<()> {
        if !self.user_recorded {
            self.conversations
                .append_history(self.chat_id, Role::User, text)
                .await?;
            self.user_recorded = true;
        }
        Ok(())
    }

    /// Deliver `text` and log it as an assistant turn.
    async fn reply(&mut self, text: &str) -> Result<()> {
        self.log_assistant(text).await?;
        self.actions.push(Outgoing::Reply(text.to_string()));
        Ok(())
    }

    /// Log an assistant turn without delivering it.
    async fn log_assistant(&mut self, text: &str) -> Result<()> {
        self.conversations
            .append_history(self.chat_id, Role::Assistant, text)
            .await
            .map_err(Into::into)
    }

    /// Queue an action that is not part of the history (button prompts).
    fn send(&mut self, action: Outgoing) {
        self.actions.push(action);
    }

    fn finish(self) -> Vec<Outgoing> {
        self.actions
    }
}

pub struct ChatEngine {
    conversations: Arc<dyn ConversationStore>,
    ai: Arc<dyn AiProvider>,
    notifier: Arc<dyn Notifier>,
    composer: Composer,
    finalizer: LeadFinalizer,
    flow: ContactFlow,
    settings: Settings,
}

impl ChatEngine {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        chunks: Arc<dyn ChunkStore>,
        ai: Arc<dyn AiProvider>,
        crm: Arc<dyn CrmApi>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        let composer = Composer::new(
            conversations.clone(),
            chunks,
            ai.clone(),
            settings.preamble.clone(),
        );
        let finalizer = LeadFinalizer::new(
            conversations.clone(),
            crm,
            notifier.clone(),
            settings.base_url.clone(),
        );
        Self {
            conversations,
            ai,
            notifier,
            composer,
            finalizer,
            flow: ContactFlow::new(),
            settings,
        }
    }

    /// Stateless composer access for the HTTP surface.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Process one inbound event and return the actions to send. The
    /// caller is expected to have ensured the session exists.
    pub async fn handle(&self, chat_id: i64, event: UserEvent) -> Result<Vec<Outgoing>> {
        let mut turn = Turn::new(self.conversations.as_ref(), chat_id);
        match event {
            UserEvent::Text(text) => self.on_text(&mut turn, chat_id, &text).await?,
            UserEvent::CallManager => self.on_call_manager(&mut turn, chat_id).await?,
            UserEvent::ConfirmYes => self.on_confirm_yes(&mut turn, chat_id).await?,
            UserEvent::ConfirmNo => self.on_confirm_no(&mut turn, chat_id).await?,
        }
        Ok(turn.finish())
    }

    async fn on_text(&self, turn: &mut Turn<'_>, chat_id: i64, text: &str) -> Result<()> {
        match self.flow.stage(chat_id).await {
            Some(ContactStage::AwaitingName) => {
                turn.user(text).await?;
                self.conversations.update_name(chat_id, text).await?;
                self.flow.advance_to_phone(chat_id, text).await;
                turn.reply(messages::ASK_PHONE).await
            }
            Some(ContactStage::AwaitingPhone) => {
                turn.user(text).await?;
                self.conversations.update_phone(chat_id, text).await?;
                self.flow.clear(chat_id).await;
                self.finish_lead(turn, chat_id).await
            }
            Some(ContactStage::AwaitingConfirmation) => {
                if is_yes(text) {
                    self.on_confirm_yes(turn, chat_id).await
                } else if is_no(text) {
                    self.on_confirm_no(turn, chat_id).await
                } else {
                    // Unrelated text while waiting for yes/no: record
                    // it, stay in place, say nothing.
                    turn.user(text).await
                }
            }
            None => self.on_question(turn, chat_id, text).await,
        }
    }

    async fn on_question(&self, turn: &mut Turn<'_>, chat_id: i64, text: &str) -> Result<()> {
        if triggers::contains_any(text, &self.settings.trigger_words) {
            turn.user(text).await?;
            turn.send(Outgoing::OfferCallback);
            return Ok(());
        }

        let answer = match self.composer.answer(chat_id, text).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to compose an answer");
                self.notifier
                    .notify(&messages::operator_error_text(&e.to_string()))
                    .await;
                messages::USER_ERROR.to_string()
            }
        };

        turn.user(text).await?;
        turn.log_assistant(&answer).await?;

        // An answer that itself suggests calling the manager is
        // replaced by the actual callback offer.
        if triggers::contains_any(&answer, &self.settings.answer_trigger_words) {
            turn.send(Outgoing::OfferCallback);
        } else {
            turn.send(Outgoing::Reply(answer));
        }
        Ok(())
    }

    async fn on_call_manager(&self, turn: &mut Turn<'_>, chat_id: i64) -> Result<()> {
        turn.user(messages::HISTORY_CALL_REQUESTED).await?;
        self.refresh_digest(chat_id).await;

        let session = self.conversations.session_by_chat_id(chat_id).await?;
        if session.has_contact() {
            self.flow
                .begin(chat_id, ContactStage::AwaitingConfirmation)
                .await;
            turn.send(Outgoing::ConfirmContact {
                name: session.name.unwrap_or_default(),
                phone: session.phone.unwrap_or_default(),
            });
            return Ok(());
        }

        self.flow.begin(chat_id, ContactStage::AwaitingName).await;
        turn.reply(messages::ASK_NAME).await
    }

    async fn on_confirm_yes(&self, turn: &mut Turn<'_>, chat_id: i64) -> Result<()> {
        turn.user(messages::HISTORY_CONFIRM_YES).await?;
        self.flow.clear(chat_id).await;
        self.finish_lead(turn, chat_id).await
    }

    async fn on_confirm_no(&self, turn: &mut Turn<'_>, chat_id: i64) -> Result<()> {
        turn.user(messages::HISTORY_CONFIRM_NO).await?;
        // The stored contact belongs to someone else; forget it so a
        // fresh CRM contact is created from the new data.
        self.conversations
            .update_crm_contact_id(chat_id, None)
            .await?;
        self.flow.begin(chat_id, ContactStage::AwaitingName).await;
        turn.reply(messages::ASK_NAME).await
    }

    async fn finish_lead(&self, turn: &mut Turn<'_>, chat_id: i64) -> Result<()> {
        match self.finalizer.finalize(chat_id).await {
            Ok(()) => turn.reply(messages::MANAGER_WILL_CALL).await,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Lead finalization failed");
                self.notifier
                    .notify(&messages::operator_error_text(&e.to_string()))
                    .await;
                turn.reply(messages::USER_ERROR).await
            }
        }
    }

    /// Best-effort dialogue digest: summary, title and interest, each
    /// a separate generation. Failures keep the previous values.
    async fn refresh_digest(&self, chat_id: i64) {
        let history = match self.conversations.history(chat_id, HISTORY_WINDOW).await {
            Ok(history) => history,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "Failed to load history for digest");
                return;
            }
        };
        let rendered = composer::render_history(&history);

        let digest = async {
            let summary = self.ai.generate(&messages::summarize_prompt(&rendered)).await?;
            let title = self.ai.generate(&messages::title_prompt(&rendered)).await?;
            let interest = self.ai.generate(&messages::interest_prompt(&rendered)).await?;
            Ok::<_, ragbot_ai::AiError>((summary, title, interest))
        }
        .await;

        match digest {
            Ok((summary, title, interest)) => {
                debug!(chat_id = %chat_id, "Dialogue digest updated");
                if let Err(e) = self
                    .conversations
                    .update_summary(chat_id, &summary, &title, &interest)
                    .await
                {
                    warn!(chat_id = %chat_id, error = %e, "Failed to store dialogue digest");
                }
            }
            Err(e) => warn!(chat_id = %chat_id, error = %e, "Dialogue digest failed"),
        }
    }
}

/// Standalone-token match, so "да, всё верно" confirms but "даже не
/// знаю" stays noise.
fn contains_token(text: &str, word: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn is_yes(text: &str) -> bool {
    contains_token(text, "да")
}

fn is_no(text: &str) -> bool {
    contains_token(text, "нет")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragbot_ai::{AiError, AiProvider};
    use ragbot_crm::{CrmApi, CrmError, DisabledCrm, LeadRequest};
    use ragbot_models::HistoryItem;
    use ragbot_store::MemStore;
    use tokio::sync::Mutex;

    struct FakeAi {
        answer: String,
        fail: bool,
    }

    impl FakeAi {
        fn answering(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                answer: String::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl AiProvider for FakeAi {
        async fn embed(&self, _text: &str) -> ragbot_ai::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn generate(&self, _prompt: &str) -> ragbot_ai::Result<String> {
            if self.fail {
                return Err(AiError::Configuration("generation unavailable".to_string()));
            }
            Ok(self.answer.clone())
        }

        async fn transcribe(&self, _audio: &[u8], _format: &str) -> ragbot_ai::Result<String> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct FakeCrm {
        contacts: Mutex<Vec<(String, String)>>,
        leads: Mutex<Vec<LeadRequest>>,
    }

    #[async_trait]
    impl CrmApi for FakeCrm {
        async fn create_contact(&self, name: &str, phone: &str) -> ragbot_crm::Result<i64> {
            let mut contacts = self.contacts.lock().await;
            contacts.push((name.to_string(), phone.to_string()));
            Ok(contacts.len() as i64 + 100)
        }

        async fn create_lead(&self, lead: &LeadRequest) -> ragbot_crm::Result<()> {
            self.leads.lock().await.push(lead.clone());
            Ok(())
        }
    }

    struct FailingCrm;

    #[async_trait]
    impl CrmApi for FailingCrm {
        async fn create_contact(&self, _name: &str, _phone: &str) -> ragbot_crm::Result<i64> {
            Err(CrmError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }

        async fn create_lead(&self, _lead: &LeadRequest) -> ragbot_crm::Result<()> {
            Err(CrmError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) {
            self.messages.lock().await.push(text.to_string());
        }
    }

    struct Harness {
        engine: ChatEngine,
        store: Arc<MemStore>,
        crm: Arc<FakeCrm>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness_with(ai: FakeAi) -> Harness {
        let store = Arc::new(MemStore::new());
        let crm = Arc::new(FakeCrm::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ChatEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(ai),
            crm.clone(),
            notifier.clone(),
            Settings::default(),
        );
        Harness {
            engine,
            store,
            crm,
            notifier,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeAi::answering("Здравствуйте! Чем могу помочь?"))
    }

    async fn history(store: &MemStore, chat_id: i64) -> Vec<HistoryItem> {
        use ragbot_store::ConversationStore;
        store.full_history(chat_id).await.unwrap()
    }

    const CHAT: i64 = 10;

    async fn ensure(h: &Harness) {
        use ragbot_store::ConversationStore;
        h.store.ensure_session(CHAT, "dancer").await.unwrap();
    }

    #[tokio::test]
    async fn greeting_answered_from_empty_store() {
        let h = harness();
        ensure(&h).await;

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("привет".to_string()))
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![Outgoing::Reply("Здравствуйте! Чем могу помочь?".to_string())]
        );
        let hist = history(&h.store, CHAT).await;
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0], HistoryItem::new(Role::User, "привет"));
        assert_eq!(
            hist[1],
            HistoryItem::new(Role::Assistant, "Здравствуйте! Чем могу помочь?")
        );
    }

    #[tokio::test]
    async fn trigger_word_offers_callback_without_composing() {
        let h = harness();
        ensure(&h).await;

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("Позовите менеджера".to_string()))
            .await
            .unwrap();

        assert_eq!(actions, vec![Outgoing::OfferCallback]);
        let hist = history(&h.store, CHAT).await;
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].role, Role::User);
    }

    #[tokio::test]
    async fn answer_containing_trigger_is_replaced_by_callback_offer() {
        let h = harness_with(FakeAi::answering(
            "Лучше позвать менеджера, он подскажет точнее.",
        ));
        ensure(&h).await;

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("сложный вопрос".to_string()))
            .await
            .unwrap();

        assert_eq!(actions, vec![Outgoing::OfferCallback]);
        // The suppressed answer is still part of the transcript.
        let hist = history(&h.store, CHAT).await;
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[1].role, Role::Assistant);
        assert!(hist[1].content.contains("позвать менеджера"));
    }

    #[tokio::test]
    async fn composer_failure_notifies_operators_and_apologizes() {
        let h = harness_with(FakeAi::failing());
        ensure(&h).await;

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("когда занятия?".to_string()))
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::USER_ERROR.to_string())]
        );
        let notes = h.notifier.messages.lock().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("Возникла ошибка:"));
    }

    #[tokio::test]
    async fn contact_flow_collects_name_then_phone_then_finalizes() {
        let h = harness();
        ensure(&h).await;

        let actions = h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::ASK_NAME.to_string())]
        );
        assert_eq!(
            h.engine.flow.stage(CHAT).await,
            Some(ContactStage::AwaitingName)
        );

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("Анна".to_string()))
            .await
            .unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::ASK_PHONE.to_string())]
        );

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("+7 900 000-00-00".to_string()))
            .await
            .unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::MANAGER_WILL_CALL.to_string())]
        );
        assert_eq!(h.engine.flow.stage(CHAT).await, None);

        use ragbot_store::ConversationStore;
        let session = h.store.session_by_chat_id(CHAT).await.unwrap();
        assert_eq!(session.name.as_deref(), Some("Анна"));
        assert_eq!(session.phone.as_deref(), Some("+7 900 000-00-00"));
        assert!(session.crm_contact_id.is_some());

        assert_eq!(h.crm.contacts.lock().await.len(), 1);
        assert_eq!(h.crm.leads.lock().await.len(), 1);
        // Exactly one operator lead block.
        let notes = h.notifier.messages.lock().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("Анна (+7 900 000-00-00)"));
        assert!(notes[0].contains("/chat/"));
    }

    #[tokio::test]
    async fn known_contact_goes_straight_to_confirmation() {
        let h = harness();
        ensure(&h).await;
        use ragbot_store::ConversationStore;
        h.store.update_name(CHAT, "Пётр").await.unwrap();
        h.store.update_phone(CHAT, "+7 911 111-11-11").await.unwrap();

        let actions = h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::ConfirmContact {
                name: "Пётр".to_string(),
                phone: "+7 911 111-11-11".to_string(),
            }]
        );
        assert_eq!(
            h.engine.flow.stage(CHAT).await,
            Some(ContactStage::AwaitingConfirmation)
        );

        let actions = h.engine.handle(CHAT, UserEvent::ConfirmYes).await.unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::MANAGER_WILL_CALL.to_string())]
        );
        let hist = history(&h.store, CHAT).await;
        assert!(hist
            .iter()
            .any(|i| i.content == messages::HISTORY_CONFIRM_YES));
    }

    #[tokio::test]
    async fn declined_confirmation_clears_contact_and_restarts() {
        let h = harness();
        ensure(&h).await;
        use ragbot_store::ConversationStore;
        h.store.update_name(CHAT, "Пётр").await.unwrap();
        h.store.update_phone(CHAT, "+7 911 111-11-11").await.unwrap();
        h.store.update_crm_contact_id(CHAT, Some(555)).await.unwrap();

        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        let actions = h.engine.handle(CHAT, UserEvent::ConfirmNo).await.unwrap();

        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::ASK_NAME.to_string())]
        );
        assert_eq!(
            h.engine.flow.stage(CHAT).await,
            Some(ContactStage::AwaitingName)
        );
        let session = h.store.session_by_chat_id(CHAT).await.unwrap();
        assert_eq!(session.crm_contact_id, None);
        let hist = history(&h.store, CHAT).await;
        assert!(hist
            .iter()
            .any(|i| i.content == messages::HISTORY_CONFIRM_NO));
    }

    #[tokio::test]
    async fn confirmation_accepts_text_yes_and_ignores_noise() {
        let h = harness();
        ensure(&h).await;
        use ragbot_store::ConversationStore;
        h.store.update_name(CHAT, "Пётр").await.unwrap();
        h.store.update_phone(CHAT, "+7 911 111-11-11").await.unwrap();
        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();

        // Unrelated text: recorded, no reply, still waiting.
        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("а сколько это стоит?".to_string()))
            .await
            .unwrap();
        assert!(actions.is_empty());
        assert_eq!(
            h.engine.flow.stage(CHAT).await,
            Some(ContactStage::AwaitingConfirmation)
        );

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("Да, всё верно".to_string()))
            .await
            .unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::MANAGER_WILL_CALL.to_string())]
        );
        assert_eq!(h.engine.flow.stage(CHAT).await, None);
    }

    #[tokio::test]
    async fn negative_phrase_declines_confirmation() {
        let h = harness();
        ensure(&h).await;
        use ragbot_store::ConversationStore;
        h.store.update_name(CHAT, "Пётр").await.unwrap();
        h.store.update_phone(CHAT, "+7 911 111-11-11").await.unwrap();
        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();

        let actions = h
            .engine
            .handle(CHAT, UserEvent::Text("нет, не мой номер".to_string()))
            .await
            .unwrap();
        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::ASK_NAME.to_string())]
        );
        assert_eq!(
            h.engine.flow.stage(CHAT).await,
            Some(ContactStage::AwaitingName)
        );
    }

    #[tokio::test]
    async fn second_lead_reuses_crm_contact() {
        let h = harness();
        ensure(&h).await;

        // First lead through the full collection flow.
        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        h.engine
            .handle(CHAT, UserEvent::Text("Анна".to_string()))
            .await
            .unwrap();
        h.engine
            .handle(CHAT, UserEvent::Text("+7 900 000-00-00".to_string()))
            .await
            .unwrap();

        // Second lead confirms the now-known contact.
        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        h.engine.handle(CHAT, UserEvent::ConfirmYes).await.unwrap();

        assert_eq!(h.crm.contacts.lock().await.len(), 1);
        let leads = h.crm.leads.lock().await;
        assert_eq!(leads.len(), 2);
        assert!(!leads[0].returning_client);
        assert!(leads[1].returning_client);
        assert_eq!(leads[0].contact_id, leads[1].contact_id);
    }

    #[tokio::test]
    async fn crm_failure_apologizes_and_reports_but_unblocks_chat() {
        let store = Arc::new(MemStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ChatEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(FakeAi::answering("ок")),
            Arc::new(FailingCrm),
            notifier.clone(),
            Settings::default(),
        );
        use ragbot_store::ConversationStore;
        store.ensure_session(CHAT, "").await.unwrap();

        engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        engine
            .handle(CHAT, UserEvent::Text("Анна".to_string()))
            .await
            .unwrap();
        let actions = engine
            .handle(CHAT, UserEvent::Text("+7 900 000-00-00".to_string()))
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::USER_ERROR.to_string())]
        );
        // Back to idle despite the failure.
        assert_eq!(engine.flow.stage(CHAT).await, None);
        let notes = notifier.messages.lock().await;
        // Lead block first, then the error report.
        assert_eq!(notes.len(), 2);
        assert!(notes[1].starts_with("Возникла ошибка:"));
    }

    #[tokio::test]
    async fn disabled_crm_still_completes_the_flow() {
        let store = Arc::new(MemStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ChatEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(FakeAi::answering("ок")),
            Arc::new(DisabledCrm),
            notifier.clone(),
            Settings::default(),
        );
        use ragbot_store::ConversationStore;
        store.ensure_session(CHAT, "").await.unwrap();

        engine.handle(CHAT, UserEvent::CallManager).await.unwrap();
        engine
            .handle(CHAT, UserEvent::Text("Анна".to_string()))
            .await
            .unwrap();
        let actions = engine
            .handle(CHAT, UserEvent::Text("+7 900 000-00-00".to_string()))
            .await
            .unwrap();

        assert_eq!(
            actions,
            vec![Outgoing::Reply(messages::MANAGER_WILL_CALL.to_string())]
        );
        assert_eq!(notifier.messages.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn call_marker_recorded_before_digest() {
        let h = harness();
        ensure(&h).await;
        h.engine
            .handle(CHAT, UserEvent::Text("хочу на сальсу".to_string()))
            .await
            .unwrap();

        h.engine.handle(CHAT, UserEvent::CallManager).await.unwrap();

        let hist = history(&h.store, CHAT).await;
        assert!(hist
            .iter()
            .any(|i| i.role == Role::User && i.content == messages::HISTORY_CALL_REQUESTED));
        use ragbot_store::ConversationStore;
        let session = h.store.session_by_chat_id(CHAT).await.unwrap();
        // FakeAi answers every digest prompt with the same canned text.
        assert!(session.summary.is_some());
        assert!(session.title.is_some());
        assert!(session.interest.is_some());
    }

    #[test]
    fn yes_no_normalization() {
        assert!(is_yes(" Да. "));
        assert!(is_yes("да!"));
        assert!(is_yes("да, всё верно"));
        assert!(is_no("НЕТ"));
        assert!(is_no("нет, не мой номер"));
        assert!(!is_yes("даже не знаю"));
        assert!(!is_no("нету времени"));
        assert!(!is_no("не сегодня"));
    }
}
