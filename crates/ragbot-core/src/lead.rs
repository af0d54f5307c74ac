//! Lead finalization: operator notification plus CRM submission.

use std::sync::Arc;
use std::sync::Once;

use ragbot_crm::{CrmApi, LeadRequest};
use ragbot_store::ConversationStore;
use tracing::{info, warn};

use crate::error::Result;
use crate::messages;
use crate::notify::Notifier;

static CRM_DISABLED_ONCE: Once = Once::new();

/// Turns a confirmed session into an operator notification and a CRM
/// lead. At most one CRM contact is ever created per chat: once the
/// session carries a contact id, it is reused.
pub(crate) struct LeadFinalizer {
    conversations: Arc<dyn ConversationStore>,
    crm: Arc<dyn CrmApi>,
    notifier: Arc<dyn Notifier>,
    base_url: String,
}

impl LeadFinalizer {
    pub(crate) fn new(
        conversations: Arc<dyn ConversationStore>,
        crm: Arc<dyn CrmApi>,
        notifier: Arc<dyn Notifier>,
        base_url: String,
    ) -> Self {
        Self {
            conversations,
            crm,
            notifier,
            base_url,
        }
    }

    /// A missing session is a hard error; everything downstream needs
    /// the collected name, phone and summary.
    pub(crate) async fn finalize(&self, chat_id: i64) -> Result<()> {
        let session = self.conversations.session_by_chat_id(chat_id).await?;
        let link = format!("{}/chat/{}", self.base_url, session.id);

        let name = session.name.clone().unwrap_or_default();
        let phone = session.phone.clone().unwrap_or_default();
        let summary = session.summary.clone().unwrap_or_default();

        self.notifier
            .notify(&messages::lead_block(&name, &phone, &summary, &link))
            .await;

        if !self.crm.is_enabled() {
            CRM_DISABLED_ONCE.call_once(|| {
                warn!("CRM integration not configured, leads are not submitted");
            });
            return Ok(());
        }

        let (contact_id, returning_client) = match session.crm_contact_id {
            Some(id) => (id, true),
            None => {
                let id = self.crm.create_contact(&name, &phone).await?;
                if let Err(e) = self
                    .conversations
                    .update_crm_contact_id(chat_id, Some(id))
                    .await
                {
                    warn!(chat_id = %chat_id, error = %e, "Failed to persist CRM contact id");
                }
                (id, false)
            }
        };

        let lead = LeadRequest {
            contact_id,
            returning_client,
            title: session.title.unwrap_or_default(),
            summary,
            interest: session.interest.unwrap_or_default(),
            link,
        };
        self.crm.create_lead(&lead).await?;
        info!(chat_id = %chat_id, contact_id = %contact_id, "Lead submitted to CRM");
        Ok(())
    }
}
