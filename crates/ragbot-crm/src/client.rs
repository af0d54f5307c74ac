//! amoCRM v4 REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AmoConfig;
use crate::error::{CrmError, Result};
use crate::tags::{derive_branches, derive_tags};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PHONE_FIELD_CODE: &str = "PHONE";
const PHONE_FIELD_VALUE_CODE: &str = "MOB";

/// Everything the core knows about a lead at submission time.
#[derive(Debug, Clone, Default)]
pub struct LeadRequest {
    pub contact_id: i64,
    /// Whether the contact existed before this submission.
    pub returning_client: bool,
    pub title: String,
    pub summary: String,
    pub interest: String,
    pub link: String,
}

/// Outbound CRM operations, implemented by [`AmoClient`] in production
/// and by fakes in tests.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// False when the integration should be skipped entirely.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Create a contact, returning its CRM id.
    async fn create_contact(&self, name: &str, phone: &str) -> Result<i64>;

    /// Create a lead attached to an existing contact.
    async fn create_lead(&self, lead: &LeadRequest) -> Result<()>;
}

/// Build the CRM client from the environment. Falls back to
/// [`DisabledCrm`] when domain or token is missing.
pub fn client_from_env() -> Result<Arc<dyn CrmApi>> {
    let config = AmoConfig::from_env();
    if !config.is_enabled() {
        return Ok(Arc::new(DisabledCrm));
    }
    Ok(Arc::new(AmoClient::new(config)?))
}

/// No-op stand-in for an unconfigured integration. The core checks
/// [`CrmApi::is_enabled`] before calling the other methods.
pub struct DisabledCrm;

#[async_trait]
impl CrmApi for DisabledCrm {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_contact(&self, _name: &str, _phone: &str) -> Result<i64> {
        Err(CrmError::NotConfigured)
    }

    async fn create_lead(&self, _lead: &LeadRequest) -> Result<()> {
        Err(CrmError::NotConfigured)
    }
}

/// Production client over the amoCRM v4 API.
pub struct AmoClient {
    http: reqwest::Client,
    config: AmoConfig,
}

impl AmoClient {
    pub fn new(config: AmoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    async fn post_json<T: Serialize>(&self, url: &str, payload: &T) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn lead_payload(&self, lead: &LeadRequest) -> LeadPayload {
        let mut tags = self.config.static_tags.clone();
        if self.config.dynamic_tags_enabled {
            tags.extend(derive_tags(
                &lead.interest,
                &lead.summary,
                lead.returning_client,
                &self.config.keyword_rules,
            ));
        }

        let mut fields = Vec::new();
        if self.config.source_field_id != 0 && self.config.source_field_value_id != 0 {
            fields.push(CustomField::enum_value(
                self.config.source_field_id,
                self.config.source_field_value_id,
            ));
        }
        if self.config.summary_field_id != 0 && !lead.summary.is_empty() {
            fields.push(CustomField::text(self.config.summary_field_id, &lead.summary));
        }
        if self.config.chat_link_field_id != 0 && !lead.link.is_empty() {
            fields.push(CustomField::text(self.config.chat_link_field_id, &lead.link));
        }
        if self.config.interest_field_id != 0 && !lead.interest.is_empty() {
            fields.push(CustomField::text(self.config.interest_field_id, &lead.interest));
        }
        if self.config.branch_field_id != 0 {
            let branch_ids = derive_branches(&lead.summary, &self.config.branch_rules);
            if !branch_ids.is_empty() {
                fields.push(CustomField {
                    field_code: None,
                    field_id: Some(self.config.branch_field_id),
                    values: branch_ids.into_iter().map(Value::enum_id).collect(),
                });
            }
        }

        LeadPayload {
            name: lead.title.clone(),
            embedded: LeadEmbedded {
                contacts: vec![ContactRef {
                    id: lead.contact_id,
                }],
            },
            custom_fields_values: fields,
            tags,
        }
    }
}

#[async_trait]
impl CrmApi for AmoClient {
    async fn create_contact(&self, name: &str, phone: &str) -> Result<i64> {
        let payload = ContactPayload {
            name: name.to_string(),
            custom_fields_values: vec![CustomField {
                field_code: Some(PHONE_FIELD_CODE.to_string()),
                field_id: None,
                values: vec![Value {
                    value: Some(phone.to_string()),
                    enum_code: Some(PHONE_FIELD_VALUE_CODE.to_string()),
                    enum_id: None,
                }],
            }],
        };

        let url = format!("https://{}/api/v4/contacts", self.config.domain);
        let response = self.post_json(&url, &[payload]).await?;
        let parsed: ContactResponse = response.json().await?;

        let contact = parsed
            .embedded
            .contacts
            .first()
            .ok_or(CrmError::NoContactCreated)?;
        info!(contact_id = contact.id, "Created CRM contact");
        Ok(contact.id)
    }

    async fn create_lead(&self, lead: &LeadRequest) -> Result<()> {
        let payload = self.lead_payload(lead);
        let url = format!("https://{}/api/v4/leads/complex", self.config.domain);
        self.post_json(&url, &[payload]).await?;
        debug!(contact_id = lead.contact_id, "Created CRM lead");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Value {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enum_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enum_id: Option<i64>,
}

impl Value {
    fn text(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            enum_code: None,
            enum_id: None,
        }
    }

    fn enum_id(id: i64) -> Self {
        Self {
            value: None,
            enum_code: None,
            enum_id: Some(id),
        }
    }
}

#[derive(Debug, Serialize)]
struct CustomField {
    #[serde(skip_serializing_if = "Option::is_none")]
    field_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_id: Option<i64>,
    values: Vec<Value>,
}

impl CustomField {
    fn text(field_id: i64, value: &str) -> Self {
        Self {
            field_code: None,
            field_id: Some(field_id),
            values: vec![Value::text(value)],
        }
    }

    fn enum_value(field_id: i64, enum_id: i64) -> Self {
        Self {
            field_code: None,
            field_id: Some(field_id),
            values: vec![Value::enum_id(enum_id)],
        }
    }
}

#[derive(Debug, Serialize)]
struct ContactPayload {
    name: String,
    custom_fields_values: Vec<CustomField>,
}

#[derive(Debug, Serialize)]
struct ContactRef {
    id: i64,
}

#[derive(Debug, Serialize)]
struct LeadEmbedded {
    contacts: Vec<ContactRef>,
}

#[derive(Debug, Serialize)]
struct LeadPayload {
    name: String,
    #[serde(rename = "_embedded")]
    embedded: LeadEmbedded,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    custom_fields_values: Vec<CustomField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SavedContact {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ContactsEmbedded {
    #[serde(default)]
    contacts: Vec<SavedContact>,
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    #[serde(rename = "_embedded")]
    embedded: ContactsEmbedded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::KeywordRule;

    fn client(config: AmoConfig) -> AmoClient {
        AmoClient::new(config).unwrap()
    }

    #[test]
    fn contact_response_parses_embedded_contacts() {
        let raw = r#"{"_embedded":{"contacts":[{"id":4242,"is_deleted":false}]}}"#;
        let parsed: ContactResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.embedded.contacts[0].id, 4242);
    }

    #[test]
    fn contact_response_tolerates_empty_list() {
        let raw = r#"{"_embedded":{}}"#;
        let parsed: ContactResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.embedded.contacts.is_empty());
    }

    #[test]
    fn lead_payload_skips_unconfigured_fields() {
        let config = AmoConfig {
            domain: "x.amocrm.ru".to_string(),
            access_token: "t".to_string(),
            summary_field_id: 300,
            dynamic_tags_enabled: false,
            ..AmoConfig::default()
        };
        let payload = client(config).lead_payload(&LeadRequest {
            contact_id: 7,
            title: "Заявка".to_string(),
            summary: "итог диалога".to_string(),
            link: "https://example.com/chat/abc".to_string(),
            ..LeadRequest::default()
        });

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["_embedded"]["contacts"][0]["id"], 7);
        let fields = json["custom_fields_values"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0]["field_id"], 300);
        assert_eq!(fields[0]["values"][0]["value"], "итог диалога");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn lead_payload_carries_static_and_dynamic_tags() {
        let config = AmoConfig {
            domain: "x.amocrm.ru".to_string(),
            access_token: "t".to_string(),
            static_tags: vec!["Сайт".to_string()],
            keyword_rules: vec![KeywordRule {
                keyword: "абонемент".to_string(),
                tags: vec!["Продажа".to_string()],
            }],
            dynamic_tags_enabled: true,
            ..AmoConfig::default()
        };
        let payload = client(config).lead_payload(&LeadRequest {
            contact_id: 1,
            returning_client: true,
            title: "Заявка".to_string(),
            summary: "спрашивал про абонемент".to_string(),
            interest: "Сальса".to_string(),
            ..LeadRequest::default()
        });

        assert_eq!(
            payload.tags,
            vec!["Сайт", "Интерес: Сальса", "Продажа", "Повторный клиент", BOT_TAG_TEXT]
        );
    }

    const BOT_TAG_TEXT: &str = "RAG Бот";

    #[test]
    fn branch_field_matched_from_summary() {
        let config = AmoConfig {
            domain: "x.amocrm.ru".to_string(),
            access_token: "t".to_string(),
            branch_field_id: 500,
            branch_rules: vec![crate::tags::BranchRule {
                name: "Центр".to_string(),
                enum_id: 42,
            }],
            dynamic_tags_enabled: false,
            ..AmoConfig::default()
        };
        let payload = client(config).lead_payload(&LeadRequest {
            contact_id: 1,
            title: "Заявка".to_string(),
            summary: "хочет заниматься в центре".to_string(),
            ..LeadRequest::default()
        });

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["custom_fields_values"][0]["field_id"], 500);
        assert_eq!(json["custom_fields_values"][0]["values"][0]["enum_id"], 42);
    }
}
