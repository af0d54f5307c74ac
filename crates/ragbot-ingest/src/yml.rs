//! Yandex YML catalog feed source.
//!
//! Offers in categories 1 (classes) and 2 (passes) become knowledge
//! chunks keyed by `(source, ext_id)`. The feed publication date
//! drives a three-way upsert so unchanged offers are never re-embedded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ragbot_store::ChunkStore;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Result;

const SOURCE: &str = "yandex.yml";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M%:z";
const CATEGORY_CLASS: &str = "1";
const CATEGORY_PASS: &str = "2";

pub struct YmlFeedSource {
    url: String,
    interval: Duration,
    store: Arc<dyn ChunkStore>,
    http: reqwest::Client,
}

/// What to do with one feed offer given the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// No row yet: insert with the feed date.
    Insert,
    /// Feed is newer and the text changed: full update, re-embed.
    Update,
    /// Feed is newer but the text is identical: bump the date only,
    /// keep the embedding.
    Touch,
    /// Feed is not newer: leave the row alone.
    Skip,
}

/// Decide the upsert for one offer. `existing` is the stored
/// `(created_at, content)` pair when the row is already present.
pub fn upsert_action(
    existing: Option<(DateTime<Utc>, &str)>,
    feed_date: DateTime<Utc>,
    new_content: &str,
) -> UpsertAction {
    match existing {
        None => UpsertAction::Insert,
        Some((created_at, _)) if feed_date <= created_at => UpsertAction::Skip,
        Some((_, content)) if content != new_content => UpsertAction::Update,
        Some(_) => UpsertAction::Touch,
    }
}

impl YmlFeedSource {
    pub fn new(url: impl Into<String>, interval: Duration, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            url: url.into(),
            interval,
            store,
            http: reqwest::Client::new(),
        }
    }

    /// Run forever; malformed feeds abort the pass, not the loop.
    pub async fn run(&self) {
        info!(url = %self.url, "YML feed source started");
        loop {
            if let Err(e) = self.run_once().await {
                warn!(url = %self.url, error = %e, "YML feed pass failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn run_once(&self) -> Result<()> {
        let body = self.http.get(&self.url).send().await?.text().await?;
        let catalog = parse_catalog(&body)?;
        let feed_date = parse_feed_date(&catalog.date)?;

        for offer in &catalog.shop.offers.items {
            let Some((content, ext_id)) = offer_chunk(offer) else {
                continue;
            };
            if let Err(e) = self.apply_offer(&content, &ext_id, feed_date).await {
                warn!(ext_id = %ext_id, error = %e, "YML offer upsert failed");
            }
        }
        Ok(())
    }

    async fn apply_offer(
        &self,
        content: &str,
        ext_id: &str,
        feed_date: DateTime<Utc>,
    ) -> Result<()> {
        let existing = self.store.chunk_by_ext_id(SOURCE, ext_id).await?;
        let action = upsert_action(
            existing.as_ref().map(|(_, date, text)| (*date, text.as_str())),
            feed_date,
            content,
        );

        match (action, existing) {
            (UpsertAction::Insert, _) => {
                self.store
                    .insert_chunk_with_ext_id(content, SOURCE, ext_id, feed_date)
                    .await?;
                debug!(ext_id = %ext_id, "Chunk added from YML feed");
            }
            (UpsertAction::Update, Some((id, _, _))) => {
                self.store
                    .update_chunk_with_created_at(id, content, feed_date)
                    .await?;
                debug!(ext_id = %ext_id, "Chunk updated from YML feed");
            }
            (UpsertAction::Touch, Some((id, _, _))) => {
                self.store.touch_chunk_created_at(id, feed_date).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_catalog(xml: &str) -> Result<YmlCatalog> {
    Ok(quick_xml::de::from_str(xml)?)
}

fn parse_feed_date(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_str(raw, DATE_FORMAT)?;
    Ok(parsed.with_timezone(&Utc))
}

/// Render an offer as chunk text, or `None` for categories the bot
/// does not know about.
fn offer_chunk(offer: &YmlOffer) -> Option<(String, String)> {
    let prefix = match offer.category_id.as_str() {
        CATEGORY_CLASS => "Класс",
        CATEGORY_PASS => "Абонемент",
        _ => return None,
    };
    let content = format!("{} {}: {}", prefix, offer.name, offer.description);
    let ext_id = format!("{}:{}", offer.category_id, offer.id);
    Some((content, ext_id))
}

#[derive(Debug, Deserialize)]
struct YmlCatalog {
    #[serde(rename = "@date")]
    date: String,
    shop: YmlShop,
}

#[derive(Debug, Deserialize)]
struct YmlShop {
    offers: YmlOffers,
}

#[derive(Debug, Deserialize, Default)]
struct YmlOffers {
    #[serde(rename = "offer", default)]
    items: Vec<YmlOffer>,
}

#[derive(Debug, Deserialize)]
struct YmlOffer {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "categoryId", default)]
    category_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}
