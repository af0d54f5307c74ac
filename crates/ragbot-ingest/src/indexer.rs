//! Background embedding indexer.

use std::sync::Arc;
use std::time::Duration;

use ragbot_ai::AiProvider;
use ragbot_store::ChunkStore;
use tracing::{debug, info, warn};

/// Chunks picked up per pass.
const BATCH_SIZE: i64 = 5;
/// Pause between items, keeps the embedding API under its rate limit.
const ITEM_DELAY: Duration = Duration::from_millis(200);
/// Pause between passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically embeds unprocessed chunks. Edited chunks come back
/// automatically because updates reset `processed_at`.
pub struct EmbeddingIndexer {
    store: Arc<dyn ChunkStore>,
    ai: Arc<dyn AiProvider>,
    interval: Duration,
}

impl EmbeddingIndexer {
    pub fn new(store: Arc<dyn ChunkStore>, ai: Arc<dyn AiProvider>) -> Self {
        Self {
            store,
            ai,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run forever: one pass immediately, then one per interval.
    /// Every error is recovered at the pass boundary.
    pub async fn run(&self) {
        info!("Embedding indexer started");
        loop {
            self.run_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One indexing pass. Returns how many chunks were embedded;
    /// per-item failures are logged and skipped.
    pub async fn run_once(&self) -> usize {
        let chunks = match self.store.unprocessed_chunks(BATCH_SIZE).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "Indexer failed to fetch unprocessed chunks");
                return 0;
            }
        };

        let mut embedded = 0;
        for chunk in chunks {
            match self.ai.embed(&chunk.content).await {
                Ok(embedding) => {
                    match self.store.set_chunk_embedding(chunk.id, &embedding).await {
                        Ok(()) => {
                            debug!(chunk_id = chunk.id, "Chunk embedded");
                            embedded += 1;
                        }
                        Err(e) => {
                            warn!(chunk_id = chunk.id, error = %e, "Failed to store embedding")
                        }
                    }
                }
                Err(e) => warn!(chunk_id = chunk.id, error = %e, "Embedding generation failed"),
            }
            tokio::time::sleep(ITEM_DELAY).await;
        }
        embedded
    }
}
