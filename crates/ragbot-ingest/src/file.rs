//! Line-per-chunk text file source.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ragbot_store::ChunkStore;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Reloads a plain text file on a schedule. One non-empty line is one
/// chunk; duplicates are dropped by the store's content dedup.
pub struct FileSource {
    path: PathBuf,
    interval: Duration,
    store: Arc<dyn ChunkStore>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            path: path.into(),
            interval,
            store,
        }
    }

    /// Run forever; a failed pass is logged and retried next tick.
    pub async fn run(&self) {
        info!(path = %self.path.display(), "File source started");
        loop {
            if let Err(e) = self.run_once().await {
                warn!(path = %self.path.display(), error = %e, "File source pass failed");
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass: read the file and insert every non-empty line.
    /// Returns how many new chunks were added.
    pub async fn run_once(&self) -> Result<usize> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let source = self.path.to_string_lossy();

        let mut added = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.store.add_chunk(line, &source).await {
                Ok(Some(id)) => {
                    debug!(chunk_id = id, "Chunk added from file");
                    added += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "File source insert failed"),
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbot_store::MemStore;
    use std::io::Write;

    #[tokio::test]
    async fn inserts_trimmed_lines_and_skips_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  Первый фрагмент  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Второй фрагмент").unwrap();
        file.flush().unwrap();

        let store = Arc::new(MemStore::new());
        let source = FileSource::new(file.path(), Duration::from_secs(60), store.clone());

        assert_eq!(source.run_once().await.unwrap(), 2);
        assert_eq!(store.unprocessed_count().await, 2);
        assert_eq!(store.chunk(1).await.unwrap().content, "Первый фрагмент");
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "повторяемая строка").unwrap();
        file.flush().unwrap();

        let store = Arc::new(MemStore::new());
        let source = FileSource::new(file.path(), Duration::from_secs(60), store.clone());

        assert_eq!(source.run_once().await.unwrap(), 1);
        assert_eq!(source.run_once().await.unwrap(), 0);
        assert_eq!(store.unprocessed_count().await, 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_error_not_a_panic() {
        let store = Arc::new(MemStore::new());
        let source = FileSource::new("/no/such/file.txt", Duration::from_secs(60), store);
        assert!(source.run_once().await.is_err());
    }
}
