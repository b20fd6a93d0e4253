//! Differential re-indexing driven by `EventBatch`es (§4.5): re-parses only
//! the paths a batch names and writes the result back into the store,
//! leaving every other chunk at its previous state on a per-file failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkb_embeddings::EmbeddingService;
use pkb_errors::PkbError;
use pkb_store::GraphStore;
use pkb_types::Chunk;

use crate::types::EventBatch;

const CONFIG_PAGE_REL_PATH: &str = "CONFIG.md";

pub struct Indexer {
    store: GraphStore,
    space_root: PathBuf,
    embeddings: Option<Arc<EmbeddingService>>,
    on_config_change: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl Indexer {
    pub fn new(store: GraphStore, space_root: impl Into<PathBuf>, embeddings: Option<Arc<EmbeddingService>>) -> Self {
        Self {
            store,
            space_root: space_root.into(),
            embeddings,
            on_config_change: None,
        }
    }

    pub fn on_config_change(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_config_change = Some(Box::new(callback));
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    /// Full parse → full index, per §4.5. `rebuild` issues `clear()` first.
    pub async fn initial_scan(&mut self, rebuild: bool) -> Result<(), PkbError> {
        if rebuild {
            self.store.clear()?;
        }

        let parsed = pkb_parser::parse_space(&self.space_root).map_err(PkbError::Internal)?;
        let chunks = self.embed_chunks(parsed.chunks).await;
        self.store.index_chunks(&chunks)?;
        self.store.index_folders(&parsed.folders)?;
        self.maybe_notify_config(&self.space_root.join(CONFIG_PAGE_REL_PATH));
        Ok(())
    }

    /// Applies one debounced batch of filesystem changes.
    pub async fn handle_batch(&mut self, batch: &EventBatch) -> Result<(), PkbError> {
        if batch.rescan {
            tracing::warn!("rescan requested by watcher, running full re-index");
            return self.initial_scan(false).await;
        }

        let mut touched_dirs = false;

        for rel_path in &batch.space_rel_created {
            if self.is_markdown_file(rel_path) {
                self.reindex_one(rel_path).await;
            } else if self.is_directory(rel_path) {
                touched_dirs = true;
            }
        }

        for rel_path in &batch.space_rel_modified {
            if self.is_markdown_file(rel_path) {
                self.reindex_one(rel_path).await;
            }
        }

        for rel_path in &batch.space_rel_removed {
            if rel_path.ends_with(".md") {
                if let Err(error) = self.store.delete_chunks_by_file(rel_path) {
                    tracing::warn!(path = %rel_path, %error, "failed to delete chunks for removed file");
                }
            } else {
                touched_dirs = true;
            }
        }

        for pair in &batch.space_rel_renamed {
            if pair.from_rel.ends_with(".md") {
                if let Err(error) = self.store.delete_chunks_by_file(&pair.from_rel) {
                    tracing::warn!(path = %pair.from_rel, %error, "failed to delete chunks for renamed-away file");
                }
            }
            if self.is_markdown_file(&pair.to_rel) {
                self.reindex_one(&pair.to_rel).await;
            }
        }

        if touched_dirs {
            if let Err(error) = self.reenumerate_folders() {
                tracing::warn!(%error, "failed to re-enumerate folders");
            }
        }

        Ok(())
    }

    async fn reindex_one(&mut self, rel_path: &str) {
        let chunks = match pkb_parser::parse_file(&self.space_root, rel_path) {
            Ok(chunks) => chunks,
            Err(error) => {
                tracing::warn!(path = %rel_path, %error, "failed to parse file, leaving previous chunks in place");
                return;
            }
        };
        let chunks = self.embed_chunks(chunks).await;

        if let Err(error) = self.store.delete_chunks_by_file(rel_path) {
            tracing::warn!(path = %rel_path, %error, "failed to clear previous chunks before re-index");
            return;
        }
        if let Err(error) = self.store.index_chunks(&chunks) {
            tracing::warn!(path = %rel_path, %error, "failed to index re-parsed chunks");
            return;
        }

        if let Err(error) = self.reenumerate_folders() {
            tracing::warn!(%error, "failed to re-upsert folder hierarchy for changed file");
        }

        if rel_path.eq_ignore_ascii_case(CONFIG_PAGE_REL_PATH) {
            self.maybe_notify_config(&self.space_root.join(rel_path));
        }
    }

    fn reenumerate_folders(&mut self) -> Result<(), PkbError> {
        let folders = pkb_parser::collect_folders(&self.space_root).map_err(PkbError::Internal)?;
        self.store.index_folders(&folders)
    }

    async fn embed_chunks(&self, mut chunks: Vec<Chunk>) -> Vec<Chunk> {
        let Some(embeddings) = &self.embeddings else {
            return chunks;
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        match embeddings.generate_batch(&texts, true).await {
            Ok(vectors) => {
                for (chunk, vector) in chunks.iter_mut().zip(vectors.into_iter()) {
                    chunk.embedding = Some(vector);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "failed to compute embeddings for changed chunks, indexing without vectors");
            }
        }
        chunks
    }

    fn maybe_notify_config(&self, config_path: &Path) {
        let Some(callback) = &self.on_config_change else {
            return;
        };
        match std::fs::read_to_string(config_path) {
            Ok(contents) => callback(&contents),
            Err(error) => tracing::debug!(%error, path = %config_path.display(), "no config page to read"),
        }
    }

    fn is_markdown_file(&self, rel_path: &str) -> bool {
        rel_path.ends_with(".md") && self.space_root.join(rel_path).is_file()
    }

    fn is_directory(&self, rel_path: &str) -> bool {
        self.space_root.join(rel_path).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn new_store(dir: &Path) -> GraphStore {
        GraphStore::open(&dir.join("db.sqlite"), false, false, true).unwrap()
    }

    #[tokio::test]
    async fn given_new_file_when_initial_scan_then_chunk_indexed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "## Hello\nworld").unwrap();
        let mut indexer = Indexer::new(new_store(dir.path()), dir.path(), None);

        indexer.initial_scan(false).await.unwrap();

        let count: i64 = indexer
            .store()
            .conn()
            .query_row("SELECT COUNT(*) FROM node_chunk", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn given_modified_batch_when_handled_then_only_that_file_is_reindexed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "## A\noriginal").unwrap();
        fs::write(dir.path().join("B.md"), "## B\nuntouched").unwrap();
        let mut indexer = Indexer::new(new_store(dir.path()), dir.path(), None);
        indexer.initial_scan(false).await.unwrap();

        fs::write(dir.path().join("A.md"), "## A\nrewritten").unwrap();
        let mut batch = EventBatch::empty_with_seq(1);
        batch.space_rel_modified = vec!["A.md".to_string()];
        indexer.handle_batch(&batch).await.unwrap();

        let content: String = indexer
            .store()
            .conn()
            .query_row("SELECT content FROM node_chunk WHERE file_path = 'A.md'", [], |r| r.get(0))
            .unwrap();
        assert!(content.contains("rewritten"));
    }

    #[tokio::test]
    async fn given_removed_file_when_handled_then_chunks_deleted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "## A\ncontent").unwrap();
        let mut indexer = Indexer::new(new_store(dir.path()), dir.path(), None);
        indexer.initial_scan(false).await.unwrap();
        fs::remove_file(dir.path().join("A.md")).unwrap();

        let mut batch = EventBatch::empty_with_seq(1);
        batch.space_rel_removed = vec!["A.md".to_string()];
        indexer.handle_batch(&batch).await.unwrap();

        let count: i64 = indexer
            .store()
            .conn()
            .query_row("SELECT COUNT(*) FROM node_chunk", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
