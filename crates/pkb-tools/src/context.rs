//! `ToolContext` (§4.8 AMBIENT): the shared handle every tool handler runs
//! against, independent of which transport dispatched the call. The store
//! handle is opened read-only — the watcher/indexer owns the sole writer
//! connection — so reads here never block on, or get blocked by, an
//! in-flight index write (§5).

use std::path::PathBuf;
use std::sync::Arc;

use pkb_embeddings::EmbeddingService;
use pkb_proposals::ProposalManager;
use pkb_store::GraphStore;
use tokio::sync::Mutex;

pub struct ToolContext {
    pub(crate) store: Mutex<GraphStore>,
    pub(crate) embeddings: Option<Arc<EmbeddingService>>,
    pub(crate) space_root: PathBuf,
    pub(crate) proposals: ProposalManager,
    pub(crate) admin: bool,
}

impl ToolContext {
    pub fn new(
        store: GraphStore,
        embeddings: Option<Arc<EmbeddingService>>,
        space_root: impl Into<PathBuf>,
        proposals: ProposalManager,
        admin: bool,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            embeddings,
            space_root: space_root.into(),
            proposals,
            admin,
        }
    }

    pub fn space_root(&self) -> &std::path::Path {
        &self.space_root
    }
}
