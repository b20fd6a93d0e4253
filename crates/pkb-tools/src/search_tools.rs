//! `cypher_query`, `keyword_search`, `semantic_search`, `hybrid_search`
//! (§4.8): thin adapters over `pkb-store::execute` and `pkb-search`, shared
//! by both transports.

use std::collections::HashMap;

use pkb_errors::PkbError;
use pkb_types::{SearchOptions, SearchResult};
use serde_json::Value;

use crate::context::ToolContext;

pub async fn cypher_query(ctx: &ToolContext, query: &str) -> Result<Vec<Value>, PkbError> {
    let store = ctx.store.lock().await;
    pkb_store::execute(store.conn(), query, &HashMap::new())
}

pub async fn keyword_search(
    ctx: &ToolContext,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchResult>, PkbError> {
    let options = SearchOptions {
        limit,
        ..Default::default()
    };
    let store = ctx.store.lock().await;
    // Passing `embeddings = None` forces pure keyword ranking regardless of
    // whether the store has embeddings enabled.
    pkb_search::search(&store, None, query, &options).await
}

pub async fn semantic_search(
    ctx: &ToolContext,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, PkbError> {
    let store = ctx.store.lock().await;
    pkb_search::semantic_search(&store, ctx.embeddings.as_deref(), query, options).await
}

pub async fn hybrid_search(
    ctx: &ToolContext,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, PkbError> {
    let store = ctx.store.lock().await;
    pkb_search::search(&store, ctx.embeddings.as_deref(), query, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_proposals::ProposalManager;
    use pkb_store::GraphStore;
    use pkb_types::Chunk;
    use serde_json::json;

    fn sample_chunk(file_path: &str, header: &str, content: &str) -> Chunk {
        Chunk {
            file_path: file_path.to_string(),
            folder_path: String::new(),
            header: header.to_string(),
            content: content.to_string(),
            frontmatter: json!({}),
            embedding: None,
            links: vec![],
            tags: vec![],
            transclusions: vec![],
            inline_attributes: vec![],
            data_blocks: vec![],
        }
    }

    #[tokio::test]
    async fn given_indexed_chunk_when_keyword_searched_then_found_regardless_of_embeddings_flag() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let mut store = GraphStore::open(&db_path, false, false, true).unwrap();
        store
            .index_chunks(&[sample_chunk("a.md", "A", "database configuration notes")])
            .unwrap();

        let ctx = ToolContext::new(
            store,
            None,
            dir.path(),
            ProposalManager::new(dir.path(), None),
            false,
        );

        let results = keyword_search(&ctx, "database", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].semantic_score, 0.0);
    }
}
