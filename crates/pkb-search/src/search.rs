//! `HybridSearch::search` (§4.4): combines BM25 keyword ranking with vector
//! semantic ranking through RRF or weighted fusion, then applies scope and
//! tag/page filters.

use std::collections::HashMap;

use pkb_embeddings::EmbeddingService;
use pkb_errors::PkbError;
use pkb_store::GraphStore;
use pkb_types::{SearchOptions, SearchResult};

use crate::{bm25, fusion, semantic};

struct ChunkInfo {
    file_path: String,
    header: String,
    content: String,
}

pub async fn search(
    store: &GraphStore,
    embeddings: Option<&EmbeddingService>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, PkbError> {
    if query.trim().is_empty() {
        return Err(PkbError::InvalidQuery("query must not be empty".to_string()));
    }

    let conn = store.conn();
    let terms = bm25::tokenize(query);

    let keyword_candidates = bm25::candidates(conn, &terms, options.scope.as_deref())?;
    let document_count = bm25::total_documents(conn, options.scope.as_deref())?;
    let keyword_scored = bm25::score(&keyword_candidates, &terms, document_count);

    let mut chunk_info: HashMap<String, ChunkInfo> = keyword_candidates
        .into_iter()
        .map(|c| {
            (
                c.chunk_id.clone(),
                ChunkInfo {
                    file_path: c.file_path,
                    header: c.header,
                    content: c.content,
                },
            )
        })
        .collect();

    let keyword_pairs: Vec<(String, f32)> =
        keyword_scored.into_iter().map(|s| (s.chunk_id, s.score)).collect();

    let semantic_pairs: Vec<(String, f32)> = if store.embeddings_enabled() {
        if let Some(embeddings) = embeddings {
            let query_vector = embeddings.generate(query, true).await?;
            let limit = options.effective_limit().max(50);
            let semantic_candidates = semantic::candidates(
                conn,
                &query_vector,
                options.scope.as_deref(),
                &options.filter_tags,
                &options.filter_pages,
                limit,
            )?;
            for candidate in &semantic_candidates {
                chunk_info.entry(candidate.chunk_id.clone()).or_insert_with(|| ChunkInfo {
                    file_path: candidate.file_path.clone(),
                    header: candidate.header.clone(),
                    content: candidate.content.clone(),
                });
            }
            semantic_candidates
                .into_iter()
                .map(|c| (c.chunk_id, c.similarity))
                .collect()
        } else {
            Vec::new()
        }
    } else {
        Vec::new()
    };

    let (semantic_weight, keyword_weight) = options.effective_weights();
    let fused = fusion::fuse(
        &keyword_pairs,
        &semantic_pairs,
        options.fusion_method,
        semantic_weight,
        keyword_weight,
    );

    let mut results = Vec::new();
    for ranked in fused {
        let Some(info) = chunk_info.get(&ranked.chunk_id) else {
            continue;
        };

        if !options.filter_pages.is_empty() && !options.filter_pages.contains(&info.file_path) {
            continue;
        }
        if !options.filter_tags.is_empty() && !chunk_has_any_tag(conn, &ranked.chunk_id, &options.filter_tags)? {
            continue;
        }

        results.push(SearchResult {
            chunk_id: ranked.chunk_id,
            file_path: info.file_path.clone(),
            header: info.header.clone(),
            content: info.content.clone(),
            keyword_score: ranked.keyword_score,
            semantic_score: ranked.semantic_score,
            hybrid_score: ranked.hybrid_score,
        });

        if results.len() >= options.effective_limit() {
            break;
        }
    }

    Ok(results)
}

/// Pure semantic ranking for the `semantic_search` tool (§4.8): unlike
/// `search`, this never touches BM25 candidates, so a disabled/absent
/// embedding service yields an empty result set rather than a keyword
/// fallback.
pub async fn semantic_search(
    store: &GraphStore,
    embeddings: Option<&EmbeddingService>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, PkbError> {
    if query.trim().is_empty() {
        return Err(PkbError::InvalidQuery("query must not be empty".to_string()));
    }

    if !store.embeddings_enabled() {
        return Ok(Vec::new());
    }
    let Some(embeddings) = embeddings else {
        return Ok(Vec::new());
    };

    let query_vector = embeddings.generate(query, true).await?;
    let conn = store.conn();
    let candidates = semantic::candidates(
        conn,
        &query_vector,
        options.scope.as_deref(),
        &options.filter_tags,
        &options.filter_pages,
        options.effective_limit(),
    )?;

    Ok(candidates
        .into_iter()
        .take(options.effective_limit())
        .enumerate()
        .map(|(rank, candidate)| {
            let decayed = (-0.1 * rank as f32).exp();
            SearchResult {
                chunk_id: candidate.chunk_id,
                file_path: candidate.file_path,
                header: candidate.header,
                content: candidate.content,
                keyword_score: 0.0,
                semantic_score: candidate.similarity,
                hybrid_score: decayed,
            }
        })
        .collect())
}

fn chunk_has_any_tag(
    conn: &rusqlite::Connection,
    chunk_id: &str,
    tags: &std::collections::HashSet<String>,
) -> Result<bool, PkbError> {
    let mut stmt = conn.prepare("SELECT dst FROM edge WHERE label = 'TAGGED' AND src = ?1")?;
    let rows = stmt.query_map([chunk_id], |row| row.get::<_, String>(0))?;
    for row in rows {
        if tags.contains(&row?) {
            return Ok(true);
        }
    }
    Ok(false)
}
