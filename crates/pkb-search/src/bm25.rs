//! Custom BM25-like keyword ranking (§4.4), implemented directly in Rust
//! rather than reused from SQLite FTS5's built-in `bm25()` scorer: this
//! closed-form formula needs per-field term-frequency boosts (2x header,
//! 1.5x file_path) that FTS5's scorer does not expose.

use std::collections::HashMap;

use rusqlite::Connection;

const K1: f32 = 1.5;
const B: f32 = 0.75;

pub struct Candidate {
    pub chunk_id: String,
    pub file_path: String,
    pub header: String,
    pub content: String,
}

pub struct ScoredCandidate {
    pub chunk_id: String,
    pub score: f32,
}

/// Total chunk count under `scope` (§4.4 BM25 `N`), independent of which
/// chunks actually match a query term — `df` is the match-restricted count,
/// `N` is the whole scoped corpus.
pub fn total_documents(conn: &Connection, scope: Option<&str>) -> rusqlite::Result<usize> {
    let count: i64 = match scope {
        Some(scope) => conn.query_row(
            "SELECT COUNT(*) FROM node_chunk WHERE folder_path = ?1 OR folder_path LIKE ?2",
            rusqlite::params![scope, format!("{scope}/%")],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM node_chunk", [], |row| row.get(0))?,
    };
    Ok(count as usize)
}

/// Chunks within `scope` (folder_path equal to or nested under `scope`)
/// that contain at least one query term in content, header, or file_path.
pub fn candidates(
    conn: &Connection,
    terms: &[String],
    scope: Option<&str>,
) -> rusqlite::Result<Vec<Candidate>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_path, header, content, folder_path FROM node_chunk",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, file_path, header, content, folder_path) = row?;
        if let Some(scope) = scope {
            if folder_path != scope && !folder_path.starts_with(&format!("{scope}/")) {
                continue;
            }
        }

        let haystacks = [content.to_lowercase(), header.to_lowercase(), file_path.to_lowercase()];
        let matches = terms.iter().any(|term| haystacks.iter().any(|h| h.contains(term.as_str())));
        if matches {
            out.push(Candidate {
                chunk_id: id,
                file_path,
                header,
                content,
            });
        }
    }
    Ok(out)
}

pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Scores `candidates` against `terms` using the closed-form BM25 formula above.
/// `document_count` (`N`) is the scope-restricted denominator for IDF.
pub fn score(candidates: &[Candidate], terms: &[String], document_count: usize) -> Vec<ScoredCandidate> {
    if candidates.is_empty() || terms.is_empty() {
        return Vec::new();
    }

    let doc_lengths: Vec<usize> = candidates.iter().map(|c| c.content.chars().count()).collect();
    let avg_len = doc_lengths.iter().sum::<usize>() as f32 / doc_lengths.len() as f32;

    let document_frequency: HashMap<&str, usize> = terms
        .iter()
        .map(|term| {
            let df = candidates
                .iter()
                .filter(|c| {
                    let h = c.content.to_lowercase();
                    let hd = c.header.to_lowercase();
                    let fp = c.file_path.to_lowercase();
                    h.contains(term.as_str()) || hd.contains(term.as_str()) || fp.contains(term.as_str())
                })
                .count();
            (term.as_str(), df)
        })
        .collect();

    let n = document_count.max(1) as f32;

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .zip(doc_lengths.iter())
        .map(|(candidate, &doc_len)| {
            let content_lower = candidate.content.to_lowercase();
            let header_lower = candidate.header.to_lowercase();
            let path_lower = candidate.file_path.to_lowercase();

            let mut total = 0.0f32;
            for term in terms {
                let df = *document_frequency.get(term.as_str()).unwrap_or(&0) as f32;
                if df == 0.0 {
                    continue;
                }
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

                let tf = count_occurrences(&content_lower, term) as f32
                    + 2.0 * count_occurrences(&header_lower, term) as f32
                    + 1.5 * count_occurrences(&path_lower, term) as f32;

                let tf_norm = tf * (K1 + 1.0)
                    / (tf + K1 * (1.0 - B + B * doc_len as f32 / avg_len.max(1.0)));

                total += idf * tf_norm;
            }

            ScoredCandidate {
                chunk_id: candidate.chunk_id.clone(),
                score: total,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, header: &str, file_path: &str, content: &str) -> Candidate {
        Candidate {
            chunk_id: id.to_string(),
            file_path: file_path.to_string(),
            header: header.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn given_header_match_when_scored_then_ranks_above_body_only_match() {
        let candidates = vec![
            candidate("r.md#Setup", "Setup", "r.md", "Install database dependencies"),
            candidate(
                "docs/db.md#Configuration",
                "Configuration",
                "docs/db.md",
                "Database configuration requires setting the connection string for the database",
            ),
        ];
        let terms = tokenize("database configuration");
        let scored = score(&candidates, &terms, candidates.len());
        assert_eq!(scored[0].chunk_id, "docs/db.md#Configuration");
    }

    #[test]
    fn given_chunks_outside_term_matches_when_counted_then_total_exceeds_candidate_count() {
        let conn = Connection::open_in_memory().unwrap();
        pkb_store::schema::init_schema(&conn, false).unwrap();
        for (id, header, file_path, folder_path, content) in [
            ("a.md#A", "A", "a.md", "", "database configuration"),
            ("b.md#B", "B", "b.md", "", "unrelated prose about gardening"),
            ("c.md#C", "C", "c.md", "", "more unrelated prose about cooking"),
        ] {
            conn.execute(
                "INSERT INTO node_chunk(id, file_path, folder_path, header, content, frontmatter)
                 VALUES (?1, ?2, ?3, ?4, ?5, '{}')",
                rusqlite::params![id, file_path, folder_path, header, content],
            )
            .unwrap();
        }

        let terms = tokenize("database");
        let candidates = candidates(&conn, &terms, None).unwrap();
        assert_eq!(candidates.len(), 1);

        let total = total_documents(&conn, None).unwrap();
        assert_eq!(total, 3);
        assert_ne!(total, candidates.len());
    }
}
