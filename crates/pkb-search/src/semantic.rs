//! Vector candidate retrieval against `chunk_vec` (§4.3) using sqlite-vec's
//! `vec_distance_cosine`. Semantic ranking applies scope/filter_tags/
//! filter_pages as pre-filters in the query itself (§4.4), unlike keyword
//! ranking which only narrows by scope.

use std::collections::HashSet;

use pkb_errors::PkbError;
use rusqlite::{types::Value as SqlValue, Connection};

pub struct SemanticCandidate {
    pub chunk_id: String,
    pub file_path: String,
    pub header: String,
    pub content: String,
    /// Cosine similarity in `[-1, 1]`; higher is closer.
    pub similarity: f32,
}

#[allow(clippy::too_many_arguments)]
pub fn candidates(
    conn: &Connection,
    query_vector: &[f32],
    scope: Option<&str>,
    filter_tags: &HashSet<String>,
    filter_pages: &HashSet<String>,
    limit: usize,
) -> Result<Vec<SemanticCandidate>, PkbError> {
    let vector_bytes: Vec<u8> = query_vector.iter().flat_map(|f| f.to_le_bytes()).collect();

    let mut sql = String::from(
        "SELECT nc.id, nc.file_path, nc.header, nc.content, vec_distance_cosine(cv.embedding, ?1) AS distance
         FROM chunk_vec cv JOIN node_chunk nc ON nc.id = cv.chunk_id WHERE 1=1",
    );
    let mut bound: Vec<SqlValue> = vec![SqlValue::Blob(vector_bytes)];

    if let Some(scope) = scope {
        bound.push(SqlValue::Text(scope.to_string()));
        let scope_idx = bound.len();
        bound.push(SqlValue::Text(format!("{scope}/%")));
        let prefix_idx = bound.len();
        sql.push_str(&format!(" AND (nc.folder_path = ?{scope_idx} OR nc.folder_path LIKE ?{prefix_idx})"));
    }

    if !filter_tags.is_empty() {
        let placeholders = push_in_list(&mut bound, filter_tags);
        sql.push_str(&format!(
            " AND nc.id IN (SELECT src FROM edge WHERE label = 'TAGGED' AND dst IN ({placeholders}))"
        ));
    }

    if !filter_pages.is_empty() {
        let placeholders = push_in_list(&mut bound, filter_pages);
        sql.push_str(&format!(" AND nc.file_path IN ({placeholders})"));
    }

    sql.push_str(" ORDER BY distance ASC LIMIT ?");
    bound.push(SqlValue::Integer(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(bound.iter()), |row| {
        let distance: f64 = row.get(4)?;
        Ok(SemanticCandidate {
            chunk_id: row.get(0)?,
            file_path: row.get(1)?,
            header: row.get(2)?,
            content: row.get(3)?,
            similarity: (1.0 - distance) as f32,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn push_in_list(bound: &mut Vec<SqlValue>, items: &HashSet<String>) -> String {
    items
        .iter()
        .map(|item| {
            bound.push(SqlValue::Text(item.clone()));
            format!("?{}", bound.len())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
