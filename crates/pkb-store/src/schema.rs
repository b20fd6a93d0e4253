//! Schema matching §3 exactly, encoded relationally: one table per node
//! label plus one generic edge table keyed by `(label, src, dst)`. The real
//! Cypher-capable graph engine is treated as an out-of-scope external
//! collaborator (§1, §9); this store only has to honor its MATCH/MERGE/
//! DETACH-DELETE contract, not embed a third-party graph database.

use rusqlite::Connection;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS node_page (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS node_chunk (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    folder_path TEXT NOT NULL,
    header TEXT NOT NULL,
    content TEXT NOT NULL,
    frontmatter TEXT NOT NULL,
    embedding_dim INTEGER
);

CREATE TABLE IF NOT EXISTS node_tag (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS node_folder (
    path TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    has_index_page INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS node_attribute (
    id TEXT PRIMARY KEY,
    chunk_id TEXT NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS node_data_block (
    id TEXT PRIMARY KEY,
    chunk_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    data TEXT NOT NULL,
    file_path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edge (
    label TEXT NOT NULL,
    src TEXT NOT NULL,
    dst TEXT NOT NULL,
    props TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (label, src, dst)
);

CREATE INDEX IF NOT EXISTS idx_edge_label_src ON edge(label, src);
CREATE INDEX IF NOT EXISTS idx_edge_label_dst ON edge(label, dst);
CREATE INDEX IF NOT EXISTS idx_chunk_file_path ON node_chunk(file_path);
"#;

pub const CHUNK_VEC_TABLE: &str = "chunk_vec";

pub fn init_schema(conn: &Connection, enable_embeddings: bool) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if enable_embeddings {
        init_vector_table(conn, 1536)?;
    }
    Ok(())
}

/// `chunk_vec` is a `vec0` virtual table; its dimension is fixed at creation
/// time, so it is (re)created lazily once the active embedding dimension is
/// known. Safe to call repeatedly with the same dimension.
pub fn init_vector_table(conn: &Connection, dimension: i32) -> rusqlite::Result<()> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type IN ('table','virtual table') AND name = ?1)",
            [CHUNK_VEC_TABLE],
            |row| row.get(0),
        )
        .unwrap_or(false);
    if exists {
        return Ok(());
    }

    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {CHUNK_VEC_TABLE} USING vec0(chunk_id TEXT PRIMARY KEY, embedding float[{dimension}]);"
    ))
}
