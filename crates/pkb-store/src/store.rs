//! `GraphStore` (§4.3): schema init, chunk/folder indexing, deletion with
//! orphan GC, and query execution.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use pkb_errors::PkbError;
use pkb_types::{attribute_key, chunk_key, data_block_key, page_name_from_rel_path, Chunk, EdgeLabel, Folder};
use rusqlite::{params, Connection};
use serde_json::json;

use crate::schema::{init_schema, init_vector_table, CHUNK_VEC_TABLE};
use crate::sqlite_ext::register_auto_extension;

pub struct GraphStore {
    conn: Connection,
    embeddings_enabled: bool,
}

impl GraphStore {
    /// Opens (creating parent directories as needed) the database at `path`.
    /// On open failure with `auto_recover`, deletes the WAL/SHM siblings and
    /// retries once.
    pub fn open(path: &Path, read_only: bool, enable_embeddings: bool, auto_recover: bool) -> Result<Self, PkbError> {
        register_auto_extension().map_err(|e| PkbError::Store(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PkbError::Store(e.to_string()))?;
        }

        let conn = match Self::try_open(path, read_only) {
            Ok(conn) => conn,
            Err(err) if auto_recover && !read_only => {
                tracing::warn!(%err, "failed to open store, attempting wal/shm recovery");
                Self::remove_wal_files(path);
                Self::try_open(path, read_only)?
            }
            Err(err) => return Err(err),
        };

        if !read_only {
            init_schema(&conn, enable_embeddings).map_err(PkbError::from)?;
        }

        Ok(Self {
            conn,
            embeddings_enabled: enable_embeddings,
        })
    }

    fn try_open(path: &Path, read_only: bool) -> Result<Connection, PkbError> {
        let conn = if read_only {
            Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?
        } else {
            Connection::open(path)?
        };
        conn.pragma_update(None, "foreign_keys", 1)?;
        Ok(conn)
    }

    fn remove_wal_files(path: &Path) {
        for suffix in ["-wal", "-shm"] {
            let mut candidate: PathBuf = path.to_path_buf();
            let name = format!("{}{suffix}", candidate.file_name().and_then(|n| n.to_str()).unwrap_or_default());
            candidate.set_file_name(name);
            let _ = std::fs::remove_file(candidate);
        }
    }

    pub fn embeddings_enabled(&self) -> bool {
        self.embeddings_enabled
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Ensures the vector virtual table exists for the active embedding
    /// dimension. A no-op once created.
    pub fn ensure_vector_table(&self, dimension: i32) -> Result<(), PkbError> {
        init_vector_table(&self.conn, dimension).map_err(PkbError::from)
    }

    pub fn index_chunks(&mut self, chunks: &[Chunk]) -> Result<(), PkbError> {
        let tx = self.conn.transaction()?;

        let mut page_link_targets: HashMap<String, HashSet<String>> = HashMap::new();
        let mut chunk_orders: HashMap<String, usize> = HashMap::new();

        for chunk in chunks {
            let page_name = page_name_from_rel_path(&chunk.file_path);
            let order = *chunk_orders
                .entry(page_name.clone())
                .and_modify(|n| *n += 1)
                .or_insert(0);

            tx.execute(
                "INSERT INTO node_page(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![page_name],
            )?;

            let id = chunk.key();
            let frontmatter_json = serde_json::to_string(&chunk.frontmatter).unwrap_or_else(|_| "{}".to_string());
            tx.execute(
                "INSERT INTO node_chunk(id, file_path, folder_path, header, content, frontmatter, embedding_dim)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    file_path=excluded.file_path, folder_path=excluded.folder_path,
                    header=excluded.header, content=excluded.content,
                    frontmatter=excluded.frontmatter, embedding_dim=excluded.embedding_dim",
                params![
                    id,
                    chunk.file_path,
                    chunk.folder_path,
                    chunk.header,
                    chunk.content,
                    frontmatter_json,
                    chunk.embedding.as_ref().map(|v| v.len() as i64),
                ],
            )?;

            if let Some(embedding) = &chunk.embedding {
                if self.embeddings_enabled {
                    init_vector_table(&tx, embedding.len() as i32)?;
                    let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
                    tx.execute(
                        &format!("INSERT INTO {CHUNK_VEC_TABLE}(chunk_id, embedding) VALUES (?1, ?2) ON CONFLICT(chunk_id) DO UPDATE SET embedding=excluded.embedding"),
                        params![id, bytes],
                    )?;
                }
            }

            upsert_edge(&tx, EdgeLabel::HasChunk, &page_name, &id, json!({ "chunk_order": order }))?;
            upsert_edge(&tx, EdgeLabel::InFolder, &id, &chunk.folder_path, json!(null))?;
            if !chunk.folder_path.is_empty() {
                upsert_edge(&tx, EdgeLabel::FolderContainsPage, &chunk.folder_path, &page_name, json!(null))?;
            }

            for link_target in &chunk.links {
                tx.execute(
                    "INSERT INTO node_page(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![link_target],
                )?;
                upsert_edge(&tx, EdgeLabel::LinksTo, &id, link_target, json!(null))?;
                page_link_targets.entry(page_name.clone()).or_default().insert(link_target.clone());
            }

            for tag in &chunk.tags {
                tx.execute(
                    "INSERT INTO node_tag(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![tag],
                )?;
                upsert_edge(&tx, EdgeLabel::Tagged, &id, tag, json!(null))?;
            }

            for transclusion in &chunk.transclusions {
                tx.execute(
                    "INSERT INTO node_page(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![transclusion.target],
                )?;
                upsert_edge(
                    &tx,
                    EdgeLabel::Embeds,
                    &id,
                    &transclusion.target,
                    json!({ "header": transclusion.header }),
                )?;
            }

            for (name, value) in &chunk.inline_attributes {
                let attr_id = attribute_key(&id, name);
                tx.execute(
                    "INSERT INTO node_attribute(id, chunk_id, name, value) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET value=excluded.value",
                    params![attr_id, id, name, value],
                )?;
                upsert_edge(&tx, EdgeLabel::HasAttribute, &id, &attr_id, json!(null))?;
            }

            for (index, block) in chunk.data_blocks.iter().enumerate() {
                let block_id = data_block_key(&id, index);
                let data_json = serde_json::to_string(&block.data).unwrap_or_else(|_| "null".to_string());
                tx.execute(
                    "INSERT INTO node_data_block(id, chunk_id, tag, data, file_path) VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET tag=excluded.tag, data=excluded.data, file_path=excluded.file_path",
                    params![block_id, id, block.tag, data_json, block.file_path],
                )?;
                upsert_edge(&tx, EdgeLabel::HasDataBlock, &id, &block_id, json!(null))?;
                upsert_edge(&tx, EdgeLabel::DataTagged, &block_id, &block.tag, json!(null))?;
            }
        }

        for (page_name, targets) in page_link_targets {
            for target in targets {
                upsert_edge(&tx, EdgeLabel::PageLinksTo, &page_name, &target, json!(null))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn index_folders(&mut self, folders: &[Folder]) -> Result<(), PkbError> {
        let tx = self.conn.transaction()?;
        for folder in folders {
            tx.execute(
                "INSERT INTO node_folder(path, name, has_index_page) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET name=excluded.name, has_index_page=excluded.has_index_page",
                params![folder.path, folder.name, folder.has_index_page as i64],
            )?;
            if let Some((parent, _)) = folder.path.rsplit_once('/') {
                upsert_edge(&tx, EdgeLabel::Contains, parent, &folder.path, json!(null))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Detach-deletes chunks for `file_path`, then garbage-collects orphan
    /// Tag/Page/Attribute/DataBlock nodes.
    ///
    /// Also clears the deleted file's page-level `PAGE_LINKS_TO` aggregate
    /// (the watcher always pairs this with a following `index_chunks` on
    /// modify, or nothing on a real delete): `DELETE FROM edge WHERE src=?1
    /// OR dst=?1` above only matches chunk-id endpoints, so without this the
    /// aggregate edge would survive a page losing its last link to a target
    /// that still exists (§3's "aggregated wikilink between pages" would go
    /// stale instead of being rebuilt from the page's current link union).
    pub fn delete_chunks_by_file(&mut self, file_path: &str) -> Result<(), PkbError> {
        let tx = self.conn.transaction()?;

        let chunk_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM node_chunk WHERE file_path = ?1")?;
            let rows = stmt.query_map(params![file_path], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        for id in &chunk_ids {
            tx.execute("DELETE FROM edge WHERE src = ?1 OR dst = ?1", params![id])?;
            tx.execute("DELETE FROM node_attribute WHERE chunk_id = ?1", params![id])?;
            tx.execute("DELETE FROM node_data_block WHERE chunk_id = ?1", params![id])?;
            tx.execute(
                &format!("DELETE FROM {CHUNK_VEC_TABLE} WHERE chunk_id = ?1"),
                params![id],
            )
            .ok();
        }
        tx.execute("DELETE FROM node_chunk WHERE file_path = ?1", params![file_path])?;

        let page_name = page_name_from_rel_path(file_path);
        tx.execute(
            "DELETE FROM edge WHERE label = ?1 AND src = ?2",
            params![EdgeLabel::PageLinksTo.as_str(), page_name],
        )?;

        gc_orphans(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), PkbError> {
        let tx = self.conn.transaction()?;
        for table in [
            "edge",
            "node_chunk",
            "node_page",
            "node_tag",
            "node_folder",
            "node_attribute",
            "node_data_block",
        ] {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.execute(&format!("DELETE FROM {CHUNK_VEC_TABLE}"), []).ok();
        tx.commit()?;
        Ok(())
    }
}

fn upsert_edge(
    conn: &Connection,
    label: EdgeLabel,
    src: &str,
    dst: &str,
    props: serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO edge(label, src, dst, props) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(label, src, dst) DO UPDATE SET props=excluded.props",
        params![label.as_str(), src, dst, props.to_string()],
    )?;
    Ok(())
}

fn gc_orphans(tx: &rusqlite::Transaction) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM node_tag WHERE name NOT IN (
            SELECT dst FROM edge WHERE label IN ('TAGGED', 'DATA_TAGGED')
        )",
        [],
    )?;
    tx.execute(
        "DELETE FROM node_attribute WHERE id NOT IN (
            SELECT dst FROM edge WHERE label = 'HAS_ATTRIBUTE'
        )",
        [],
    )?;
    tx.execute(
        "DELETE FROM node_data_block WHERE id NOT IN (
            SELECT dst FROM edge WHERE label = 'HAS_DATA_BLOCK'
        )",
        [],
    )?;
    tx.execute(
        "DELETE FROM node_page WHERE name NOT IN (
            SELECT src FROM edge WHERE label = 'HAS_CHUNK'
            UNION
            SELECT dst FROM edge WHERE label IN ('LINKS_TO', 'EMBEDS', 'PAGE_LINKS_TO')
        )",
        [],
    )?;
    tx.execute("DELETE FROM edge WHERE label = 'TAGGED' AND dst NOT IN (SELECT name FROM node_tag)", [])?;
    tx.execute("DELETE FROM edge WHERE label = 'HAS_ATTRIBUTE' AND dst NOT IN (SELECT id FROM node_attribute)", [])?;
    tx.execute("DELETE FROM edge WHERE label = 'HAS_DATA_BLOCK' AND dst NOT IN (SELECT id FROM node_data_block)", [])?;
    tx.execute("DELETE FROM edge WHERE label IN ('LINKS_TO','EMBEDS','PAGE_LINKS_TO','HAS_CHUNK','FOLDER_CONTAINS_PAGE') AND dst NOT IN (SELECT name FROM node_page) AND src NOT IN (SELECT name FROM node_page)", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_types::Chunk;
    use serde_json::json as j;

    fn sample_chunk(file_path: &str, header: &str, tags: Vec<&str>) -> Chunk {
        linked_chunk(file_path, header, tags, vec![])
    }

    fn linked_chunk(file_path: &str, header: &str, tags: Vec<&str>, links: Vec<&str>) -> Chunk {
        Chunk {
            file_path: file_path.to_string(),
            folder_path: String::new(),
            header: header.to_string(),
            content: format!("content for {header}"),
            frontmatter: j!({}),
            embedding: None,
            links: links.into_iter().map(String::from).collect(),
            tags: tags.into_iter().map(String::from).collect(),
            transclusions: vec![],
            inline_attributes: vec![],
            data_blocks: vec![],
        }
    }

    #[test]
    fn given_same_chunk_list_indexed_twice_when_compared_then_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let mut store = GraphStore::open(&db_path, false, false, true).unwrap();

        let chunks = vec![sample_chunk("A.md", "A", vec!["x"])];
        store.index_chunks(&chunks).unwrap();
        let count_before: i64 = store.conn().query_row("SELECT COUNT(*) FROM edge", [], |r| r.get(0)).unwrap();
        store.index_chunks(&chunks).unwrap();
        let count_after: i64 = store.conn().query_row("SELECT COUNT(*) FROM edge", [], |r| r.get(0)).unwrap();
        assert_eq!(count_before, count_after);
    }

    #[test]
    fn given_tag_referencing_file_deleted_when_deleted_then_orphan_tag_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let mut store = GraphStore::open(&db_path, false, false, true).unwrap();

        store.index_chunks(&[sample_chunk("A.md", "A", vec!["only-here"])]).unwrap();
        store.delete_chunks_by_file("A.md").unwrap();

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM node_tag WHERE name = 'only-here'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn given_page_drops_a_link_when_reindexed_then_stale_page_links_to_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        let mut store = GraphStore::open(&db_path, false, false, true).unwrap();

        store.index_chunks(&[
            linked_chunk("A.md", "A", vec![], vec!["B"]),
            linked_chunk("B.md", "B", vec![], vec![]),
        ]).unwrap();
        let before: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM edge WHERE label = 'PAGE_LINKS_TO' AND src = 'A' AND dst = 'B'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(before, 1);

        store.delete_chunks_by_file("A.md").unwrap();
        store.index_chunks(&[linked_chunk("A.md", "A", vec![], vec![])]).unwrap();

        let after: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM edge WHERE label = 'PAGE_LINKS_TO' AND src = 'A'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(after, 0, "B still exists as a page, so PAGE_LINKS_TO A->B must not survive losing its only link");
    }
}
