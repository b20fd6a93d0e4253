//! Entity and relationship records shared by every component: the property
//! graph's node and edge vocabulary (§3), plus the search-result shape
//! returned by the hybrid search and tool surface layers.

mod edges;
mod entities;
mod search;

pub use edges::{Edge, EdgeLabel};
pub use entities::{Attribute, Chunk, DataBlock, Folder, Page, Tag, Transclusion};
pub use search::{FusionMethod, SearchOptions, SearchResult};

/// A stable string key identifying a node, e.g. a page name or `file_path#header`.
pub type PkbId = String;

pub fn chunk_key(file_path: &str, header: &str) -> PkbId {
    format!("{file_path}#{header}")
}

pub fn attribute_key(chunk_id: &str, name: &str) -> PkbId {
    format!("{chunk_id}#{name}")
}

pub fn data_block_key(chunk_id: &str, index: usize) -> PkbId {
    format!("{chunk_id}#datablock#{index}")
}

pub fn page_name_from_rel_path(rel_path: &str) -> String {
    rel_path.trim_end_matches(".md").replace('\\', "/")
}
