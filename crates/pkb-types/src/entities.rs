use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A logical page. Key: relative file path with the trailing `.md` stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub name: String,
}

/// A contiguous section of a page, split at `##` boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Chunk {
    pub file_path: String,
    pub folder_path: String,
    pub header: String,
    pub content: String,
    /// JSON-serialized front-matter mapping.
    pub frontmatter: Value,
    #[schemars(skip)]
    pub embedding: Option<Vec<f32>>,
    pub links: Vec<String>,
    pub tags: Vec<String>,
    pub transclusions: Vec<Transclusion>,
    pub inline_attributes: Vec<(String, String)>,
    pub data_blocks: Vec<DataBlock>,
}

impl Chunk {
    pub fn key(&self) -> String {
        crate::chunk_key(&self.file_path, &self.header)
    }
}

/// `![[page#header]]` or `![[page]]` occurring in a chunk's unexpanded text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transclusion {
    pub target: String,
    pub header: Option<String>,
}

/// A hashtag occurrence, either from content tokens or front-matter `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    pub name: String,
}

/// A directory in the space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Folder {
    pub path: String,
    pub name: String,
    pub has_index_page: bool,
}

/// An inline `[name: value]` occurrence attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Attribute {
    pub chunk_id: String,
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn key(&self) -> String {
        crate::attribute_key(&self.chunk_id, &self.name)
    }
}

/// A fenced code block whose info string begins with `#`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataBlock {
    pub tag: String,
    pub data: Value,
    pub file_path: String,
}
