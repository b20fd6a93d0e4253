//! `get_graph_schema` (§4.8): a fixed description of the §3 node/edge
//! vocabulary. Served from an in-memory constant — no GraphStore round-trip
//! — the same way static `ServerInfo` capability descriptions are served
//! rather than querying live state for them.

use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct NodeSchema {
    pub label: &'static str,
    pub key: &'static str,
    pub properties: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct EdgeSchema {
    pub label: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub properties: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GraphSchema {
    pub nodes: Vec<NodeSchema>,
    pub edges: Vec<EdgeSchema>,
}

pub fn get_graph_schema() -> GraphSchema {
    GraphSchema {
        nodes: vec![
            NodeSchema { label: "Page", key: "name", properties: &["name"] },
            NodeSchema {
                label: "Chunk",
                key: "file_path#header",
                properties: &["file_path", "folder_path", "header", "content", "frontmatter", "embedding"],
            },
            NodeSchema { label: "Tag", key: "name", properties: &["name"] },
            NodeSchema {
                label: "Folder",
                key: "path",
                properties: &["path", "name", "has_index_page"],
            },
            NodeSchema {
                label: "Attribute",
                key: "chunk_id#name",
                properties: &["name", "value"],
            },
            NodeSchema {
                label: "DataBlock",
                key: "chunk_id#datablock#index",
                properties: &["tag", "data", "file_path"],
            },
        ],
        edges: vec![
            EdgeSchema { label: "HAS_CHUNK", from: "Page", to: "Chunk", properties: &["chunk_order"] },
            EdgeSchema { label: "PAGE_LINKS_TO", from: "Page", to: "Page", properties: &[] },
            EdgeSchema { label: "LINKS_TO", from: "Chunk", to: "Page", properties: &[] },
            EdgeSchema { label: "TAGGED", from: "Chunk", to: "Tag", properties: &[] },
            EdgeSchema { label: "EMBEDS", from: "Chunk", to: "Page", properties: &["header"] },
            EdgeSchema { label: "HAS_ATTRIBUTE", from: "Chunk", to: "Attribute", properties: &[] },
            EdgeSchema { label: "HAS_DATA_BLOCK", from: "Chunk", to: "DataBlock", properties: &[] },
            EdgeSchema { label: "DATA_TAGGED", from: "DataBlock", to: "Tag", properties: &[] },
            EdgeSchema { label: "IN_FOLDER", from: "Chunk", to: "Folder", properties: &[] },
            EdgeSchema { label: "CONTAINS", from: "Folder", to: "Folder", properties: &[] },
            EdgeSchema { label: "FOLDER_CONTAINS_PAGE", from: "Folder", to: "Page", properties: &[] },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_schema_when_requested_then_every_spec_edge_is_present() {
        let schema = get_graph_schema();
        let labels: Vec<&str> = schema.edges.iter().map(|e| e.label).collect();
        for expected in [
            "HAS_CHUNK",
            "PAGE_LINKS_TO",
            "LINKS_TO",
            "TAGGED",
            "EMBEDS",
            "HAS_ATTRIBUTE",
            "HAS_DATA_BLOCK",
            "DATA_TAGGED",
            "IN_FOLDER",
            "CONTAINS",
            "FOLDER_CONTAINS_PAGE",
        ] {
            assert!(labels.contains(&expected), "missing edge {expected}");
        }
    }
}
