use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The eleven directed edge labels of the property graph (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    HasChunk,
    PageLinksTo,
    LinksTo,
    Tagged,
    Embeds,
    HasAttribute,
    HasDataBlock,
    DataTagged,
    InFolder,
    Contains,
    FolderContainsPage,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::HasChunk => "HAS_CHUNK",
            EdgeLabel::PageLinksTo => "PAGE_LINKS_TO",
            EdgeLabel::LinksTo => "LINKS_TO",
            EdgeLabel::Tagged => "TAGGED",
            EdgeLabel::Embeds => "EMBEDS",
            EdgeLabel::HasAttribute => "HAS_ATTRIBUTE",
            EdgeLabel::HasDataBlock => "HAS_DATA_BLOCK",
            EdgeLabel::DataTagged => "DATA_TAGGED",
            EdgeLabel::InFolder => "IN_FOLDER",
            EdgeLabel::Contains => "CONTAINS",
            EdgeLabel::FolderContainsPage => "FOLDER_CONTAINS_PAGE",
        }
    }
}

/// A directed, unique edge upserted with `MERGE`-style semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub label: EdgeLabel,
    pub src: String,
    pub dst: String,
    pub props: Value,
}

impl Edge {
    pub fn new(label: EdgeLabel, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            label,
            src: src.into(),
            dst: dst.into(),
            props: Value::Null,
        }
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}
