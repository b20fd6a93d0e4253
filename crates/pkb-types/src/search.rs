use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    Rrf,
    Weighted,
}

impl Default for FusionMethod {
    fn default() -> Self {
        FusionMethod::Rrf
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub limit: Option<usize>,
    #[serde(default)]
    pub filter_tags: HashSet<String>,
    #[serde(default)]
    pub filter_pages: HashSet<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub fusion_method: FusionMethod,
    pub semantic_weight: Option<f32>,
    pub keyword_weight: Option<f32>,
}

impl SearchOptions {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(10)
    }

    /// Normalizes `(semantic_weight, keyword_weight)` to sum to 1, defaulting
    /// to 0.5/0.5 when neither is provided.
    pub fn effective_weights(&self) -> (f32, f32) {
        let (sem, kw) = match (self.semantic_weight, self.keyword_weight) {
            (None, None) => (0.5, 0.5),
            (Some(s), None) => (s, 1.0 - s),
            (None, Some(k)) => (1.0 - k, k),
            (Some(s), Some(k)) => (s, k),
        };
        let total = sem + kw;
        if total.abs() < f32::EPSILON {
            (0.5, 0.5)
        } else {
            (sem / total, kw / total)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub chunk_id: String,
    pub file_path: String,
    pub header: String,
    pub content: String,
    pub keyword_score: f32,
    pub semantic_score: f32,
    pub hybrid_score: f32,
}
