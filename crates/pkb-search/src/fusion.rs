//! Combines keyword and semantic rankings (§4.4): Reciprocal Rank Fusion
//! (k=60) or a weighted blend of min-max normalized keyword scores and
//! rank-decayed semantic scores. The teacher only ever does a fixed 0.7/0.3
//! weighted blend; RRF and configurable weights are this system's addition.

use std::collections::HashMap;

use pkb_types::FusionMethod;

const RRF_K: f32 = 60.0;
const SEMANTIC_RANK_DECAY: f32 = 0.1;

pub struct Ranked {
    pub chunk_id: String,
    pub keyword_score: f32,
    pub semantic_score: f32,
    pub hybrid_score: f32,
}

/// `keyword` and `semantic` are each pre-sorted best-first by their own
/// ranking function; entries absent from one side score 0 on that side.
///
/// Per-spec single-side fallback: if one side is empty, the other side's
/// ranking is returned unchanged with `hybrid_score` equal to its own
/// exposed score (rank-decay for a semantic-only result, so the decay
/// applies uniformly whether or not keyword candidates exist).
pub fn fuse(
    keyword: &[(String, f32)],
    semantic: &[(String, f32)],
    method: FusionMethod,
    semantic_weight: f32,
    keyword_weight: f32,
) -> Vec<Ranked> {
    if semantic.is_empty() {
        let min_max = min_max(keyword.iter().map(|(_, s)| *s));
        return keyword
            .iter()
            .map(|(id, s)| {
                let norm = normalize(*s, min_max);
                Ranked {
                    chunk_id: id.clone(),
                    keyword_score: norm,
                    semantic_score: 0.0,
                    hybrid_score: norm,
                }
            })
            .collect();
    }
    if keyword.is_empty() {
        return semantic
            .iter()
            .enumerate()
            .map(|(rank, (id, s))| {
                let decayed = (-SEMANTIC_RANK_DECAY * rank as f32).exp();
                Ranked {
                    chunk_id: id.clone(),
                    keyword_score: 0.0,
                    semantic_score: *s,
                    hybrid_score: decayed,
                }
            })
            .collect();
    }

    let keyword_rank: HashMap<&str, usize> =
        keyword.iter().enumerate().map(|(i, (id, _))| (id.as_str(), i)).collect();
    let semantic_rank: HashMap<&str, usize> =
        semantic.iter().enumerate().map(|(i, (id, _))| (id.as_str(), i)).collect();
    let keyword_raw: HashMap<&str, f32> = keyword.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    let semantic_raw: HashMap<&str, f32> = semantic.iter().map(|(id, s)| (id.as_str(), *s)).collect();

    let mut ids: Vec<String> = keyword.iter().map(|(id, _)| id.clone()).collect();
    for (id, _) in semantic {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }

    let keyword_min_max = min_max(keyword.iter().map(|(_, s)| *s));

    let mut raw: Vec<(String, f32, f32, f32)> = ids
        .into_iter()
        .map(|id| {
            let kw_norm = keyword_raw
                .get(id.as_str())
                .map(|&s| normalize(s, keyword_min_max))
                .unwrap_or(0.0);
            let sem_score = semantic_raw.get(id.as_str()).copied().unwrap_or(0.0);

            let hybrid = match method {
                FusionMethod::Rrf => {
                    let kw_term = keyword_rank
                        .get(id.as_str())
                        .map(|&r| 1.0 / (RRF_K + r as f32 + 1.0))
                        .unwrap_or(0.0);
                    let sem_term = semantic_rank
                        .get(id.as_str())
                        .map(|&r| 1.0 / (RRF_K + r as f32 + 1.0))
                        .unwrap_or(0.0);
                    kw_term + sem_term
                }
                FusionMethod::Weighted => {
                    let sem_decayed = semantic_rank
                        .get(id.as_str())
                        .map(|&r| (-SEMANTIC_RANK_DECAY * r as f32).exp())
                        .unwrap_or(0.0);
                    keyword_weight * kw_norm + semantic_weight * sem_decayed
                }
            };

            (id, kw_norm, sem_score, hybrid)
        })
        .collect();

    // RRF scores are min-max normalized within the fused set (§4.4); the
    // weighted blend is already composed of normalized/decayed terms.
    if matches!(method, FusionMethod::Rrf) {
        let hybrid_min_max = min_max(raw.iter().map(|(_, _, _, h)| *h));
        for entry in &mut raw {
            entry.3 = normalize(entry.3, hybrid_min_max);
        }
    }

    let mut ranked: Vec<Ranked> = raw
        .into_iter()
        .map(|(chunk_id, keyword_score, semantic_score, hybrid_score)| Ranked {
            chunk_id,
            keyword_score,
            semantic_score,
            hybrid_score,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.hybrid_score
            .partial_cmp(&a.hybrid_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    ranked
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v), max.max(v)))
}

fn normalize(value: f32, (min, max): (f32, f32)) -> f32 {
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    (value - min) / (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_only_keyword_hits_when_fused_rrf_then_keyword_order_preserved() {
        let keyword = vec![("a".to_string(), 3.0), ("b".to_string(), 1.0)];
        let semantic = vec![];
        let ranked = fuse(&keyword, &semantic, FusionMethod::Rrf, 0.5, 0.5);
        assert_eq!(ranked[0].chunk_id, "a");
        assert_eq!(ranked[1].chunk_id, "b");
    }

    #[test]
    fn given_agreement_on_top_rank_when_fused_weighted_then_that_item_wins() {
        let keyword = vec![("a".to_string(), 5.0), ("b".to_string(), 4.0)];
        let semantic = vec![("a".to_string(), 0.9), ("b".to_string(), 0.2)];
        let ranked = fuse(&keyword, &semantic, FusionMethod::Weighted, 0.5, 0.5);
        assert_eq!(ranked[0].chunk_id, "a");
    }
}
