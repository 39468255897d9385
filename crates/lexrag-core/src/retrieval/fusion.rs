//! Result Fusion (Reciprocal Rank Fusion)
//!
//! Merges ranked lists from multiple retrievers. Each result at zero-indexed
//! rank `r` in a source list contributes `weight / (r + k)` to an accumulator
//! keyed by `(id, content prefix)`; contributions for the same key sum across
//! sources. Only the rank within a source list matters, never wall-clock
//! arrival order, so fused output is deterministic even when the sources ran
//! concurrently.

use std::collections::HashMap;

use crate::retrieval::SearchResult;

/// Characters of content that participate in the fusion key. Two chunks of
/// one document share an id but differ here, so they are never merged.
const FUSION_KEY_PREFIX_CHARS: usize = 50;

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for hybrid fusion
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF smoothing constant (higher = more uniform weighting)
    pub rrf_k: f32,
    /// Weight for semantic results in the two-source hybrid
    pub semantic_weight: f32,
    /// Weight for keyword results in the two-source hybrid
    pub keyword_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            semantic_weight: 0.6,
            keyword_weight: 0.4,
        }
    }
}

// ============================================================================
// FUSION
// ============================================================================

/// One ranked result list with its fusion weight
#[derive(Debug, Clone)]
pub struct WeightedResults {
    pub results: Vec<SearchResult>,
    pub weight: f32,
}

/// Fuse ranked result sets with Reciprocal Rank Fusion.
///
/// Returns results ordered by fused score descending. The first occurrence
/// of a key provides the representative result; its score is replaced by the
/// accumulated RRF score.
pub fn reciprocal_rank_fusion(sets: Vec<WeightedResults>, k: f32) -> Vec<SearchResult> {
    let mut accumulator: HashMap<(String, String), (SearchResult, f32)> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();

    for set in sets {
        for (rank, result) in set.results.into_iter().enumerate() {
            let key = (result.id.clone(), content_prefix(&result.content));
            let contribution = set.weight / (rank as f32 + k);
            match accumulator.get_mut(&key) {
                Some((_, score)) => *score += contribution,
                None => {
                    order.push(key.clone());
                    accumulator.insert(key, (result, contribution));
                }
            }
        }
    }

    // Drain in first-seen order so equal scores keep a stable ordering
    let mut fused: Vec<SearchResult> = order
        .into_iter()
        .filter_map(|key| accumulator.remove(&key))
        .map(|(mut result, score)| {
            result.score = score;
            result
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

fn content_prefix(content: &str) -> String {
    content.chars().take(FUSION_KEY_PREFIX_CHARS).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SourceType;

    fn result(id: &str, content: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            content: content.to_string(),
            score: 0.5,
            source_type: SourceType::Semantic,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_heavier_weight_ranks_first() {
        let set_a = WeightedResults {
            results: vec![result("a", "texto a")],
            weight: 0.6,
        };
        let set_b = WeightedResults {
            results: vec![result("b", "texto b")],
            weight: 0.4,
        };

        let fused = reciprocal_rank_fusion(vec![set_a, set_b], 60.0);
        assert_eq!(fused[0].id, "a");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn test_overlapping_results_sum_contributions() {
        let set_a = WeightedResults {
            results: vec![result("shared", "mismo texto"), result("a", "texto a")],
            weight: 0.5,
        };
        let set_b = WeightedResults {
            results: vec![result("b", "texto b"), result("shared", "mismo texto")],
            weight: 0.5,
        };

        let fused = reciprocal_rank_fusion(vec![set_a, set_b], 60.0);
        // "shared" gets rank-0 + rank-1 contributions, beating both singles
        assert_eq!(fused[0].id, "shared");
        let expected = 0.5 / 60.0 + 0.5 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_same_id_different_content_not_merged() {
        let chunk_one = result("doc-1", "primer fragmento del documento con contenido propio y extenso");
        let chunk_two = result("doc-1", "segundo fragmento del documento con otro contenido distinto");
        let set = WeightedResults {
            results: vec![chunk_one, chunk_two],
            weight: 1.0,
        };

        let fused = reciprocal_rank_fusion(vec![set], 60.0);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_same_id_same_prefix_merges() {
        let long_shared: String = "x".repeat(60);
        let set_a = WeightedResults {
            results: vec![result("doc-1", &long_shared)],
            weight: 1.0,
        };
        let set_b = WeightedResults {
            results: vec![result("doc-1", &format!("{long_shared} con cola diferente"))],
            weight: 1.0,
        };

        // First 50 chars are identical, so the two entries fuse into one
        let fused = reciprocal_rank_fusion(vec![set_a, set_b], 60.0);
        assert_eq!(fused.len(), 1);
    }

    #[test]
    fn test_empty_sets() {
        let fused = reciprocal_rank_fusion(vec![], 60.0);
        assert!(fused.is_empty());

        let fused = reciprocal_rank_fusion(
            vec![WeightedResults {
                results: vec![],
                weight: 1.0,
            }],
            60.0,
        );
        assert!(fused.is_empty());
    }

    #[test]
    fn test_output_sorted_descending() {
        let set = WeightedResults {
            results: vec![
                result("a", "aaa"),
                result("b", "bbb"),
                result("c", "ccc"),
            ],
            weight: 1.0,
        };
        let fused = reciprocal_rank_fusion(vec![set], 60.0);
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_rank_not_raw_score_drives_fusion() {
        let mut high_raw = result("low-rank", "con puntaje crudo alto");
        high_raw.score = 99.0;
        let set = WeightedResults {
            results: vec![result("top-rank", "primero en su lista"), high_raw],
            weight: 1.0,
        };

        let fused = reciprocal_rank_fusion(vec![set], 60.0);
        assert_eq!(fused[0].id, "top-rank");
    }
}
