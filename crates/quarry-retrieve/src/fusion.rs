//! Reciprocal rank fusion over per-sub-query result lists.

use std::cmp::Ordering;
use std::collections::HashMap;

use quarry_core::types::RetrievedChunk;

/// Fuse ranked lists by summed reciprocal rank.
///
/// Each list contributes `1 / (k + rank + 1)` per chunk for ranks below
/// `rank_cap`; a chunk appearing in several lists accumulates. The fused
/// score replaces `similarity` on the first-seen payload while the
/// component scores stay as retrieved. Ties break on chunk id so the
/// output does not depend on list order.
pub fn reciprocal_rank_fusion(
    lists: Vec<Vec<RetrievedChunk>>,
    rank_cap: usize,
    k: u32,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut payloads: HashMap<String, RetrievedChunk> = HashMap::new();

    for list in lists {
        for (rank, chunk) in list.into_iter().take(rank_cap).enumerate() {
            *scores.entry(chunk.chunk_id.clone()).or_default() +=
                1.0 / (k as f32 + rank as f32 + 1.0);
            payloads.entry(chunk.chunk_id.clone()).or_insert(chunk);
        }
    }

    let mut fused: Vec<RetrievedChunk> = payloads
        .into_values()
        .map(|mut chunk| {
            chunk.similarity = scores[&chunk.chunk_id];
            chunk
        })
        .collect();
    fused.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused.truncate(top_k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            doc_id: format!("doc-{}", id),
            similarity: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_fusion_prefers_consensus() {
        let a = vec![chunk("c1"), chunk("c2"), chunk("c3")];
        let b = vec![chunk("c2"), chunk("c4")];
        let fused = reciprocal_rank_fusion(vec![a, b], 30, 60, 10);

        // c2 appears in both lists and outranks every single-list chunk
        assert_eq!(fused[0].chunk_id, "c2");
        assert!((fused[0].similarity - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
        assert_eq!(fused.len(), 4);
        for pair in fused.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_fusion_is_order_independent() {
        let a = vec![chunk("c1"), chunk("c2")];
        let b = vec![chunk("c3"), chunk("c1")];
        let x = reciprocal_rank_fusion(vec![a.clone(), b.clone()], 30, 60, 10);
        let y = reciprocal_rank_fusion(vec![b, a], 30, 60, 10);

        let ids_x: Vec<_> = x.iter().map(|c| c.chunk_id.as_str()).collect();
        let ids_y: Vec<_> = y.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids_x, ids_y);
    }

    #[test]
    fn test_fusion_rank_cap_and_top_k() {
        let long = |n: usize| -> Vec<RetrievedChunk> {
            (0..n).map(|i| chunk(&format!("c{:02}", i))).collect()
        };
        let fused = reciprocal_rank_fusion(vec![long(40)], 30, 60, 5);
        assert_eq!(fused.len(), 5);

        // ranks past the cap contribute nothing
        let all = reciprocal_rank_fusion(vec![long(40)], 30, 60, 100);
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn test_fusion_empty() {
        assert!(reciprocal_rank_fusion(vec![], 30, 60, 5).is_empty());
        assert!(reciprocal_rank_fusion(vec![vec![]], 30, 60, 5).is_empty());
    }
}
