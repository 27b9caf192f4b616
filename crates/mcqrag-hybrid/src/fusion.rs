//! Score fusion of the dense and lexical candidate lists.

use std::collections::HashMap;

use mcqrag_core::config::{FusionStrategy, RetrievalSettings};
use mcqrag_core::types::{Chunk, RankedChunk, RetrievalResult, SearchHit};

/// Standard RRF constant from Cormack, Clarke and Buettcher (SIGIR 2009).
pub const RRF_K: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub strategy: FusionStrategy,
    pub dense_weight: f32,
    pub lexical_weight: f32,
    pub rrf_k: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self { strategy: FusionStrategy::MinMax, dense_weight: 0.6, lexical_weight: 0.4, rrf_k: RRF_K }
    }
}

impl From<&RetrievalSettings> for FusionParams {
    fn from(s: &RetrievalSettings) -> Self {
        Self { strategy: s.fusion, dense_weight: s.dense_weight, lexical_weight: s.lexical_weight, rrf_k: s.rrf_k }
    }
}

/// Fuse both sub-rankings and keep the best `top_k`.
///
/// Output order is descending fused score, ties broken by ascending chunk id,
/// so identical inputs always give identical output.
pub fn fuse(dense: &[SearchHit], lexical: &[SearchHit], params: &FusionParams, top_k: usize) -> RetrievalResult {
    let dense = dedup_by_id(dense);
    let lexical = dedup_by_id(lexical);

    let (dense_scores, lexical_scores) = match params.strategy {
        FusionStrategy::MinMax => (min_max(&dense), min_max(&lexical)),
        FusionStrategy::ReciprocalRank => (reciprocal_ranks(dense.len(), params.rrf_k), reciprocal_ranks(lexical.len(), params.rrf_k)),
    };

    let mut fused: HashMap<&str, (&Chunk, f32)> = HashMap::new();
    for (hit, s) in dense.iter().zip(dense_scores) {
        fused.entry(hit.chunk.id.as_str()).or_insert((&hit.chunk, 0.0)).1 += params.dense_weight * s;
    }
    for (hit, s) in lexical.iter().zip(lexical_scores) {
        fused.entry(hit.chunk.id.as_str()).or_insert((&hit.chunk, 0.0)).1 += params.lexical_weight * s;
    }

    let mut hits: Vec<RankedChunk> = fused
        .into_values()
        .map(|(chunk, score)| RankedChunk { chunk: chunk.clone(), score })
        .collect();
    sort_ranked(&mut hits);
    hits.truncate(top_k);
    RetrievalResult { hits }
}

pub fn sort_ranked(hits: &mut [RankedChunk]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id)));
}

/// First occurrence of each chunk id wins; engines return best-first.
fn dedup_by_id(hits: &[SearchHit]) -> Vec<&SearchHit> {
    let mut seen = std::collections::HashSet::new();
    hits.iter().filter(|h| seen.insert(h.chunk.id.as_str())).collect()
}

/// Scale to `[0, 1]`; a side whose scores are all equal maps to 1.0.
/// Non-finite scores contribute 0.
fn min_max(hits: &[&SearchHit]) -> Vec<f32> {
    let (lo, hi) = hits
        .iter()
        .map(|h| h.score)
        .filter(|s| s.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let range = hi - lo;
    hits.iter()
        .map(|h| {
            if !h.score.is_finite() {
                0.0
            } else if range > 0.0 {
                (h.score - lo) / range
            } else {
                1.0
            }
        })
        .collect()
}

/// `1 / (k + rank)` with 1-based ranks.
fn reciprocal_ranks(n: usize, k: f32) -> Vec<f32> {
    (1..=n).map(|rank| 1.0 / (k + rank as f32)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcqrag_core::types::SourceKind;

    fn hit(id: &str, score: f32, source: SourceKind) -> SearchHit {
        let chunk = Chunk {
            id: id.to_string(),
            doc_id: "d".into(),
            chunk_index: 0,
            char_start: 0,
            char_end: 1,
            text: id.to_string(),
            title: None,
            section: None,
            page: None,
        };
        SearchHit { chunk, score, source }
    }

    fn ids(r: &RetrievalResult) -> Vec<&str> {
        r.hits.iter().map(|h| h.chunk.id.as_str()).collect()
    }

    #[test]
    fn min_max_combines_weighted_sides() {
        let dense = vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.5, SourceKind::Vector)];
        let lexical = vec![hit("b", 12.0, SourceKind::Text), hit("c", 2.0, SourceKind::Text)];
        let r = fuse(&dense, &lexical, &FusionParams::default(), 10);
        // a: 0.6*1 ; b: 0.6*0 + 0.4*1 ; c: 0.4*0
        assert_eq!(ids(&r), vec!["a", "b", "c"]);
        assert!((r.hits[0].score - 0.6).abs() < 1e-6);
        assert!((r.hits[1].score - 0.4).abs() < 1e-6);
        assert_eq!(r.hits[2].score, 0.0);
    }

    #[test]
    fn equal_scores_normalise_to_one_and_ties_break_by_id() {
        let dense = vec![hit("z", 0.3, SourceKind::Vector), hit("m", 0.3, SourceKind::Vector)];
        let r = fuse(&dense, &[], &FusionParams::default(), 10);
        assert_eq!(ids(&r), vec!["m", "z"]);
        assert!(r.hits.iter().all(|h| (h.score - 0.6).abs() < 1e-6));
    }

    #[test]
    fn reciprocal_rank_prefers_items_in_both_lists() {
        let params = FusionParams { strategy: FusionStrategy::ReciprocalRank, dense_weight: 1.0, lexical_weight: 1.0, rrf_k: RRF_K };
        let dense = vec![hit("1", 0.9, SourceKind::Vector), hit("2", 0.8, SourceKind::Vector), hit("3", 0.7, SourceKind::Vector)];
        let lexical = vec![hit("3", 10.0, SourceKind::Text), hit("1", 8.0, SourceKind::Text), hit("4", 5.0, SourceKind::Text)];
        let r = fuse(&dense, &lexical, &params, 2);
        assert_eq!(ids(&r), vec!["1", "3"]);
        assert!((r.hits[0].score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
    }

    #[test]
    fn truncates_and_handles_empty() {
        assert!(fuse(&[], &[], &FusionParams::default(), 3).is_empty());
        let dense: Vec<_> = (0..10).map(|i| hit(&format!("c{i}"), i as f32, SourceKind::Vector)).collect();
        assert_eq!(fuse(&dense, &[], &FusionParams::default(), 3).len(), 3);
        assert!(fuse(&dense, &[], &FusionParams::default(), 0).is_empty());
    }

    #[test]
    fn duplicate_ids_within_a_side_count_once() {
        let dense = vec![hit("a", 0.9, SourceKind::Vector), hit("a", 0.1, SourceKind::Vector), hit("b", 0.1, SourceKind::Vector)];
        let r = fuse(&dense, &[], &FusionParams::default(), 10);
        assert_eq!(ids(&r), vec!["a", "b"]);
        assert!((r.hits[0].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn nan_scores_do_not_poison_ordering() {
        let dense = vec![hit("a", f32::NAN, SourceKind::Vector), hit("b", 0.5, SourceKind::Vector), hit("c", 0.1, SourceKind::Vector)];
        let r1 = fuse(&dense, &[], &FusionParams::default(), 10);
        let r2 = fuse(&dense, &[], &FusionParams::default(), 10);
        assert_eq!(r1, r2);
        assert_eq!(ids(&r1)[0], "b");
    }
}
