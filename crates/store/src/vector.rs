//! Vector similarity scoring and rank fusion for message search.

use std::collections::HashMap;

use threadloom_core::Message;

/// Cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` when the vectors differ in
/// length, are empty, or either has (near-)zero magnitude. Accumulates in
/// `f64` to keep long vectors numerically stable.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank candidates by cosine similarity to a query embedding.
///
/// Candidates without a stored embedding are skipped; those scoring below
/// `min_score` are dropped. Returns at most `limit` messages, most similar
/// first.
pub fn rank_by_similarity(
    candidates: &[Message],
    query: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<Message> {
    let mut scored: Vec<(f32, &Message)> = candidates
        .iter()
        .filter_map(|message| {
            let embedding = message.embedding.as_ref()?;
            let similarity = cosine_similarity(embedding, query);
            (similarity >= min_score).then_some((similarity, message))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, message)| message.clone()).collect()
}

/// Standard smoothing constant for reciprocal rank fusion.
pub const RRF_K: u32 = 60;

/// Merge two ranked hit lists with reciprocal rank fusion.
///
/// Each message scores `1 / (k + rank + 1)` per list it appears in, summed
/// across lists, so a message ranked well by both keyword and vector search
/// beats one ranked well by only one. Deduplicates by message id and returns
/// at most `limit` messages, best fused score first.
pub fn reciprocal_rank_fusion(
    keyword_hits: &[Message],
    vector_hits: &[Message],
    k: u32,
    limit: usize,
) -> Vec<Message> {
    let k = k as f32;
    let mut fused: HashMap<String, (f32, &Message)> = HashMap::new();

    for hits in [keyword_hits, vector_hits] {
        for (rank, message) in hits.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f32 + 1.0);
            fused
                .entry(message.id.clone())
                .and_modify(|(score, _)| *score += contribution)
                .or_insert((contribution, message));
        }
    }

    let mut ranked: Vec<(f32, &Message)> = fused.into_values().collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, message)| message.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadloom_core::Role;

    fn embedded(id: &str, order: i64, embedding: Vec<f32>) -> Message {
        let mut message = Message::at(order, 0, Role::User, id).with_embedding(embedding);
        message.id = id.to_string();
        message
    }

    #[test]
    fn identical_vectors_are_maximally_similar() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_or_degenerate_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn similarity_ranking_orders_and_thresholds() {
        let candidates = vec![
            embedded("close", 0, vec![1.0, 0.1]),
            embedded("far", 1, vec![0.0, 1.0]),
            embedded("exact", 2, vec![1.0, 0.0]),
        ];

        let ranked = rank_by_similarity(&candidates, &[1.0, 0.0], 10, 0.5);
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["exact", "close"]);
    }

    #[test]
    fn candidates_without_embeddings_are_skipped() {
        let mut plain = Message::at(0, 0, Role::User, "no embedding");
        plain.id = "plain".to_string();
        let candidates = vec![plain, embedded("hit", 1, vec![1.0, 0.0])];

        let ranked = rank_by_similarity(&candidates, &[1.0, 0.0], 10, 0.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "hit");
    }

    #[test]
    fn ranking_respects_the_limit() {
        let candidates: Vec<Message> = (0..5)
            .map(|i| embedded(&format!("m{i}"), i, vec![1.0, i as f32 * 0.01]))
            .collect();

        let ranked = rank_by_similarity(&candidates, &[1.0, 0.0], 2, 0.0);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn fusion_prefers_messages_ranked_by_both_lists() {
        let both = embedded("both", 0, vec![1.0]);
        let keyword_only = embedded("keyword", 1, vec![1.0]);
        let vector_only = embedded("vector", 2, vec![1.0]);

        let keyword_hits = vec![keyword_only.clone(), both.clone()];
        let vector_hits = vec![vector_only.clone(), both.clone()];

        let fused = reciprocal_rank_fusion(&keyword_hits, &vector_hits, RRF_K, 10);
        assert_eq!(fused[0].id, "both");
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn fusion_deduplicates_by_id_and_truncates() {
        let a = embedded("a", 0, vec![1.0]);
        let b = embedded("b", 1, vec![1.0]);
        let c = embedded("c", 2, vec![1.0]);

        let fused = reciprocal_rank_fusion(
            &[a.clone(), b.clone(), c.clone()],
            &[a.clone(), c.clone()],
            RRF_K,
            2,
        );
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "a");
    }

    #[test]
    fn fusion_of_one_empty_list_preserves_the_other_ranking() {
        let a = embedded("a", 0, vec![1.0]);
        let b = embedded("b", 1, vec![1.0]);

        let fused = reciprocal_rank_fusion(&[a.clone(), b.clone()], &[], RRF_K, 10);
        let ids: Vec<&str> = fused.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
