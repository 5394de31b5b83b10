//! Hit ranking and context-window expansion for the in-memory store.
//!
//! [`rank_hits`] turns a pre-scoped candidate set into a ranked list of
//! matches; [`expand_hits`] then widens each match into a small window of
//! surrounding messages from its own thread so callers see tool calls and
//! answers next to the message that matched.

use std::collections::{HashMap, HashSet};

use threadloom_core::{Message, MessageRange, SearchMessagesRequest};

use crate::vector::{rank_by_similarity, reciprocal_rank_fusion, RRF_K};

/// Rank candidates against a search request.
///
/// Keyword scoring always runs over the request text. When the request
/// carries a query embedding, cosine ranking runs as well and the two lists
/// are merged with reciprocal rank fusion; if either side comes back empty
/// the other stands alone. Returns at most `request.limit` messages.
pub(crate) fn rank_hits(candidates: &[Message], request: &SearchMessagesRequest) -> Vec<Message> {
    let keyword_hits = rank_by_keyword(candidates, &request.text, request.limit);

    match &request.vector {
        Some(query) => {
            let vector_hits = rank_by_similarity(
                candidates,
                query,
                request.limit,
                request.vector_score_threshold,
            );
            if keyword_hits.is_empty() {
                vector_hits
            } else if vector_hits.is_empty() {
                keyword_hits
            } else {
                reciprocal_rank_fusion(&keyword_hits, &vector_hits, RRF_K, request.limit)
            }
        }
        None => keyword_hits,
    }
}

/// Score candidates by query-term occurrences in their text.
///
/// The query is split into lowercase terms and each term is counted
/// case-insensitively, so natural-language queries match messages that
/// share words without containing the whole phrase. Counts are normalized
/// by text length so short messages that are mostly query terms outrank
/// long ones that mention one term once.
fn rank_by_keyword(candidates: &[Message], query: &str, limit: usize) -> Vec<Message> {
    let needles: Vec<String> = query
        .split_whitespace()
        .map(|term| term.to_lowercase())
        .collect();
    if needles.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &Message)> = candidates
        .iter()
        .filter_map(|message| {
            let text = message.text()?;
            let haystack = text.to_lowercase();
            let occurrences: usize = needles
                .iter()
                .map(|needle| haystack.matches(needle.as_str()).count())
                .sum();
            if occurrences == 0 {
                return None;
            }
            let score = occurrences as f32 / (haystack.len() as f32 / 100.0).max(1.0);
            Some((score, message))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(_, message)| message.clone()).collect()
}

/// Expand ranked hits into windows of surrounding messages.
///
/// `sequences` maps thread id to that thread's in-scope messages in
/// chronological order. Each hit contributes itself plus up to
/// `range.before` earlier and `range.after` later neighbors from its own
/// thread. Windows are emitted in hit rank order and deduplicated by id, so
/// overlapping windows never repeat a message.
pub(crate) fn expand_hits(
    hits: &[Message],
    range: MessageRange,
    sequences: &HashMap<String, Vec<Message>>,
) -> Vec<Message> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut expanded = Vec::new();

    for hit in hits {
        let window = match hit.thread_id.as_ref().and_then(|id| sequences.get(id)) {
            Some(sequence) => match sequence.iter().position(|m| m.id == hit.id) {
                Some(position) => {
                    let start = position.saturating_sub(range.before);
                    let end = position
                        .saturating_add(range.after)
                        .min(sequence.len().saturating_sub(1));
                    sequence[start..=end].to_vec()
                }
                None => vec![hit.clone()],
            },
            None => vec![hit.clone()],
        };

        for message in window {
            if seen.insert(message.id.clone()) {
                expanded.push(message);
            }
        }
    }

    expanded
}
