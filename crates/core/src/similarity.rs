use crate::models::{Chunk, EmbeddingRecord, SimilarityResult};
use std::collections::HashMap;

const STOP_WORDS: [&str; 39] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "may", "might", "must", "can", "this", "that", "these",
    "those",
];

/// Cosine of the angle between `left` and `right`.
///
/// Returns `0.0` when the lengths differ or either vector has zero
/// magnitude.
pub fn cosine_similarity(left: &[f64], right: &[f64]) -> f64 {
    if left.len() != right.len() {
        return 0.0;
    }

    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f64>();
    let left_norm = left.iter().map(|a| a * a).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|b| b * b).sum::<f64>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }

    dot / (left_norm * right_norm)
}

/// Scores every record against `query`, best first, keeping at most `top_k`.
///
/// Equal scores keep document order. `records` and `chunks` are parallel
/// sequences produced by the same chunking pass.
pub fn rank(
    query: &[f64],
    records: &[EmbeddingRecord],
    chunks: &[Chunk],
    top_k: usize,
) -> Vec<SimilarityResult> {
    let mut scored = records
        .iter()
        .zip(chunks)
        .map(|(record, chunk)| SimilarityResult {
            chunk_id: record.chunk_id,
            similarity_score: cosine_similarity(query, &record.embedding),
            text: chunk.text.clone(),
            word_count: chunk.word_count,
            enrichment: None,
        })
        .collect::<Vec<_>>();

    // sort_by is stable, ties stay in chunk order
    scored.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
    scored.truncate(top_k.min(records.len()));
    scored
}

/// Up to five most frequent non-stop-words (longer than two characters).
pub fn extract_key_phrases(text: &str) -> Vec<String> {
    let mut order = Vec::<String>::new();
    let mut counts = HashMap::<String, usize>::new();

    for word in text.to_lowercase().split_whitespace() {
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        let count = counts.entry(word.to_string()).or_insert(0);
        if *count == 0 {
            order.push(word.to_string());
        }
        *count += 1;
    }

    order.sort_by(|left, right| counts[right].cmp(&counts[left]));
    order.truncate(5);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{split_into_chunks, ChunkingConfig};
    use crate::embeddings::{Embedder, SeededEmbedder};

    fn embed_all(chunks: &[Chunk], embedder: &dyn Embedder) -> Vec<EmbeddingRecord> {
        chunks
            .iter()
            .map(|chunk| EmbeddingRecord {
                chunk_id: chunk.id,
                embedding: embedder.embed(&chunk.text),
                text_preview: chunk.text.clone(),
                word_count: chunk.word_count,
            })
            .collect()
    }

    #[test]
    fn self_similarity_is_one() {
        let vector = SeededEmbedder::default().embed("relief valve");
        assert!((cosine_similarity(&vector, &vector) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_or_mismatched_vectors_score_zero() {
        let vector = vec![0.3, -0.2, 0.9];
        assert_eq!(cosine_similarity(&vector, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&vector, &[0.3, -0.2]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        let score = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((score + 1.0).abs() < 1e-12);
    }

    #[test]
    fn ranking_is_sorted_and_bounded() {
        let text = (0..25).map(|index| format!("token{index}")).collect::<Vec<_>>().join(" ");
        let config = ChunkingConfig::new(5, 0).expect("valid config");
        let chunks = split_into_chunks(&text, config);
        assert_eq!(chunks.len(), 5);

        let embedder = SeededEmbedder::default();
        let records = embed_all(&chunks, &embedder);
        let query = embedder.embed("token3 token4");

        let results = rank(&query, &records, &chunks, 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].similarity_score >= results[1].similarity_score);

        let all = rank(&query, &records, &chunks, 50);
        assert_eq!(all.len(), 5);
        for pair in all.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }

    #[test]
    fn identical_query_text_ranks_its_chunk_first() {
        let text = "pump housing inspection torque values for flange bolts and gasket seating";
        let chunks = split_into_chunks(text, ChunkingConfig::new(4, 1).expect("valid config"));
        let embedder = SeededEmbedder::default();
        let records = embed_all(&chunks, &embedder);

        let target = &chunks[2];
        let results = rank(&embedder.embed(&target.text), &records, &chunks, chunks.len());
        assert_eq!(results[0].chunk_id, target.id);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_document_order() {
        let chunks = split_into_chunks("a b c", ChunkingConfig::new(1, 0).expect("valid config"));
        let records = chunks
            .iter()
            .map(|chunk| EmbeddingRecord {
                chunk_id: chunk.id,
                embedding: vec![1.0, 0.0],
                text_preview: chunk.text.clone(),
                word_count: 1,
            })
            .collect::<Vec<_>>();

        let ids = rank(&[1.0, 0.0], &records, &chunks, 3)
            .into_iter()
            .map(|result| result.chunk_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn key_phrases_skip_stop_words_and_rank_by_frequency() {
        let phrases = extract_key_phrases(
            "The valve and the valve seat: pressure on valve seat is the pressure limit",
        );
        assert_eq!(phrases[0], "valve");
        assert!(phrases.contains(&"pressure".to_string()));
        assert!(!phrases.iter().any(|phrase| phrase == "the" || phrase == "is"));
        assert!(phrases.len() <= 5);
    }

    #[test]
    fn only_listed_function_words_are_dropped() {
        let phrases = extract_key_phrases("its seal from the pump into its");
        assert_eq!(phrases[0], "its");
        assert!(phrases.contains(&"from".to_string()));
        assert!(phrases.contains(&"into".to_string()));
        assert!(!phrases.contains(&"the".to_string()));
    }
}
