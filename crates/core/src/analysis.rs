//! LLM enrichment of raw embeddings output.
//!
//! Every function here degrades gracefully: a failing model call becomes a
//! warning plus placeholder text, never an error.

use crate::models::{Chunk, Enrichment, RelevanceCategory, SimilarityResult};
use crate::similarity::extract_key_phrases;
use crate::traits::ChatModel;
use serde::{Deserialize, Serialize};
use tracing::warn;

const ANALYSIS_EXCERPT_CHARS: usize = 2_000;
const MATCH_EXCERPT_CHARS: usize = 500;
pub const FALLBACK_EXPLANATION: &str = "Semantic match based on embedding similarity";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub total_chunks: usize,
    pub avg_chunk_length: f64,
    pub content_coverage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub content_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_summary: Option<ChunkSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_insights: Vec<String>,
}

impl ContentAnalysis {
    fn fallback(message: &str) -> Self {
        Self {
            content_analysis: message.to_string(),
            chunk_summary: None,
            key_insights: Vec::new(),
        }
    }
}

/// Outcome of an enrichment step plus any warnings it produced.
#[derive(Debug, Clone)]
pub struct Enriched<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn key_insights(chunks: &[Chunk]) -> Vec<String> {
    let total_words = chunks.iter().map(|chunk| chunk.word_count).sum::<usize>();
    let average = if chunks.is_empty() {
        0.0
    } else {
        total_words as f64 / chunks.len() as f64
    };

    let mut insights = vec![format!(
        "Document contains {} text chunks with average {:.0} words per chunk",
        chunks.len(),
        average
    )];

    if total_words > 5_000 {
        insights.push("Large document - comprehensive embeddings coverage achieved".to_string());
    } else if total_words < 500 {
        insights.push("Short document - may benefit from smaller chunk sizes".to_string());
    }

    insights
}

pub async fn analyze_content(
    model: &dyn ChatModel,
    full_text: &str,
    chunks: &[Chunk],
) -> Enriched<ContentAnalysis> {
    let response = model
        .analyze_text(
            take_chars(full_text, ANALYSIS_EXCERPT_CHARS),
            "analyze the content and identify key themes, topics, and important information",
            Some("This is text extracted from a PDF document for embeddings and search"),
        )
        .await;

    match response {
        Ok(completion) => match completion.first_content() {
            Some(analysis) => {
                let total_words = chunks.iter().map(|chunk| chunk.word_count).sum::<usize>();
                Enriched {
                    value: ContentAnalysis {
                        content_analysis: analysis.to_string(),
                        chunk_summary: Some(ChunkSummary {
                            total_chunks: chunks.len(),
                            avg_chunk_length: if chunks.is_empty() {
                                0.0
                            } else {
                                total_words as f64 / chunks.len() as f64
                            },
                            content_coverage: "complete".to_string(),
                        }),
                        key_insights: key_insights(chunks),
                    },
                    warnings: Vec::new(),
                }
            }
            None => Enriched {
                value: ContentAnalysis::fallback("Content processed but AI analysis unavailable"),
                warnings: vec!["AI content analysis returned no choices".to_string()],
            },
        },
        Err(error) => {
            warn!(error = %error, "ai content analysis failed");
            Enriched {
                value: ContentAnalysis::fallback("Content processed but AI analysis failed"),
                warnings: vec![format!("AI content analysis failed: {error}")],
            }
        }
    }
}

/// Adds an explanation, relevance category and key phrases to each result.
///
/// After the first failed model call the remaining results get the fallback
/// explanation without contacting the model again.
pub async fn enrich_results(
    model: &dyn ChatModel,
    query: &str,
    results: &[SimilarityResult],
) -> Enriched<Vec<SimilarityResult>> {
    let mut warnings = Vec::new();
    let mut model_available = true;
    let mut enriched = Vec::with_capacity(results.len());

    for result in results {
        let mut explanation = FALLBACK_EXPLANATION.to_string();

        if model_available {
            let context = format!(
                "Query: {query}\nMatched text: {}",
                take_chars(&result.text, MATCH_EXCERPT_CHARS)
            );
            match model
                .analyze_text(
                    &context,
                    "explain why this text matches the query and provide context",
                    Some("This is a search result from semantic similarity matching"),
                )
                .await
            {
                Ok(completion) => {
                    if let Some(content) = completion.first_content() {
                        explanation = content.to_string();
                    }
                }
                Err(error) => {
                    warn!(chunk_id = result.chunk_id, error = %error, "search result enrichment failed");
                    warnings.push(format!("AI search enrichment failed: {error}"));
                    model_available = false;
                }
            }
        }

        enriched.push(SimilarityResult {
            enrichment: Some(Enrichment {
                explanation,
                relevance_category: RelevanceCategory::from_score(result.similarity_score),
                key_phrases: extract_key_phrases(&result.text),
            }),
            ..result.clone()
        });
    }

    Enriched {
        value: enriched,
        warnings,
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeChatModel;
    use super::*;

    fn chunk(id: usize, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            start_word: 0,
            end_word: text.split_whitespace().count(),
            word_count: text.split_whitespace().count(),
        }
    }

    fn result(chunk_id: usize, score: f64, text: &str) -> SimilarityResult {
        SimilarityResult {
            chunk_id,
            similarity_score: score,
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
            enrichment: None,
        }
    }

    #[test]
    fn insights_flag_short_documents() {
        let insights = key_insights(&[chunk(0, "one two three"), chunk(1, "four five")]);
        assert_eq!(
            insights[0],
            "Document contains 2 text chunks with average 2 words per chunk"
        );
        assert_eq!(insights[1], "Short document - may benefit from smaller chunk sizes");
    }

    #[tokio::test]
    async fn successful_analysis_includes_summary() {
        let model = FakeChatModel::replying("Themes: valves");
        let chunks = vec![chunk(0, "valve seat pressure")];
        let analysis = analyze_content(&model, "valve seat pressure", &chunks).await;

        assert!(analysis.warnings.is_empty());
        assert_eq!(analysis.value.content_analysis, "Themes: valves");
        let summary = analysis.value.chunk_summary.expect("summary present");
        assert_eq!(summary.total_chunks, 1);
        assert_eq!(summary.content_coverage, "complete");
    }

    #[tokio::test]
    async fn failed_analysis_degrades_to_warning() {
        let model = FakeChatModel::failing();
        let analysis = analyze_content(&model, "text", &[chunk(0, "text")]).await;

        assert_eq!(
            analysis.value.content_analysis,
            "Content processed but AI analysis failed"
        );
        assert!(analysis.value.chunk_summary.is_none());
        assert_eq!(analysis.warnings.len(), 1);
    }

    #[tokio::test]
    async fn analysis_prompt_is_truncated() {
        let model = FakeChatModel::replying("ok");
        let long_text = "x".repeat(5_000);
        analyze_content(&model, &long_text, &[]).await;

        let prompts = model.prompts.lock().expect("prompts lock");
        assert_eq!(prompts[1].len(), 2_000);
    }

    #[tokio::test]
    async fn enrichment_adds_category_and_phrases() {
        let model = FakeChatModel::replying("Matches the pump query");
        let raw = vec![result(3, 0.9, "pump pump impeller"), result(1, 0.5, "gasket seat")];
        let enriched = enrich_results(&model, "pump", &raw).await;

        assert!(enriched.warnings.is_empty());
        assert_eq!(model.call_count(), 2);
        let first = enriched.value[0].enrichment.as_ref().expect("enriched");
        assert_eq!(first.explanation, "Matches the pump query");
        assert_eq!(first.relevance_category, RelevanceCategory::HighlyRelevant);
        assert_eq!(first.key_phrases[0], "pump");
        assert_eq!(enriched.value[1].chunk_id, 1);
    }

    #[tokio::test]
    async fn failing_model_is_called_once_and_not_retried() {
        let model = FakeChatModel::failing();
        let raw = vec![result(0, 0.7, "a b c"), result(1, 0.3, "d e f"), result(2, 0.1, "g h i")];
        let enriched = enrich_results(&model, "query", &raw).await;

        assert_eq!(model.call_count(), 1);
        assert_eq!(enriched.warnings.len(), 1);
        assert_eq!(enriched.value.len(), 3);
        for item in &enriched.value {
            let enrichment = item.enrichment.as_ref().expect("fallback enrichment");
            assert_eq!(enrichment.explanation, FALLBACK_EXPLANATION);
        }
        assert_eq!(
            enriched.value[0].enrichment.as_ref().map(|e| e.relevance_category),
            Some(RelevanceCategory::Relevant)
        );
    }
}
