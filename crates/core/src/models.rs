use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type Embedding = Vec<f64>;

/// A word window of the extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub start_word: usize,
    pub end_word: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: usize,
    pub embedding: Embedding,
    pub text_preview: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceCategory {
    HighlyRelevant,
    Relevant,
    SomewhatRelevant,
    LowRelevance,
}

impl RelevanceCategory {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            RelevanceCategory::HighlyRelevant
        } else if score > 0.6 {
            RelevanceCategory::Relevant
        } else if score > 0.4 {
            RelevanceCategory::SomewhatRelevant
        } else {
            RelevanceCategory::LowRelevance
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub explanation: String,
    pub relevance_category: RelevanceCategory,
    pub key_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub chunk_id: usize,
    pub similarity_score: f64,
    pub text: String,
    pub word_count: usize,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Embeddings,
    Ocr,
    Vision,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Embeddings => "embeddings",
            OperationKind::Ocr => "ocr",
            OperationKind::Vision => "vision",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform envelope returned by every top-level operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub operation_type: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl OperationResult {
    pub fn succeeded(
        kind: OperationKind,
        data: Map<String, Value>,
        metadata: Map<String, Value>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            operation_type: kind.as_str().to_string(),
            timestamp: Utc::now(),
            processing_time_seconds: 0.0,
            data,
            metadata,
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn failed(kind: OperationKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            operation_type: kind.as_str().to_string(),
            timestamp: Utc::now(),
            processing_time_seconds: 0.0,
            data: Map::new(),
            metadata: Map::new(),
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_time_seconds = seconds;
        self
    }
}

/// Which payload the embeddings operation should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingsRequest {
    Generate { chunk_size: Option<usize> },
    Search { query: String, top_k: usize },
}

impl Default for EmbeddingsRequest {
    fn default() -> Self {
        EmbeddingsRequest::Generate { chunk_size: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OcrRequest {
    Text { page_numbers: Option<Vec<u32>> },
    Structured { schema: Option<Value> },
}

impl Default for OcrRequest {
    fn default() -> Self {
        OcrRequest::Text { page_numbers: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisionRequest {
    Layout { page_numbers: Option<Vec<u32>> },
    Objects { object_types: Option<Vec<String>> },
}

impl Default for VisionRequest {
    fn default() -> Self {
        VisionRequest::Layout { page_numbers: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_thresholds_are_exclusive() {
        assert_eq!(RelevanceCategory::from_score(0.81), RelevanceCategory::HighlyRelevant);
        assert_eq!(RelevanceCategory::from_score(0.8), RelevanceCategory::Relevant);
        assert_eq!(RelevanceCategory::from_score(0.6), RelevanceCategory::SomewhatRelevant);
        assert_eq!(RelevanceCategory::from_score(0.4), RelevanceCategory::LowRelevance);
        assert_eq!(RelevanceCategory::from_score(-0.9), RelevanceCategory::LowRelevance);
    }

    #[test]
    fn enrichment_is_flattened_into_similarity_result() {
        let result = SimilarityResult {
            chunk_id: 2,
            similarity_score: 0.5,
            text: "pump pressure".to_string(),
            word_count: 2,
            enrichment: Some(Enrichment {
                explanation: "matches".to_string(),
                relevance_category: RelevanceCategory::SomewhatRelevant,
                key_phrases: vec!["pump".to_string()],
            }),
        };

        let value = serde_json::to_value(&result).expect("serializable");
        assert_eq!(value["relevance_category"], "somewhat_relevant");
        assert_eq!(value["explanation"], "matches");

        let raw = SimilarityResult {
            enrichment: None,
            ..result
        };
        let value = serde_json::to_value(&raw).expect("serializable");
        assert!(value.get("explanation").is_none());
    }

    #[test]
    fn failed_envelope_carries_single_error() {
        let result = OperationResult::failed(OperationKind::Embeddings, "boom");
        assert!(!result.success);
        assert_eq!(result.operation_type, "embeddings");
        assert_eq!(result.errors, vec!["boom".to_string()]);
        assert!(result.data.is_empty());
    }
}
