use crate::error::OperationError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

pub const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_EMBEDDINGS_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MistralConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_MISTRAL_BASE_URL.to_string(),
            model: "mistral-medium".to_string(),
            max_tokens: 1_000,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub model: String,
    pub languages: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "tesseract".to_string(),
            languages: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub enabled: bool,
    pub model: String,
    pub confidence_threshold: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "yolov5".to_string(),
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderBackend {
    /// Content-seeded pseudo-random vectors.
    Seeded,
    /// Hashed character trigrams.
    Ngram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Placeholder,
    Lopdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub enabled: bool,
    pub model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub dimensions: usize,
    pub backend: EmbedderBackend,
    pub text_source: TextSource,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_EMBEDDINGS_MODEL.to_string(),
            chunk_size: 512,
            overlap: 50,
            dimensions: 384,
            backend: EmbedderBackend::Seeded,
            text_source: TextSource::Placeholder,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 4_096,
            ttl: Duration::from_secs(3_600),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiPdfConfig {
    pub mistral: MistralConfig,
    pub ocr: OcrConfig,
    pub vision: VisionConfig,
    pub embeddings: EmbeddingsConfig,
    pub cache: CacheConfig,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Accepted for compatibility; LLM calls are attempted once.
    pub max_retries: u32,
    pub max_pages_per_request: usize,
    pub max_file_size_bytes: usize,
}

impl Default for AiPdfConfig {
    fn default() -> Self {
        Self {
            mistral: MistralConfig::default(),
            ocr: OcrConfig::default(),
            vision: VisionConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            cache: CacheConfig::default(),
            timeout: Duration::from_secs(300),
            max_retries: 3,
            max_pages_per_request: 50,
            max_file_size_bytes: 50 * 1024 * 1024,
        }
    }
}

impl AiPdfConfig {
    pub fn validate(&self) -> Result<(), OperationError> {
        let embeddings = &self.embeddings;
        if embeddings.chunk_size == 0 {
            return Err(OperationError::InvalidConfig(
                "embeddings chunk_size must be greater than 0".to_string(),
            ));
        }
        if embeddings.overlap >= embeddings.chunk_size {
            return Err(OperationError::InvalidConfig(format!(
                "embeddings overlap {} must be smaller than chunk_size {}",
                embeddings.overlap, embeddings.chunk_size
            )));
        }
        if embeddings.dimensions == 0 {
            return Err(OperationError::InvalidConfig(
                "embedding dimensions must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.mistral.temperature) {
            return Err(OperationError::InvalidConfig(format!(
                "mistral temperature {} is outside 0.0..=2.0",
                self.mistral.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.vision.confidence_threshold) {
            return Err(OperationError::InvalidConfig(format!(
                "vision confidence_threshold {} is outside 0.0..=1.0",
                self.vision.confidence_threshold
            )));
        }
        if self.timeout.is_zero() {
            return Err(OperationError::InvalidConfig(
                "timeout must be greater than 0 seconds".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(OperationError::InvalidConfig(
                "cache capacity must be greater than 0 when caching is enabled".to_string(),
            ));
        }
        if self.max_pages_per_request == 0 {
            return Err(OperationError::InvalidConfig(
                "max_pages_per_request must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AiPdfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embeddings.chunk_size, 512);
        assert_eq!(config.embeddings.overlap, 50);
        assert_eq!(config.embeddings.dimensions, 384);
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let mut config = AiPdfConfig::default();
        config.embeddings.chunk_size = 10;
        config.embeddings.overlap = 10;
        assert!(matches!(
            config.validate(),
            Err(OperationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AiPdfConfig = serde_json::from_str(
            r#"{"embeddings": {"chunk_size": 64, "overlap": 8}, "timeout": 30}"#,
        )
        .expect("config should parse");

        assert_eq!(config.embeddings.chunk_size, 64);
        assert_eq!(config.embeddings.backend, EmbedderBackend::Seeded);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.mistral.model, "mistral-medium");
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut config = AiPdfConfig::default();
        config.mistral.api_key = Some("secret".to_string());
        let rendered = serde_json::to_string(&config).expect("serializable");
        assert!(!rendered.contains("secret"));
    }
}
