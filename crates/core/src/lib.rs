pub mod analysis;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod mistral;
pub mod models;
pub mod orchestrator;
pub mod pdf_ops;
pub mod processors;
pub mod similarity;
pub mod traits;

pub use analysis::{analyze_content, enrich_results, ContentAnalysis, FALLBACK_EXPLANATION};
pub use cache::{cache_key, CacheStats, EmbeddingCache};
pub use chunking::{preview, split_into_chunks, ChunkingConfig};
pub use config::{
    AiPdfConfig, CacheConfig, EmbedderBackend, EmbeddingsConfig, MistralConfig, OcrConfig,
    TextSource, VisionConfig,
};
pub use embeddings::{
    embedder_from_config, CharacterNgramEmbedder, Embedder, SeededEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ExternalApiError, OperationError, PdfError};
pub use extractor::{
    document_extractor, ocr_extractor, LopdfExtractor, PlaceholderExtractor, TextExtractor,
};
pub use mistral::{ChatCompletion, ChatMessage, ChatRequest, MistralClient};
pub use models::{
    Chunk, Embedding, EmbeddingRecord, EmbeddingsRequest, Enrichment, OcrRequest, OperationKind,
    OperationResult, RelevanceCategory, SimilarityResult, VisionRequest,
};
pub use orchestrator::{Operation, ProcessingStage};
pub use pdf_ops::{
    has_pdf_signature, parse_page_range, read_metadata, split_by_ranges, split_into_pages,
    write_outputs, PdfMetadata,
};
pub use processors::{EmbeddingsProcessor, OcrProcessor, VisionProcessor};
pub use similarity::{cosine_similarity, extract_key_phrases, rank};
pub use traits::ChatModel;
